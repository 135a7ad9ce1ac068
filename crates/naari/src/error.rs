//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text
//! and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use naari_config::ConfigError;
use naari_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Devices ──────────────────────────────────────────────────────

    #[error("Device {address} did not respond after {attempts} attempts")]
    #[diagnostic(
        code(naari::unreachable),
        help(
            "Check that the controller is powered and reachable.\n\
             Last error: {reason}\n\
             Timeouts and retries can be raised under [settings] in the config file."
        )
    )]
    Unreachable {
        address: String,
        attempts: u32,
        reason: String,
    },

    #[error("Device request failed: {message}")]
    #[diagnostic(code(naari::device_error))]
    DeviceError { message: String },

    #[error("State of device '{device}' is unknown")]
    #[diagnostic(
        code(naari::unknown_state),
        help("The device has not answered a status poll yet. Run: naari status")
    )]
    UnknownState { device: String },

    #[error("A poll cycle is already running")]
    #[diagnostic(code(naari::busy), help("Wait for the current poll to finish."))]
    Busy,

    // ── Lookups ──────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(naari::not_found),
        help("Check the {resource_type}s listed in the config file: naari config show")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("No master sync device configured")]
    #[diagnostic(
        code(naari::no_master),
        help("Set master_sync = true on one device in the config file.")
    )]
    NoMaster,

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(naari::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration file not found")]
    #[diagnostic(
        code(naari::no_config),
        help(
            "Create one with: naari config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(naari::config_exists),
        help("Use --force to overwrite: {path}")
    )]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(naari::config))]
    Config(#[from] ConfigError),

    // ── Internal ─────────────────────────────────────────────────────

    #[error("{0}")]
    #[diagnostic(code(naari::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(naari::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(naari::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::DeviceError { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } | Self::NoConfig { .. } | Self::NoMaster => exit_code::NOT_FOUND,
            Self::Busy | Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RetryExhausted {
                address,
                attempts,
                cause,
            } => CliError::Unreachable {
                address,
                attempts,
                reason: cause.to_string(),
            },

            CoreError::InvalidResponse { url, message } => CliError::DeviceError {
                message: format!("invalid response from {url}: {message}"),
            },

            CoreError::Api { message, .. } => CliError::DeviceError { message },

            CoreError::PollInProgress | CoreError::PollStalled { .. } => CliError::Busy,

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
            },

            CoreError::ThemeNotFound { identifier } => CliError::NotFound {
                resource_type: "theme".into(),
                identifier,
            },

            CoreError::NoMasterDevice => CliError::NoMaster,

            CoreError::UnknownDeviceState { identifier } => CliError::UnknownState { device: identifier },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::NotReady => CliError::Internal("device state was not loaded".into()),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
