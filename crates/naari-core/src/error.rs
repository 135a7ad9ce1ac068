// ── Core error types ──
//
// User-facing errors from naari-core. Callers branch on the variant:
// retry exhaustion, single-flight rejection and the persistent-conflict
// threshold each have their own kind. The `From<naari_api::Error>` impl
// translates transport-layer errors into these.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device I/O ───────────────────────────────────────────────────
    #[error("Device {address} unreachable after {attempts} attempts: {cause}")]
    RetryExhausted {
        address: String,
        attempts: u32,
        #[source]
        cause: naari_api::Error,
    },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Device request failed: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Poll coordination ────────────────────────────────────────────
    #[error("A poll cycle is already in progress")]
    PollInProgress,

    #[error("Polling blocked by an in-flight cycle for {consecutive} consecutive attempts")]
    PollStalled { consecutive: u32 },

    #[error("Panel not initialized -- startup load has not completed")]
    NotReady,

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Theme not found: {identifier}")]
    ThemeNotFound { identifier: String },

    #[error("No master sync device configured")]
    NoMasterDevice,

    #[error("State of device {identifier} is unknown (no successful poll)")]
    UnknownDeviceState { identifier: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for outcomes that are expected under load rather
    /// than faults: a rejected overlapping poll, escalated or not.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::PollInProgress | Self::PollStalled { .. })
    }

    /// Returns `true` if a device could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<naari_api::Error> for CoreError {
    fn from(err: naari_api::Error) -> Self {
        match err {
            naari_api::Error::RetryExhausted {
                address,
                attempts,
                last,
            } => CoreError::RetryExhausted {
                address,
                attempts,
                cause: *last,
            },
            naari_api::Error::InvalidJson { url, message, .. } => {
                CoreError::InvalidResponse { url, message }
            }
            naari_api::Error::Status { url, status } => CoreError::Api {
                message: format!("HTTP {status} from {url}"),
                status: Some(status),
            },
            naari_api::Error::Transport(e) => CoreError::Api {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            naari_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid device address: {e}"),
            },
            naari_api::Error::ClientBuild(msg) => CoreError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_api_error_keeps_address_and_attempts() {
        let api = naari_api::Error::RetryExhausted {
            address: "10.0.0.5".into(),
            attempts: 3,
            last: Box::new(naari_api::Error::Status {
                url: "http://10.0.0.5/json/state".into(),
                status: 500,
            }),
        };
        let core = CoreError::from(api);
        match &core {
            CoreError::RetryExhausted {
                address,
                attempts,
                cause,
            } => {
                assert_eq!(address, "10.0.0.5");
                assert_eq!(*attempts, 3);
                assert_eq!(cause.status(), Some(500));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(core.is_unreachable());
    }

    #[test]
    fn invalid_json_becomes_invalid_response() {
        let core = CoreError::from(naari_api::Error::InvalidJson {
            url: "http://10.0.0.5/json".into(),
            message: "trailing characters".into(),
            body: "{}x".into(),
        });
        assert!(matches!(core, CoreError::InvalidResponse { .. }));
    }
}
