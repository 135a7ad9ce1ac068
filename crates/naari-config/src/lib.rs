//! Configuration file for naari.
//!
//! One flat TOML file holds the device registry, the settings bag and the
//! themes. Loading layers the file and `NAARI_` environment variables
//! through figment, then validates the registry and resolves settings into
//! `naari_core::Settings`.

mod settings;

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use naari_core::{Device, Registry, Settings, Theme};

pub use settings::{RawSettings, Scalar, SettingValue, SettingWarning};

/// Env var naming an alternate config file.
pub const CONFIG_ENV: &str = "NAARI_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config ──────────────────────────────────────────────────────────

/// Whole config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub devices: Vec<Device>,

    #[serde(default)]
    pub settings: RawSettings,

    #[serde(default)]
    pub themes: Vec<Theme>,
}

impl Config {
    /// Check registry invariants: unique ids, at most one master.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry().map(|_| ())
    }

    pub fn registry(&self) -> Result<Registry, ConfigError> {
        Registry::new(self.devices.clone()).map_err(|err| ConfigError::Validation {
            field: "devices".into(),
            reason: err.to_string(),
        })
    }

    /// Resolved settings. Invalid entries are logged and replaced.
    pub fn resolve_settings(&self) -> (Settings, Vec<SettingWarning>) {
        self.settings.resolve()
    }

    /// Split into what `naari_core::Panel` is built from.
    pub fn into_parts(self) -> Result<(Registry, Settings, Vec<Theme>), ConfigError> {
        let registry = self.registry()?;
        let (settings, _) = self.resolve_settings();
        Ok((registry, settings, self.themes))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "naari", "naari").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("naari");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Table name used by older config files for `settings`.
const LEGACY_SETTINGS_KEY: &str = "ui_settings";

/// Load and validate the config at `path`, with env overrides applied.
///
/// A missing file yields an empty registry with default settings.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let file = Figment::from(Toml::file(path));

    // A legacy table sits underneath `settings`, so a `settings` table or an
    // env override still wins key by key.
    let mut figment = Figment::new();
    if file.contains(LEGACY_SETTINGS_KEY) {
        let legacy: RawSettings = file.focus(LEGACY_SETTINGS_KEY).extract()?;
        debug!(key = LEGACY_SETTINGS_KEY, "reading legacy settings table");
        figment = figment.merge(Serialized::default("settings", legacy));
    }
    let figment = figment
        .merge(file)
        .merge(Env::prefixed("NAARI_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    cfg.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// A fresh config with no devices and the starter settings.
pub fn make_empty_config() -> Config {
    let int = |n: i64| Some(SettingValue::typed(Scalar::Int(n), "int"));
    Config {
        devices: Vec::new(),
        settings: RawSettings {
            app_name: Some(SettingValue::typed(
                Scalar::Text("WLED Controller".into()),
                "str",
            )),
            polling_rate: int(3),
            connect_timeout: int(2),
            read_timeout: int(5),
            request_timeout: int(3),
            max_concurrency: int(10),
            retries: int(2),
            retry_backoff: Some(SettingValue::typed(Scalar::Float(0.25), "float")),
            ..RawSettings::default()
        },
        themes: Vec::new(),
    }
}

/// Write [`make_empty_config`] to `path`, creating parent directories.
pub fn write_empty_config(path: &Path) -> Result<Config, ConfigError> {
    let config = make_empty_config();
    save_config(&config, path)?;
    info!(path = %path.display(), "wrote empty config");
    Ok(config)
}
