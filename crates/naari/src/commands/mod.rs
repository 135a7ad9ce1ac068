//! Command dispatch: bridges CLI args -> panel operations -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use naari_core::Panel;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// `--config` / `NAARI_CONFIG`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(naari_config::config_path)
}

/// Load the config and run the startup load.
async fn load_panel(global: &GlobalOpts) -> Result<Panel, CliError> {
    let path = config_path(global);
    if !path.exists() {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }

    let config = naari_config::load_config(&path)?;
    let (registry, settings, themes) = config.into_parts()?;
    let panel = Panel::new(registry, themes, settings)?;

    let snapshot = panel.initialize().await?;
    if !snapshot.complete {
        tracing::warn!("some devices did not answer the startup poll");
    }
    Ok(panel)
}

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let panel = load_panel(global).await?;

    match cmd {
        Command::Status => status::status(&panel, global),
        Command::Presets => status::presets(&panel, global),
        Command::Power(args) => control::power(&panel, args, global).await,
        Command::Brightness(args) => control::brightness(&panel, args, global).await,
        Command::Preset(args) => control::preset(&panel, args, global).await,
        Command::Theme(args) => control::theme(&panel, args, global).await,
        Command::MasterPower => control::master_power(&panel, global).await,
        Command::Watch => watch::watch(&panel, global).await,
        // Handled before dispatch
        Command::Config(_) => Ok(()),
    }
}
