//! Clap derive structures for the `naari` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// naari -- control panel for LED strip controllers
#[derive(Debug, Parser)]
#[command(
    name = "naari",
    version,
    about = "Poll and control WLED-style LED strip controllers",
    long_about = "Poll status and presets from a fleet of LED strip controllers and\n\
        send power, brightness, preset and theme changes to them.\n\n\
        Devices, settings and themes come from a TOML config file.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "NAARI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll every active device once and show its state
    #[command(alias = "st")]
    Status,

    /// List presets of every active device
    Presets,

    /// Switch a device on or off
    Power(PowerArgs),

    /// Set a device's brightness
    #[command(alias = "bri")]
    Brightness(BrightnessArgs),

    /// Apply a saved preset on a device
    Preset(PresetArgs),

    /// Apply a theme across devices
    Theme(ThemeArgs),

    /// Toggle power on the master sync device (synced peers follow)
    MasterPower,

    /// Poll continuously and print status changes until interrupted
    Watch,

    /// Manage the config file
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerAction {
    On,
    Off,
    Toggle,
}

#[derive(Debug, Args)]
pub struct PowerArgs {
    /// Device id
    pub device: String,

    pub action: PowerAction,
}

#[derive(Debug, Args)]
pub struct BrightnessArgs {
    /// Device id
    pub device: String,

    /// Brightness, normally 0-255 (sent as given)
    #[arg(allow_negative_numbers = true)]
    pub value: i64,
}

#[derive(Debug, Args)]
pub struct PresetArgs {
    /// Device id
    pub device: String,

    /// Preset number, or a "N: Name" option string
    pub preset: String,
}

#[derive(Debug, Args)]
pub struct ThemeArgs {
    /// Theme id or name
    pub theme: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective config (file + env overrides)
    Show,

    /// Print the config file path
    Path,
}
