//! Device command handlers: power, brightness, preset, theme, master power.

use serde::Serialize;
use tabled::Tabled;

use naari_core::{CommandOutcome, Device, Panel, ThemeSend, parse_preset_option};

use crate::cli::{BrightnessArgs, GlobalOpts, PowerAction, PowerArgs, PresetArgs, ThemeArgs};
use crate::error::CliError;
use crate::output;

/// What one command did, as printed.
#[derive(Debug, Serialize)]
struct CommandReport {
    device: String,
    address: String,
    action: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    resync: Option<String>,
}

impl CommandReport {
    fn new(device: &Device, action: String, outcome: &CommandOutcome) -> Self {
        let resync = outcome.resync.as_ref().map(|r| match r {
            Ok(status) => format!("ok ({status})"),
            Err(err) => format!("failed: {err}"),
        });
        Self {
            device: device.display_name().to_owned(),
            address: outcome.address.clone(),
            action,
            status: outcome.status,
            resync,
        }
    }

    fn detail(&self) -> String {
        let mut line = format!("{} ({}): {} [HTTP {}]", self.device, self.address, self.action, self.status);
        if let Some(resync) = &self.resync {
            line.push_str(&format!("\nsync re-enable: {resync}"));
        }
        line
    }
}

fn print_report(report: &CommandReport, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = output::render_single(global.output, report, CommandReport::detail)?;
    output::print_output(&rendered);
    Ok(())
}

pub async fn power(panel: &Panel, args: PowerArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = panel.device(&args.device)?.clone();
    let (on, outcome) = match args.action {
        PowerAction::On => (true, panel.set_power(&device.id, true).await?),
        PowerAction::Off => (false, panel.set_power(&device.id, false).await?),
        PowerAction::Toggle => panel.toggle_power(&device.id).await?,
    };
    let action = format!("power {}", if on { "on" } else { "off" });
    print_report(&CommandReport::new(&device, action, &outcome), global)
}

pub async fn brightness(panel: &Panel, args: BrightnessArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = panel.device(&args.device)?.clone();
    let outcome = panel.set_brightness(&device.id, args.value).await?;
    let action = format!("brightness {}", args.value);
    print_report(&CommandReport::new(&device, action, &outcome), global)
}

pub async fn preset(panel: &Panel, args: PresetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let device = panel.device(&args.device)?.clone();
    let number = parse_preset_option(&args.preset).ok_or_else(|| CliError::Validation {
        field: "preset".into(),
        reason: format!("expected a preset number, got '{}'", args.preset),
    })?;

    let outcome = panel.apply_preset(&device.id, number).await?;
    let mut action = format!("preset {number}");
    if let Ok(Some(bri)) = panel.preset_brightness(&device.id, number) {
        action.push_str(&format!(" (brightness {bri})"));
    }
    print_report(&CommandReport::new(&device, action, &outcome), global)
}

#[derive(Debug, Serialize)]
struct ThemeReport {
    device_id: String,
    preset: i64,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Tabled)]
struct ThemeRow {
    #[tabled(rename = "Device")]
    device_id: String,
    #[tabled(rename = "Preset")]
    preset: i64,
    #[tabled(rename = "Result")]
    result: String,
}

impl From<&ThemeSend> for ThemeReport {
    fn from(send: &ThemeSend) -> Self {
        Self {
            device_id: send.device_id.to_string(),
            preset: send.preset,
            ok: send.result.is_ok(),
            error: send.result.as_ref().err().map(ToString::to_string),
        }
    }
}

pub async fn theme(panel: &Panel, args: ThemeArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sends = panel.apply_theme(&args.theme).await?;
    let reports: Vec<ThemeReport> = sends.iter().map(ThemeReport::from).collect();

    let rendered = output::render_list(global.output, &reports, |r| ThemeRow {
        device_id: r.device_id.clone(),
        preset: r.preset,
        result: r.error.clone().unwrap_or_else(|| "ok".into()),
    })?;
    output::print_output(&rendered);

    let failed = reports.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        tracing::warn!(failed, "theme applied partially");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct MasterReport {
    device: String,
    on: bool,
}

pub async fn master_power(panel: &Panel, global: &GlobalOpts) -> Result<(), CliError> {
    let on = panel.toggle_master_power().await?;
    let device = panel
        .registry()
        .master()
        .map(|d| d.display_name().to_owned())
        .unwrap_or_default();

    let report = MasterReport { device, on };
    let rendered = output::render_single(global.output, &report, |r| {
        format!("{}: all synced devices {}", r.device, if r.on { "on" } else { "off" })
    })?;
    output::print_output(&rendered);
    Ok(())
}
