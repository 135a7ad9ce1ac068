//! `status` and `presets` handlers.

use naari_core::{Panel, PollResult, PresetOptions, StatusFields};
use tabled::Tabled;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, cell};

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Bri")]
    brightness: String,
    #[tabled(rename = "Sync")]
    sync: String,
    #[tabled(rename = "Error")]
    error: String,
}

#[derive(Tabled)]
struct PresetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Presets")]
    presets: String,
}

fn status_row(panel: &Panel, result: &PollResult) -> StatusRow {
    let name = panel
        .registry()
        .by_address(result.address())
        .map(|d| d.display_name().to_owned())
        .unwrap_or_default();
    let fields = result.data().map(StatusFields::from_status).unwrap_or_default();

    StatusRow {
        id: cell(result.device_id()),
        name,
        address: result.address().to_owned(),
        power: cell(fields.on.map(|on| if on { "on" } else { "off" })),
        brightness: cell(fields.bri),
        sync: cell(fields.sync_send),
        error: result.error_reason().unwrap_or_default().to_owned(),
    }
}

/// Render a status list in the selected format.
pub fn render_status(panel: &Panel, results: &[PollResult], global: &GlobalOpts) -> Result<String, CliError> {
    output::render_list(global.output, results, |r| status_row(panel, r))
}

pub fn status(panel: &Panel, global: &GlobalOpts) -> Result<(), CliError> {
    let results = panel.status_snapshot();
    output::print_output(&render_status(panel, &results, global)?);
    Ok(())
}

pub fn presets(panel: &Panel, global: &GlobalOpts) -> Result<(), CliError> {
    let options: Vec<PresetOptions> = panel.preset_options()?;
    let rendered = output::render_list(global.output, &options, |o| PresetRow {
        id: o.device_id.to_string(),
        address: o.address.clone(),
        presets: o.options.join("\n"),
    })?;
    output::print_output(&rendered);
    Ok(())
}
