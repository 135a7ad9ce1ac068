//! `watch`: run the background poll loop and print each new snapshot.

use tokio::sync::broadcast::error::RecvError;

use naari_core::{Panel, PanelSignal};

use crate::cli::GlobalOpts;
use crate::commands::status::render_status;
use crate::error::CliError;
use crate::output;

fn describe(signal: &PanelSignal) -> String {
    match signal {
        PanelSignal::PollFailed {
            address, reason, ..
        } => format!("poll failed for {address}: {reason}"),
        PanelSignal::PollRejected { consecutive } => {
            format!("poll skipped, previous cycle still running ({consecutive} in a row)")
        }
        PanelSignal::PollStalled { consecutive } => {
            format!("polling stalled: {consecutive} consecutive cycles blocked")
        }
        PanelSignal::CommandFailed { device_id, reason } => {
            format!("command to device {device_id} failed: {reason}")
        }
    }
}

pub async fn watch(panel: &Panel, global: &GlobalOpts) -> Result<(), CliError> {
    let mut status = panel.subscribe_status();
    let mut signals = panel.signals();

    let initial = status.borrow_and_update().clone();
    output::print_output(&render_status(panel, &initial, global)?);

    panel.start_polling().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                output::print_output(&render_status(panel, &snapshot, global)?);
            }
            signal = signals.recv() => match signal {
                Ok(signal) => eprintln!("{}", describe(&signal)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dropped panel signals");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    panel.stop_polling().await;
    Ok(())
}
