// ── Command dispatcher ──
//
// Sends one state change to one device. Targeted changes suppress the
// device's sync broadcast so synced peers are left alone; the master device
// gets its broadcast switched back on after a settle delay.

use std::time::Duration;

use naari_api::{DeviceClient, RetryPolicy, StatePatch, TransportConfig, with_retry};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::CoreError;
use crate::model::Device;

/// Pause between a master device's state change and its sync re-enable.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// A user-level state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Power(bool),
    /// Passed through unchecked; devices expect 0-255.
    Brightness(i64),
    Preset(i64),
}

impl Command {
    pub fn patch(self) -> StatePatch {
        match self {
            Self::Power(on) => StatePatch::power(on),
            Self::Brightness(bri) => StatePatch::brightness(bri),
            Self::Preset(ps) => StatePatch::preset(ps),
        }
    }
}

/// Result of a command that reached its device.
#[derive(Debug)]
pub struct CommandOutcome {
    pub address: String,
    /// HTTP status of the state change itself.
    pub status: u16,
    /// Outcome of the sync re-enable call; `None` for non-master devices.
    /// A failure here does not undo or fail the state change.
    pub resync: Option<Result<u16, CoreError>>,
}

impl CommandOutcome {
    pub fn resync_failed(&self) -> bool {
        matches!(self.resync, Some(Err(_)))
    }
}

#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    client: DeviceClient,
    policy: RetryPolicy,
    settle_delay: Duration,
}

impl CommandDispatcher {
    pub fn new(transport: &TransportConfig, policy: RetryPolicy) -> Result<Self, CoreError> {
        Ok(Self {
            client: DeviceClient::new(transport)?,
            policy,
            settle_delay: SETTLE_DELAY,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, CoreError> {
        Self::new(&settings.command_transport(), settings.command_retry())
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn send_command(&self, device: &Device, command: Command) -> Result<CommandOutcome, CoreError> {
        self.send_patch(device, command.patch()).await
    }

    /// Send `patch` with sync suppression merged in.
    ///
    /// For the master device, waits the settle delay after success and then
    /// re-enables its sync broadcast with the same retry policy.
    pub async fn send_patch(&self, device: &Device, patch: StatePatch) -> Result<CommandOutcome, CoreError> {
        let address = device.address.as_str();
        let status = self.send_raw(address, &patch.without_sync()).await?;
        info!(address, device_id = %device.id, status, "command applied");

        let resync = if device.master_sync {
            tokio::time::sleep(self.settle_delay).await;
            let resync = self.send_raw(address, &StatePatch::sync(true)).await;
            match &resync {
                Ok(status) => debug!(address, status, "sync broadcast re-enabled"),
                Err(err) => warn!(address, error = %err, "failed to re-enable sync broadcast"),
            }
            Some(resync)
        } else {
            None
        };

        Ok(CommandOutcome {
            address: address.to_owned(),
            status,
            resync,
        })
    }

    /// POST `patch` as-is, with retries.
    pub async fn send_raw(&self, address: &str, patch: &StatePatch) -> Result<u16, CoreError> {
        let status = with_retry(&self.policy, address, |attempt| {
            debug!(address, attempt, ?patch, "sending state");
            self.client.apply_state(address, patch)
        })
        .await?;
        Ok(status.as_u16())
    }
}
