// ── Panel facade ──
//
// Owns the registry, both dispatchers, the scheduler and the startup cache,
// and publishes what a front-end renders: the latest status snapshot (watch
// channel), preset lists and failure signals (broadcast channel).
//
// Operations that depend on the startup snapshot check readiness up front
// and return `CoreError::NotReady` instead of acting on empty state.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use naari_api::{STATUS_PATH, StatePatch, StatusFields};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::StartupCache;
use crate::command::{Command, CommandDispatcher, CommandOutcome, SETTLE_DELAY};
use crate::config::Settings;
use crate::error::CoreError;
use crate::fetch::FetchDispatcher;
use crate::model::{Device, DeviceId, PollCycle, PollResult, PresetCatalog, Registry, Theme};
use crate::normalize::attach_identity;
use crate::pool::WorkerPool;
use crate::schedule::{Scheduler, TickOutcome};

const SIGNAL_CAPACITY: usize = 64;

/// Fixed delays used around startup and master resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Wait before re-enabling a master device's sync broadcast.
    pub settle_delay: Duration,
    /// Gap between the first status fetch and the first presets fetch.
    pub initial_gap: Duration,
    /// Wait before each startup status re-poll.
    pub startup_repoll_delay: Duration,
    /// Extra status polls at startup when some device did not answer.
    pub startup_repolls: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            settle_delay: SETTLE_DELAY,
            initial_gap: Duration::from_millis(500),
            startup_repoll_delay: Duration::from_secs(2),
            startup_repolls: 2,
        }
    }
}

impl Timing {
    /// No waits at all. Re-poll count is kept.
    pub fn immediate() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            initial_gap: Duration::ZERO,
            startup_repoll_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// First status and presets load.
#[derive(Debug, Clone, Serialize)]
pub struct StartupSnapshot {
    pub status: Vec<PollResult>,
    pub presets: Vec<PollResult>,
    /// `false` if some device still had not answered after the re-polls.
    pub complete: bool,
}

/// Failure indicators for the front-end. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelSignal {
    PollFailed {
        address: String,
        device_id: Option<DeviceId>,
        reason: String,
    },
    PollRejected {
        consecutive: u32,
    },
    PollStalled {
        consecutive: u32,
    },
    CommandFailed {
        device_id: DeviceId,
        reason: String,
    },
}

/// Ordered preset choices for one active device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresetOptions {
    pub device_id: DeviceId,
    pub address: String,
    pub options: Vec<String>,
}

/// Per-device result of applying a theme.
#[derive(Debug)]
pub struct ThemeSend {
    pub device_id: DeviceId,
    pub preset: i64,
    pub result: Result<CommandOutcome, CoreError>,
}

struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct PanelInner {
    registry: Registry,
    themes: Vec<Theme>,
    settings: Settings,
    fetcher: FetchDispatcher,
    commands: CommandDispatcher,
    command_pool: WorkerPool,
    scheduler: Scheduler,
    startup: StartupCache<StartupSnapshot>,
    status: Arc<watch::Sender<Vec<PollResult>>>,
    presets: Arc<watch::Sender<Vec<PollResult>>>,
    signals: broadcast::Sender<PanelSignal>,
    poller: Mutex<Option<Poller>>,
}

impl Drop for PanelInner {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.cancel.cancel();
        }
    }
}

/// Cheaply cloneable handle; clones share all state.
///
/// The background poll loop holds only a weak reference, so dropping the
/// last handle stops it.
#[derive(Clone)]
pub struct Panel {
    inner: Arc<PanelInner>,
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("devices", &self.inner.registry.len())
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Panel {
    pub fn new(registry: Registry, themes: Vec<Theme>, settings: Settings) -> Result<Self, CoreError> {
        Self::with_timing(registry, themes, settings, Timing::default())
    }

    pub fn with_timing(
        registry: Registry,
        themes: Vec<Theme>,
        settings: Settings,
        timing: Timing,
    ) -> Result<Self, CoreError> {
        let fetcher = FetchDispatcher::from_settings(&settings);
        let commands = CommandDispatcher::from_settings(&settings)?.with_settle_delay(timing.settle_delay);
        let command_pool = WorkerPool::new("command", settings.command_workers);
        let scheduler = Scheduler::new(settings.throttle(), settings.conflict_threshold);

        let (status, _) = watch::channel(Vec::new());
        let (presets, _) = watch::channel(Vec::new());
        let status = Arc::new(status);
        let presets = Arc::new(presets);
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        let startup = {
            let fetcher = fetcher.clone();
            let devices = registry.all().to_vec();
            let status = Arc::clone(&status);
            let presets = Arc::clone(&presets);
            StartupCache::new(move || {
                let fetcher = fetcher.clone();
                let devices = devices.clone();
                let status = Arc::clone(&status);
                let presets = Arc::clone(&presets);
                async move {
                    let snapshot = startup_load(&fetcher, &devices, timing).await;
                    status.send_replace(snapshot.status.clone());
                    presets.send_replace(snapshot.presets.clone());
                    Ok(snapshot)
                }
                .boxed()
            })
        };

        Ok(Self {
            inner: Arc::new(PanelInner {
                registry,
                themes,
                settings,
                fetcher,
                commands,
                command_pool,
                scheduler,
                startup,
                status,
                presets,
                signals,
                poller: Mutex::new(None),
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn themes(&self) -> &[Theme] {
        &self.inner.themes
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Resolve a user-typed device id.
    pub fn device(&self, identifier: &str) -> Result<&Device, CoreError> {
        self.inner
            .registry
            .find(identifier)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: identifier.to_owned(),
            })
    }

    pub fn theme(&self, identifier: &str) -> Result<&Theme, CoreError> {
        self.inner
            .themes
            .iter()
            .find(|t| t.matches(identifier))
            .ok_or_else(|| CoreError::ThemeNotFound {
                identifier: identifier.to_owned(),
            })
    }

    // ── Startup ──────────────────────────────────────────────────────

    /// Run (or reuse) the startup load and mark the panel ready.
    pub async fn initialize(&self) -> Result<Arc<StartupSnapshot>, CoreError> {
        self.inner.startup.get_or_init().await
    }

    pub fn is_ready(&self) -> bool {
        self.inner.startup.is_ready()
    }

    pub fn ensure_ready(&self) -> Result<(), CoreError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(CoreError::NotReady)
        }
    }

    // ── Polling ──────────────────────────────────────────────────────

    /// Poll status now, bypassing the throttle but not the single-flight
    /// guard.
    pub async fn poll_status(&self) -> Result<PollCycle, CoreError> {
        match self.inner.scheduler.run_exclusive(|| self.poll_cycle()).await {
            Ok(cycle) => Ok(cycle),
            Err(CoreError::PollInProgress) => match self.inner.scheduler.rejection::<PollCycle>() {
                TickOutcome::Stalled { consecutive } => {
                    self.signal(PanelSignal::PollStalled { consecutive });
                    Err(CoreError::PollStalled { consecutive })
                }
                _ => {
                    self.signal(PanelSignal::PollRejected {
                        consecutive: self.inner.scheduler.consecutive_conflicts(),
                    });
                    Err(CoreError::PollInProgress)
                }
            },
            Err(err) => Err(err),
        }
    }

    /// One timer tick: throttled, guarded poll.
    pub async fn tick(&self) -> TickOutcome<PollCycle> {
        let device_count = self.inner.registry.active().count();
        let outcome = self.inner.scheduler.tick(device_count, || self.poll_cycle()).await;
        match &outcome {
            TickOutcome::Busy { consecutive } => self.signal(PanelSignal::PollRejected {
                consecutive: *consecutive,
            }),
            TickOutcome::Stalled { consecutive } => self.signal(PanelSignal::PollStalled {
                consecutive: *consecutive,
            }),
            TickOutcome::Throttled | TickOutcome::Completed(_) => {}
        }
        outcome
    }

    async fn poll_cycle(&self) -> PollCycle {
        let addresses = self.inner.registry.active_addresses();
        let mut cycle = self.inner.fetcher.fetch_cycle(&addresses, STATUS_PATH).await;
        cycle.results = attach_identity(cycle.results, self.inner.registry.all());

        for failed in cycle.results.iter().filter(|r| r.is_error()) {
            self.signal(PanelSignal::PollFailed {
                address: failed.address().to_owned(),
                device_id: failed.device_id().cloned(),
                reason: failed.error_reason().unwrap_or_default().to_owned(),
            });
        }
        if cycle.all_ok() {
            debug!(devices = cycle.results.len(), "status poll complete");
        } else {
            warn!(failed = cycle.failed_count(), devices = cycle.results.len(), "status poll incomplete");
        }

        self.inner.status.send_replace(cycle.results.clone());
        cycle
    }

    /// Start the background poll loop at `polling_rate`.
    ///
    /// No-op if already running.
    pub async fn start_polling(&self) -> Result<(), CoreError> {
        self.ensure_ready()?;
        let mut poller = self.inner.poller.lock().await;
        if poller.as_ref().is_some_and(|p| !p.handle.is_finished()) {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let weak: Weak<PanelInner> = Arc::downgrade(&self.inner);
        let token = cancel.clone();
        let period = self.inner.settings.polling_rate.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately; the startup load just polled.
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(inner) = weak.upgrade() else { break };
                        let _ = Panel { inner }.tick().await;
                    }
                }
            }
            debug!("poll loop stopped");
        });

        info!(period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX), "poll loop started");
        *poller = Some(Poller { cancel, handle });
        Ok(())
    }

    /// Stop the poll loop and wait for it to exit.
    pub async fn stop_polling(&self) {
        let poller = self.inner.poller.lock().await.take();
        if let Some(Poller { cancel, handle }) = poller {
            cancel.cancel();
            if let Err(err) = handle.await {
                warn!(error = %err, "poll loop ended abnormally");
            }
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.inner
            .poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn status_snapshot(&self) -> Vec<PollResult> {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<Vec<PollResult>> {
        self.inner.status.subscribe()
    }

    pub fn signals(&self) -> broadcast::Receiver<PanelSignal> {
        self.inner.signals.subscribe()
    }

    /// Fields of the device's last successful status poll.
    pub fn device_status(&self, id: &DeviceId) -> Option<StatusFields> {
        self.inner
            .status
            .borrow()
            .iter()
            .find(|r| r.device_id() == Some(id))
            .and_then(PollResult::data)
            .map(StatusFields::from_status)
    }

    // ── Presets ──────────────────────────────────────────────────────

    /// Re-fetch presets from every active device, replacing the cache.
    pub async fn refresh_presets(&self) -> Result<Vec<PollResult>, CoreError> {
        self.ensure_ready()?;
        let addresses = self.inner.registry.active_addresses();
        let results = attach_identity(
            self.inner.fetcher.fetch_presets(&addresses).await,
            self.inner.registry.all(),
        );
        let failed = results.iter().filter(|r| r.is_error()).count();
        if failed > 0 {
            warn!(failed, "some presets failed to load");
        }
        self.inner.presets.send_replace(results.clone());
        Ok(results)
    }

    /// Preset choices for every active device with cached presets.
    pub fn preset_options(&self) -> Result<Vec<PresetOptions>, CoreError> {
        self.ensure_ready()?;
        let presets = self.inner.presets.borrow();
        Ok(presets
            .iter()
            .filter_map(|result| {
                let id = result.device_id()?;
                if !self.inner.registry.is_active(id) {
                    return None;
                }
                let options = result
                    .data()
                    .map(|data| PresetCatalog::from_json(data).options())
                    .unwrap_or_default();
                Some(PresetOptions {
                    device_id: id.clone(),
                    address: result.address().to_owned(),
                    options,
                })
            })
            .collect())
    }

    /// Brightness stored with a device's preset, from the cached presets.
    pub fn preset_brightness(&self, id: &DeviceId, preset: i64) -> Result<Option<i64>, CoreError> {
        self.ensure_ready()?;
        let presets = self.inner.presets.borrow();
        Ok(presets
            .iter()
            .find(|r| r.device_id() == Some(id))
            .and_then(PollResult::data)
            .and_then(|data| PresetCatalog::from_json(data).brightness(preset)))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send a command to one device. Resets the idle clock.
    pub async fn send(&self, id: &DeviceId, command: Command) -> Result<CommandOutcome, CoreError> {
        self.ensure_ready()?;
        let device = self
            .inner
            .registry
            .get(id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_string(),
            })?;
        self.inner.scheduler.reset_idle();

        let result = self.inner.commands.send_command(device, command).await;
        if let Err(err) = &result {
            warn!(device_id = %id, error = %err, "command failed, keeping previous state");
            self.signal(PanelSignal::CommandFailed {
                device_id: id.clone(),
                reason: err.to_string(),
            });
        }
        result
    }

    pub async fn set_power(&self, id: &DeviceId, on: bool) -> Result<CommandOutcome, CoreError> {
        self.send(id, Command::Power(on)).await
    }

    pub async fn set_brightness(&self, id: &DeviceId, brightness: i64) -> Result<CommandOutcome, CoreError> {
        self.send(id, Command::Brightness(brightness)).await
    }

    pub async fn apply_preset(&self, id: &DeviceId, preset: i64) -> Result<CommandOutcome, CoreError> {
        self.send(id, Command::Preset(preset)).await
    }

    /// Flip power based on the last polled `state.on`. Returns the new
    /// state with the command outcome.
    pub async fn toggle_power(&self, id: &DeviceId) -> Result<(bool, CommandOutcome), CoreError> {
        self.ensure_ready()?;
        let on = self
            .device_status(id)
            .and_then(|s| s.on)
            .ok_or_else(|| CoreError::UnknownDeviceState {
                identifier: id.to_string(),
            })?;
        let outcome = self.set_power(id, !on).await?;
        Ok((!on, outcome))
    }

    /// Apply every selection of a theme in parallel on the command pool.
    ///
    /// Empty and zero selections, unknown devices and inactive devices are
    /// skipped.
    pub async fn apply_theme(&self, identifier: &str) -> Result<Vec<ThemeSend>, CoreError> {
        self.ensure_ready()?;
        let theme = self.theme(identifier)?;
        self.inner.scheduler.reset_idle();

        let jobs: Vec<(Device, i64)> = theme
            .presets
            .iter()
            .filter_map(|selection| {
                let preset = selection.preset_number()?;
                match self.inner.registry.get(&selection.device_id) {
                    Some(device) if device.active => Some((device.clone(), preset)),
                    Some(_) => None,
                    None => {
                        warn!(theme = %theme.name, device_id = %selection.device_id, "theme references unknown device");
                        None
                    }
                }
            })
            .collect();

        info!(theme = %theme.name, devices = jobs.len(), "applying theme");
        let commands = self.inner.commands.clone();
        let joined = self
            .inner
            .command_pool
            .run_limited(jobs, |(device, preset)| {
                let commands = commands.clone();
                async move { commands.send_command(&device, Command::Preset(preset)).await }
            })
            .await;

        let sends: Vec<ThemeSend> = joined
            .into_iter()
            .map(|((device, preset), joined)| {
                let result = joined.unwrap_or_else(|err| Err(CoreError::Internal(format!("command task aborted: {err}"))));
                ThemeSend {
                    device_id: device.id,
                    preset,
                    result,
                }
            })
            .collect();

        for send in sends.iter().filter(|s| s.result.is_err()) {
            if let Err(err) = &send.result {
                self.signal(PanelSignal::CommandFailed {
                    device_id: send.device_id.clone(),
                    reason: err.to_string(),
                });
            }
        }
        Ok(sends)
    }

    /// Flip power on the master device with sync left on, so every synced
    /// peer follows. Returns the new power state.
    pub async fn toggle_master_power(&self) -> Result<bool, CoreError> {
        self.ensure_ready()?;
        let master = self.inner.registry.master().ok_or(CoreError::NoMasterDevice)?;
        let unknown = || CoreError::UnknownDeviceState {
            identifier: master.id.to_string(),
        };

        let status = self.device_status(&master.id).ok_or_else(unknown)?;
        status.sync_send.ok_or_else(unknown)?;
        let on = status.on.ok_or_else(unknown)?;

        self.inner.scheduler.reset_idle();
        self.inner
            .commands
            .send_raw(&master.address, &StatePatch::power(!on))
            .await?;
        info!(address = %master.address, on = !on, "master power toggled");
        Ok(!on)
    }

    fn signal(&self, signal: PanelSignal) {
        // No subscribers is fine.
        let _ = self.inner.signals.send(signal);
    }
}

/// Status, short gap, presets; then re-poll status while some device is
/// missing.
async fn startup_load(fetcher: &FetchDispatcher, devices: &[Device], timing: Timing) -> StartupSnapshot {
    let addresses: Vec<String> = devices
        .iter()
        .filter(|d| d.active)
        .map(|d| d.address.clone())
        .collect();

    let mut status = fetcher.fetch_status(&addresses).await;
    tokio::time::sleep(timing.initial_gap).await;
    let presets = fetcher.fetch_presets(&addresses).await;

    let mut repolls = 0;
    while !status.iter().all(PollResult::is_ok) && repolls < timing.startup_repolls {
        repolls += 1;
        warn!(attempt = repolls, "startup poll incomplete, re-polling devices");
        tokio::time::sleep(timing.startup_repoll_delay).await;
        status = fetcher.fetch_status(&addresses).await;
    }

    let complete = status.iter().all(PollResult::is_ok);
    if complete {
        info!(devices = addresses.len(), "startup load complete");
    } else {
        warn!("unable to get data from all devices at startup");
    }

    StartupSnapshot {
        status: attach_identity(status, devices),
        presets: attach_identity(presets, devices),
        complete,
    }
}
