//! Polling and command-dispatch core for a panel of LED strip controllers.
//!
//! This crate sits between `naari-api` (one request, one device) and
//! whatever front-end renders device state:
//!
//! - **[`FetchDispatcher`]**: fans `GET`s out to many devices on a bounded
//!   [`WorkerPool`], retrying each one independently. Partial failure is the
//!   steady state: every address gets a [`PollResult`], success or error.
//!
//! - **[`Scheduler`]**: decides per timer tick whether to poll at all
//!   ([`Throttle`]) and guarantees at most one poll cycle in flight through a
//!   non-blocking single-flight guard.
//!
//! - **[`CommandDispatcher`]**: sends power/brightness/preset changes with
//!   sync-broadcast suppression and the master-device resync sequence.
//!
//! - **[`attach_identity`]**: stamps registry ids onto raw results.
//!
//! - **[`Panel`]**: facade owning all of the above plus the startup cache,
//!   published snapshots and failure signals.

pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod panel;
pub mod pool;
pub mod schedule;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::StartupCache;
pub use command::{Command, CommandDispatcher, CommandOutcome, SETTLE_DELAY};
pub use config::Settings;
pub use error::CoreError;
pub use fetch::FetchDispatcher;
pub use normalize::attach_identity;
pub use panel::{Panel, PanelSignal, PresetOptions, StartupSnapshot, ThemeSend, Timing};
pub use pool::{Limiter, WorkerPool};
pub use schedule::{PollGuard, Scheduler, SchedulerState, Throttle, TickOutcome};

pub use naari_api::{StatePatch, StatusFields};

pub use model::{
    Device, DeviceId, PollCycle, PollOutcome, PollResult, PresetCatalog, Registry, Theme,
    ThemePreset, parse_preset_option,
};
