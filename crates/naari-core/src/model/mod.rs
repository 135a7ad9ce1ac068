// ── Domain model ──
//
// Devices and themes come from configuration and are read-only to the
// core. Poll results and preset catalogs are built fresh from device
// responses and never mutated afterwards.

mod device;
mod poll;
mod preset;
mod theme;

pub use device::{Device, DeviceId, Registry};
pub use poll::{PollCycle, PollOutcome, PollResult};
pub use preset::{PresetCatalog, PresetEntry, parse_preset_option};
pub use theme::{Theme, ThemePreset};
