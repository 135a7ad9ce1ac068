use serde::{Deserialize, Serialize};

use super::device::DeviceId;
use super::preset::parse_preset_option;

/// A named set of per-device preset selections applied together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub presets: Vec<ThemePreset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePreset {
    pub device_id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_address: Option<String>,
    /// `"<key>: <name>"` as shown in preset lists.
    pub preset_name: String,
}

impl ThemePreset {
    /// Preset number to send, or `None` for an empty or zero selection.
    pub fn preset_number(&self) -> Option<i64> {
        parse_preset_option(&self.preset_name).filter(|n| *n != 0)
    }
}

impl Theme {
    /// Matches the numeric id or the name (case-insensitive).
    pub fn matches(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        identifier.parse::<i64>().is_ok_and(|id| id == self.id)
            || self.name.eq_ignore_ascii_case(identifier)
    }
}
