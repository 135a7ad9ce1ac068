use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

/// One saved preset as reported by `/presets.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetEntry {
    /// `n`
    pub name: Option<String>,
    /// `bri`
    pub brightness: Option<i64>,
}

/// Presets of a single device, keyed by preset number.
///
/// Rebuilt wholesale from each `/presets.json` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetCatalog {
    entries: BTreeMap<i64, PresetEntry>,
}

impl PresetCatalog {
    /// Parse a presets payload. Keys that are not integers are skipped.
    pub fn from_json(payload: &Value) -> Self {
        let Some(map) = payload.as_object() else {
            return Self::default();
        };

        let entries = map
            .iter()
            .filter_map(|(key, preset)| {
                let Ok(number) = key.trim().parse::<i64>() else {
                    debug!(key, "skipping non-numeric preset key");
                    return None;
                };
                let entry = PresetEntry {
                    name: preset.get("n").and_then(Value::as_str).map(str::to_owned),
                    brightness: preset.get("bri").and_then(Value::as_i64),
                };
                Some((number, entry))
            })
            .collect();

        Self { entries }
    }

    /// UI-ready `"<key>: <name>"` list.
    ///
    /// Named presets come first, ordered by name without regard to case;
    /// unnamed ones follow as `"<key>: None"`. Ties fall back to the key.
    pub fn options(&self) -> Vec<String> {
        let mut sorted: Vec<(&i64, &PresetEntry)> = self.entries.iter().collect();
        sorted.sort_by_cached_key(|(key, entry)| {
            (
                entry.name.is_none(),
                entry.name.as_deref().map(str::to_lowercase),
                **key,
            )
        });
        sorted
            .into_iter()
            .map(|(key, entry)| format!("{key}: {}", entry.name.as_deref().unwrap_or("None")))
            .collect()
    }

    pub fn name(&self, key: i64) -> Option<&str> {
        self.entries.get(&key).and_then(|e| e.name.as_deref())
    }

    /// Brightness stored with the preset, if any.
    pub fn brightness(&self, key: i64) -> Option<i64> {
        self.entries.get(&key).and_then(|e| e.brightness)
    }

    pub fn contains(&self, key: i64) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Preset number from a `"<key>: <name>"` option string.
///
/// Empty selections and unparsable prefixes give `None`.
pub fn parse_preset_option(option: &str) -> Option<i64> {
    let prefix = option.split(':').next()?.trim();
    if prefix.is_empty() {
        return None;
    }
    prefix.parse().ok()
}
