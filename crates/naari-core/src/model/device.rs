use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Stable device identifier from configuration.
///
/// Config files written by hand use small integers; older ones may use
/// arbitrary string keys. Both compare by their rendered form when a
/// user types an id on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceId {
    Number(i64),
    Name(String),
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Name(s) => f.write_str(s),
        }
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Name(s.to_owned()), Self::Number))
    }
}

impl From<i64> for DeviceId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::Name(s.to_owned())
    }
}

fn default_active() -> bool {
    true
}

/// A registered controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// IP or DNS name, optionally with a port.
    pub address: String,
    #[serde(default)]
    pub instance_name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub master_sync: bool,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            instance_name: String::new(),
            active: true,
            master_sync: false,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.instance_name = name.into();
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    #[must_use]
    pub fn master(mut self) -> Self {
        self.master_sync = true;
        self
    }

    /// Name for display: the instance name, or the address when unnamed.
    pub fn display_name(&self) -> &str {
        if self.instance_name.is_empty() {
            &self.address
        } else {
            &self.instance_name
        }
    }
}

/// Validated, immutable set of devices.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    devices: Vec<Device>,
}

impl Registry {
    /// Build a registry, rejecting duplicate ids and more than one
    /// master device.
    pub fn new(devices: Vec<Device>) -> Result<Self, CoreError> {
        let mut seen = HashSet::new();
        for device in &devices {
            if !seen.insert(&device.id) {
                return Err(CoreError::Config {
                    message: format!("duplicate device id {}", device.id),
                });
            }
        }

        let masters: Vec<String> = devices
            .iter()
            .filter(|d| d.master_sync)
            .map(|d| d.id.to_string())
            .collect();
        if masters.len() > 1 {
            return Err(CoreError::Config {
                message: format!(
                    "only one device may be master_sync, found {}",
                    masters.join(", ")
                ),
            });
        }

        Ok(Self { devices })
    }

    pub fn all(&self) -> &[Device] {
        &self.devices
    }

    pub fn active(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.active)
    }

    /// Addresses to poll. Inactive devices are skipped unless asked for.
    pub fn addresses(&self, include_inactive: bool) -> Vec<String> {
        self.devices
            .iter()
            .filter(|d| include_inactive || d.active)
            .map(|d| d.address.clone())
            .collect()
    }

    pub fn active_addresses(&self) -> Vec<String> {
        self.addresses(false)
    }

    pub fn get(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.iter().find(|d| &d.id == id)
    }

    /// Lookup by the textual form of an id, as typed by a user.
    pub fn find(&self, identifier: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.id.to_string() == identifier)
    }

    pub fn by_address(&self, address: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.address == address)
    }

    pub fn master(&self) -> Option<&Device> {
        self.devices.iter().find(|d| d.master_sync)
    }

    /// Unknown ids count as inactive.
    pub fn is_active(&self, id: &DeviceId) -> bool {
        self.get(id).is_some_and(|d| d.active)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
