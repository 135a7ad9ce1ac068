// Wire types for the device JSON API.
//
// Only the request side is modelled as structs. Status and preset payloads
// are handed to callers as raw `serde_json::Value` since devices add fields
// across firmware versions; `StatusFields` pulls out the few the panel reads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `udpn` block: controls whether the device broadcasts state changes to
/// its synced peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpNotify {
    pub send: bool,
}

/// Partial state accepted by `POST /json/state`.
///
/// Any combination of fields may be set; unset fields are omitted from the
/// body so the device leaves them alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udpn: Option<UdpNotify>,
}

impl StatePatch {
    pub fn power(on: bool) -> Self {
        Self {
            on: Some(on),
            ..Self::default()
        }
    }

    /// Brightness is sent as given; devices expect 0-255.
    pub fn brightness(bri: i64) -> Self {
        Self {
            bri: Some(bri),
            ..Self::default()
        }
    }

    pub fn preset(ps: i64) -> Self {
        Self {
            ps: Some(ps),
            ..Self::default()
        }
    }

    /// Only the sync-broadcast flag, set to `send`.
    pub fn sync(send: bool) -> Self {
        Self {
            udpn: Some(UdpNotify { send }),
            ..Self::default()
        }
    }

    /// Merge in a sync-broadcast suppression for this one call.
    pub fn without_sync(mut self) -> Self {
        self.udpn = Some(UdpNotify { send: false });
        self
    }
}

/// The handful of status fields the panel reads from `GET /json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFields {
    /// `state.on`
    pub on: Option<bool>,
    /// `state.bri`
    pub bri: Option<i64>,
    /// `state.udpn.send`
    pub sync_send: Option<bool>,
}

impl StatusFields {
    pub fn from_status(status: &Value) -> Self {
        let state = status.get("state");
        Self {
            on: state.and_then(|s| s.get("on")).and_then(Value::as_bool),
            bri: state.and_then(|s| s.get("bri")).and_then(Value::as_i64),
            sync_send: state
                .and_then(|s| s.get("udpn"))
                .and_then(|u| u.get("send"))
                .and_then(Value::as_bool),
        }
    }
}
