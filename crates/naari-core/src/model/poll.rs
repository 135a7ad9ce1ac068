use std::time::Duration;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::device::DeviceId;
use crate::error::CoreError;

/// Success payload or failure reason for one device. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Data(Value),
    Failed(String),
}

// Serialized as `{"data": ...}` or `{"error": true, "error_reason": ...}`,
// the shape front-ends already key on.
impl Serialize for PollOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Data(data) => {
                let mut s = serializer.serialize_struct("PollOutcome", 1)?;
                s.serialize_field("data", data)?;
                s.end()
            }
            Self::Failed(reason) => {
                let mut s = serializer.serialize_struct("PollOutcome", 2)?;
                s.serialize_field("error", &true)?;
                s.serialize_field("error_reason", reason)?;
                s.end()
            }
        }
    }
}

/// Result of querying one device once (after retries).
///
/// Built fresh per fetch and never mutated; normalization produces a new
/// value via [`PollResult::with_device_id`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResult {
    #[serde(rename = "ip")]
    address: String,
    #[serde(rename = "id", skip_serializing_if = "Option::is_none")]
    device_id: Option<DeviceId>,
    #[serde(flatten)]
    outcome: PollOutcome,
}

impl PollResult {
    pub fn ok(address: impl Into<String>, data: Value) -> Self {
        Self {
            address: address.into(),
            device_id: None,
            outcome: PollOutcome::Data(data),
        }
    }

    pub fn failed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            device_id: None,
            outcome: PollOutcome::Failed(reason.into()),
        }
    }

    pub fn from_fetch(address: impl Into<String>, fetched: Result<Value, naari_api::Error>) -> Self {
        match fetched {
            Ok(data) => Self::ok(address, data),
            Err(err) => Self::failed(address, CoreError::from(err).to_string()),
        }
    }

    #[must_use]
    pub fn with_device_id(mut self, id: DeviceId) -> Self {
        self.device_id = Some(id);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn device_id(&self) -> Option<&DeviceId> {
        self.device_id.as_ref()
    }

    pub fn outcome(&self) -> &PollOutcome {
        &self.outcome
    }

    pub fn data(&self) -> Option<&Value> {
        match &self.outcome {
            PollOutcome::Data(data) => Some(data),
            PollOutcome::Failed(_) => None,
        }
    }

    pub fn error_reason(&self) -> Option<&str> {
        match &self.outcome {
            PollOutcome::Data(_) => None,
            PollOutcome::Failed(reason) => Some(reason),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, PollOutcome::Data(_))
    }

    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }
}

/// One completed fan-out over a set of addresses.
#[derive(Debug, Clone)]
pub struct PollCycle {
    pub targets: Vec<String>,
    /// Cap in force for this cycle; `0` means unbounded.
    pub max_concurrency: usize,
    pub results: Vec<PollResult>,
    pub elapsed: Duration,
}

impl PollCycle {
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(PollResult::is_ok)
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }

    /// Results are unordered; match by address.
    pub fn result_for(&self, address: &str) -> Option<&PollResult> {
        self.results.iter().find(|r| r.address == address)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn success_serializes_with_data_only() {
        let result = PollResult::ok("10.0.0.1", json!({"state": {"on": true}}))
            .with_device_id(DeviceId::Number(1));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"ip": "10.0.0.1", "id": 1, "data": {"state": {"on": true}}})
        );
    }

    #[test]
    fn failure_serializes_error_flag_and_reason() {
        let result = PollResult::failed("10.0.0.2", "timed out");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"ip": "10.0.0.2", "error": true, "error_reason": "timed out"})
        );
        assert!(result.data().is_none());
    }

    #[test]
    fn from_fetch_error_keeps_retry_detail() {
        let result = PollResult::from_fetch(
            "10.0.0.3",
            Err(naari_api::Error::RetryExhausted {
                address: "10.0.0.3".into(),
                attempts: 3,
                last: Box::new(naari_api::Error::Status {
                    url: "http://10.0.0.3/json".into(),
                    status: 503,
                }),
            }),
        );
        let reason = result.error_reason().unwrap();
        assert!(reason.contains("after 3 attempts"), "{reason}");
    }

    #[test]
    fn cycle_counts_failures() {
        let cycle = PollCycle {
            targets: vec!["a".into(), "b".into()],
            max_concurrency: 10,
            results: vec![PollResult::ok("a", json!({})), PollResult::failed("b", "x")],
            elapsed: Duration::ZERO,
        };
        assert!(!cycle.all_ok());
        assert_eq!(cycle.failed_count(), 1);
        assert!(cycle.result_for("b").unwrap().is_error());
    }
}
