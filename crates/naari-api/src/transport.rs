// Shared transport configuration for building reqwest::Client instances.
//
// The poll path and the command path both build their clients here so
// connect/read timeouts are applied the same way everywhere.

use std::time::Duration;

use crate::error::Error;

const USER_AGENT: &str = concat!("naari/", env!("CARGO_PKG_VERSION"));

/// Timeouts applied to every request made through a built client.
///
/// The two timeouts are independent: `connect_timeout` bounds TCP
/// establishment, `read_timeout` bounds each read from the socket. A call
/// that trips either one surfaces as a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(3),
        }
    }
}

impl TransportConfig {
    pub const fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    /// Same bound for connect and read, as used by one-off command sends.
    pub const fn uniform(timeout: Duration) -> Self {
        Self::new(timeout, timeout)
    }

    /// Build a `reqwest::Client` from this config.
    ///
    /// The returned client owns a connection pool; clone it to share the
    /// pool across concurrent requests.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::ClientBuild(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_friendly_timeouts() {
        let cfg = TransportConfig::default();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(2));
        assert_eq!(cfg.read_timeout, Duration::from_secs(3));
    }

    #[test]
    fn uniform_sets_both_bounds() {
        let cfg = TransportConfig::uniform(Duration::from_millis(1500));
        assert_eq!(cfg.connect_timeout, cfg.read_timeout);
        assert!(cfg.build_client().is_ok());
    }
}
