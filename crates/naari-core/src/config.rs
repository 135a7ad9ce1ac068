// ── Resolved runtime settings ──
//
// Typed, already-defaulted settings consumed by the core. Raw config
// values (bare scalars or `{ value, type }` wrappers) are resolved into
// this struct by `naari-config` at load time, so nothing here ever sees
// an invalid value.

use std::time::Duration;

use naari_api::{RetryPolicy, TransportConfig};

use crate::schedule::Throttle;

/// Hard fallbacks used whenever a configured value is absent, non-numeric
/// or not positive.
pub mod defaults {
    use std::time::Duration;

    pub const APP_NAME: &str = "Naari";
    pub const POLLING_RATE: Duration = Duration::from_secs(3);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
    pub const READ_TIMEOUT: Duration = Duration::from_secs(3);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
    pub const MAX_CONCURRENCY: usize = 10;
    pub const RETRIES: u32 = 2;
    pub const RETRY_BACKOFF: Duration = Duration::from_millis(250);
    pub const IDLE_MIN_TIME: Duration = Duration::from_secs(60);
    pub const IDLE_MAX_TIME: Duration = Duration::from_secs(3600);
    pub const CONFLICT_THRESHOLD: u32 = 4;
    pub const COMMAND_WORKERS: usize = 4;
}

/// Runtime settings for polling and command dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub app_name: String,
    /// Timer tick period of the background poll loop.
    pub polling_rate: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Bound for each command send (connect and read).
    pub request_timeout: Duration,
    /// Poll fan-out cap. `0` means unbounded.
    pub max_concurrency: usize,
    pub retries: u32,
    pub retry_backoff: Duration,
    pub idle_min_time: Duration,
    pub idle_max_time: Duration,
    /// Consecutive rejected polls before a stall is reported.
    pub conflict_threshold: u32,
    pub command_workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: defaults::APP_NAME.to_owned(),
            polling_rate: defaults::POLLING_RATE,
            connect_timeout: defaults::CONNECT_TIMEOUT,
            read_timeout: defaults::READ_TIMEOUT,
            request_timeout: defaults::REQUEST_TIMEOUT,
            max_concurrency: defaults::MAX_CONCURRENCY,
            retries: defaults::RETRIES,
            retry_backoff: defaults::RETRY_BACKOFF,
            idle_min_time: defaults::IDLE_MIN_TIME,
            idle_max_time: defaults::IDLE_MAX_TIME,
            conflict_threshold: defaults::CONFLICT_THRESHOLD,
            command_workers: defaults::COMMAND_WORKERS,
        }
    }
}

impl Settings {
    pub fn poll_transport(&self) -> TransportConfig {
        TransportConfig::new(self.connect_timeout, self.read_timeout)
    }

    pub fn poll_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.retry_backoff)
    }

    pub fn command_transport(&self) -> TransportConfig {
        TransportConfig::uniform(self.request_timeout)
    }

    pub fn command_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, self.retry_backoff)
    }

    /// Throttle arithmetic works in whole seconds, so a fractional polling
    /// rate is rounded up (never down to zero).
    pub fn throttle(&self) -> Throttle {
        Throttle::new(
            whole_secs_ceil(self.polling_rate).max(1),
            self.idle_min_time.as_secs(),
            self.idle_max_time.as_secs(),
        )
    }
}

/// Whole seconds in `duration`, rounding any fraction up.
pub fn whole_secs_ceil(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_transport_uses_request_timeout_for_both_bounds() {
        let settings = Settings {
            request_timeout: Duration::from_secs(7),
            ..Settings::default()
        };
        let transport = settings.command_transport();
        assert_eq!(transport.connect_timeout, Duration::from_secs(7));
        assert_eq!(transport.read_timeout, Duration::from_secs(7));
    }

    #[test]
    fn default_throttle_matches_idle_window() {
        let throttle = Settings::default().throttle();
        assert_eq!(throttle.polling_rate_secs, 3);
        assert_eq!(throttle.min_time_secs, 60);
        assert_eq!(throttle.max_time_secs, 3600);
    }

    #[test]
    fn fractional_polling_rate_rounds_up_to_whole_seconds() {
        let half = Settings {
            polling_rate: Duration::from_millis(500),
            ..Settings::default()
        };
        assert_eq!(half.throttle().polling_rate_secs, 1);

        let sesqui = Settings {
            polling_rate: Duration::from_millis(1500),
            ..Settings::default()
        };
        let throttle = sesqui.throttle();
        assert_eq!(throttle.polling_rate_secs, 2);
        // 20 devices reach the 60s idle threshold at tick 30
        assert_eq!(throttle.multiplier(throttle.elapsed_secs(30), 20), 3);
        assert!(throttle.should_poll(30, 20));
        assert!(!throttle.should_poll(31, 20));
    }
}
