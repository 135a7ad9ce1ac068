// Adaptive poll throttle.
//
// The longer the panel sits without user input, the fewer ticks turn into
// real polls. Large fleets are stretched further to bound request volume.

/// Fleets larger than this get their multiplier scaled by 1.5.
pub const LARGE_FLEET: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    pub polling_rate_secs: u64,
    pub min_time_secs: u64,
    pub max_time_secs: u64,
}

impl Throttle {
    pub const fn new(polling_rate_secs: u64, min_time_secs: u64, max_time_secs: u64) -> Self {
        Self {
            polling_rate_secs,
            min_time_secs,
            max_time_secs,
        }
    }

    pub fn elapsed_secs(&self, elapsed_ticks: u64) -> u64 {
        self.polling_rate_secs.saturating_mul(elapsed_ticks)
    }

    /// Poll interval multiplier for the given idle time and fleet size.
    ///
    /// The max threshold is checked before the min threshold.
    pub fn multiplier(&self, elapsed_secs: u64, device_count: usize) -> u64 {
        let base: u64 = if elapsed_secs >= self.max_time_secs {
            4
        } else if elapsed_secs >= self.min_time_secs {
            2
        } else {
            1
        };

        if device_count > LARGE_FLEET {
            // ceil(base * 1.5)
            (base * 3).div_ceil(2)
        } else {
            base
        }
    }

    pub fn should_poll_at(&self, elapsed_secs: u64, device_count: usize) -> bool {
        elapsed_secs % self.multiplier(elapsed_secs, device_count) == 0
    }

    pub fn should_poll(&self, elapsed_ticks: u64, device_count: usize) -> bool {
        self.should_poll_at(self.elapsed_secs(elapsed_ticks), device_count)
    }
}
