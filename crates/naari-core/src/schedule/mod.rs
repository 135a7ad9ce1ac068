// ── Poll scheduler ──
//
// Turns timer ticks into poll cycles. Two gates apply in order: the
// throttle (is this tick live?) and the single-flight guard (is a cycle
// already running?). A closed gate is a no-op for the tick, never a queue.

mod throttle;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tracing::{debug, warn};

pub use throttle::{LARGE_FLEET, Throttle};

use crate::config::defaults;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome<T> {
    /// Throttle skipped this tick.
    Throttled,
    /// Another cycle holds the guard.
    Busy { consecutive: u32 },
    /// Like `Busy`, but the consecutive count reached the stall threshold.
    Stalled { consecutive: u32 },
    Completed(T),
}

impl<T> TickOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }
}

/// Scoped ownership of the single-flight guard.
///
/// Dropping it (on any exit path, including panics and cancelled futures)
/// releases the guard and returns the scheduler to `Idle`.
#[derive(Debug)]
pub struct PollGuard {
    _lock: OwnedMutexGuard<()>,
    state: Arc<watch::Sender<SchedulerState>>,
}

impl Drop for PollGuard {
    fn drop(&mut self) {
        self.state.send_replace(SchedulerState::Idle);
    }
}

#[derive(Debug)]
pub struct Scheduler {
    throttle: Throttle,
    conflict_threshold: u32,
    guard: Arc<Mutex<()>>,
    state: Arc<watch::Sender<SchedulerState>>,
    ticks: AtomicU64,
    conflicts: AtomicU32,
}

impl Scheduler {
    pub fn new(throttle: Throttle, conflict_threshold: u32) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            throttle,
            conflict_threshold: if conflict_threshold == 0 {
                defaults::CONFLICT_THRESHOLD
            } else {
                conflict_threshold
            },
            guard: Arc::new(Mutex::new(())),
            state: Arc::new(state),
            ticks: AtomicU64::new(0),
            conflicts: AtomicU32::new(0),
        }
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn conflict_threshold(&self) -> u32 {
        self.conflict_threshold
    }

    /// Take the guard without waiting.
    ///
    /// Fails with [`CoreError::PollInProgress`] if a cycle is running; each
    /// failure bumps the consecutive-conflict count, each success resets it.
    pub fn try_acquire(&self) -> Result<PollGuard, CoreError> {
        match Arc::clone(&self.guard).try_lock_owned() {
            Ok(lock) => {
                self.conflicts.store(0, Ordering::SeqCst);
                self.state.send_replace(SchedulerState::Polling);
                Ok(PollGuard {
                    _lock: lock,
                    state: Arc::clone(&self.state),
                })
            }
            Err(_) => {
                let consecutive = self.conflicts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(consecutive, "poll rejected, cycle already in flight");
                Err(CoreError::PollInProgress)
            }
        }
    }

    /// Run `cycle` while holding the guard.
    pub async fn run_exclusive<T, F, Fut>(&self, cycle: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.try_acquire()?;
        Ok(cycle().await)
    }

    /// Advance the tick counter and, if the tick is live and the guard is
    /// free, run `cycle`.
    pub async fn tick<T, F, Fut>(&self, device_count: usize, cycle: F) -> TickOutcome<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticks = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.throttle.should_poll(ticks, device_count) {
            return TickOutcome::Throttled;
        }

        match self.run_exclusive(cycle).await {
            Ok(value) => TickOutcome::Completed(value),
            Err(_) => self.rejection(),
        }
    }

    /// Classify the latest rejection: `Busy` below the conflict threshold,
    /// `Stalled` at or above it.
    pub fn rejection<T>(&self) -> TickOutcome<T> {
        let consecutive = self.consecutive_conflicts();
        if consecutive >= self.conflict_threshold {
            warn!(consecutive, "polling stalled behind an in-flight cycle");
            TickOutcome::Stalled { consecutive }
        } else {
            TickOutcome::Busy { consecutive }
        }
    }

    /// Restart the idle clock so the throttle drops back to every tick.
    pub fn reset_idle(&self) {
        self.ticks.store(0, Ordering::SeqCst);
    }

    pub fn elapsed_ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn consecutive_conflicts(&self) -> u32 {
        self.conflicts.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }
}
