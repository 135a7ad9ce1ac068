// ── Bounded worker pool ──
//
// One abstraction for both fan-out paths: poll cycles run on a pool capped
// at `max_concurrency`, command bursts (themes) on a pool capped at
// `command_workers`. Each job is its own tokio task, so one slow device
// never holds up its siblings.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;
use tracing::trace;

/// Counting limiter. A capacity of `0` disables limiting.
#[derive(Debug, Clone)]
pub struct Limiter {
    capacity: usize,
    semaphore: Option<Arc<Semaphore>>,
}

impl Limiter {
    pub fn new(max_concurrency: usize) -> Self {
        let semaphore = (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)));
        Self {
            capacity: max_concurrency,
            semaphore,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Configured cap, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|_| self.capacity)
    }

    /// Slots free right now, `None` when unbounded.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Wait for a slot. The slot is held until the returned permit drops;
    /// unbounded limiters return `None` immediately.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        match &self.semaphore {
            // The semaphore is never closed, so acquisition cannot fail.
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        }
    }
}

/// Named task pool with a concurrency cap.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    max_concurrency: usize,
}

impl WorkerPool {
    pub fn new(name: &'static str, max_concurrency: usize) -> Self {
        Self {
            name,
            max_concurrency,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Spawn one task per key and wait for all of them.
    ///
    /// Every job receives the pool's shared [`Limiter`] and decides itself
    /// how long to hold a slot (the fetch path holds one per attempt, not
    /// across backoff sleeps). Results pair each key with its job's output;
    /// a panicked job shows up as `Err(JoinError)` for that key only.
    pub async fn run_all<K, T, F, Fut>(&self, keys: Vec<K>, job: F) -> Vec<(K, Result<T, JoinError>)>
    where
        K: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(K, Limiter) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let limiter = Limiter::new(self.max_concurrency);
        trace!(pool = self.name, jobs = keys.len(), cap = self.max_concurrency, "dispatching");

        let handles: Vec<_> = keys
            .iter()
            .cloned()
            .map(|key| tokio::spawn(job(key, limiter.clone())))
            .collect();

        keys.into_iter().zip(join_all(handles).await).collect()
    }

    /// Like [`run_all`](Self::run_all), but each job holds one slot for
    /// its whole run.
    pub async fn run_limited<K, T, F, Fut>(&self, keys: Vec<K>, job: F) -> Vec<(K, Result<T, JoinError>)>
    where
        K: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(K) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.run_all(keys, |key, limiter| {
            let fut = job(key);
            async move {
                let _permit = limiter.acquire().await;
                fut.await
            }
        })
        .await
    }
}
