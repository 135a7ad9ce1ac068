// ── Concurrent fetch dispatcher ──
//
// Fans one GET path out to many devices. Each address runs its own retry
// sequence in its own task; a concurrency slot is taken per attempt so
// backoff sleeps never hold a slot another device could use.
//
// Worst-case wall time for one call is roughly
// `ceil(N / max_concurrency) * (timeout * (retries + 1) + total_backoff)`;
// there is no global deadline.

use std::time::Instant;

use naari_api::{DeviceClient, PRESETS_PATH, RetryPolicy, STATUS_PATH, TransportConfig, with_retry};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::model::{PollCycle, PollResult};
use crate::pool::WorkerPool;

#[derive(Debug, Clone)]
pub struct FetchDispatcher {
    transport: TransportConfig,
    policy: RetryPolicy,
    max_concurrency: usize,
}

impl FetchDispatcher {
    pub fn new(transport: TransportConfig, policy: RetryPolicy, max_concurrency: usize) -> Self {
        Self {
            transport,
            policy,
            max_concurrency,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.poll_transport(),
            settings.poll_retry(),
            settings.max_concurrency,
        )
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// GET `path` from every address.
    ///
    /// Always returns one result per address, never an error: failures are
    /// error-shaped entries. Results are in completion-independent order
    /// but callers should still match by address.
    pub async fn fetch_all(&self, addresses: &[String], path: &str) -> Vec<PollResult> {
        self.fetch_cycle(addresses, path).await.results
    }

    /// [`fetch_all`](Self::fetch_all) with cycle metadata.
    pub async fn fetch_cycle(&self, addresses: &[String], path: &str) -> PollCycle {
        let started = Instant::now();
        let targets = addresses.to_vec();

        // One pooled client per call, shared by every task of the call and
        // dropped when the last task finishes.
        let client = match DeviceClient::new(&self.transport) {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "failed to build HTTP client; reporting every device as failed");
                let reason = err.to_string();
                return PollCycle {
                    results: targets
                        .iter()
                        .map(|address| PollResult::failed(address.clone(), reason.clone()))
                        .collect(),
                    targets,
                    max_concurrency: self.max_concurrency,
                    elapsed: started.elapsed(),
                };
            }
        };

        let pool = WorkerPool::new("poll", self.max_concurrency);
        let policy = self.policy;
        let path = path.to_owned();

        let joined = pool
            .run_all(targets.clone(), |address, limiter| {
                let client = client.clone();
                let path = path.clone();
                async move {
                    let fetched = with_retry(&policy, &address, |attempt| {
                        let client = &client;
                        let limiter = &limiter;
                        let address = &address;
                        let path = &path;
                        async move {
                            let _slot = limiter.acquire().await;
                            debug!(address, path, attempt, "fetching");
                            client.get_json(address, path).await
                        }
                    })
                    .await;
                    PollResult::from_fetch(address, fetched)
                }
            })
            .await;

        let results: Vec<PollResult> = joined
            .into_iter()
            .map(|(address, joined)| {
                joined.unwrap_or_else(|err| {
                    warn!(address, error = %err, "fetch task aborted");
                    PollResult::failed(address, format!("fetch task aborted: {err}"))
                })
            })
            .collect();

        let cycle = PollCycle {
            targets,
            max_concurrency: self.max_concurrency,
            results,
            elapsed: started.elapsed(),
        };
        info!(
            path = %path,
            devices = cycle.targets.len(),
            failed = cycle.failed_count(),
            elapsed_ms = u64::try_from(cycle.elapsed.as_millis()).unwrap_or(u64::MAX),
            "fetch cycle complete"
        );
        cycle
    }

    pub async fn fetch_status(&self, addresses: &[String]) -> Vec<PollResult> {
        self.fetch_all(addresses, STATUS_PATH).await
    }

    pub async fn fetch_presets(&self, addresses: &[String]) -> Vec<PollResult> {
        self.fetch_all(addresses, PRESETS_PATH).await
    }
}
