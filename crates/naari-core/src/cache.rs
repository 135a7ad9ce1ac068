// ── Startup cache ──
//
// Holds the result of the expensive first load (status + presets from every
// device). The init function is injected by the owner and runs at most once
// to completion; concurrent callers wait on the same scoped lock and then
// read the stored value. Failed inits are not stored, so a later call
// retries.

use std::fmt;
use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::CoreError;

type InitFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync>;

pub struct StartupCache<T> {
    init: InitFn<T>,
    value: OnceLock<Arc<T>>,
    lock: Mutex<()>,
}

impl<T> fmt::Debug for StartupCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartupCache")
            .field("ready", &self.value.get().is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> StartupCache<T> {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<T, CoreError>> + Send + Sync + 'static,
    {
        Self {
            init: Box::new(init),
            value: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    /// Return the cached value, running the init function first if needed.
    pub async fn get_or_init(&self) -> Result<Arc<T>, CoreError> {
        if let Some(value) = self.value.get() {
            return Ok(Arc::clone(value));
        }

        let _lock = self.lock.lock().await;
        // Another caller may have finished while we waited.
        if let Some(value) = self.value.get() {
            return Ok(Arc::clone(value));
        }

        debug!("running startup load");
        let value = Arc::new((self.init)().await?);
        Ok(Arc::clone(self.value.get_or_init(|| value)))
    }

    /// The cached value without triggering init.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.value.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.value.get().is_some()
    }
}
