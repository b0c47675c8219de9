//! Keyed single-flight loads
//!
//! Callers loading the same key share one run of the loader and all receive
//! its result, failures included. A key is released once its run completes,
//! so the next caller after that starts a fresh load.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

pub struct LoadCoalescer<T> {
    inflight: Mutex<HashMap<String, Arc<OnceCell<T>>>>,
}

impl<T: Clone> LoadCoalescer<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `load` for `key` unless a run is already in flight, then share its result
    ///
    /// If the task driving a run is cancelled, one of the waiters takes over.
    pub async fn run<F, Fut>(&self, key: &str, load: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(OnceCell::new())),
            )
        };

        let value = cell.get_or_init(load).await.clone();

        let mut inflight = self.inflight.lock().await;
        if inflight
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &cell))
        {
            inflight.remove(key);
        }
        value
    }

    /// Drop slots left behind by cancelled runs nobody is waiting on
    pub async fn prune(&self) {
        let mut inflight = self.inflight.lock().await;
        inflight.retain(|_, cell| Arc::strong_count(cell) > 1);
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inflight.lock().await.len()
    }
}

impl<T: Clone> Default for LoadCoalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}
