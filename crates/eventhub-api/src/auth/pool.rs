//! Bounded worker pool for CPU-heavy authentication work
//!
//! Argon2 hashing and token verification run on tokio's blocking threads.
//! At most `workers` jobs run at once; up to `max_queue` more may wait for a
//! permit. Anything beyond that is rejected immediately so a login storm
//! cannot pile up unbounded work.

use crate::metrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool queue is full")]
    Saturated,

    #[error("worker task failed: {0}")]
    Join(String),
}

#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    max_queue: usize,
}

impl WorkerPool {
    pub fn new(workers: usize, max_queue: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            waiting: Arc::new(AtomicUsize::new(0)),
            max_queue,
        }
    }

    /// Jobs currently waiting for a permit
    pub fn queue_depth(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Run `f` on a blocking thread once a worker permit is available.
    pub async fn run<F, T>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let queued = self.waiting.fetch_add(1, Ordering::SeqCst) + 1;
                if queued > self.max_queue {
                    self.waiting.fetch_sub(1, Ordering::SeqCst);
                    metrics::record_pool_rejection();
                    tracing::warn!(
                        queued = queued - 1,
                        max_queue = self.max_queue,
                        "Worker pool saturated, rejecting job"
                    );
                    return Err(PoolError::Saturated);
                }
                metrics::set_pool_queue_depth(queued);

                let acquired = Arc::clone(&self.permits).acquire_owned().await;
                let remaining = self.waiting.fetch_sub(1, Ordering::SeqCst) - 1;
                metrics::set_pool_queue_depth(remaining);

                // the semaphore is never closed
                acquired.map_err(|e| PoolError::Join(e.to_string()))?
            }
        };

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|e| PoolError::Join(e.to_string()))
    }
}
