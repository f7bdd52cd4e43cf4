use std::future::Future;
use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;

/// Spawns tokio tasks while keeping at most `max_concurrent` of them running.
///
/// `spawn` waits for a free slot before the task is handed to the runtime, so
/// a backlog larger than the limit is drained as earlier tasks finish.
pub struct LimitedSpawner {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl LimitedSpawner {
    pub fn new(max_concurrent: usize) -> Self {
        // A zero-sized pool would never make progress.
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub async fn spawn<F>(&self, f: F) -> Result<JoinHandle<F::Output>, AcquireError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        Ok(tokio::spawn(async move {
            let _permit = permit;
            f.await
        }))
    }
}
