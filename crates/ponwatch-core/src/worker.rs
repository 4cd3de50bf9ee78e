// ── Bounded blocking worker pool ──
//
// Telemetry walks and interactive sessions are blocking I/O. They run on
// tokio's blocking threads behind a semaphore so at most `size` device
// transports are in flight at once and the async scheduler never stalls.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::CoreError;

pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Idle workers right now.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking worker once one is free and wait for it.
    pub async fn run<T, F>(&self, job: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| CoreError::Internal("worker pool closed".into()))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| CoreError::Internal(format!("worker task failed: {e}")))
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn returns_job_result() {
        let pool = WorkerPool::new(2);
        let value = pool.run(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn never_exceeds_size() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut jobs = Vec::new();
        for _ in 0..6 {
            let pool = pool.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            jobs.push(tokio::spawn(async move {
                pool.run(move || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(20));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for job in jobs {
            job.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn zero_size_still_runs() {
        assert_eq!(WorkerPool::new(0).size(), 1);
    }
}
