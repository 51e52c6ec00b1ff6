//! Worker pool scoped to one analysis session.

use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::ScanError;

/// Bounded rayon pool shared by scanning and hashing.
///
/// There is no global pool: every session starts one and shuts it down.
/// Clones share the same threads.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
    size: usize,
}

impl WorkerPool {
    /// Start a pool with `worker_limit` threads.
    pub fn start(worker_limit: usize) -> Result<Self, ScanError> {
        if worker_limit == 0 {
            return Err(ScanError::Pool {
                message: "worker limit must be at least 1".to_string(),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(worker_limit)
            .thread_name(|i| format!("reclaim-worker-{i}"))
            .build()
            .map_err(|e| ScanError::Pool {
                message: e.to_string(),
            })?;

        tracing::debug!(workers = worker_limit, "worker pool started");

        Ok(Self {
            pool: Arc::new(pool),
            size: worker_limit,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Shared handle to the underlying rayon pool.
    pub fn handle(&self) -> Arc<ThreadPool> {
        Arc::clone(&self.pool)
    }

    /// Run `op` inside the pool; parallel iterators in `op` use its threads.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Release this handle. Threads exit once every clone has been shut down.
    pub fn shutdown(self) {
        tracing::debug!(workers = self.size, "worker pool shutdown");
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_pool_bounds_parallelism() {
        let pool = WorkerPool::start(2).unwrap();
        assert_eq!(pool.size(), 2);
        let threads = pool.install(rayon::current_num_threads);
        assert_eq!(threads, 2);

        let sum: u64 = pool.install(|| (1..=100u64).into_par_iter().sum());
        assert_eq!(sum, 5050);
        pool.shutdown();
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(WorkerPool::start(0).is_err());
    }
}
