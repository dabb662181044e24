//! Bounded worker pool for per-record work
//!
//! Prep packages and PDF preparation touch one record at a time, so the
//! records are handed to a fixed number of rayon workers. Shared state
//! (feeds, counters) must carry its own lock.

use crate::error::Result;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::fmt;

/// Fixed-size pool of worker threads
pub struct WorkerPool {
    pool: ThreadPool,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl WorkerPool {
    /// Pool with `threads` workers (at least one)
    ///
    /// # Errors
    /// Returns [`ColrevError::Pool`] when the threads cannot be spawned.
    ///
    /// [`ColrevError::Pool`]: crate::ColrevError::Pool
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("colrev-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Single worker; work runs in order
    ///
    /// # Errors
    /// Returns [`ColrevError::Pool`] when the thread cannot be spawned.
    ///
    /// [`ColrevError::Pool`]: crate::ColrevError::Pool
    pub fn sequential() -> Result<Self> {
        Self::new(1)
    }

    /// Number of workers
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Apply `f` to every item; results keep the input order
    pub fn map<T, R, F>(&self, items: &mut [T], f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(&mut T) -> R + Sync + Send,
    {
        self.pool
            .install(|| items.par_iter_mut().map(|item| f(item)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn keeps_input_order() {
        let pool = WorkerPool::new(4).unwrap();
        let mut items: Vec<usize> = (0..100).collect();
        let doubled = pool.map(&mut items, |n| {
            *n *= 2;
            *n
        });
        assert_eq!(doubled, (0..100).map(|n| n * 2).collect::<Vec<_>>());
        assert_eq!(items[99], 198);
    }

    #[test]
    fn shared_state_goes_through_a_lock() {
        let pool = WorkerPool::new(3).unwrap();
        let seen = Mutex::new(Vec::new());
        let mut items: Vec<u32> = (0..20).collect();
        pool.map(&mut items, |n| seen.lock().push(*n));
        let mut seen = seen.into_inner();
        seen.sort_unstable();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn zero_threads_means_one() {
        assert_eq!(WorkerPool::new(0).unwrap().threads(), 1);
    }
}
