use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParallelError {
    #[error("Thread error: {0}")]
    ThreadError(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),
}

/// Configuration for parallel processing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Number of threads to use (0 lets rayon decide)
    pub threads: usize,

    /// Minimum number of items handed to one task
    pub chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            threads: 0,
            chunk_size: 1,
        }
    }
}

/// Runs order-preserving fallible maps on a dedicated thread pool.
pub struct ParallelExecutor {
    /// Thread pool
    pool: rayon::ThreadPool,

    /// Configuration
    config: ParallelConfig,
}

impl ParallelExecutor {
    /// Create a new parallel executor
    pub fn new(config: ParallelConfig) -> Result<Self, ParallelError> {
        if config.chunk_size == 0 {
            return Err(ParallelError::InvalidChunkSize(0));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| {
                ParallelError::ThreadError(format!("Failed to build thread pool: {}", e))
            })?;
        debug!(
            "Built thread pool with {} threads (chunk size {})",
            pool.current_num_threads(),
            config.chunk_size
        );

        Ok(ParallelExecutor { pool, config })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Applies `processor` to every item in parallel.
    ///
    /// The processor receives each item's position. Results come back in
    /// input order; the first error aborts the whole map.
    pub fn execute<T, U, F, E>(&self, items: &[T], processor: F) -> Result<Vec<U>, E>
    where
        T: Sync,
        U: Send,
        F: Fn(usize, &T) -> Result<U, E> + Send + Sync,
        E: Send,
    {
        let chunk_size = self.config.chunk_size;
        self.pool.install(|| {
            items
                .par_iter()
                .enumerate()
                .with_min_len(chunk_size)
                .map(|(i, item)| processor(i, item))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_preserves_order() {
        let executor = ParallelExecutor::new(ParallelConfig {
            threads: 4,
            chunk_size: 3,
        })
        .unwrap();
        let items: Vec<u64> = (0..100).collect();
        let out: Result<Vec<u64>, ParallelError> =
            executor.execute(&items, |i, x| Ok(x * 2 + i as u64));
        let expected: Vec<u64> = (0..100).map(|x| x * 3).collect();
        assert_eq!(out.unwrap(), expected);
    }

    #[test]
    fn test_execute_stops_on_error() {
        let executor = ParallelExecutor::new(ParallelConfig::default()).unwrap();
        let items: Vec<u64> = (0..50).collect();
        let out: Result<Vec<u64>, String> = executor.execute(&items, |_, &x| {
            if x == 17 {
                Err(format!("bad item {}", x))
            } else {
                Ok(x)
            }
        });
        assert_eq!(out.unwrap_err(), "bad item 17");
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let res = ParallelExecutor::new(ParallelConfig {
            threads: 1,
            chunk_size: 0,
        });
        assert!(matches!(res, Err(ParallelError::InvalidChunkSize(0))));
    }

    #[test]
    fn test_thread_count_is_honoured() {
        let executor = ParallelExecutor::new(ParallelConfig {
            threads: 2,
            chunk_size: 1,
        })
        .unwrap();
        assert_eq!(executor.threads(), 2);
    }
}
