//! Thread strategy: a dedicated rayon pool with one thread per task.

use super::{ChecksumTask, Strategy, StrategyError, TaskPool};
use crcbench_core::{TaskResult, compute};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::sync::Arc;

/// Runs tasks on a rayon pool sized to the task count
pub struct ThreadPool {
    data: Arc<[u8]>,
    pool: rayon::ThreadPool,
}

impl ThreadPool {
    /// Create a pool of `threads` workers sharing `data`
    pub fn new(data: Vec<u8>, threads: usize) -> Result<Self, StrategyError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("crcbench-task-{}", i))
            .build()
            .map_err(|e| StrategyError::ThreadPool(e.to_string()))?;

        Ok(Self {
            data: Arc::from(data),
            pool,
        })
    }
}

impl TaskPool for ThreadPool {
    fn strategy(&self) -> Strategy {
        Strategy::Threads
    }

    fn map(
        &mut self,
        task: &ChecksumTask<'_>,
        tasks: usize,
    ) -> Result<Vec<TaskResult>, StrategyError> {
        let data: &[u8] = &self.data;
        let chunk_size = task.chunk_size;
        let algorithm = task.algorithm;

        // One task per split so every task lands on its own thread when possible
        Ok(self.pool.install(|| {
            (0..tasks)
                .into_par_iter()
                .with_max_len(1)
                .map(|_| compute(data, chunk_size, algorithm))
                .collect()
        }))
    }
}
