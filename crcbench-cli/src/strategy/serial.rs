//! Serial strategy: tasks run one after another in the caller.

use super::{ChecksumTask, Strategy, StrategyError, TaskPool};
use crcbench_core::{TaskResult, compute};

/// Runs every task in the calling thread
pub struct SerialPool {
    data: Vec<u8>,
}

impl SerialPool {
    /// Create a pool over `data`
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl TaskPool for SerialPool {
    fn strategy(&self) -> Strategy {
        Strategy::Serial
    }

    fn map(
        &mut self,
        task: &ChecksumTask<'_>,
        tasks: usize,
    ) -> Result<Vec<TaskResult>, StrategyError> {
        Ok((0..tasks)
            .map(|_| compute(&self.data, task.chunk_size, task.algorithm))
            .collect())
    }
}
