//! Concurrency Strategies
//!
//! A [`TaskPool`] runs the same checksum task `N` times concurrently and hands
//! back one [`TaskResult`] per task, ordered by task index. Pools are built
//! once per run by [`build_pool`]; the input buffer is wired into the pool at
//! that point and reused for every (algorithm, chunk size) combination.

mod process;
mod serial;
mod threads;

pub use process::{ProcessPool, WorkerHandle};
pub use serial::SerialPool;
pub use threads::ThreadPool;

use crcbench_core::{AlgorithmDescriptor, SegmentError, SegmentSetup, TaskResult};
use crcbench_ipc::{FailureKind, FrameError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// How concurrent tasks are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// One task after another in the calling thread
    #[default]
    Serial,
    /// One OS thread per task, sharing the buffer
    Threads,
    /// One worker process per task, sharing the buffer through a memory segment
    ProcessShared,
    /// One worker process per task, each task receiving its own copy of the buffer
    ProcessCopy,
}

impl Strategy {
    /// Plural noun used in the run preamble
    pub fn mechanism(self) -> &'static str {
        match self {
            Strategy::Serial => "serial evaluation(s)",
            Strategy::Threads => "thread(s)",
            Strategy::ProcessShared | Strategy::ProcessCopy => "process(es)",
        }
    }

    /// Whether tasks run in worker processes
    pub fn uses_processes(self) -> bool {
        matches!(self, Strategy::ProcessShared | Strategy::ProcessCopy)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Serial => "serial",
            Strategy::Threads => "threads",
            Strategy::ProcessShared => "process-shared",
            Strategy::ProcessCopy => "process-copy",
        };
        f.write_str(name)
    }
}

/// Errors raised by a pool while setting up or running tasks
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Worker process or its pipes could not be created
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// Frame exchange with a worker failed
    #[error("IPC error: {0}")]
    IpcError(String),

    /// Worker exited or closed its pipes unexpectedly
    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    /// Worker reported that a task failed
    #[error("Worker failed task {task_index} ({kind:?}): {message}")]
    WorkerFailure {
        /// Task that failed
        task_index: u32,
        /// Failure category
        kind: FailureKind,
        /// Worker's description
        message: String,
    },

    /// Worker sent something other than what was expected
    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError {
        /// What the supervisor was waiting for
        expected: String,
        /// What arrived instead
        got: String,
    },

    /// Algorithm is not compiled into the workers
    #[error("Algorithm '{0}' is not available in worker processes")]
    UnsupportedAlgorithm(String),

    /// rayon pool could not be built
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),

    /// Shared segment could not be created
    #[error("Shared memory error: {0}")]
    Segment(#[from] SegmentError),
}

impl From<FrameError> for StrategyError {
    fn from(e: FrameError) -> Self {
        StrategyError::IpcError(e.to_string())
    }
}

/// One unit of work: an algorithm applied with a given chunk size
#[derive(Debug, Clone, Copy)]
pub struct ChecksumTask<'a> {
    /// Algorithm to run
    pub algorithm: &'a AlgorithmDescriptor,
    /// Chunk size in bytes (`WHOLE_BUFFER` = single update)
    pub chunk_size: usize,
}

/// Executes a checksum task `tasks` times under one concurrency strategy
pub trait TaskPool {
    /// Strategy implemented by this pool
    fn strategy(&self) -> Strategy;

    /// One-time cost of placing the buffer in shared memory, if any
    fn setup_cost(&self) -> Option<&SegmentSetup> {
        None
    }

    /// Run `tasks` copies of `task`, returning results in task-index order
    fn map(&mut self, task: &ChecksumTask<'_>, tasks: usize)
    -> Result<Vec<TaskResult>, StrategyError>;
}

/// Build the pool for `strategy`, taking ownership of the buffer.
///
/// `worker_binary` is the executable re-spawned with `--worker` by the process
/// strategies; it is ignored otherwise.
pub fn build_pool(
    strategy: Strategy,
    data: Vec<u8>,
    tasks: usize,
    worker_binary: &Path,
) -> Result<Box<dyn TaskPool>, StrategyError> {
    let tasks = tasks.max(1);
    tracing::debug!(%strategy, tasks, bytes = data.len(), "building task pool");

    Ok(match strategy {
        Strategy::Serial => Box::new(SerialPool::new(data)),
        Strategy::Threads => Box::new(ThreadPool::new(data, tasks)?),
        Strategy::ProcessShared => Box::new(ProcessPool::shared(data, tasks, worker_binary)?),
        Strategy::ProcessCopy => Box::new(ProcessPool::copying(data, tasks, worker_binary)?),
    })
}
