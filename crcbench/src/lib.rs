#![warn(missing_docs)]
//! # crcbench
//!
//! Checksum throughput benchmark across execution strategies.
//!
//! crcbench measures how fast several 32-bit checksum algorithms process a
//! buffer, sweeping the chunk size the buffer is fed in and running `N`
//! identical tasks at once:
//! - **Serial**: tasks one after another in the calling thread
//! - **Threads**: a rayon pool with one thread per task sharing the buffer
//! - **Process-shared**: worker processes mapping one read-only memory segment
//! - **Process-copy**: worker processes receiving their own copy per task
//!
//! Every task of a combination must agree on the checksum; a mismatch aborts
//! the run.
//!
//! ## Plugging in an algorithm
//!
//! ```
//! use crcbench::{ChecksumState, Registry, WHOLE_BUFFER, compute};
//!
//! fn init() -> ChecksumState {
//!     ChecksumState::Word(0)
//! }
//! fn update(state: ChecksumState, chunk: &[u8]) -> ChecksumState {
//!     match state {
//!         ChecksumState::Word(sum) => ChecksumState::Word(
//!             chunk.iter().fold(sum, |acc, &b| acc.wrapping_add(u32::from(b))),
//!         ),
//!         other => other,
//!     }
//! }
//! fn finalize(state: ChecksumState) -> u32 {
//!     match state {
//!         ChecksumState::Word(sum) => sum,
//!         _ => 0,
//!     }
//! }
//!
//! let mut registry = Registry::with_builtin();
//! registry.register("sum", "sum of bytes", init, update, finalize).unwrap();
//! let sum = registry.lookup("sum").unwrap();
//! assert_eq!(compute(&[1, 2, 3], WHOLE_BUFFER, sum).checksum, 6);
//! ```

// Re-export core types
pub use crcbench_core::{
    AlgorithmDescriptor, ChecksumState, DEFAULT_MAX_CHUNK_LOG2, DEFAULT_MIN_CHUNK_LOG2, Registry,
    RegistryError, SegmentSetup, TaskResult, WHOLE_BUFFER, chunk_sweep, compute, monotonic_nanos,
};

// Re-export strategies, driver and CLI entry points
pub use crcbench_cli::{
    BenchError, ChecksumTask, Cli, CrcbenchConfig, ProcessPool, RowStats, RunConfig, SerialPool,
    Strategy, StrategyError, TaskPool, ThreadPool, WorkerHandle, build_pool, run, run_benchmark,
    run_sweep, run_with_cli,
};

// Re-export stats
pub use crcbench_stats::{Summary, mean_and_std_dev};
