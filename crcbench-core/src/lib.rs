#![warn(missing_docs)]
//! crcbench Core - Checksum Runtime
//!
//! This crate provides everything that runs inside a checksum task:
//! - `Registry` of named algorithms with an incremental init/update/finalize contract
//! - Chunked executor timing a single checksum computation
//! - System-wide monotonic timestamps comparable across processes
//! - Shared memory segments inherited by worker processes
//! - Worker main loop for the process strategies

mod executor;
mod measure;
mod registry;
mod segment;
mod worker;

pub use executor::{
    DEFAULT_MAX_CHUNK_LOG2, DEFAULT_MIN_CHUNK_LOG2, TaskResult, WHOLE_BUFFER, chunk_sweep, compute,
};
pub use measure::{Timer, monotonic_nanos, nanos_to_secs};
pub use registry::{
    AlgorithmDescriptor, ChecksumState, FinalizeFn, InitFn, Registry, RegistryError, UpdateFn,
};
pub use segment::{SegmentError, SegmentSetup, SharedSegment};
pub use worker::{WorkerError, WorkerMain};
