//! IPC Message Types
//!
//! All messages are serialized with rkyv and validated on receipt.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// Outcome of one checksum task as measured inside the worker.
///
/// `started_at_ns` is a reading of the system-wide monotonic clock so the
/// supervisor can subtract its own dispatch timestamp from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
#[repr(C)]
pub struct TaskReport {
    /// Index of the task within the current combination
    pub task_index: u32,
    /// Final 32-bit checksum
    pub checksum: u32,
    /// Monotonic timestamp taken right before the first update
    pub started_at_ns: u64,
    /// Checksum computation time in nanoseconds
    pub elapsed_ns: u64,
}

/// Where a worker finds the bytes to checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum DataSource {
    /// The read-only segment mapped at worker startup
    Shared,
    /// `len` raw bytes follow the command frame on the command pipe
    Inline {
        /// Payload length in bytes
        len: u64,
    },
}

/// A single checksum task
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct TaskSpec {
    /// Index of the task within the current combination
    pub task_index: u32,
    /// Registry name of the algorithm
    pub algorithm: String,
    /// Chunk size in bytes, 0 = whole buffer in one update
    pub chunk_size: u64,
    /// Data placement
    pub data: DataSource,
}

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// Worker process id (for logs)
    pub pid: u32,
    /// Names of the algorithms compiled into the worker
    pub algorithms: Vec<String>,
    /// Length of the mapped shared segment, if one was inherited
    pub shared_len: Option<u64>,
}

/// Messages sent from Worker to Supervisor
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake with worker capabilities
    Hello(WorkerCapabilities),

    /// A task finished
    TaskComplete(TaskReport),

    /// A task could not be run
    Failure {
        /// Index of the failed task
        task_index: u32,
        /// Error category
        kind: FailureKind,
        /// Human-readable error message
        message: String,
    },
}

/// Categories of task failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// Algorithm name not registered in the worker
    UnknownAlgorithm,
    /// Shared data requested but no segment was inherited
    MissingSegment,
    /// Checksum code panicked (caught)
    Panic,
}

/// Commands sent from Supervisor to Worker
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Run one checksum task
    Run(TaskSpec),

    /// Request graceful shutdown
    Shutdown,
}

impl WorkerCapabilities {
    /// Capabilities of the current process
    pub fn current(algorithms: Vec<String>, shared_len: Option<u64>) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            pid: std::process::id(),
            algorithms,
            shared_len,
        }
    }

    /// Whether the worker knows `algorithm`
    pub fn supports(&self, algorithm: &str) -> bool {
        self.algorithms.iter().any(|a| a == algorithm)
    }
}

impl TaskSpec {
    /// Number of raw payload bytes following this command
    pub fn payload_len(&self) -> u64 {
        match self.data {
            DataSource::Shared => 0,
            DataSource::Inline { len } => len,
        }
    }
}
