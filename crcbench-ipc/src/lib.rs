#![warn(missing_docs)]
//! crcbench IPC Protocol
//!
//! Wire protocol between the benchmark supervisor and its worker processes.
//! Control messages are length-prefixed rkyv frames; bulk buffer copies for
//! the per-task copy strategy are streamed as raw payload bytes right after
//! the frame that announces them.

mod framing;
mod messages;

pub use framing::{
    FrameError, FrameReader, FrameWriter, MAX_FRAME_SIZE, PAYLOAD_CHUNK_SIZE, read_frame,
    read_payload, write_frame, write_payload,
};
pub use messages::{
    DataSource, FailureKind, SupervisorCommand, TaskReport, TaskSpec, WorkerCapabilities,
    WorkerMessage,
};

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the `<read_fd>,<write_fd>` pair of a worker
pub const IPC_FD_ENV: &str = "CRCBENCH_IPC_FD";

/// Environment variable carrying the inherited shared segment descriptor
pub const SHM_FD_ENV: &str = "CRCBENCH_SHM_FD";

/// Descriptor number a worker reads commands from
pub const WORKER_COMMAND_FD: i32 = 3;

/// Descriptor number a worker writes messages to
pub const WORKER_MESSAGE_FD: i32 = 4;

/// Descriptor number of the inherited shared memory segment
pub const WORKER_SEGMENT_FD: i32 = 5;
