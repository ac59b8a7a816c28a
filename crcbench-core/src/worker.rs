//! Worker Process Entry Point
//!
//! Handles the worker side of the supervisor-worker architecture.
//!
//! On Unix, uses fd 3/4 for IPC (set via `CRCBENCH_IPC_FD`) and, for the
//! shared-memory strategy, maps the segment inherited as fd 5 (announced via
//! `CRCBENCH_SHM_FD`). Without those variables the worker falls back to
//! stdin/stdout and has no segment.

use crate::executor::compute;
use crate::registry::Registry;
use crate::segment::{SegmentError, SharedSegment};
use crcbench_ipc::{
    DataSource, FailureKind, FrameError, FrameReader, FrameWriter, SupervisorCommand, TaskSpec,
    WorkerCapabilities, WorkerMessage,
};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Fatal worker errors (task-level problems are reported over IPC instead)
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Talking to the supervisor failed
    #[error("IPC error: {0}")]
    Ipc(#[from] FrameError),

    /// The inherited segment could not be mapped
    #[error("Shared segment error: {0}")]
    Segment(#[from] SegmentError),

    /// Malformed descriptor variable
    #[error("Invalid {var}={value:?}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },
}

/// IPC transport: either inherited fd pair or stdin/stdout fallback.
enum IpcTransport {
    #[cfg(unix)]
    Fds { read_fd: i32, write_fd: i32 },
    Stdio,
}

fn detect_transport() -> IpcTransport {
    #[cfg(unix)]
    if let Ok(val) = std::env::var(crcbench_ipc::IPC_FD_ENV) {
        let parts: Vec<&str> = val.split(',').collect();
        if parts.len() == 2 {
            if let (Ok(r), Ok(w)) = (parts[0].parse::<i32>(), parts[1].parse::<i32>()) {
                return IpcTransport::Fds {
                    read_fd: r,
                    write_fd: w,
                };
            }
        }
        eprintln!(
            "crcbench: warning: invalid {}={val:?} (expected format: <read_fd>,<write_fd>), falling back to stdio",
            crcbench_ipc::IPC_FD_ENV
        );
    }
    IpcTransport::Stdio
}

#[cfg(unix)]
fn inherited_segment() -> Result<Option<SharedSegment>, WorkerError> {
    let Ok(val) = std::env::var(crcbench_ipc::SHM_FD_ENV) else {
        return Ok(None);
    };
    let fd = val.parse::<i32>().map_err(|_| WorkerError::InvalidEnv {
        var: crcbench_ipc::SHM_FD_ENV,
        value: val.clone(),
    })?;
    // SAFETY: the supervisor placed the segment at this descriptor before exec
    // and nothing else in this process owns it.
    let segment = unsafe { SharedSegment::from_inherited_fd(fd) }?;
    Ok(Some(segment))
}

#[cfg(not(unix))]
fn inherited_segment() -> Result<Option<SharedSegment>, WorkerError> {
    Ok(None)
}

/// Worker main loop
pub struct WorkerMain {
    reader: FrameReader<Box<dyn std::io::Read>>,
    writer: FrameWriter<Box<dyn std::io::Write>>,
    registry: Registry,
    segment: Option<SharedSegment>,
}

impl WorkerMain {
    /// Create a worker from the environment set up by the supervisor.
    pub fn from_env() -> Result<Self, WorkerError> {
        let segment = inherited_segment()?;
        let (reader, writer): (Box<dyn std::io::Read>, Box<dyn std::io::Write>) =
            match detect_transport() {
                #[cfg(unix)]
                IpcTransport::Fds { read_fd, write_fd } => {
                    let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                    let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                    (Box::new(read_file), Box::new(write_file))
                }
                IpcTransport::Stdio => (Box::new(std::io::stdin()), Box::new(std::io::stdout())),
            };

        Ok(Self::with_io(reader, writer, Registry::with_builtin(), segment))
    }

    /// Create a worker over explicit streams.
    pub fn with_io(
        reader: Box<dyn std::io::Read>,
        writer: Box<dyn std::io::Write>,
        registry: Registry,
        segment: Option<SharedSegment>,
    ) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
            registry,
            segment,
        }
    }

    /// Run the worker main loop until `Shutdown` or the supervisor hangs up.
    pub fn run(&mut self) -> Result<(), WorkerError> {
        let algorithms = self.registry.names().iter().map(|n| n.to_string()).collect();
        let shared_len = self.segment.as_ref().map(|s| s.len() as u64);
        self.writer
            .write(&WorkerMessage::Hello(WorkerCapabilities::current(
                algorithms, shared_len,
            )))?;

        loop {
            let command: SupervisorCommand = match self.reader.read() {
                Ok(command) => command,
                Err(FrameError::EndOfStream) => break,
                Err(e) => return Err(e.into()),
            };

            match command {
                SupervisorCommand::Run(spec) => {
                    let message = self.run_task(&spec)?;
                    self.writer.write(&message)?;
                }
                SupervisorCommand::Shutdown => break,
            }
        }

        Ok(())
    }

    /// Run a single task and build the message reporting it
    fn run_task(&mut self, spec: &TaskSpec) -> Result<WorkerMessage, WorkerError> {
        // Inline payloads are drained before anything can fail so the command
        // stream stays aligned on frame boundaries.
        let copied = match spec.data {
            DataSource::Inline { .. } => Some(self.reader.read_payload(spec.payload_len())?),
            DataSource::Shared => None,
        };

        let algo = match self.registry.lookup(&spec.algorithm) {
            Ok(algo) => *algo,
            Err(e) => {
                return Ok(WorkerMessage::Failure {
                    task_index: spec.task_index,
                    kind: FailureKind::UnknownAlgorithm,
                    message: e.to_string(),
                });
            }
        };

        let data: &[u8] = match (&copied, &self.segment) {
            (Some(copy), _) => copy,
            (None, Some(segment)) => segment.as_slice(),
            (None, None) => {
                return Ok(WorkerMessage::Failure {
                    task_index: spec.task_index,
                    kind: FailureKind::MissingSegment,
                    message: "task requested shared data but no segment was inherited"
                        .to_string(),
                });
            }
        };

        let chunk_size = spec.chunk_size as usize;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            compute(data, chunk_size, &algo)
        }));

        Ok(match result {
            Ok(result) => WorkerMessage::TaskComplete(result.into_report(spec.task_index)),
            Err(panic) => {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                WorkerMessage::Failure {
                    task_index: spec.task_index,
                    kind: FailureKind::Panic,
                    message,
                }
            }
        })
    }
}
