//! Process Strategies
//!
//! Worker processes are re-executions of the current binary with `--worker`.
//! Commands travel over fd 3 and messages come back over fd 4. With a shared
//! segment the worker also inherits the segment as fd 5 and maps it
//! read-only; without one, every task streams its own copy of the buffer
//! after the `Run` frame.

use super::{ChecksumTask, Strategy, StrategyError, TaskPool};
use crcbench_core::{SegmentSetup, SharedSegment, TaskResult};
use crcbench_ipc::{
    DataSource, FrameError, FrameReader, FrameWriter, SupervisorCommand, TaskSpec,
    WorkerCapabilities, WorkerMessage,
};
use std::os::unix::io::{FromRawFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Create a pipe pair with close-on-exec set on both ends, returning
/// (read_fd, write_fd).
fn create_pipe() -> Result<(RawFd, RawFd), std::io::Error> {
    let mut fds = [0 as RawFd; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    for &fd in &fds {
        unsafe {
            let flags = libc::fcntl(fd, libc::F_GETFD);
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
    Ok((fds[0], fds[1]))
}

/// Close a raw file descriptor.
fn close_fd(fd: RawFd) {
    unsafe {
        libc::close(fd);
    }
}

/// Place `fds[i]` at `targets[i]` in the child, leaving the targets inheritable.
///
/// Every source is first duplicated above the target range so that a source
/// sitting on another entry's target is not clobbered by an earlier `dup2`.
/// Runs between fork and exec, so it only makes async-signal-safe calls.
fn install_fds(fds: &[(RawFd, RawFd)]) -> std::io::Result<()> {
    const SCRATCH_FLOOR: RawFd = 16;
    let mut moved = [(-1 as RawFd, -1 as RawFd); 3];

    for (slot, &(source, target)) in moved.iter_mut().zip(fds) {
        let high = unsafe { libc::fcntl(source, libc::F_DUPFD_CLOEXEC, SCRATCH_FLOOR) };
        if high < 0 {
            return Err(std::io::Error::last_os_error());
        }
        *slot = (high, target);
    }

    for &(high, target) in moved.iter().take(fds.len()) {
        // dup2 clears FD_CLOEXEC on the new descriptor; the scratch copy
        // keeps it and disappears at exec.
        if unsafe { libc::dup2(high, target) } < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    Ok(())
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<std::fs::File>,
    writer: FrameWriter<std::fs::File>,
    capabilities: WorkerCapabilities,
}

impl WorkerHandle {
    /// Spawn a worker running `binary --worker`.
    ///
    /// `segment` is inherited as fd 5 when given; the worker must report the
    /// same mapped length in its `Hello`.
    pub fn spawn(binary: &Path, segment: Option<&SharedSegment>) -> Result<Self, StrategyError> {
        // cmd_pipe: supervisor writes commands → worker reads from fd 3
        let (cmd_read, cmd_write) = create_pipe()?;
        // msg_pipe: worker writes messages from fd 4 → supervisor reads
        let (msg_read, msg_write) = match create_pipe() {
            Ok(fds) => fds,
            Err(e) => {
                close_fd(cmd_read);
                close_fd(cmd_write);
                return Err(StrategyError::SpawnFailed(e));
            }
        };

        let mut command = Command::new(binary);
        command
            .arg("--worker")
            .env(
                crcbench_ipc::IPC_FD_ENV,
                format!(
                    "{},{}",
                    crcbench_ipc::WORKER_COMMAND_FD,
                    crcbench_ipc::WORKER_MESSAGE_FD
                ),
            )
            .env_remove(crcbench_ipc::SHM_FD_ENV)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let segment_fd = segment.map(SharedSegment::raw_fd);
        if segment_fd.is_some() {
            command.env(
                crcbench_ipc::SHM_FD_ENV,
                crcbench_ipc::WORKER_SEGMENT_FD.to_string(),
            );
        }

        // In the child: cmd_read→3, msg_write→4, segment→5. The parent-side
        // pipe ends are close-on-exec and vanish at exec.
        unsafe {
            command.pre_exec(move || {
                let mut fds = [(cmd_read, crcbench_ipc::WORKER_COMMAND_FD); 3];
                fds[1] = (msg_write, crcbench_ipc::WORKER_MESSAGE_FD);
                let count = match segment_fd {
                    Some(fd) => {
                        fds[2] = (fd, crcbench_ipc::WORKER_SEGMENT_FD);
                        3
                    }
                    None => 2,
                };
                install_fds(&fds[..count])
            });
        }

        let spawned = command.spawn();

        // Close the child-side ends in the parent
        close_fd(cmd_read);
        close_fd(msg_write);

        let child = match spawned {
            Ok(c) => c,
            Err(e) => {
                close_fd(cmd_write);
                close_fd(msg_read);
                return Err(StrategyError::SpawnFailed(e));
            }
        };

        // Wrap parent-side ends in Files
        let writer_file = unsafe { std::fs::File::from_raw_fd(cmd_write) };
        let reader_file = unsafe { std::fs::File::from_raw_fd(msg_read) };
        let mut reader = FrameReader::new(reader_file);

        let capabilities = match Self::wait_for_hello(&mut reader) {
            Ok(caps) => caps,
            Err(e) => {
                let mut child = child;
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let expected_len = segment.map(|s| s.len() as u64);
        let handle = Self {
            child,
            reader,
            writer: FrameWriter::new(writer_file),
            capabilities,
        };

        if handle.capabilities.shared_len != expected_len {
            return Err(StrategyError::ProtocolError {
                expected: format!("shared segment of {:?} bytes", expected_len),
                got: format!("{:?} bytes", handle.capabilities.shared_len),
            });
        }

        tracing::debug!(
            pid = handle.capabilities.pid,
            shared_len = ?handle.capabilities.shared_len,
            "worker ready"
        );
        Ok(handle)
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(
        reader: &mut FrameReader<std::fs::File>,
    ) -> Result<WorkerCapabilities, StrategyError> {
        let msg: WorkerMessage = match reader.read() {
            Ok(msg) => msg,
            Err(FrameError::EndOfStream) => {
                return Err(StrategyError::WorkerCrashed(
                    "Worker exited before handshake".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        match msg {
            WorkerMessage::Hello(caps) => {
                if caps.protocol_version != crcbench_ipc::PROTOCOL_VERSION {
                    return Err(StrategyError::ProtocolError {
                        expected: format!("protocol version {}", crcbench_ipc::PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                Ok(caps)
            }
            other => Err(StrategyError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Send a task, followed by its payload when the task carries one
    fn dispatch(&mut self, spec: TaskSpec, payload: Option<&[u8]>) -> Result<(), StrategyError> {
        let command = SupervisorCommand::Run(spec);
        let sent = match payload {
            Some(bytes) => self.writer.write_with_payload(&command, bytes),
            None => self.writer.write(&command),
        };
        sent.map_err(|e| self.crash_or(e.into()))
    }

    /// Wait for the result of `task_index`
    fn collect(&mut self, task_index: u32) -> Result<TaskResult, StrategyError> {
        let msg: WorkerMessage = match self.reader.read() {
            Ok(msg) => msg,
            Err(FrameError::EndOfStream) => {
                return Err(self.crash_or(StrategyError::WorkerCrashed(
                    "Worker closed connection unexpectedly".to_string(),
                )));
            }
            Err(e) => return Err(self.crash_or(e.into())),
        };

        match msg {
            WorkerMessage::TaskComplete(report) if report.task_index == task_index => {
                Ok(TaskResult::from(report))
            }
            WorkerMessage::TaskComplete(report) => Err(StrategyError::ProtocolError {
                expected: format!("result for task {}", task_index),
                got: format!("result for task {}", report.task_index),
            }),
            WorkerMessage::Failure {
                task_index,
                kind,
                message,
            } => Err(StrategyError::WorkerFailure {
                task_index,
                kind,
                message,
            }),
            WorkerMessage::Hello(_) => Err(StrategyError::ProtocolError {
                expected: "TaskComplete/Failure".to_string(),
                got: "Hello".to_string(),
            }),
        }
    }

    /// Replace `error` with a crash report if the worker is gone
    fn crash_or(&mut self, error: StrategyError) -> StrategyError {
        match self.child.try_wait() {
            Ok(Some(status)) => StrategyError::WorkerCrashed(format!(
                "Worker {} exited with {}",
                self.capabilities.pid, status
            )),
            _ => error,
        }
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(Some(_)) => false,
            Ok(None) => true,
            Err(_) => false,
        }
    }

    /// Ask the worker to exit and reap it.
    ///
    /// A worker that already exited is only reaped, so calling this twice is
    /// harmless. A worker that cannot be told to stop is killed.
    pub fn shutdown(&mut self) -> Result<(), StrategyError> {
        if !self.is_alive() {
            return Ok(());
        }

        let pid = self.capabilities.pid;
        if let Err(e) = self.writer.write(&SupervisorCommand::Shutdown) {
            let _ = self.child.kill();
            let _ = self.child.wait();
            return Err(e.into());
        }

        let status = self.child.wait().map_err(|e| {
            StrategyError::WorkerCrashed(format!("Failed to reap worker {}: {}", pid, e))
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(StrategyError::WorkerCrashed(format!(
                "Worker {} exited with {}",
                pid, status
            )))
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(pid = self.capabilities.pid, error = %e, "worker shutdown failed");
        }
    }
}

/// Where the workers find the buffer
enum DataPlacement {
    Shared {
        // Held so the mapping outlives every worker
        _segment: SharedSegment,
        setup: SegmentSetup,
    },
    Copy(Vec<u8>),
}

/// Pool of persistent worker processes
pub struct ProcessPool {
    workers: Vec<WorkerHandle>,
    placement: DataPlacement,
}

impl ProcessPool {
    /// Copy `data` into a shared segment once and spawn `workers` processes
    /// mapping it.
    pub fn shared(data: Vec<u8>, workers: usize, binary: &Path) -> Result<Self, StrategyError> {
        let (segment, setup) = SharedSegment::create_from(data)?;
        tracing::info!(
            size_mb = setup.size_mb(),
            allocate = ?setup.allocate,
            initialize = ?setup.initialize,
            "shared memory segment initialized"
        );

        let workers = Self::spawn_workers(binary, workers, Some(&segment))?;
        Ok(Self {
            workers,
            placement: DataPlacement::Shared {
                _segment: segment,
                setup,
            },
        })
    }

    /// Spawn `workers` processes that receive a copy of `data` with every task.
    pub fn copying(data: Vec<u8>, workers: usize, binary: &Path) -> Result<Self, StrategyError> {
        let workers = Self::spawn_workers(binary, workers, None)?;
        Ok(Self {
            workers,
            placement: DataPlacement::Copy(data),
        })
    }

    fn spawn_workers(
        binary: &Path,
        count: usize,
        segment: Option<&SharedSegment>,
    ) -> Result<Vec<WorkerHandle>, StrategyError> {
        (0..count.max(1))
            .map(|_| WorkerHandle::spawn(binary, segment))
            .collect()
    }
}

impl TaskPool for ProcessPool {
    fn strategy(&self) -> Strategy {
        match self.placement {
            DataPlacement::Shared { .. } => Strategy::ProcessShared,
            DataPlacement::Copy(_) => Strategy::ProcessCopy,
        }
    }

    fn setup_cost(&self) -> Option<&SegmentSetup> {
        match &self.placement {
            DataPlacement::Shared { setup, .. } => Some(setup),
            DataPlacement::Copy(_) => None,
        }
    }

    fn map(
        &mut self,
        task: &ChecksumTask<'_>,
        tasks: usize,
    ) -> Result<Vec<TaskResult>, StrategyError> {
        let name = task.algorithm.name;
        if !self.workers.iter().all(|w| w.capabilities.supports(name)) {
            return Err(StrategyError::UnsupportedAlgorithm(name.to_string()));
        }

        let worker_count = self.workers.len();
        let (data, payload) = match &self.placement {
            DataPlacement::Shared { .. } => (DataSource::Shared, None),
            DataPlacement::Copy(bytes) => (
                DataSource::Inline {
                    len: bytes.len() as u64,
                },
                Some(bytes.as_slice()),
            ),
        };

        // Dispatch everything first so workers run concurrently. Each worker
        // answers its own tasks in the order they were sent. An inline
        // payload is streamed in full before the worker starts its timer, so
        // the copy lands in setup time rather than elapsed time.
        for index in 0..tasks {
            let spec = TaskSpec {
                task_index: index as u32,
                algorithm: name.to_string(),
                chunk_size: task.chunk_size as u64,
                data: data.clone(),
            };
            self.workers[index % worker_count].dispatch(spec, payload)?;
        }

        (0..tasks)
            .map(|index| self.workers[index % worker_count].collect(index as u32))
            .collect()
    }
}
