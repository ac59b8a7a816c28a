//! Shared Memory Segment
//!
//! An anonymous, fd-backed memory region that worker processes inherit and
//! map read-only. The segment is written exactly once, by the supervisor,
//! right after allocation; the source buffer is dropped as soon as the copy
//! is done so peak memory stays at one copy of the data.
//!
//! On Linux the backing object comes from `memfd_create`; other Unix systems
//! use an immediately-unlinked POSIX `shm_open` object.

use memmap2::{Mmap, MmapMut};
use std::fs::File;
use std::time::{Duration, Instant};
use thiserror::Error;

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};

/// Errors raised while creating or mapping a segment
#[derive(Debug, Error)]
pub enum SegmentError {
    /// Creating or sizing the backing object failed
    #[error("Failed to allocate shared memory segment of {len} bytes: {source}")]
    Allocate {
        /// Requested size in bytes
        len: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Mapping or protecting the segment failed
    #[error("Failed to map shared memory segment: {0}")]
    Map(#[source] std::io::Error),

    /// No fd-backed shared memory on this platform
    #[error("Shared memory segments are not supported on this platform")]
    Unsupported,
}

/// One-time cost of wiring the data into a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentSetup {
    /// Segment size in bytes
    pub len: usize,
    /// Time to create, size and map the segment
    pub allocate: Duration,
    /// Time to copy the data in
    pub initialize: Duration,
}

impl SegmentSetup {
    /// Segment size in MB (2^20 bytes)
    pub fn size_mb(&self) -> f64 {
        self.len as f64 / 1024.0 / 1024.0
    }
}

/// Read-only shared memory holding the benchmark data
pub struct SharedSegment {
    file: File,
    map: Option<Mmap>,
    len: usize,
}

impl SharedSegment {
    /// Allocate a segment, copy `data` into it and release `data`.
    pub fn create_from(data: Vec<u8>) -> Result<(Self, SegmentSetup), SegmentError> {
        let len = data.len();

        let t0 = Instant::now();
        let file = anonymous_file(len)?;
        file.set_len(len as u64)
            .map_err(|source| SegmentError::Allocate { len, source })?;
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the file is private to this process tree and is not
            // resized after this point.
            Some(unsafe { MmapMut::map_mut(&file) }.map_err(SegmentError::Map)?)
        };
        let allocate = t0.elapsed();

        let t1 = Instant::now();
        let map = match map {
            Some(mut map) => {
                map.copy_from_slice(&data);
                drop(data);
                Some(map.make_read_only().map_err(SegmentError::Map)?)
            }
            None => None,
        };
        let initialize = t1.elapsed();

        tracing::debug!(len, ?allocate, ?initialize, "shared segment ready");

        Ok((
            Self { file, map, len },
            SegmentSetup {
                len,
                allocate,
                initialize,
            },
        ))
    }

    /// Map a segment inherited from the supervisor.
    ///
    /// # Safety
    ///
    /// `fd` must be an open descriptor for a segment created by
    /// [`SharedSegment::create_from`], owned by the caller from now on.
    #[cfg(unix)]
    pub unsafe fn from_inherited_fd(fd: RawFd) -> Result<Self, SegmentError> {
        let file = File::from_raw_fd(fd);
        let len = file.metadata().map_err(SegmentError::Map)?.len() as usize;
        let map = if len == 0 {
            None
        } else {
            Some(Mmap::map(&file).map_err(SegmentError::Map)?)
        };
        Ok(Self { file, map, len })
    }

    /// The segment contents
    pub fn as_slice(&self) -> &[u8] {
        match &self.map {
            Some(map) => &map[..],
            None => &[],
        }
    }

    /// Segment size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the segment holds no data
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Descriptor to hand to child processes
    #[cfg(unix)]
    pub fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl std::fmt::Debug for SharedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSegment")
            .field("len", &self.len)
            .field("mapped", &self.map.is_some())
            .finish()
    }
}

#[cfg(target_os = "linux")]
fn anonymous_file(len: usize) -> Result<File, SegmentError> {
    let name = b"crcbench-segment\0";
    // SAFETY: `name` is NUL-terminated.
    let fd = unsafe { libc::memfd_create(name.as_ptr() as *const libc::c_char, libc::MFD_CLOEXEC) };
    if fd < 0 {
        return Err(SegmentError::Allocate {
            len,
            source: std::io::Error::last_os_error(),
        });
    }
    // SAFETY: `fd` was just created and is owned by nobody else.
    Ok(unsafe { File::from_raw_fd(fd) })
}

#[cfg(all(unix, not(target_os = "linux")))]
fn anonymous_file(len: usize) -> Result<File, SegmentError> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let name = format!(
        "/crcbench-{}-{}\0",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let allocate_err = |source| SegmentError::Allocate { len, source };

    // SAFETY: `name` is NUL-terminated and outlives both calls.
    let fd = unsafe {
        libc::shm_open(
            name.as_ptr() as *const libc::c_char,
            libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
            0o600 as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(allocate_err(std::io::Error::last_os_error()));
    }
    unsafe {
        libc::shm_unlink(name.as_ptr() as *const libc::c_char);
        let flags = libc::fcntl(fd, libc::F_GETFD);
        libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
    }
    // SAFETY: `fd` was just created and is owned by nobody else.
    Ok(unsafe { File::from_raw_fd(fd) })
}

#[cfg(not(unix))]
fn anonymous_file(_len: usize) -> Result<File, SegmentError> {
    Err(SegmentError::Unsupported)
}
