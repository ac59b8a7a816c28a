//! Timing
//!
//! Task start times must be comparable between the supervisor and worker
//! processes, so they are read from the system-wide monotonic clock
//! (`CLOCK_MONOTONIC`) rather than a process-local `Instant` origin.

use std::time::Duration;

/// Current reading of the system-wide monotonic clock, in nanoseconds.
#[cfg(unix)]
#[inline]
pub fn monotonic_nanos() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec and CLOCK_MONOTONIC is
    // supported on every Unix we target.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64)
        .saturating_mul(1_000_000_000)
        .saturating_add(ts.tv_nsec as u64)
}

/// Process-local fallback: only comparable within one process.
#[cfg(not(unix))]
#[inline]
pub fn monotonic_nanos() -> u64 {
    use std::sync::OnceLock;
    static ORIGIN: OnceLock<std::time::Instant> = OnceLock::new();
    ORIGIN
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_nanos() as u64
}

/// Timer for a single checksum computation
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    started_at_ns: u64,
    start: std::time::Instant,
}

impl Timer {
    /// Start a new timer
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            started_at_ns: monotonic_nanos(),
            start: std::time::Instant::now(),
        }
    }

    /// Monotonic timestamp at which the timer started
    #[inline(always)]
    pub fn started_at_ns(&self) -> u64 {
        self.started_at_ns
    }

    /// Stop the timer and return elapsed nanoseconds
    #[inline(always)]
    pub fn stop(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

/// Nanoseconds to fractional seconds
#[inline]
pub fn nanos_to_secs(nanos: u64) -> f64 {
    Duration::from_nanos(nanos).as_secs_f64()
}
