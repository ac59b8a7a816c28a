//! Chunked Checksum Executor
//!
//! Runs one algorithm over a buffer, either in a single `update` call or by
//! threading the running state through contiguous fixed-size slices. Only the
//! computation itself is timed: fetching the data and dispatching the task
//! happen before the timer starts.

use crate::measure::{Timer, nanos_to_secs};
use crate::registry::AlgorithmDescriptor;
use crcbench_ipc::TaskReport;

/// Chunk size sentinel: feed the whole buffer to a single `update` call
pub const WHOLE_BUFFER: usize = 0;

/// Smallest chunk of the default sweep (512 B)
pub const DEFAULT_MIN_CHUNK_LOG2: u32 = 9;

/// Largest chunk of the default sweep (1 MiB)
pub const DEFAULT_MAX_CHUNK_LOG2: u32 = 20;

/// Outcome of one checksum task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskResult {
    /// Final checksum
    pub checksum: u32,
    /// Monotonic timestamp taken right before the computation
    pub started_at_ns: u64,
    /// Computation time in nanoseconds
    pub elapsed_ns: u64,
}

impl TaskResult {
    /// Computation time in seconds
    pub fn elapsed_secs(&self) -> f64 {
        nanos_to_secs(self.elapsed_ns)
    }

    /// Time between dispatch and the start of the computation, in seconds
    pub fn setup_secs(&self, dispatched_at_ns: u64) -> f64 {
        nanos_to_secs(self.started_at_ns.saturating_sub(dispatched_at_ns))
    }

    /// Wire form of this result
    pub fn into_report(self, task_index: u32) -> TaskReport {
        TaskReport {
            task_index,
            checksum: self.checksum,
            started_at_ns: self.started_at_ns,
            elapsed_ns: self.elapsed_ns,
        }
    }
}

impl From<TaskReport> for TaskResult {
    fn from(report: TaskReport) -> Self {
        Self {
            checksum: report.checksum,
            started_at_ns: report.started_at_ns,
            elapsed_ns: report.elapsed_ns,
        }
    }
}

/// Checksum `data` with `algo`, feeding it `chunk_size` bytes at a time.
///
/// `chunk_size == WHOLE_BUFFER` applies the algorithm to the entire buffer in
/// one update. Otherwise the last slice may be shorter than `chunk_size`.
pub fn compute(data: &[u8], chunk_size: usize, algo: &AlgorithmDescriptor) -> TaskResult {
    let timer = Timer::start();

    let checksum = if chunk_size == WHOLE_BUFFER {
        algo.finalize(algo.update(algo.init(), data))
    } else {
        let state = data
            .chunks(chunk_size)
            .fold(algo.init(), |state, chunk| algo.update(state, chunk));
        algo.finalize(state)
    };

    let elapsed_ns = timer.stop();

    TaskResult {
        checksum,
        started_at_ns: timer.started_at_ns(),
        elapsed_ns,
    }
}

/// Ascending power-of-two chunk sizes `2^min_log2..=2^max_log2`, followed by
/// the whole-buffer sentinel.
pub fn chunk_sweep(min_log2: u32, max_log2: u32) -> Vec<usize> {
    let mut sizes: Vec<usize> = (min_log2..=max_log2).map(|exp| 1usize << exp).collect();
    sizes.push(WHOLE_BUFFER);
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ChecksumState, Registry};

    fn sample_data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i.wrapping_mul(31) ^ (i >> 3)) as u8).collect()
    }

    #[test]
    fn test_default_sweep() {
        let sweep = chunk_sweep(DEFAULT_MIN_CHUNK_LOG2, DEFAULT_MAX_CHUNK_LOG2);
        assert_eq!(sweep.len(), 13);
        assert_eq!(sweep[0], 512);
        assert_eq!(sweep[11], 1024 * 1024);
        assert_eq!(*sweep.last().unwrap(), WHOLE_BUFFER);
        assert!(sweep[..12].windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_chunking_never_changes_checksum() {
        let registry = Registry::with_builtin();
        // Not a multiple of any sweep size, so the tail slice is short
        let data = sample_data(256 * 1024 + 77);

        for algo in registry.iter() {
            let reference = compute(&data, WHOLE_BUFFER, algo).checksum;
            for chunk_size in chunk_sweep(0, 19) {
                assert_eq!(
                    compute(&data, chunk_size, algo).checksum,
                    reference,
                    "{} with chunk size {}",
                    algo.name,
                    chunk_size
                );
            }
        }
    }

    #[test]
    fn test_chunk_larger_than_buffer() {
        let registry = Registry::with_builtin();
        let data = sample_data(100);
        for algo in registry.iter() {
            assert_eq!(
                compute(&data, 4096, algo).checksum,
                compute(&data, WHOLE_BUFFER, algo).checksum
            );
        }
    }

    #[test]
    fn test_empty_buffer_identity() {
        let registry = Registry::with_builtin();
        let expected = |name: &str| -> u32 {
            match name {
                "crc32" | "crc32z" | "crc32c" => 0,
                "adler32" => 1,
                "xxhash32" => 0x02cc_5d05,
                other => panic!("no identity recorded for {}", other),
            }
        };
        #[cfg(feature = "zlib")]
        assert!(registry.contains("crc32z"));

        for algo in registry.iter() {
            assert_eq!(compute(&[], WHOLE_BUFFER, algo).checksum, expected(algo.name));
            assert_eq!(compute(&[], 512, algo).checksum, expected(algo.name));
        }
    }

    #[test]
    fn test_update_calls_follow_chunking() {
        fn count_init() -> ChecksumState {
            ChecksumState::Word(0)
        }
        fn count_update(state: ChecksumState, _chunk: &[u8]) -> ChecksumState {
            match state {
                ChecksumState::Word(n) => ChecksumState::Word(n + 1),
                other => other,
            }
        }
        fn count_finalize(state: ChecksumState) -> u32 {
            match state {
                ChecksumState::Word(n) => n,
                _ => u32::MAX,
            }
        }

        let mut registry = Registry::new();
        registry
            .register("calls", "counts update calls", count_init, count_update, count_finalize)
            .unwrap();
        let algo = registry.lookup("calls").unwrap();
        let data = vec![0u8; 1000];

        assert_eq!(compute(&data, WHOLE_BUFFER, algo).checksum, 1);
        assert_eq!(compute(&data, 512, algo).checksum, 2);
        assert_eq!(compute(&data, 100, algo).checksum, 10);
        assert_eq!(compute(&data, 999, algo).checksum, 2);
    }

    #[test]
    fn test_timing_fields() {
        let registry = Registry::with_builtin();
        let algo = registry.lookup("crc32").unwrap();
        let dispatched = crate::measure::monotonic_nanos();
        let result = compute(&sample_data(1 << 20), 4096, algo);

        assert!(result.started_at_ns >= dispatched);
        assert!(result.setup_secs(dispatched) >= 0.0);
        assert!(result.elapsed_secs() > 0.0);
        // Dispatch after start clamps to zero instead of underflowing
        assert_eq!(result.setup_secs(u64::MAX), 0.0);
    }

    #[test]
    fn test_report_roundtrip() {
        let result = TaskResult {
            checksum: 0xabcd_ef01,
            started_at_ns: 123,
            elapsed_ns: 456,
        };
        let report = result.into_report(3);
        assert_eq!(report.task_index, 3);
        assert_eq!(TaskResult::from(report), result);
    }
}
