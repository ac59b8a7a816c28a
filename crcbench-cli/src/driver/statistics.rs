//! Row Statistics
//!
//! Collapses the per-task results of one (algorithm, chunk size) combination
//! into a table row. Setup time of a task is its start timestamp minus the
//! dispatch timestamp; throughput is buffer MB over computation seconds.

use super::BenchError;
use crcbench_core::TaskResult;
use crcbench_stats::Summary;

/// Aggregated results for one (algorithm, chunk size) combination
#[derive(Debug, Clone)]
pub struct RowStats {
    /// Algorithm name
    pub algorithm: String,
    /// Checksum shared by every task
    pub checksum: u32,
    /// Chunk size in bytes (0 = whole buffer)
    pub chunk_size: usize,
    /// Throughput in MB/s
    pub speed: Summary,
    /// Computation time in seconds
    pub time: Summary,
    /// Dispatch-to-start delay in seconds
    pub setup: Summary,
}

impl RowStats {
    /// Aggregate `results`, failing if the tasks disagree on the checksum.
    pub fn from_results(
        algorithm: &str,
        chunk_size: usize,
        size_mb: f64,
        dispatched_at_ns: u64,
        results: &[TaskResult],
    ) -> Result<Self, BenchError> {
        let checksum = results.first().map(|r| r.checksum).unwrap_or_default();
        if results.iter().any(|r| r.checksum != checksum) {
            return Err(BenchError::ChecksumMismatch {
                algorithm: algorithm.to_string(),
                chunk_size,
                checksums: results.iter().map(|r| r.checksum).collect(),
            });
        }

        let times: Vec<f64> = results.iter().map(TaskResult::elapsed_secs).collect();
        let setups: Vec<f64> = results
            .iter()
            .map(|r| r.setup_secs(dispatched_at_ns))
            .collect();
        let speeds: Vec<f64> = times.iter().map(|&t| throughput(size_mb, t)).collect();

        Ok(Self {
            algorithm: algorithm.to_string(),
            checksum,
            chunk_size,
            speed: Summary::from_samples(&speeds),
            time: Summary::from_samples(&times),
            setup: Summary::from_samples(&setups),
        })
    }
}

/// MB/s for one task; a computation too fast for the clock counts as 0
fn throughput(size_mb: f64, secs: f64) -> f64 {
    if secs > 0.0 { size_mb / secs } else { 0.0 }
}
