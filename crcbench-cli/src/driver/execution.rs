//! Sweep Execution
//!
//! Owns the loop over (algorithm, chunk size) combinations. Rows are written
//! and flushed as soon as they are measured; a checksum disagreement aborts
//! the sweep.

use super::formatting::{format_header, format_preamble, format_row, format_segment_setup};
use super::metadata::RunMetadata;
use super::statistics::RowStats;
use crate::strategy::{ChecksumTask, Strategy, StrategyError, TaskPool, build_pool};
use crcbench_core::{Registry, monotonic_nanos};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Errors that abort a benchmark run
#[derive(Debug, Error)]
pub enum BenchError {
    /// Concurrent tasks of one combination returned different checksums
    #[error(
        "Different checksum results obtained for {algorithm} with chunk size {chunk_size}: {checksums:x?}"
    )]
    ChecksumMismatch {
        /// Algorithm name
        algorithm: String,
        /// Chunk size in bytes
        chunk_size: usize,
        /// Checksum of every task, in task order
        checksums: Vec<u32>,
    },

    /// Pool failed to run a task
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Results could not be written
    #[error("Failed to write results: {0}")]
    Output(#[from] std::io::Error),
}

/// Resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Concurrent tasks per combination (at least 1)
    pub tasks: usize,
    /// Concurrency strategy
    pub strategy: Strategy,
    /// Chunk sizes in sweep order, whole-buffer sentinel last
    pub chunk_sizes: Vec<usize>,
}

/// Build the pool for `config`, print the preamble and run the full sweep.
///
/// `data` is handed to the pool; for the shared-memory strategy it is released
/// as soon as the segment holds its copy.
pub fn run_benchmark<W: Write>(
    registry: &Registry,
    config: &RunConfig,
    data: Vec<u8>,
    worker_binary: &Path,
    out: &mut W,
) -> Result<Vec<RowStats>, BenchError> {
    let size_mb = data.len() as f64 / 1024.0 / 1024.0;
    let meta = RunMetadata::collect();

    out.write_all(
        format_preamble(&meta, size_mb, config.tasks, config.strategy, registry).as_bytes(),
    )?;
    out.flush()?;

    let mut pool = build_pool(config.strategy, data, config.tasks, worker_binary)?;
    if let Some(setup) = pool.setup_cost() {
        out.write_all(format_segment_setup(setup).as_bytes())?;
    }

    run_sweep(registry, pool.as_mut(), config, size_mb, out)
}

/// Run every (algorithm, chunk size) combination on `pool`, writing the
/// header and one row per combination.
pub fn run_sweep<W: Write>(
    registry: &Registry,
    pool: &mut dyn TaskPool,
    config: &RunConfig,
    size_mb: f64,
    out: &mut W,
) -> Result<Vec<RowStats>, BenchError> {
    out.write_all(format_header().as_bytes())?;
    out.flush()?;

    let mut rows = Vec::with_capacity(registry.len() * config.chunk_sizes.len());
    for algorithm in registry.iter() {
        for &chunk_size in &config.chunk_sizes {
            let task = ChecksumTask {
                algorithm,
                chunk_size,
            };

            let dispatched_at_ns = monotonic_nanos();
            let results = pool.map(&task, config.tasks)?;
            let row = RowStats::from_results(
                algorithm.name,
                chunk_size,
                size_mb,
                dispatched_at_ns,
                &results,
            )?;

            tracing::debug!(
                algorithm = algorithm.name,
                chunk_size,
                checksum = row.checksum,
                time_cv = row.time.coefficient_of_variation(),
                slowest = row.time.max,
                "combination measured"
            );

            out.write_all(format_row(&row).as_bytes())?;
            out.flush()?;
            rows.push(row);
        }
    }

    Ok(rows)
}
