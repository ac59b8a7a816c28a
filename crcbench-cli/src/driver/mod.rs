//! Benchmark Driver
//!
//! Sweeps every selected algorithm over every chunk size and prints one row
//! per combination.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Registry (selected algorithms) + input buffer
//!       │
//!       ▼
//! ┌─────────────┐
//! │  strategy   │  Build the task pool once, wiring the buffer in
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │  execution  │  For each algorithm × chunk size: dispatch N tasks
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ statistics  │  Checksum agreement, mean ± stddev
//! └──────┬──────┘
//!        │
//!        ▼
//! ┌─────────────┐
//! │ formatting  │  Preamble, header, one row per combination
//! └─────────────┘
//! ```

mod execution;
mod formatting;
mod metadata;
mod statistics;

pub use execution::{BenchError, RunConfig, run_benchmark, run_sweep};
pub use formatting::{
    HEADER, UNDERLINE, format_header, format_preamble, format_row, format_segment_setup,
};
pub use metadata::RunMetadata;
pub use statistics::RowStats;
