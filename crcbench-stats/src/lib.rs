#![warn(missing_docs)]
//! crcbench Statistical Engine
//!
//! Aggregates per-task measurements into the figures reported for each
//! (algorithm, chunk size) row:
//! - Arithmetic mean
//! - Population standard deviation (normalised by N, not N-1)
//! - Extremes, kept for debug logging

mod summary;

pub use summary::{Summary, mean_and_std_dev};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let summary = Summary::from_samples(&[2.0, 4.0]);
        assert_eq!(summary.count, 2);
        assert_eq!(mean_and_std_dev(&[2.0, 4.0]), (3.0, 1.0));
    }
}
