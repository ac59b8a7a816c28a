//! Output Formatting
//!
//! Plain-text table written to stdout: a preamble describing the run, a
//! header, then one row per (algorithm, chunk size) combination printed as
//! soon as it is measured.

use super::RowStats;
use super::metadata::RunMetadata;
use crate::strategy::Strategy;
use crcbench_core::{Registry, SegmentSetup};

/// Column titles
pub const HEADER: &str =
    "Algo     Chksum   Chksum(int) BufSize         Speed [MB/s]       Time [s] Setup Time [s]";

/// Rule under the column titles
pub const UNDERLINE: &str =
    "======== ======== =========== ======= ==================== ============== ==============";

/// Describe the run: host, data size, task count, mechanism and algorithms
pub fn format_preamble(
    meta: &RunMetadata,
    size_mb: f64,
    tasks: usize,
    strategy: Strategy,
    registry: &Registry,
) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Using crcbench {} on {} ({}, {} cores) at {}\n",
        meta.version,
        meta.cpu,
        meta.platform,
        meta.cpu_cores,
        meta.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    output.push_str(&format!(
        "Checksuming {:.2} [MB] using {} {}\n",
        size_mb,
        tasks,
        strategy.mechanism()
    ));
    output.push_str("Checksum methods to be tested:\n");
    for algo in registry.iter() {
        output.push_str(&format!(" * {}: {}\n", algo.name, algo.description));
    }

    output
}

/// One-time shared memory cost, reported before the table
pub fn format_segment_setup(setup: &SegmentSetup) -> String {
    format!(
        "\n{:.2} [MB] of shared memory created in {:.3} [s] and initialized in {:.3} [s]\n",
        setup.size_mb(),
        setup.allocate.as_secs_f64(),
        setup.initialize.as_secs_f64()
    )
}

/// Blank line, column titles and rule
pub fn format_header() -> String {
    format!("\n{}\n{}\n", HEADER, UNDERLINE)
}

/// One table row
pub fn format_row(row: &RowStats) -> String {
    format!(
        "{:<8} {:08x} {:>11} {:<7} {:>9.3} ± {:>8.3} {:>6.3} ± {:>5.3} {:>6.3} ± {:>5.3}\n",
        row.algorithm,
        row.checksum,
        row.checksum,
        row.chunk_size,
        row.speed.mean,
        row.speed.std_dev,
        row.time.mean,
        row.time.std_dev,
        row.setup.mean,
        row.setup.std_dev,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crcbench_stats::Summary;
    use std::time::Duration;

    fn summary(mean: f64, std_dev: f64) -> Summary {
        Summary {
            mean,
            std_dev,
            min: mean,
            max: mean,
            count: 1,
        }
    }

    #[test]
    fn test_header_columns_line_up() {
        assert_eq!(HEADER.len(), UNDERLINE.len());
        assert!(format_header().starts_with("\nAlgo "));
    }

    #[test]
    fn test_format_row() {
        let row = RowStats {
            algorithm: "crc32".to_string(),
            checksum: 0xcbf4_3926,
            chunk_size: 512,
            speed: summary(1234.5678, 12.3456),
            time: summary(0.1037, 0.0011),
            setup: summary(0.0002, 0.0001),
        };

        assert_eq!(
            format_row(&row),
            "crc32    cbf43926  3421780262 512      1234.568 ±   12.346  0.104 ± 0.001  0.000 ± 0.000\n"
        );
    }

    #[test]
    fn test_integer_checksum_is_unsigned() {
        let row = RowStats {
            algorithm: "crc32z".to_string(),
            checksum: u32::MAX,
            chunk_size: 512,
            speed: summary(1.0, 0.0),
            time: summary(1.0, 0.0),
            setup: summary(0.0, 0.0),
        };
        let line = format_row(&row);
        assert_eq!(&line[9..17], "ffffffff");
        assert_eq!(&line[18..29], " 4294967295");
        assert_eq!(line.trim_end().chars().count(), UNDERLINE.chars().count());
    }

    #[test]
    fn test_row_columns_match_underline() {
        let row = RowStats {
            algorithm: "adler32".to_string(),
            checksum: 1,
            chunk_size: 1048576,
            speed: summary(5.0, 0.5),
            time: summary(1.0, 0.1),
            setup: summary(0.5, 0.05),
        };
        let line = format_row(&row);
        assert_eq!(line.trim_end().chars().count(), UNDERLINE.chars().count());
        // Left-aligned columns start where their rule segment starts
        assert_eq!(&line[0..8], "adler32 ");
        assert_eq!(&line[9..17], "00000001");
        assert_eq!(&line[18..29], "          1");
        assert_eq!(&line[30..37], "1048576");
    }

    #[test]
    fn test_segment_setup_line() {
        let setup = SegmentSetup {
            len: 128 * 1024 * 1024,
            allocate: Duration::from_millis(12),
            initialize: Duration::from_millis(34),
        };
        assert_eq!(
            format_segment_setup(&setup),
            "\n128.00 [MB] of shared memory created in 0.012 [s] and initialized in 0.034 [s]\n"
        );
    }

    #[test]
    fn test_preamble_lists_algorithms() {
        let registry = Registry::with_builtin().select(&["adler32", "crc32"]).unwrap();
        let meta = RunMetadata::collect();
        let text = format_preamble(&meta, 128.0, 4, Strategy::Threads, &registry);

        assert!(text.contains("Checksuming 128.00 [MB] using 4 thread(s)\n"));
        let listed: Vec<&str> = text.lines().filter(|l| l.starts_with(" * ")).collect();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].starts_with(" * adler32: "));
        assert!(listed[1].starts_with(" * crc32: "));
    }
}
