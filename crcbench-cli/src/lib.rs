#![warn(missing_docs)]
//! crcbench CLI Library
//!
//! Command line front-end of the checksum throughput benchmark. The same
//! binary doubles as the worker process for the process strategies: it is
//! re-executed with the hidden `--worker` flag.
//!
//! # Example
//!
//! ```ignore
//! fn main() {
//!     if let Err(e) = crcbench_cli::run() {
//!         eprintln!("Error: {e:#}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

mod config;
mod driver;
mod strategy;

pub use config::*;
pub use driver::{
    BenchError, HEADER, RowStats, RunConfig, RunMetadata, UNDERLINE, format_header,
    format_preamble, format_row, format_segment_setup, run_benchmark, run_sweep,
};
pub use strategy::*;

use anyhow::Context;
use clap::{ArgGroup, Parser};
use crcbench_core::{Registry, WorkerMain, chunk_sweep};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Default synthetic buffer size in MB
pub const DEFAULT_MEGABYTES: u64 = 128;

/// Largest accepted chunk size exponent
pub const MAX_CHUNK_LOG2: u32 = 31;

/// crcbench CLI arguments
#[derive(Parser, Debug, Default)]
#[command(name = "crcbench")]
#[command(
    author,
    version,
    about = "Benchmarks the performance of various checksum algorithms"
)]
#[command(group(ArgGroup::new("data").args(["file", "megabytes"])))]
#[command(group(ArgGroup::new("mode").args(["threads", "processes", "processes_copy"])))]
pub struct Cli {
    /// Number of checksums to perform concurrently (default: 1)
    #[arg(short = 'n', long)]
    pub number_tasks: Option<usize>,

    /// File contents to checksum; synthetic data is used if none given
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Megabytes of synthetic data to checksum (default: 128)
    #[arg(short, long)]
    pub megabytes: Option<u64>,

    /// Use threads for parallel execution
    #[arg(short, long)]
    pub threads: bool,

    /// Use processes with shared memory for parallel execution
    #[arg(short, long)]
    pub processes: bool,

    /// Like --processes, but copying the data to every task
    #[arg(short = 'P', long)]
    pub processes_copy: bool,

    /// Algorithm to benchmark (repeatable; default: all)
    #[arg(short, long = "algorithm", value_name = "NAME")]
    pub algorithms: Vec<String>,

    /// Smallest chunk size as a power of two (default: 9, i.e. 512 B)
    #[arg(long)]
    pub min_chunk_log2: Option<u32>,

    /// Largest chunk size as a power of two (default: 20, i.e. 1 MiB)
    #[arg(long)]
    pub max_chunk_log2: Option<u32>,

    /// List available algorithms and exit
    #[arg(long)]
    pub list: bool,

    /// Print a starter crcbench.toml and exit
    #[arg(long)]
    pub print_config: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by the process strategies)
    #[arg(long, hide = true)]
    pub worker: bool,
}

/// Where the benchmark data comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Contents of a file
    File(PathBuf),
    /// `megabytes` MB of ASCII spaces
    Synthetic {
        /// Size in MB (2^20 bytes)
        megabytes: u64,
    },
}

impl InputSource {
    /// Read or generate the buffer
    pub fn load(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            InputSource::File(path) => std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display())),
            InputSource::Synthetic { megabytes } => {
                let len = megabytes
                    .checked_mul(1024 * 1024)
                    .and_then(|bytes| usize::try_from(bytes).ok())
                    .with_context(|| format!("{} MB does not fit in memory", megabytes))?;
                Ok(vec![b' '; len])
            }
        }
    }
}

/// Everything needed to run, resolved from CLI flags over `crcbench.toml`
#[derive(Debug, Clone)]
pub struct ResolvedRun {
    /// Pool and sweep settings
    pub run: RunConfig,
    /// Data source
    pub input: InputSource,
    /// Algorithms to benchmark, in order
    pub registry: Registry,
}

impl ResolvedRun {
    /// Layer CLI flags over the configuration file and validate the result.
    ///
    /// Runs before any buffer is read or allocated.
    pub fn resolve(cli: &Cli, config: &CrcbenchConfig, builtin: &Registry) -> anyhow::Result<Self> {
        let tasks = cli.number_tasks.or(config.run.tasks).unwrap_or(1);
        if tasks == 0 {
            anyhow::bail!("Number of tasks must be at least 1");
        }

        let strategy = if cli.threads {
            Strategy::Threads
        } else if cli.processes {
            Strategy::ProcessShared
        } else if cli.processes_copy {
            Strategy::ProcessCopy
        } else {
            config.run.strategy.unwrap_or_default()
        };

        let min_log2 = cli.min_chunk_log2.unwrap_or(config.sweep.min_chunk_log2);
        let max_log2 = cli.max_chunk_log2.unwrap_or(config.sweep.max_chunk_log2);
        if min_log2 > max_log2 {
            anyhow::bail!(
                "Invalid chunk sweep: min_chunk_log2 ({}) exceeds max_chunk_log2 ({})",
                min_log2,
                max_log2
            );
        }
        if max_log2 > MAX_CHUNK_LOG2 {
            anyhow::bail!(
                "Invalid chunk sweep: max_chunk_log2 ({}) exceeds {}",
                max_log2,
                MAX_CHUNK_LOG2
            );
        }

        let names = if cli.algorithms.is_empty() {
            &config.algorithms.enabled
        } else {
            &cli.algorithms
        };
        let registry = if names.is_empty() {
            builtin.clone()
        } else {
            builtin.select(names.as_slice())?
        };

        let input = match &cli.file {
            Some(path) => InputSource::File(path.clone()),
            None => InputSource::Synthetic {
                megabytes: cli
                    .megabytes
                    .or(config.run.megabytes)
                    .unwrap_or(DEFAULT_MEGABYTES),
            },
        };

        Ok(Self {
            run: RunConfig {
                tasks,
                strategy,
                chunk_sizes: chunk_sweep(min_log2, max_log2),
            },
            input,
            registry,
        })
    }
}

/// Run the crcbench CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if something goes wrong.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the crcbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Handle worker mode first (before any other initialization)
    if cli.worker {
        return run_worker_mode();
    }

    // Initialize logging; stdout carries only the results table
    let filter = if cli.verbose {
        "crcbench_cli=debug,crcbench_core=debug"
    } else {
        "crcbench_cli=info,crcbench_core=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    // Discover crcbench.toml configuration (CLI flags override)
    let config = CrcbenchConfig::discover()?.unwrap_or_default();

    let worker_binary = std::env::current_exe().context("Failed to locate worker binary")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_configured(&cli, &config, &worker_binary, &mut out)
}

/// Run with an explicit configuration, worker binary and output stream.
pub fn run_configured<W: Write>(
    cli: &Cli,
    config: &CrcbenchConfig,
    worker_binary: &Path,
    out: &mut W,
) -> anyhow::Result<()> {
    let builtin = Registry::with_builtin();
    if cli.list {
        return list_algorithms(&builtin, out);
    }
    if cli.print_config {
        out.write_all(CrcbenchConfig::default_toml().as_bytes())?;
        return Ok(());
    }

    let resolved = ResolvedRun::resolve(cli, config, &builtin)?;
    tracing::debug!(run = ?resolved.run, input = ?resolved.input, "run resolved");

    let data = resolved.input.load()?;
    if let InputSource::File(path) = &resolved.input {
        writeln!(out, "Checking file {} ({} bytes)\n", path.display(), data.len())?;
    }

    let rows = run_benchmark(&resolved.registry, &resolved.run, data, worker_binary, out)?;
    tracing::info!(rows = rows.len(), "benchmark complete");
    Ok(())
}

/// Run as a worker process (IPC mode)
fn run_worker_mode() -> anyhow::Result<()> {
    let mut worker = WorkerMain::from_env().map_err(|e| anyhow::anyhow!("Worker error: {}", e))?;
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

fn list_algorithms<W: Write>(registry: &Registry, out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "Available checksum algorithms:")?;
    for algo in registry.iter() {
        writeln!(out, "  {:<10} {}", algo.name, algo.description)?;
    }
    writeln!(out, "{} algorithms registered.", registry.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crcbench_core::{RegistryError, WHOLE_BUFFER};

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("crcbench").chain(args.iter().copied())).unwrap()
    }

    fn resolve(cli: &Cli) -> anyhow::Result<ResolvedRun> {
        ResolvedRun::resolve(cli, &CrcbenchConfig::default(), &Registry::with_builtin())
    }

    #[test]
    fn test_defaults() {
        let resolved = resolve(&parse(&[])).unwrap();
        assert_eq!(resolved.run.tasks, 1);
        assert_eq!(resolved.run.strategy, Strategy::Serial);
        assert_eq!(resolved.run.chunk_sizes.len(), 13);
        assert_eq!(resolved.run.chunk_sizes.last(), Some(&WHOLE_BUFFER));
        assert_eq!(resolved.input, InputSource::Synthetic { megabytes: 128 });
        assert_eq!(resolved.registry.len(), Registry::with_builtin().len());
    }

    #[test]
    fn test_short_flags() {
        let cli = parse(&["-n", "4", "-m", "2", "-P", "-a", "adler32", "-a", "crc32"]);
        let resolved = resolve(&cli).unwrap();
        assert_eq!(resolved.run.tasks, 4);
        assert_eq!(resolved.run.strategy, Strategy::ProcessCopy);
        assert_eq!(resolved.input, InputSource::Synthetic { megabytes: 2 });
        assert_eq!(resolved.registry.names(), vec!["adler32", "crc32"]);

        assert_eq!(resolve(&parse(&["-t"])).unwrap().run.strategy, Strategy::Threads);
        assert_eq!(
            resolve(&parse(&["-p"])).unwrap().run.strategy,
            Strategy::ProcessShared
        );
    }

    #[test]
    fn test_mutually_exclusive_flags() {
        let args = |a: &[&str]| Cli::try_parse_from(std::iter::once("crcbench").chain(a.iter().copied()));
        assert!(args(&["-t", "-p"]).is_err());
        assert!(args(&["-p", "-P"]).is_err());
        assert!(args(&["-f", "data.bin", "-m", "4"]).is_err());
        assert!(args(&["-f", "data.bin", "-t"]).is_ok());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config: CrcbenchConfig = toml::from_str(
            r#"
            [run]
            tasks = 8
            megabytes = 16
            strategy = "threads"

            [sweep]
            min_chunk_log2 = 10
            max_chunk_log2 = 11

            [algorithms]
            enabled = ["crc32"]
        "#,
        )
        .unwrap();
        let builtin = Registry::with_builtin();

        let from_file = ResolvedRun::resolve(&parse(&[]), &config, &builtin).unwrap();
        assert_eq!(from_file.run.tasks, 8);
        assert_eq!(from_file.run.strategy, Strategy::Threads);
        assert_eq!(from_file.run.chunk_sizes, vec![1024, 2048, WHOLE_BUFFER]);
        assert_eq!(from_file.input, InputSource::Synthetic { megabytes: 16 });
        assert_eq!(from_file.registry.names(), vec!["crc32"]);

        let cli = parse(&["-n", "2", "-P", "--max-chunk-log2", "12", "-a", "adler32"]);
        let overridden = ResolvedRun::resolve(&cli, &config, &builtin).unwrap();
        assert_eq!(overridden.run.tasks, 2);
        assert_eq!(overridden.run.strategy, Strategy::ProcessCopy);
        assert_eq!(overridden.run.chunk_sizes, vec![1024, 2048, 4096, WHOLE_BUFFER]);
        assert_eq!(overridden.registry.names(), vec!["adler32"]);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(resolve(&parse(&["-n", "0"])).is_err());
        assert!(resolve(&parse(&["--min-chunk-log2", "12", "--max-chunk-log2", "10"])).is_err());
        assert!(resolve(&parse(&["--max-chunk-log2", "40"])).is_err());
    }

    #[test]
    fn test_unknown_algorithm_fails_before_buffer_work() {
        // The file does not exist: reaching the read would produce an I/O error
        let cli = parse(&["-f", "/nonexistent/input.bin", "-a", "md5"]);
        let mut out = Vec::new();
        let err = run_configured(
            &cli,
            &CrcbenchConfig::default(),
            Path::new("/nonexistent/crcbench"),
            &mut out,
        )
        .unwrap_err();

        match err.downcast_ref::<RegistryError>() {
            Some(RegistryError::NotFound { name, .. }) => assert_eq!(name, "md5"),
            other => panic!("expected unknown algorithm, got {:?} ({})", other, err),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_missing_file_reported() {
        let cli = parse(&["-f", "/nonexistent/input.bin"]);
        let mut out = Vec::new();
        let err = run_configured(
            &cli,
            &CrcbenchConfig::default(),
            Path::new("/nonexistent/crcbench"),
            &mut out,
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/input.bin"));
    }

    #[test]
    fn test_file_input() {
        let path = std::env::temp_dir().join(format!("crcbench-input-{}.bin", std::process::id()));
        std::fs::write(&path, b"123456789").unwrap();

        let cli = Cli {
            file: Some(path.clone()),
            algorithms: vec!["crc32".to_string()],
            min_chunk_log2: Some(0),
            max_chunk_log2: Some(2),
            number_tasks: Some(3),
            ..Cli::default()
        };
        let mut out = Vec::new();
        run_configured(
            &cli,
            &CrcbenchConfig::default(),
            Path::new("/nonexistent/crcbench"),
            &mut out,
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(&format!("Checking file {} (9 bytes)\n\n", path.display())));
        assert!(text.contains("using 3 serial evaluation(s)"));
        let rows: Vec<&str> = text.lines().filter(|l| l.starts_with("crc32 ")).collect();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.contains(" cbf43926 ")));
    }

    #[test]
    fn test_list_algorithms() {
        let cli = Cli {
            list: true,
            ..Cli::default()
        };
        let mut out = Vec::new();
        run_configured(
            &cli,
            &CrcbenchConfig::default(),
            Path::new("/nonexistent/crcbench"),
            &mut out,
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("  crc32 "));
        assert!(text.contains("  adler32 "));
    }

    #[test]
    fn test_print_config_emits_loadable_defaults() {
        let cli = parse(&["--print-config"]);
        assert!(cli.print_config);

        let mut out = Vec::new();
        run_configured(
            &cli,
            &CrcbenchConfig::default(),
            Path::new("/nonexistent/crcbench"),
            &mut out,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("# crcbench configuration"));
        let config: CrcbenchConfig = toml::from_str(&text).unwrap();
        let resolved = ResolvedRun::resolve(&Cli::default(), &config, &Registry::with_builtin())
            .unwrap();
        assert_eq!(resolved.run.tasks, 1);
        assert_eq!(resolved.run.strategy, Strategy::Serial);
        assert_eq!(resolved.run.chunk_sizes.len(), 13);
    }

    #[test]
    fn test_synthetic_input_is_spaces() {
        let data = InputSource::Synthetic { megabytes: 1 }.load().unwrap();
        assert_eq!(data.len(), 1024 * 1024);
        assert!(data.iter().all(|&b| b == b' '));
    }
}
