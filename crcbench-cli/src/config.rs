//! Configuration loading from crcbench.toml
//!
//! Run defaults can be specified in a `crcbench.toml` file. The configuration
//! is automatically discovered by walking up from the current directory.
//! Command line flags always win over file values.

use crate::strategy::Strategy;
use crcbench_core::{DEFAULT_MAX_CHUNK_LOG2, DEFAULT_MIN_CHUNK_LOG2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up during discovery
pub const CONFIG_FILE_NAME: &str = "crcbench.toml";

/// crcbench configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CrcbenchConfig {
    /// Run defaults
    #[serde(default)]
    pub run: RunDefaults,
    /// Chunk-size sweep bounds
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Algorithm selection
    #[serde(default)]
    pub algorithms: AlgorithmsConfig,
}

/// Defaults for a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunDefaults {
    /// Number of concurrent tasks per combination
    #[serde(default)]
    pub tasks: Option<usize>,
    /// Size of the synthetic buffer in MB
    #[serde(default)]
    pub megabytes: Option<u64>,
    /// Strategy: "serial", "threads", "process-shared" or "process-copy"
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

/// Chunk-size sweep bounds (log2 of bytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Smallest chunk size exponent
    #[serde(default = "default_min_chunk_log2")]
    pub min_chunk_log2: u32,
    /// Largest chunk size exponent
    #[serde(default = "default_max_chunk_log2")]
    pub max_chunk_log2: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_chunk_log2: default_min_chunk_log2(),
            max_chunk_log2: default_max_chunk_log2(),
        }
    }
}

fn default_min_chunk_log2() -> u32 {
    DEFAULT_MIN_CHUNK_LOG2
}
fn default_max_chunk_log2() -> u32 {
    DEFAULT_MAX_CHUNK_LOG2
}

/// Algorithm selection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlgorithmsConfig {
    /// Algorithms to benchmark, in order (empty = all registered)
    #[serde(default)]
    pub enabled: Vec<String>,
}

impl CrcbenchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Discover the configuration by walking up from the current directory.
    ///
    /// A missing file yields `Ok(None)`; a file that exists but does not parse
    /// is an error.
    pub fn discover() -> anyhow::Result<Option<Self>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                tracing::debug!(path = %config_path.display(), "loading configuration");
                return Self::load(&config_path)
                    .map(Some)
                    .map_err(|e| e.context(format!("invalid {}", config_path.display())));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# crcbench configuration

[run]
# Concurrent tasks per (algorithm, chunk size) combination
tasks = 1
# Size of the synthetic buffer when no file is given
megabytes = 128
# "serial", "threads", "process-shared" or "process-copy"
strategy = "serial"

[sweep]
# Chunk sizes 2^min_chunk_log2 ..= 2^max_chunk_log2, then the whole buffer
min_chunk_log2 = 9
max_chunk_log2 = 20

[algorithms]
# Empty means every registered algorithm
enabled = []
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrcbenchConfig::default();
        assert_eq!(config.run.tasks, None);
        assert_eq!(config.sweep.min_chunk_log2, 9);
        assert_eq!(config.sweep.max_chunk_log2, 20);
        assert!(config.algorithms.enabled.is_empty());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [run]
            tasks = 4
            strategy = "process-copy"

            [algorithms]
            enabled = ["adler32", "crc32"]
        "#;

        let config: CrcbenchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.run.tasks, Some(4));
        assert_eq!(config.run.strategy, Some(Strategy::ProcessCopy));
        assert_eq!(config.algorithms.enabled, vec!["adler32", "crc32"]);
        // Defaults should still apply
        assert_eq!(config.run.megabytes, None);
        assert_eq!(config.sweep.max_chunk_log2, 20);
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let toml_str = r#"
            [run]
            strategy = "fibers"
        "#;
        assert!(toml::from_str::<CrcbenchConfig>(toml_str).is_err());
    }

    #[test]
    fn test_default_toml_parses() {
        let default_toml = CrcbenchConfig::default_toml();
        let config: CrcbenchConfig = toml::from_str(&default_toml).unwrap();
        assert_eq!(config.run.tasks, Some(1));
        assert_eq!(config.run.megabytes, Some(128));
        assert_eq!(config.run.strategy, Some(Strategy::Serial));
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("crcbench-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[sweep]\nmin_chunk_log2 = 12\n").unwrap();

        let config = CrcbenchConfig::load(&path).unwrap();
        assert_eq!(config.sweep.min_chunk_log2, 12);
        assert_eq!(config.sweep.max_chunk_log2, 20);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
