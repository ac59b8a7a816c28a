//! Run Metadata
//!
//! Host details printed in the run preamble. CPU model lookup is Linux-only
//! and degrades to "Unknown" elsewhere.

use chrono::{DateTime, Utc};

/// Host and build details for the preamble
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// crcbench version
    pub version: &'static str,
    /// When the run started
    pub timestamp: DateTime<Utc>,
    /// CPU model name
    pub cpu: String,
    /// Logical cores available to this process
    pub cpu_cores: u32,
    /// Operating system and architecture
    pub platform: String,
}

impl RunMetadata {
    /// Collect metadata for the current host
    pub fn collect() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now(),
            cpu: get_cpu_model().unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: num_cpus(),
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

/// Get CPU model name from /proc/cpuinfo (Linux only)
fn get_cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| parse_cpu_model(&content))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|l| l.starts_with("model name"))
        .and_then(|l| l.split(':').nth(1))
        .map(|s| s.trim().to_string())
}

/// Get number of available CPU cores
fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
