//! Host information for health endpoints and the periodic health check.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

// ─────────────────────────────────────────────────────────────────
// System Info
// ─────────────────────────────────────────────────────────────────

/// Static facts about the host, collected once
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os_name: String,
    pub os_version: String,
    pub arch: String,
    pub cpu_count: usize,
    /// None when the platform does not expose it
    pub total_memory_mb: Option<u64>,
}

impl SystemInfo {
    pub fn collect() -> Self {
        Self {
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            os_name: std::env::consts::OS.to_string(),
            os_version: os_version(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: num_cpus::get(),
            total_memory_mb: total_memory_mb(),
        }
    }
}

#[cfg(target_os = "linux")]
fn total_memory_mb() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    meminfo
        .lines()
        .find(|l| l.starts_with("MemTotal:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb / 1024)
}

#[cfg(not(target_os = "linux"))]
fn total_memory_mb() -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn os_version() -> String {
    std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|content| {
            content
                .lines()
                .find(|l| l.starts_with("PRETTY_NAME="))
                .map(|l| l.trim_start_matches("PRETTY_NAME=").trim_matches('"').to_string())
        })
        .unwrap_or_else(|| "Linux".to_string())
}

#[cfg(target_os = "macos")]
fn os_version() -> String {
    "macOS".to_string()
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn os_version() -> String {
    std::env::consts::OS.to_string()
}

/// Resident memory of this process in MB
#[cfg(target_os = "linux")]
fn process_memory_mb() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4 / 1024)
}

#[cfg(not(target_os = "linux"))]
fn process_memory_mb() -> Option<u64> {
    None
}

// ─────────────────────────────────────────────────────────────────
// Host Monitor
// ─────────────────────────────────────────────────────────────────

/// Point-in-time health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    #[serde(flatten)]
    pub info: SystemInfo,
    pub uptime_secs: u64,
    pub process_memory_mb: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

pub struct HostMonitor {
    info: SystemInfo,
    started: Instant,
}

impl HostMonitor {
    pub fn new() -> Self {
        Self {
            info: SystemInfo::collect(),
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            info: self.info.clone(),
            uptime_secs: self.uptime_secs(),
            process_memory_mb: process_memory_mb(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for HostMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect() {
        let info = SystemInfo::collect();
        assert!(info.cpu_count > 0);
        assert!(!info.os_name.is_empty());
        assert!(!info.hostname.is_empty());
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let snapshot = HostMonitor::new().snapshot();
        let value = serde_json::to_value(&snapshot).unwrap();
        assert!(value.get("cpu_count").is_some());
        assert!(value.get("uptime_secs").is_some());
    }
}
