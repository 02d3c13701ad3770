//! Metric and session collection.
//!
//! `MetricsProvider` wraps `sysinfo` behind a trait so the monitor and the
//! router can be tested against scripted readings. `SessionSource` does the
//! same for interactive login sessions, backed by `who(1)`.

use async_trait::async_trait;
use std::process::Stdio;
use sysinfo::{Disks, Networks, ProcessesToUpdate, System};
use tokio::process::Command;

use crate::error::{CoreError, Result};

/// One point-in-time system reading.
#[derive(Debug, Clone, Default)]
pub struct MetricSnapshot {
    pub cpu_percent: f32,
    pub ram_percent: f32,
    pub ram_used: u64,
    pub ram_total: u64,
    pub swap_used: u64,
    pub swap_total: u64,
    /// Usage of the fullest mounted partition.
    pub disk_percent: f32,
    pub uptime_secs: u64,
    pub load_avg: (f64, f64, f64),
}

/// One process sample, CPU as a share of a single core.
#[derive(Debug, Clone)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DiskUsage {
    pub mount_point: String,
    pub file_system: String,
    pub total: u64,
    pub used: u64,
    pub percent: f32,
}

#[derive(Debug, Clone)]
pub struct NetworkUsage {
    pub interface: String,
    pub received: u64,
    pub transmitted: u64,
}

/// An interactive login session as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    pub user: String,
    /// Remote host or address, `"local"` for console logins.
    pub origin: String,
    pub login_time: String,
}

/// System metrics seam.
///
/// Stateful on purpose: CPU percentages are deltas between successive
/// refreshes, so callers keep one provider alive across ticks. `Sync` is
/// required so the monitor loop can run on a spawned task; all methods take
/// `&mut self`, so implementations need no interior locking.
pub trait MetricsProvider: Send + Sync {
    fn snapshot(&mut self) -> Result<MetricSnapshot>;
    /// Processes sorted by CPU usage, highest first.
    fn top_processes(&mut self, limit: usize) -> Result<Vec<ProcessSample>>;
    fn disks(&mut self) -> Result<Vec<DiskUsage>>;
    fn networks(&mut self) -> Result<Vec<NetworkUsage>>;
}

/// Login session seam.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn sessions(&self) -> Result<Vec<Session>>;
}

/// `sysinfo`-backed provider.
pub struct SystemMetrics {
    system: System,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetrics {
    pub fn new() -> Self {
        let mut system = System::new();
        // Prime the CPU counters so the first real reading has a delta.
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl MetricsProvider for SystemMetrics {
    fn snapshot(&mut self) -> Result<MetricSnapshot> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let ram_total = self.system.total_memory();
        let ram_used = self.system.used_memory();
        let ram_percent = if ram_total > 0 {
            (ram_used as f64 / ram_total as f64 * 100.0) as f32
        } else {
            0.0
        };

        let disk_percent = self
            .disks()?
            .iter()
            .map(|d| d.percent)
            .fold(0.0_f32, f32::max);

        let load = System::load_average();

        Ok(MetricSnapshot {
            cpu_percent: self.system.global_cpu_usage(),
            ram_percent,
            ram_used,
            ram_total,
            swap_used: self.system.used_swap(),
            swap_total: self.system.total_swap(),
            disk_percent,
            uptime_secs: System::uptime(),
            load_avg: (load.one, load.five, load.fifteen),
        })
    }

    fn top_processes(&mut self, limit: usize) -> Result<Vec<ProcessSample>> {
        self.system.refresh_processes(ProcessesToUpdate::All, true);

        let mut samples: Vec<ProcessSample> = self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessSample {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                cpu_percent: process.cpu_usage(),
                memory_bytes: process.memory(),
            })
            .collect();

        samples.sort_by(|a, b| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        samples.truncate(limit);
        Ok(samples)
    }

    fn disks(&mut self) -> Result<Vec<DiskUsage>> {
        let disks = Disks::new_with_refreshed_list();
        Ok(disks
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                let used = total.saturating_sub(disk.available_space());
                DiskUsage {
                    mount_point: disk.mount_point().to_string_lossy().into_owned(),
                    file_system: disk.file_system().to_string_lossy().into_owned(),
                    total,
                    used,
                    percent: if total > 0 {
                        (used as f64 / total as f64 * 100.0) as f32
                    } else {
                        0.0
                    },
                }
            })
            .collect())
    }

    fn networks(&mut self) -> Result<Vec<NetworkUsage>> {
        let networks = Networks::new_with_refreshed_list();
        let mut usage: Vec<NetworkUsage> = networks
            .iter()
            .map(|(interface, data)| NetworkUsage {
                interface: interface.clone(),
                received: data.total_received(),
                transmitted: data.total_transmitted(),
            })
            .collect();
        usage.sort_by(|a, b| a.interface.cmp(&b.interface));
        Ok(usage)
    }
}

/// `who(1)`-backed session source.
pub struct WhoSessions;

#[async_trait]
impl SessionSource for WhoSessions {
    async fn sessions(&self) -> Result<Vec<Session>> {
        let output = Command::new("who")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CoreError::Collection(format!("failed to run who: {e}")))?;

        if !output.status.success() {
            return Err(CoreError::Collection(format!(
                "who exited with {:?}",
                output.status.code()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().filter_map(parse_who_line).collect())
    }
}

/// Parse one `who` line: `user tty 2026-08-23 10:15 (origin)`.
fn parse_who_line(line: &str) -> Option<Session> {
    let mut parts = line.split_whitespace();
    let user = parts.next()?.to_string();
    let _tty = parts.next()?;
    let date = parts.next()?;
    let time = parts.next()?;

    let origin = parts
        .next()
        .and_then(|s| s.strip_prefix('('))
        .and_then(|s| s.strip_suffix(')'))
        .map(str::to_string)
        .unwrap_or_else(|| "local".to_string());

    Some(Session {
        user,
        origin,
        login_time: format!("{date} {time}"),
    })
}

/// Render a byte count for humans.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Render seconds of uptime as `Nd Nh Nm`.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_who_line_remote() {
        let session = parse_who_line("alice pts/0 2026-08-23 10:15 (203.0.113.5)").unwrap();
        assert_eq!(session.user, "alice");
        assert_eq!(session.origin, "203.0.113.5");
        assert_eq!(session.login_time, "2026-08-23 10:15");
    }

    #[test]
    fn test_parse_who_line_console() {
        let session = parse_who_line("root tty1 2026-08-23 09:00").unwrap();
        assert_eq!(session.user, "root");
        assert_eq!(session.origin, "local");
    }

    #[test]
    fn test_parse_who_line_malformed() {
        assert!(parse_who_line("").is_none());
        assert!(parse_who_line("alice").is_none());
        assert!(parse_who_line("alice pts/0").is_none());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(90_061), "1d 1h 1m");
    }

    #[test]
    fn test_system_metrics_snapshot_in_range() {
        let mut provider = SystemMetrics::new();
        let snapshot = provider.snapshot().unwrap();
        assert!(snapshot.ram_total > 0);
        assert!((0.0..=100.0).contains(&snapshot.ram_percent));
        assert!(snapshot.disk_percent >= 0.0);
    }

    #[test]
    fn test_top_processes_sorted_and_limited() {
        let mut provider = SystemMetrics::new();
        let processes = provider.top_processes(10).unwrap();
        assert!(processes.len() <= 10);
        for pair in processes.windows(2) {
            assert!(pair[0].cpu_percent >= pair[1].cpu_percent);
        }
    }
}
