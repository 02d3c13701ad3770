//! Resource and session alerting.
//!
//! Periodically samples system metrics, process load and login sessions and
//! pushes alerts to a configured chat. Metric alerts use hysteresis
//! watermarks; process and session alerts are deduplicated with a TTL so a
//! persistent condition re-alerts after the window instead of never.

pub mod geo;
pub mod metrics;
pub mod report;
pub mod state;

pub use geo::{GeoResolver, IpApiResolver};
pub use metrics::{
    DiskUsage, MetricSnapshot, MetricsProvider, NetworkUsage, ProcessSample, Session,
    SessionSource, SystemMetrics, WhoSessions,
};
pub use state::{DedupCache, MetricAlarm};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::channel::{Channel, OutboundMessage};

/// Monitor tuning.
///
/// Each metric has a high watermark that raises the alert and a lower one
/// that re-arms it, so readings hovering around a single threshold do not
/// flap.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub cpu_high: f32,
    pub cpu_low: f32,
    pub ram_high: f32,
    pub ram_low: f32,
    pub disk_high: f32,
    pub disk_low: f32,
    /// Single-process CPU share that triggers a process alert.
    pub process_share: f32,
    /// How long a process or session alert stays suppressed.
    pub dedup_ttl: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            cpu_high: 80.0,
            cpu_low: 70.0,
            ram_high: 80.0,
            ram_low: 70.0,
            disk_high: 90.0,
            disk_low: 85.0,
            process_share: 50.0,
            dedup_ttl: Duration::from_secs(30 * 60),
        }
    }
}

pub struct AlertMonitor {
    config: MonitorConfig,
    channel: Arc<dyn Channel>,
    alert_chat_id: i64,
    provider: Box<dyn MetricsProvider>,
    sessions: Box<dyn SessionSource>,
    geo: Box<dyn GeoResolver>,
    cpu_alarm: MetricAlarm,
    ram_alarm: MetricAlarm,
    disk_alarm: MetricAlarm,
    seen_processes: DedupCache<(u32, String)>,
    seen_sessions: DedupCache<Session>,
}

impl AlertMonitor {
    pub fn new(config: MonitorConfig, channel: Arc<dyn Channel>, alert_chat_id: i64) -> Self {
        let cpu_alarm = MetricAlarm::new(config.cpu_high, config.cpu_low);
        let ram_alarm = MetricAlarm::new(config.ram_high, config.ram_low);
        let disk_alarm = MetricAlarm::new(config.disk_high, config.disk_low);
        let seen_processes = DedupCache::new(config.dedup_ttl);
        let seen_sessions = DedupCache::new(config.dedup_ttl);
        Self {
            config,
            channel,
            alert_chat_id,
            provider: Box::new(SystemMetrics::new()),
            sessions: Box::new(WhoSessions),
            geo: Box::new(IpApiResolver::new()),
            cpu_alarm,
            ram_alarm,
            disk_alarm,
            seen_processes,
            seen_sessions,
        }
    }

    pub fn with_provider(mut self, provider: Box<dyn MetricsProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_session_source(mut self, sessions: Box<dyn SessionSource>) -> Self {
        self.sessions = sessions;
        self
    }

    pub fn with_geo_resolver(mut self, geo: Box<dyn GeoResolver>) -> Self {
        self.geo = geo;
        self
    }

    /// Run forever; only process shutdown stops the loop.
    pub async fn run(mut self) {
        info!(
            "Starting alert monitor, interval {}s",
            self.config.interval.as_secs()
        );
        loop {
            self.tick().await;
            tokio::time::sleep(self.config.interval).await;
        }
    }

    /// One sampling pass. Collection and send failures are logged here and
    /// never propagate; the next tick starts fresh.
    pub async fn tick(&mut self) {
        let ram_total = match self.provider.snapshot() {
            Ok(snapshot) => {
                if self.cpu_alarm.observe(snapshot.cpu_percent) {
                    self.alert(format!(
                        "High CPU usage: {:.1}% (watermark {:.0}%)",
                        snapshot.cpu_percent, self.config.cpu_high
                    ))
                    .await;
                }
                if self.ram_alarm.observe(snapshot.ram_percent) {
                    self.alert(format!(
                        "High RAM usage: {:.1}% (watermark {:.0}%)",
                        snapshot.ram_percent, self.config.ram_high
                    ))
                    .await;
                }
                if self.disk_alarm.observe(snapshot.disk_percent) {
                    self.alert(format!(
                        "High disk usage: {:.1}% (watermark {:.0}%)",
                        snapshot.disk_percent, self.config.disk_high
                    ))
                    .await;
                }
                Some(snapshot.ram_total)
            }
            Err(e) => {
                warn!("Metric collection failed: {}", e);
                None
            }
        };

        self.check_processes(ram_total).await;
        self.check_sessions().await;
    }

    /// Scan the whole process table; a memory hog can sit far down the CPU
    /// ordering. Memory share is skipped when the snapshot failed.
    async fn check_processes(&mut self, ram_total: Option<u64>) {
        let samples = match self.provider.top_processes(usize::MAX) {
            Ok(samples) => samples,
            Err(e) => {
                warn!("Process collection failed: {}", e);
                return;
            }
        };

        for sample in samples {
            let mem_share = ram_total
                .filter(|&total| total > 0)
                .map(|total| sample.memory_bytes as f32 / total as f32 * 100.0)
                .unwrap_or(0.0);
            let hot_cpu = sample.cpu_percent > self.config.process_share;
            let hot_mem = mem_share > self.config.process_share;
            if !hot_cpu && !hot_mem {
                continue;
            }
            if self
                .seen_processes
                .insert_if_new((sample.pid, sample.name.clone()))
            {
                let usage = if hot_cpu && hot_mem {
                    format!(
                        "{:.1}% CPU and {:.1}% of memory",
                        sample.cpu_percent, mem_share
                    )
                } else if hot_cpu {
                    format!("{:.1}% CPU", sample.cpu_percent)
                } else {
                    format!("{mem_share:.1}% of memory")
                };
                self.alert(format!(
                    "Process {} (pid {}) is using {}",
                    sample.name, sample.pid, usage
                ))
                .await;
            }
        }
    }

    async fn check_sessions(&mut self) {
        let sessions = match self.sessions.sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Session collection failed: {}", e);
                return;
            }
        };

        for session in sessions {
            if !self.seen_sessions.insert_if_new(session.clone()) {
                continue;
            }

            let location = if session.origin == "local" {
                None
            } else {
                self.geo.locate(&session.origin).await
            };

            let text = match location {
                Some(location) => format!(
                    "New session: {} from {} ({}), login {}",
                    session.user, session.origin, location, session.login_time
                ),
                None => format!(
                    "New session: {} from {}, login {}",
                    session.user, session.origin, session.login_time
                ),
            };
            self.alert(text).await;
        }
    }

    async fn alert(&self, text: String) {
        debug!("Alert: {}", text);
        let message = OutboundMessage::warning(self.alert_chat_id, text);
        if let Err(e) = self.channel.send(message).await {
            warn!("Failed to deliver alert: {}", e);
        }
    }
}
