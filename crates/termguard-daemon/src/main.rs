mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use cli::Args;
use termguard_core::auth::AuthGuard;
use termguard_core::channel::Channel;
use termguard_core::channel::telegram::{TelegramChannel, TelegramConfig};
use termguard_core::exec::{CommandExecutor, CommandPolicy};
use termguard_core::monitor::{AlertMonitor, MonitorConfig};
use termguard_core::router::RequestRouter;
use termguard_store::{AuthStore, paths};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,termguard_core=debug".into()),
        )
        .with_target(false)
        .init();

    let config_path = match args.config {
        Some(path) => path,
        None => paths::default_config_path()?,
    };
    info!(
        "Loading authorization record from {}",
        config_path.display()
    );
    let store = Arc::new(AuthStore::load(&config_path)?);

    let (token, alert_chat_id, policy) = {
        let record = store.record();
        (
            record.token.clone(),
            record.alert_chat_id,
            CommandPolicy::from_lists(
                record.allowed_commands.as_deref(),
                record.blocked_commands.as_deref(),
            ),
        )
    };

    let channel = Arc::new(TelegramChannel::new(TelegramConfig::new(token)));
    let me = channel
        .test_connection()
        .await
        .context("Telegram connection check failed")?;
    info!(
        "Connected as @{}",
        me.username.as_deref().unwrap_or("unknown")
    );

    if let Some(chat_id) = alert_chat_id {
        let monitor_config = MonitorConfig {
            interval: Duration::from_secs(args.interval.max(1)),
            ..Default::default()
        };
        let monitor = AlertMonitor::new(monitor_config, channel.clone(), chat_id);
        tokio::spawn(monitor.run());
        info!("Resource monitor enabled, alerting chat {}", chat_id);
    } else {
        info!("No alert_chat_id configured, resource monitor disabled");
    }

    let executor = CommandExecutor::new()
        .with_policy(policy)
        .with_deadline(Duration::from_secs(args.timeout.max(1)));
    let router = RequestRouter::new(AuthGuard::new(store), executor, channel.clone());

    let mut inbound = channel
        .start_receiving()
        .context("channel is not configured for receiving")?;
    info!("termguardd ready");

    // One event at a time, in arrival order.
    while let Some(message) = inbound.next().await {
        router.dispatch(message).await;
    }

    warn!("Inbound stream closed, shutting down");
    Ok(())
}
