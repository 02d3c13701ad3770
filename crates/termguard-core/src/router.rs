//! Inbound event dispatch.
//!
//! Every event goes through the authorization guard first; only then does it
//! reach the executor or the status reports. Send failures are logged and
//! swallowed here so one broken reply cannot take down the dispatch loop.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::{AccessDecision, AuthGuard};
use crate::channel::chunk::chunk_code_block;
use crate::channel::{Channel, FormattingMode, InboundMessage, OutboundMessage, Payload};
use crate::exec::{CommandExecutor, ExecStatus};
use crate::monitor::report;
use crate::monitor::{MetricsProvider, SystemMetrics};

const WELCOME_TEXT: &str = "TermGuard at your service.\n\n\
Commands:\n\
/cmd <command> - run a shell command\n\
/status - system overview\n\
/processes - top processes by CPU\n\
/memory - RAM and swap\n\
/disk - partition usage\n\
/network - interface traffic\n\
/help - this message\n\n\
Repeated unauthorized attempts lead to a permanent lockout.";

/// How many processes the process report shows.
const REPORT_PROCESS_COUNT: usize = 10;

pub struct RequestRouter {
    guard: AuthGuard,
    executor: CommandExecutor,
    channel: Arc<dyn Channel>,
    metrics: Mutex<Box<dyn MetricsProvider>>,
}

impl RequestRouter {
    pub fn new(guard: AuthGuard, executor: CommandExecutor, channel: Arc<dyn Channel>) -> Self {
        Self {
            guard,
            executor,
            channel,
            metrics: Mutex::new(Box::new(SystemMetrics::new())),
        }
    }

    pub fn with_metrics_provider(mut self, provider: Box<dyn MetricsProvider>) -> Self {
        self.metrics = Mutex::new(provider);
        self
    }

    /// Handle one inbound event to completion.
    ///
    /// Never returns an error; anything that goes wrong past the guard is
    /// reported to the chat or logged, and the loop moves on.
    pub async fn dispatch(&self, message: InboundMessage) {
        match self
            .guard
            .check(message.sender_id, message.sender_name.as_deref())
        {
            Ok(AccessDecision::Authorized) => {}
            Ok(AccessDecision::Unauthorized { remaining }) => {
                info!(
                    sender_id = message.sender_id,
                    remaining, "Unauthorized request"
                );
                self.send(OutboundMessage::warning(
                    message.chat_id,
                    format!(
                        "Unauthorized. {} attempt(s) remaining before lockout.",
                        remaining
                    ),
                ))
                .await;
                return;
            }
            Ok(AccessDecision::Locked) => {
                info!(sender_id = message.sender_id, "Locked identity request");
                self.send(OutboundMessage::error(
                    message.chat_id,
                    "Access denied. This identity is locked out.",
                ))
                .await;
                return;
            }
            Err(e) => {
                error!("Authorization check failed: {}", e);
                self.send(OutboundMessage::error(
                    message.chat_id,
                    "Internal error, request not processed.",
                ))
                .await;
                return;
            }
        }

        match &message.payload {
            Payload::Command { name, args } => {
                self.handle_command(message.chat_id, name, args).await
            }
            Payload::ButtonPress { token } => self.handle_report(message.chat_id, token).await,
            Payload::Text(_) => {
                self.send(OutboundMessage::new(
                    message.chat_id,
                    "Not a command. Try /help.",
                ))
                .await;
            }
        }
    }

    fn menu_message(chat_id: i64) -> OutboundMessage {
        OutboundMessage::new(chat_id, WELCOME_TEXT)
            .with_button_row(&[("Status", "status"), ("Processes", "processes")])
            .with_button_row(&[("Memory", "memory"), ("Disk", "disk")])
            .with_button_row(&[("Network", "network"), ("Help", "help")])
    }

    async fn handle_command(&self, chat_id: i64, name: &str, args: &[String]) {
        match name {
            "start" | "help" => self.send(Self::menu_message(chat_id)).await,
            "cmd" => self.handle_shell(chat_id, args).await,
            "status" | "processes" | "memory" | "disk" | "network" => {
                self.handle_report(chat_id, name).await
            }
            other => {
                self.send(OutboundMessage::new(
                    chat_id,
                    format!("Unknown command /{other}. Try /help."),
                ))
                .await;
            }
        }
    }

    async fn handle_shell(&self, chat_id: i64, args: &[String]) {
        if args.is_empty() {
            self.send(OutboundMessage::new(chat_id, "Usage: /cmd <command>"))
                .await;
            return;
        }

        let command = args.join(" ");
        info!(command = %command, "Running shell command");
        let result = self.executor.run(&command).await;

        match &result.status {
            ExecStatus::Rejected(reason) => {
                self.send(OutboundMessage::error(
                    chat_id,
                    format!("Command rejected: {reason}"),
                ))
                .await;
                return;
            }
            ExecStatus::TimedOut => {
                self.send(OutboundMessage::warning(
                    chat_id,
                    format!("Command timed out after {} ms.", result.duration_ms),
                ))
                .await;
            }
            ExecStatus::Failure(code) => {
                self.send(OutboundMessage::warning(
                    chat_id,
                    format!("Command exited with code {code}."),
                ))
                .await;
            }
            ExecStatus::Success => {}
        }

        let mut output = result.stdout;
        if !result.stderr.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str("stderr:\n");
            output.push_str(&result.stderr);
        }
        if output.is_empty() {
            return;
        }

        for chunk in chunk_code_block(&output, None) {
            self.send(
                OutboundMessage::new(chat_id, chunk)
                    .with_formatting(FormattingMode::MarkdownV2),
            )
            .await;
        }
    }

    async fn handle_report(&self, chat_id: i64, token: &str) {
        let rendered = {
            let mut provider = self.metrics.lock();
            match token {
                "status" => provider.snapshot().map(|s| report::status_report(&s)),
                "processes" => provider
                    .top_processes(REPORT_PROCESS_COUNT)
                    .map(|p| report::process_report(&p)),
                "memory" => provider.snapshot().map(|s| report::memory_report(&s)),
                "disk" => provider.disks().map(|d| report::disk_report(&d)),
                "network" => provider.networks().map(|n| report::network_report(&n)),
                "help" => {
                    drop(provider);
                    self.send(Self::menu_message(chat_id)).await;
                    return;
                }
                other => {
                    warn!(token = other, "Unknown report token");
                    drop(provider);
                    self.send(OutboundMessage::new(chat_id, "Unknown button."))
                        .await;
                    return;
                }
            }
        };

        match rendered {
            Ok(text) => {
                for chunk in chunk_code_block(&text, None) {
                    self.send(
                        OutboundMessage::new(chat_id, chunk)
                            .with_formatting(FormattingMode::MarkdownV2),
                    )
                    .await;
                }
            }
            Err(e) => {
                error!("Report collection failed: {}", e);
                self.send(OutboundMessage::error(
                    chat_id,
                    "Could not collect system data.",
                ))
                .await;
            }
        }
    }

    async fn send(&self, message: OutboundMessage) {
        if let Err(e) = self.channel.send(message).await {
            warn!("Failed to send reply: {}", e);
        }
    }
}
