//! Shell command execution under a deadline.
//!
//! Commands run through `sh -c` in their own process group so the whole
//! group, children included, can be terminated atomically when the deadline
//! passes. Output is captured as separate streams and truncated to a
//! character cap before it reaches the channel layer.

use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::policy::CommandPolicy;

/// Synthesized stdout for a clean exit that produced nothing.
pub const NO_OUTPUT_MARKER: &str = "command completed with no output";

/// Appended when stdout exceeds the character cap.
const TRUNCATED_MARKER: &str = "[output truncated]";

/// Default deadline for command execution in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum captured stdout in characters
const DEFAULT_MAX_OUTPUT_CHARS: usize = 3500;

/// Grace between SIGTERM and SIGKILL on timeout
const KILL_GRACE: Duration = Duration::from_millis(500);

/// How a single invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    /// Exit code 0.
    Success,
    /// Non-zero exit code.
    Failure(i32),
    /// Deadline exceeded; the process group was forcibly reclaimed.
    TimedOut,
    /// Refused by the command policy; nothing was spawned.
    Rejected(String),
}

/// Outcome of one invocation. Nothing here outlives the call.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub status: ExecStatus,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
    pub duration_ms: u64,
}

impl ExecutionResult {
    fn rejected(reason: String) -> Self {
        Self {
            status: ExecStatus::Rejected(reason),
            stdout: String::new(),
            stderr: String::new(),
            truncated: false,
            duration_ms: 0,
        }
    }
}

/// Runs arbitrary shell commands under a fixed deadline.
#[derive(Clone)]
pub struct CommandExecutor {
    policy: CommandPolicy,
    deadline: Duration,
    max_output_chars: usize,
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            policy: CommandPolicy::default(),
            deadline: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
        }
    }

    /// Attach an allow/deny policy.
    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the execution deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the stdout character cap.
    pub fn with_max_output(mut self, chars: usize) -> Self {
        self.max_output_chars = chars;
        self
    }

    /// Run `command` under the configured deadline.
    pub async fn run(&self, command: &str) -> ExecutionResult {
        self.run_with_deadline(command, self.deadline).await
    }

    /// Run `command` under an explicit deadline.
    ///
    /// Policy violations reject before anything is spawned. A timed-out
    /// invocation is not retried; the process group is reclaimed and
    /// whatever output was captured so far is returned.
    pub async fn run_with_deadline(&self, command: &str, deadline: Duration) -> ExecutionResult {
        if command.trim().is_empty() {
            return ExecutionResult::rejected("empty command".to_string());
        }
        if let Err(reason) = self.policy.evaluate(command) {
            debug!(command, "Command rejected by policy: {reason}");
            return ExecutionResult::rejected(reason);
        }

        let start = Instant::now();

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionResult {
                    status: ExecStatus::Failure(-1),
                    stdout: String::new(),
                    stderr: e.to_string(),
                    truncated: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(drain(stdout_pipe));
        let stderr_task = tokio::spawn(drain(stderr_pipe));

        let timed_out = match timeout(deadline, child.wait()).await {
            Ok(Ok(status)) => {
                let exit_code = status.code().unwrap_or(-1);
                let duration_ms = start.elapsed().as_millis() as u64;
                let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default())
                    .into_owned();
                let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default())
                    .into_owned();
                return self.finish(exit_code, stdout, stderr, duration_ms);
            }
            Ok(Err(e)) => {
                warn!("Failed to wait on child: {e}");
                false
            }
            Err(_) => true,
        };

        terminate_group(&mut child).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout =
            String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
        let stderr =
            String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();

        let (stdout, stdout_cut) = self.truncate(stdout);
        let (stderr, stderr_cut) = self.truncate(stderr);
        let truncated = stdout_cut || stderr_cut;

        if timed_out {
            warn!(command, "Command timed out after {deadline:?}");
            ExecutionResult {
                status: ExecStatus::TimedOut,
                stdout,
                stderr,
                truncated,
                duration_ms,
            }
        } else {
            ExecutionResult {
                status: ExecStatus::Failure(-1),
                stdout,
                stderr,
                truncated,
                duration_ms,
            }
        }
    }

    fn finish(
        &self,
        exit_code: i32,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    ) -> ExecutionResult {
        let status = if exit_code == 0 {
            ExecStatus::Success
        } else {
            ExecStatus::Failure(exit_code)
        };

        let stdout = if exit_code == 0 && stdout.trim().is_empty() && stderr.trim().is_empty() {
            NO_OUTPUT_MARKER.to_string()
        } else {
            stdout
        };

        let (stdout, stdout_cut) = self.truncate(stdout);
        let (stderr, stderr_cut) = self.truncate(stderr);
        ExecutionResult {
            status,
            stdout,
            stderr,
            truncated: stdout_cut || stderr_cut,
            duration_ms,
        }
    }

    /// Truncate `text` to the character cap, appending the marker when cut.
    fn truncate(&self, text: String) -> (String, bool) {
        if text.chars().count() <= self.max_output_chars {
            return (text, false);
        }
        let cut: String = text.chars().take(self.max_output_chars).collect();
        (format!("{cut}\n{TRUNCATED_MARKER}"), true)
    }
}

async fn drain(pipe: Option<impl AsyncReadExt + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Terminate the child's whole process group: SIGTERM, a short grace, then
/// SIGKILL, then reap.
#[cfg(unix)]
async fn terminate_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let pgid = Pid::from_raw(pid as i32);
        let _ = killpg(pgid, Signal::SIGTERM);
        tokio::select! {
            _ = child.wait() => return,
            _ = sleep(KILL_GRACE) => {}
        }
        let _ = killpg(pgid, Signal::SIGKILL);
    }
    let _ = child.wait().await;
}

#[cfg(not(unix))]
async fn terminate_group(child: &mut Child) {
    let _ = child.kill().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandPolicy;

    #[test]
    fn test_truncate_below_cap() {
        let executor = CommandExecutor::new().with_max_output(10);
        let (text, truncated) = executor.truncate("short".to_string());
        assert_eq!(text, "short");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_above_cap_appends_marker() {
        let executor = CommandExecutor::new().with_max_output(10);
        let (text, truncated) = executor.truncate("x".repeat(50));
        assert!(truncated);
        assert!(text.starts_with(&"x".repeat(10)));
        assert!(text.ends_with(TRUNCATED_MARKER));
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let executor = CommandExecutor::new();
        let result = executor.run("  ").await;
        assert!(matches!(result.status, ExecStatus::Rejected(_)));
    }

    #[tokio::test]
    async fn test_policy_rejection_never_spawns() {
        let deny = vec!["reboot".to_string()];
        let executor = CommandExecutor::new()
            .with_policy(CommandPolicy::from_lists(None, Some(&deny)));
        let result = executor.run("reboot now").await;
        assert!(matches!(result.status, ExecStatus::Rejected(_)));
        assert_eq!(result.duration_ms, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_with_no_output_synthesizes_marker() {
        let executor = CommandExecutor::new();
        let result = executor.run("true").await;
        assert_eq!(result.status, ExecStatus::Success);
        assert_eq!(result.stdout, NO_OUTPUT_MARKER);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_captured() {
        let executor = CommandExecutor::new();
        let result = executor.run("echo hello").await;
        assert_eq!(result.status, ExecStatus::Success);
        assert_eq!(result.stdout.trim(), "hello");
        assert!(!result.truncated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let executor = CommandExecutor::new();
        let result = executor.run("exit 3").await;
        assert_eq!(result.status, ExecStatus::Failure(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_captured_separately() {
        let executor = CommandExecutor::new();
        let result = executor.run("echo oops >&2; exit 1").await;
        assert_eq!(result.status, ExecStatus::Failure(1));
        assert!(result.stderr.contains("oops"));
        assert!(result.stdout.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_bounded() {
        let executor = CommandExecutor::new();
        let start = Instant::now();
        let result = executor
            .run_with_deadline("sleep 120", Duration::from_secs(1))
            .await;
        assert_eq!(result.status, ExecStatus::TimedOut);
        // Bounded by the 1s deadline plus the kill grace, not the 120s sleep.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_timeout_kills_whole_process_group() {
        let executor = CommandExecutor::new();
        let result = executor
            .run_with_deadline("sleep 120 & echo $!; wait", Duration::from_secs(1))
            .await;
        assert_eq!(result.status, ExecStatus::TimedOut);

        // $! is the backgrounded sleep, a grandchild in the same group.
        let pid: i32 = result.stdout.trim().parse().unwrap();
        // Give the kernel a moment to finish tearing the group down.
        sleep(Duration::from_millis(200)).await;
        // Under a non-reaping init the killed grandchild lingers as a
        // zombie; not-running is what the signal guarantees, not absence.
        if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            let state = stat
                .rsplit_once(") ")
                .and_then(|(_, rest)| rest.chars().next());
            assert_eq!(state, Some('Z'), "grandchild still running: {stat}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_truncated() {
        let executor = CommandExecutor::new().with_max_output(100);
        let result = executor.run("yes x | head -n 500").await;
        assert_eq!(result.status, ExecStatus::Success);
        assert!(result.truncated);
        assert!(result.stdout.contains(TRUNCATED_MARKER));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_stderr_truncated() {
        let executor = CommandExecutor::new().with_max_output(100);
        let result = executor.run("yes x | head -n 500 >&2; exit 1").await;
        assert_eq!(result.status, ExecStatus::Failure(1));
        assert!(result.truncated);
        assert!(result.stderr.contains(TRUNCATED_MARKER));
        assert!(result.stderr.chars().count() <= 100 + TRUNCATED_MARKER.len() + 1);
    }
}
