//! TermGuard Core - Access control, command execution, resource monitoring
//!
//! The three pieces that determine correctness and safety of the bot:
//!
//! - [`auth`] — the per-identity authorization and lockout state machine,
//!   backed by the persisted record in `termguard-store`.
//! - [`exec`] — the timeout-bound command dispatcher that turns arbitrary
//!   shell input into bounded, chunked output.
//! - [`monitor`] — the background loop that polls system metrics and emits
//!   deduplicated alerts through the same outbound channel.
//!
//! [`channel`] carries messages to and from the chat platform, and
//! [`router`] maps inbound events onto the pieces above. The core exposes no
//! CLI of its own; `termguard-daemon` wires it into a process.

pub mod auth;
pub mod channel;
pub mod error;
pub mod exec;
pub mod monitor;
pub mod router;

pub use error::{CoreError, Result};
