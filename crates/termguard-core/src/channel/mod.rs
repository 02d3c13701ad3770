//! Chat-platform channel layer.
//!
//! Message types, transport trait, output escaping and chunking, and the
//! Telegram Bot API implementation. The transport never splits messages
//! itself; callers pre-chunk anything near the cap.

pub mod chunk;
pub mod escape;
pub mod telegram;
pub mod traits;
pub mod types;

pub use traits::Channel;
pub use types::{FormattingMode, InboundMessage, MessageLevel, OutboundMessage, Payload};
