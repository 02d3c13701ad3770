//! Channel trait definition.

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::types::{InboundMessage, OutboundMessage};

/// A bidirectional chat transport.
///
/// The dispatch loop and the monitor loop both send through the same
/// channel; sends are best-effort and unordered between the two.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Check if the channel is properly configured
    fn is_configured(&self) -> bool;

    /// Send one message. The text must already fit the transport cap.
    async fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Start receiving messages (returns None if the channel cannot receive).
    ///
    /// The returned stream should be consumed by a single dispatch loop so
    /// events are processed strictly in arrival order.
    fn start_receiving(&self) -> Option<Pin<Box<dyn Stream<Item = InboundMessage> + Send>>>;
}

/// Test/mock channel that records what was sent.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    pub struct MockChannel {
        sent: Arc<Mutex<Vec<OutboundMessage>>>,
    }

    impl Default for MockChannel {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockChannel {
        pub fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub async fn sent_messages(&self) -> Vec<OutboundMessage> {
            self.sent.lock().await.clone()
        }

        pub async fn clear(&self) {
            self.sent.lock().await.clear();
        }
    }

    #[async_trait]
    impl Channel for MockChannel {
        fn is_configured(&self) -> bool {
            true
        }

        async fn send(&self, message: OutboundMessage) -> Result<()> {
            self.sent.lock().await.push(message);
            Ok(())
        }

        fn start_receiving(
            &self,
        ) -> Option<Pin<Box<dyn Stream<Item = InboundMessage> + Send>>> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockChannel;
    use super::*;

    #[tokio::test]
    async fn test_mock_channel_records_sends() {
        let channel = MockChannel::new();
        channel
            .send(OutboundMessage::new(123, "Hello"))
            .await
            .unwrap();

        let sent = channel.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 123);
        assert_eq!(sent[0].text, "Hello");
    }
}
