//! The outbound side of a client channel, as seen by the pipeline.

use async_trait::async_trait;
use reel_core::message::ServerMessage;

/// The peer has gone away. A signal to stop, not a server failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("channel closed by peer")]
pub struct ChannelClosed;

/// Ordered, fallible delivery of messages to one connected client.
///
/// Implementations may suspend in `send` while the peer drains its
/// queue; that suspension is the backpressure the dispatcher relies on.
#[async_trait]
pub trait ResultChannel: Send + Sync {
    /// Deliver one message, or report that the peer disconnected.
    async fn send(&self, message: ServerMessage) -> Result<(), ChannelClosed>;

    /// Cheap check used to stop pulling units once the peer is gone.
    fn is_closed(&self) -> bool {
        false
    }
}
