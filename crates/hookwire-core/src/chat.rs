//! The outbound chat collaborator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ChatResult;

/// Sends plain-text messages into a room.
///
/// Implemented by the host's chat client. The router treats every error as
/// non-fatal: it is logged and processing continues with the next event.
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// Sends `body` to `room_id`.
    async fn send_message(&self, room_id: &str, body: &str) -> ChatResult<()>;
}

/// A shared chat sender trait object.
pub type BoxedChatSender = Arc<dyn ChatSender>;
