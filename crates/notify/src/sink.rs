//! The delivery capability the scheduler talks to.

use async_trait::async_trait;
use bankwatch_core::{Chat, ChatProvider};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Telegram API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("Invalid chat id: {0}")]
    InvalidChatId(String),
    #[error("Delivery rejected: {0}")]
    Rejected(String),
    #[error("Refusing to send an empty message")]
    Empty,
}

/// Delivers formatted text to an external chat.
#[async_trait]
pub trait DispatchSink: Send + Sync {
    /// Send `text`, split into as many messages as the channel needs.
    ///
    /// Returns the external id of the last message sent.
    async fn send(
        &self,
        provider: ChatProvider,
        external_chat_id: &str,
        text: &str,
    ) -> Result<String, DeliveryError>;

    async fn send_to_chat(&self, chat: &Chat, text: &str) -> Result<String, DeliveryError> {
        self.send(chat.provider, &chat.external_id, text).await
    }
}
