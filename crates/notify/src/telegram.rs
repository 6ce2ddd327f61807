//! Telegram delivery.

use crate::chunk::split_message;
use crate::sink::{DeliveryError, DispatchSink};
use async_trait::async_trait;
use bankwatch_core::ChatProvider;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use teloxide::RequestError;
use tracing::{debug, warn};

/// Telegram's limit for a single text message.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Configuration for the Telegram sink.
#[derive(Debug, Clone)]
pub struct TelegramSinkConfig {
    /// Pause between consecutive chunks of one message.
    pub flood_delay: Duration,
    /// Wait after Telegram asks us to slow down.
    pub retry_after_delay: Duration,
    /// Retries per chunk when throttled.
    pub max_retries: u32,
    pub max_message_chars: usize,
}

impl Default for TelegramSinkConfig {
    fn default() -> Self {
        Self {
            flood_delay: Duration::from_secs(1),
            retry_after_delay: Duration::from_secs(5),
            max_retries: 3,
            max_message_chars: TELEGRAM_MAX_MESSAGE_CHARS,
        }
    }
}

/// Sends HTML messages through the Bot API.
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
    config: TelegramSinkConfig,
}

impl TelegramSink {
    pub fn new(bot: Bot, config: TelegramSinkConfig) -> Self {
        Self { bot, config }
    }

    async fn send_chunk(&self, chat_id: ChatId, text: &str) -> Result<MessageId, DeliveryError> {
        let mut attempt = 0;
        loop {
            match self
                .bot
                .send_message(chat_id, text)
                .parse_mode(ParseMode::Html)
                .await
            {
                Ok(message) => return Ok(message.id),
                Err(RequestError::RetryAfter(_)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        chat_id = chat_id.0,
                        attempt,
                        "Telegram flood control, backing off"
                    );
                    tokio::time::sleep(self.config.retry_after_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl DispatchSink for TelegramSink {
    async fn send(
        &self,
        provider: ChatProvider,
        external_chat_id: &str,
        text: &str,
    ) -> Result<String, DeliveryError> {
        let ChatProvider::Telegram = provider;
        let chat_id = external_chat_id
            .trim()
            .parse::<i64>()
            .map(ChatId)
            .map_err(|_| DeliveryError::InvalidChatId(external_chat_id.to_string()))?;

        let chunks = split_message(text, self.config.max_message_chars);
        let mut last = None;
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.flood_delay).await;
            }
            last = Some(self.send_chunk(chat_id, chunk).await?);
        }

        let last = last.ok_or(DeliveryError::Empty)?;
        debug!(
            chat_id = chat_id.0,
            chunks = chunks.len(),
            message_id = last.0,
            "Message delivered"
        );
        Ok(last.0.to_string())
    }
}
