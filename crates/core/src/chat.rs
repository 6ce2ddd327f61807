//! Chats and account-chat links.

use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Messaging platform a chat lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChatProvider {
    #[default]
    Telegram,
}

impl ChatProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatProvider::Telegram => "Telegram",
        }
    }
}

impl fmt::Display for ChatProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telegram" => Ok(ChatProvider::Telegram),
            _ => Err(CoreError::UnknownLabel {
                kind: "chat provider",
                label: s.to_string(),
            }),
        }
    }
}

/// An external channel notifications are delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub name: String,
    pub provider: ChatProvider,
    /// Chat id in the provider's system.
    pub external_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChat {
    pub name: String,
    pub provider: ChatProvider,
    pub external_id: String,
}

/// Link between an account and a chat. Owns notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountChat {
    pub id: i64,
    pub account_id: i64,
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A link together with both of its ends.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountChatDetails {
    pub link: AccountChat,
    pub account: crate::Account,
    pub chat: Chat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_provider_labels() {
        assert_eq!("telegram".parse::<ChatProvider>().unwrap(), ChatProvider::Telegram);
        assert_eq!(ChatProvider::Telegram.to_string(), "Telegram");
        assert!("slack".parse::<ChatProvider>().is_err());
    }
}
