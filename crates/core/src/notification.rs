//! Notification settings and sent-notification records.

use crate::{Account, Chat, CoreError, CronSchedule, TransactionType, ValidationError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of notification a setting produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Balance,
    Active,
    Deposit,
    Withdrawal,
    Unanswered,
}

impl NotificationType {
    pub const ALL: [NotificationType; 5] = [
        NotificationType::Balance,
        NotificationType::Active,
        NotificationType::Deposit,
        NotificationType::Withdrawal,
        NotificationType::Unanswered,
    ];

    /// Event-driven types fire once per matching transaction and never use a schedule.
    pub const EVENT_DRIVEN: [NotificationType; 2] =
        [NotificationType::Deposit, NotificationType::Withdrawal];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Balance => "BALANCE",
            NotificationType::Active => "ACTIVE",
            NotificationType::Deposit => "DEPOSIT",
            NotificationType::Withdrawal => "WITHDRAWAL",
            NotificationType::Unanswered => "UNANSWERED",
        }
    }

    pub fn is_event_driven(self) -> bool {
        Self::EVENT_DRIVEN.contains(&self)
    }

    pub fn for_transaction(transaction_type: TransactionType) -> Self {
        match transaction_type {
            TransactionType::Deposit => NotificationType::Deposit,
            TransactionType::Withdrawal => NotificationType::Withdrawal,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownLabel {
                kind: "notification type",
                label: s.to_string(),
            })
    }
}

/// A notification rule attached to an account-chat link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSetting {
    pub id: i64,
    pub account_chat_id: i64,
    pub notification_type: NotificationType,
    /// Cron expression; only meaningful for schedule-driven types.
    pub schedule: Option<String>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const NEW_NOTIFICATION_SCHEMA: &str = r#"{
    "notification_type": "BALANCE | ACTIVE | DEPOSIT | WITHDRAWAL | UNANSWERED",
    "schedule": "cron expression, e.g. \"0 18 * * *\" (required for BALANCE, ACTIVE, UNANSWERED)"
}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotificationSetting {
    pub notification_type: NotificationType,
    #[serde(default)]
    pub schedule: Option<String>,
}

impl NewNotificationSetting {
    pub fn from_json(input: &str) -> Result<Self, ValidationError> {
        let setting: NewNotificationSetting = serde_json::from_str(input)
            .map_err(|e| ValidationError::new(e.to_string(), NEW_NOTIFICATION_SCHEMA))?;
        setting.validate()?;
        Ok(setting)
    }

    /// Schedule-driven types need a parseable cron expression; event-driven
    /// types drop any schedule they were given.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.notification_type.is_event_driven() {
            return Ok(());
        }
        match self.schedule.as_deref().map(str::trim) {
            None | Some("") => Err(ValidationError::new(
                format!("{} notifications require a schedule", self.notification_type),
                NEW_NOTIFICATION_SCHEMA,
            )),
            Some(expr) => CronSchedule::parse(expr)
                .map(|_| ())
                .map_err(|e| ValidationError::new(e.to_string(), NEW_NOTIFICATION_SCHEMA)),
        }
    }

    /// Schedule as it should be stored.
    pub fn stored_schedule(&self) -> Option<String> {
        if self.notification_type.is_event_driven() {
            return None;
        }
        self.schedule.as_ref().map(|s| s.trim().to_string())
    }
}

/// A setting together with the account and chat it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationTarget {
    pub setting: NotificationSetting,
    pub account: Account,
    pub chat: Chat,
}

/// Record that a transaction produced a message in an external chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentNotification {
    pub id: i64,
    pub transaction_id: i64,
    pub account_chat_id: i64,
    pub external_chat_id: String,
    pub external_message_id: String,
    pub is_replied: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSentNotification {
    pub transaction_id: i64,
    pub account_chat_id: i64,
    pub external_chat_id: String,
    pub external_message_id: String,
}

/// Unanswered notification joined with its transaction for display.
#[derive(Debug, Clone, PartialEq)]
pub struct UnansweredNotification {
    pub notification: SentNotification,
    pub account_name: String,
    pub amount: Decimal,
    pub currency: u16,
    pub at_time: DateTime<Utc>,
}
