//! Reply tracking.

use crate::error::EngineError;
use bankwatch_ledger::Database;
use tracing::debug;

/// Marks sent notifications as answered when someone replies to them.
#[derive(Clone)]
pub struct ReplyTracker {
    db: Database,
}

impl ReplyTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Handle an incoming chat message.
    ///
    /// `reply_to` is the external id of the message being replied to, if any.
    /// Returns whether a notification was flagged.
    pub async fn on_message(
        &self,
        external_chat_id: &str,
        reply_to: Option<&str>,
    ) -> Result<bool, EngineError> {
        let Some(message_id) = reply_to else {
            return Ok(false);
        };

        let updated = self.db.mark_replied(external_chat_id, message_id).await?;
        if updated > 0 {
            debug!(
                external_chat_id,
                external_message_id = message_id,
                "Notification marked as replied"
            );
        }
        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ledger, linked_account, stored_transaction};
    use bankwatch_core::NewSentNotification;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_reply_marks_notification() {
        let db = ledger().await;
        let (account, _, link) = linked_account(&db, "Main", "-1001").await;
        let tx = stored_transaction(&db, account.id, "tx-1", dec!(20), Utc::now()).await;
        db.create_sent_notification(&NewSentNotification {
            transaction_id: tx.id,
            account_chat_id: link,
            external_chat_id: "-1001".to_string(),
            external_message_id: "77".to_string(),
        })
        .await
        .unwrap();
        let tracker = ReplyTracker::new(db.clone());

        assert!(tracker.on_message("-1001", Some("77")).await.unwrap());
        // Already answered
        assert!(!tracker.on_message("-1001", Some("77")).await.unwrap());

        let sent = db.list_sent_notifications(tx.id).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_replied);
        assert!(db.list_unanswered("-1001").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_without_reply_target_is_ignored() {
        let db = ledger().await;
        let tracker = ReplyTracker::new(db);

        assert!(!tracker.on_message("-1001", None).await.unwrap());
        assert!(!tracker.on_message("-1001", Some("404")).await.unwrap());
    }
}
