//! Notification settings and sent-notification records.

use crate::rows::{
    self, account_columns, chat_columns, sent_columns, setting_columns, transaction_columns,
};
use crate::{Database, LedgerError};
use bankwatch_core::{
    NewNotificationSetting, NewSentNotification, NotificationSetting, NotificationTarget,
    NotificationType, SentNotification, UnansweredNotification,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;

const SELECT_SETTING: &str =
    concat!("SELECT ", setting_columns!("s"), " FROM notification_settings s");

const SELECT_TARGET: &str = concat!(
    "SELECT ",
    setting_columns!("s"),
    ", ",
    account_columns!("a"),
    ", ",
    chat_columns!("c"),
    " FROM notification_settings s",
    " JOIN account_chats l ON l.id = s.account_chat_id",
    " JOIN accounts a ON a.id = l.account_id",
    " JOIN chats c ON c.id = l.chat_id"
);

const SELECT_SENT: &str =
    concat!("SELECT ", sent_columns!("n"), " FROM sent_notifications n");

const SELECT_UNANSWERED: &str = concat!(
    "SELECT ",
    sent_columns!("n"),
    ", ",
    transaction_columns!("t"),
    ", a.name AS account_name",
    " FROM sent_notifications n",
    " JOIN transactions t ON t.id = n.transaction_id",
    " JOIN accounts a ON a.id = t.account_id"
);

fn target(row: &SqliteRow) -> Result<NotificationTarget, LedgerError> {
    Ok(NotificationTarget {
        setting: rows::setting(row)?,
        account: rows::account(row)?,
        chat: rows::chat(row)?,
    })
}

fn unanswered(row: &SqliteRow) -> Result<UnansweredNotification, LedgerError> {
    use sqlx::Row;

    let transaction = rows::transaction(row)?;
    Ok(UnansweredNotification {
        notification: rows::sent(row)?,
        account_name: row.try_get("account_name")?,
        amount: transaction.amount,
        currency: transaction.currency,
        at_time: transaction.at_time,
    })
}

impl Database {
    /// Validate and store a notification setting for an account-chat link.
    ///
    /// Event-driven types never keep a schedule.
    pub async fn create_notification_setting(
        &self,
        account_chat_id: i64,
        setting: &NewNotificationSetting,
    ) -> Result<NotificationSetting, LedgerError> {
        setting.validate()?;

        let now = Utc::now();
        let schedule = setting.stored_schedule();
        let id = sqlx::query(
            r#"
            INSERT INTO notification_settings (account_chat_id, notification_type, schedule, last_sent_at, created_at, updated_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(account_chat_id)
        .bind(setting.notification_type.as_str())
        .bind(&schedule)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        Ok(NotificationSetting {
            id,
            account_chat_id,
            notification_type: setting.notification_type,
            schedule,
            last_sent_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_notification_setting(
        &self,
        id: i64,
    ) -> Result<Option<NotificationSetting>, LedgerError> {
        let row = sqlx::query(&format!("{SELECT_SETTING} WHERE s.id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(rows::setting).transpose()
    }

    pub async fn list_notification_settings(
        &self,
        account_chat_id: i64,
    ) -> Result<Vec<NotificationSetting>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_SETTING} WHERE s.account_chat_id = ? ORDER BY s.id"
        ))
        .bind(account_chat_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(rows::setting).collect()
    }

    /// Every schedule-driven setting with a schedule, joined with its account and chat.
    pub async fn list_scheduled_targets(&self) -> Result<Vec<NotificationTarget>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_TARGET} WHERE s.schedule IS NOT NULL AND s.notification_type NOT IN (?, ?) ORDER BY s.id"
        ))
        .bind(NotificationType::Deposit.as_str())
        .bind(NotificationType::Withdrawal.as_str())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(target).collect()
    }

    /// Settings of one type for an account, optionally limited to one chat.
    pub async fn list_event_targets(
        &self,
        notification_type: NotificationType,
        account_id: i64,
        chat_id: Option<i64>,
    ) -> Result<Vec<NotificationTarget>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_TARGET} WHERE s.notification_type = ?1 AND a.id = ?2 AND (?3 IS NULL OR c.id = ?3) ORDER BY s.id"
        ))
        .bind(notification_type.as_str())
        .bind(account_id)
        .bind(chat_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(target).collect()
    }

    /// Record a successful scheduled send.
    pub async fn mark_setting_sent(
        &self,
        id: i64,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            "UPDATE notification_settings SET last_sent_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(sent_at)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_notification_setting(&self, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM notification_settings WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_sent_notification(
        &self,
        sent: &NewSentNotification,
    ) -> Result<SentNotification, LedgerError> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO sent_notifications
                (transaction_id, account_chat_id, external_chat_id, external_message_id, is_replied, created_at, updated_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(sent.transaction_id)
        .bind(sent.account_chat_id)
        .bind(&sent.external_chat_id)
        .bind(&sent.external_message_id)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        Ok(SentNotification {
            id,
            transaction_id: sent.transaction_id,
            account_chat_id: sent.account_chat_id,
            external_chat_id: sent.external_chat_id.clone(),
            external_message_id: sent.external_message_id.clone(),
            is_replied: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether any notification was already sent for this transaction, in any chat.
    pub async fn sent_notification_exists(&self, transaction_id: i64) -> Result<bool, LedgerError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sent_notifications WHERE transaction_id = ?",
        )
        .bind(transaction_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    pub async fn list_sent_notifications(
        &self,
        transaction_id: i64,
    ) -> Result<Vec<SentNotification>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_SENT} WHERE n.transaction_id = ? ORDER BY n.id"
        ))
        .bind(transaction_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(rows::sent).collect()
    }

    /// Flag the notification behind an external message as replied.
    ///
    /// Returns the number of records updated; zero when the message is not a
    /// notification.
    pub async fn mark_replied(
        &self,
        external_chat_id: &str,
        external_message_id: &str,
    ) -> Result<u64, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE sent_notifications
            SET is_replied = 1, updated_at = ?
            WHERE external_chat_id = ? AND external_message_id = ? AND is_replied = 0
            "#,
        )
        .bind(Utc::now())
        .bind(external_chat_id)
        .bind(external_message_id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected())
    }

    /// Notifications in an external chat that nobody replied to, oldest first.
    pub async fn list_unanswered(
        &self,
        external_chat_id: &str,
    ) -> Result<Vec<UnansweredNotification>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_UNANSWERED} WHERE n.external_chat_id = ? AND n.is_replied = 0 ORDER BY t.at_time, n.id"
        ))
        .bind(external_chat_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(unanswered).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankwatch_core::{
        AccountProvider, ChatProvider, NewAccount, NewChat, NewTransaction, TransactionType,
    };
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    struct Fixture {
        db: Database,
        account_id: i64,
        account_chat_id: i64,
        transaction_id: i64,
    }

    async fn fixture() -> Fixture {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let account = db
            .create_account(&NewAccount {
                name: "Main".to_string(),
                provider: AccountProvider::Monobank,
                configuration: serde_json::json!({}),
                interval_seconds: 3600,
                currency: 980,
            })
            .await
            .unwrap();
        let chat = db
            .create_or_get_chat(&NewChat {
                name: "Team".to_string(),
                provider: ChatProvider::Telegram,
                external_id: "-100777".to_string(),
            })
            .await
            .unwrap();
        let link = db.link_account_chat(account.id, chat.id).await.unwrap();
        let transaction = db
            .insert_transaction(&NewTransaction {
                account_id: account.id,
                unique_id: "tx-1".to_string(),
                transaction_type: TransactionType::Deposit,
                amount: dec!(300),
                currency: 980,
                description: "Invoice".to_string(),
                at_time: Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
            })
            .await
            .unwrap()
            .unwrap();

        Fixture {
            db,
            account_id: account.id,
            account_chat_id: link.id,
            transaction_id: transaction.id,
        }
    }

    fn setting(notification_type: NotificationType, schedule: Option<&str>) -> NewNotificationSetting {
        NewNotificationSetting {
            notification_type,
            schedule: schedule.map(str::to_string),
        }
    }

    fn sent(f: &Fixture, message_id: &str) -> NewSentNotification {
        NewSentNotification {
            transaction_id: f.transaction_id,
            account_chat_id: f.account_chat_id,
            external_chat_id: "-100777".to_string(),
            external_message_id: message_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_scheduled_targets_exclude_event_types() {
        let f = fixture().await;
        f.db.create_notification_setting(
            f.account_chat_id,
            &setting(NotificationType::Balance, Some("0 18 * * *")),
        )
        .await
        .unwrap();
        f.db.create_notification_setting(
            f.account_chat_id,
            &setting(NotificationType::Deposit, Some("0 18 * * *")),
        )
        .await
        .unwrap();

        // A legacy row with a schedule on an event type must still be ignored.
        sqlx::query(
            "UPDATE notification_settings SET schedule = '0 9 * * *' WHERE notification_type = 'DEPOSIT'",
        )
        .execute(f.db.pool())
        .await
        .unwrap();

        let targets = f.db.list_scheduled_targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].setting.notification_type, NotificationType::Balance);
        assert_eq!(targets[0].account.name, "Main");
        assert_eq!(targets[0].chat.external_id, "-100777");
    }

    #[tokio::test]
    async fn test_create_setting_validates_schedule() {
        let f = fixture().await;
        let err = f
            .db
            .create_notification_setting(f.account_chat_id, &setting(NotificationType::Active, None))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(f.db.list_notification_settings(f.account_chat_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_targets_by_type_and_chat() {
        let f = fixture().await;
        for _ in 0..2 {
            f.db.create_notification_setting(f.account_chat_id, &setting(NotificationType::Deposit, None))
                .await
                .unwrap();
        }
        f.db.create_notification_setting(f.account_chat_id, &setting(NotificationType::Withdrawal, None))
            .await
            .unwrap();

        let deposits = f
            .db
            .list_event_targets(NotificationType::Deposit, f.account_id, None)
            .await
            .unwrap();
        assert_eq!(deposits.len(), 2);

        let other_chat = f
            .db
            .list_event_targets(NotificationType::Deposit, f.account_id, Some(9999))
            .await
            .unwrap();
        assert!(other_chat.is_empty());
    }

    #[tokio::test]
    async fn test_mark_setting_sent() {
        let f = fixture().await;
        let created = f
            .db
            .create_notification_setting(
                f.account_chat_id,
                &setting(NotificationType::Active, Some("*/5 * * * *")),
            )
            .await
            .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();

        assert!(f.db.mark_setting_sent(created.id, at).await.unwrap());

        let loaded = f.db.get_notification_setting(created.id).await.unwrap().unwrap();
        assert_eq!(loaded.last_sent_at, Some(at));
    }

    #[tokio::test]
    async fn test_mark_replied_and_unanswered() {
        let f = fixture().await;
        f.db.create_sent_notification(&sent(&f, "10")).await.unwrap();
        f.db.create_sent_notification(&sent(&f, "11")).await.unwrap();
        assert!(f.db.sent_notification_exists(f.transaction_id).await.unwrap());

        assert_eq!(f.db.mark_replied("-100777", "10").await.unwrap(), 1);
        assert_eq!(f.db.mark_replied("-100777", "10").await.unwrap(), 0);
        assert_eq!(f.db.mark_replied("-100777", "404").await.unwrap(), 0);

        let open = f.db.list_unanswered("-100777").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].notification.external_message_id, "11");
        assert_eq!(open[0].account_name, "Main");
        assert_eq!(open[0].amount, dec!(300));
        assert!(f.db.list_unanswered("-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_link_cascades() {
        let f = fixture().await;
        f.db.create_notification_setting(f.account_chat_id, &setting(NotificationType::Deposit, None))
            .await
            .unwrap();
        f.db.create_sent_notification(&sent(&f, "10")).await.unwrap();

        assert!(f.db.delete_account_chat(f.account_chat_id).await.unwrap());

        assert!(f.db.list_notification_settings(f.account_chat_id).await.unwrap().is_empty());
        assert!(f.db.list_sent_notifications(f.transaction_id).await.unwrap().is_empty());
        assert!(!f.db.sent_notification_exists(f.transaction_id).await.unwrap());
    }
}
