//! Chat and account-chat link repository.

use crate::rows::{self, account_chat_columns, account_columns, chat_columns};
use crate::{Database, LedgerError};
use bankwatch_core::{AccountChat, AccountChatDetails, Chat, ChatProvider, NewChat};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;

const SELECT_CHAT: &str = concat!("SELECT ", chat_columns!("c"), " FROM chats c");

const SELECT_LINK: &str = concat!(
    "SELECT ",
    account_chat_columns!("l"),
    " FROM account_chats l"
);

const SELECT_LINK_DETAILS: &str = concat!(
    "SELECT ",
    account_chat_columns!("l"),
    ", ",
    account_columns!("a"),
    ", ",
    chat_columns!("c"),
    " FROM account_chats l",
    " JOIN accounts a ON a.id = l.account_id",
    " JOIN chats c ON c.id = l.chat_id"
);

fn link_details(row: &SqliteRow) -> Result<AccountChatDetails, LedgerError> {
    Ok(AccountChatDetails {
        link: rows::account_chat(row)?,
        account: rows::account(row)?,
        chat: rows::chat(row)?,
    })
}

impl Database {
    /// Return the chat with this external id, creating it if needed.
    pub async fn create_or_get_chat(&self, chat: &NewChat) -> Result<Chat, LedgerError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO chats (name, provider, external_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(provider, external_id) DO NOTHING
            "#,
        )
        .bind(&chat.name)
        .bind(chat.provider.as_str())
        .bind(&chat.external_id)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_chat_by_external_id(chat.provider, &chat.external_id)
            .await?
            .ok_or_else(|| LedgerError::decode("chats", "chat vanished after insert"))
    }

    pub async fn get_chat(&self, id: i64) -> Result<Option<Chat>, LedgerError> {
        let row = sqlx::query(&format!("{SELECT_CHAT} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(rows::chat).transpose()
    }

    pub async fn get_chat_by_external_id(
        &self,
        provider: ChatProvider,
        external_id: &str,
    ) -> Result<Option<Chat>, LedgerError> {
        let row = sqlx::query(&format!(
            "{SELECT_CHAT} WHERE c.provider = ? AND c.external_id = ?"
        ))
        .bind(provider.as_str())
        .bind(external_id)
        .fetch_optional(self.pool())
        .await?;
        row.as_ref().map(rows::chat).transpose()
    }

    /// Chats, optionally narrowed to one provider and/or to those linked to an account.
    pub async fn list_chats(
        &self,
        provider: Option<ChatProvider>,
        account_id: Option<i64>,
    ) -> Result<Vec<Chat>, LedgerError> {
        let rows = sqlx::query(&format!(
            r#"
            {SELECT_CHAT}
            WHERE (?1 IS NULL OR c.provider = ?1)
              AND (?2 IS NULL OR EXISTS (
                    SELECT 1 FROM account_chats l WHERE l.chat_id = c.id AND l.account_id = ?2))
            ORDER BY c.id
            "#
        ))
        .bind(provider.map(ChatProvider::as_str))
        .bind(account_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(rows::chat).collect()
    }

    pub async fn delete_chat(&self, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Link an account to a chat. Linking twice returns the existing link.
    pub async fn link_account_chat(
        &self,
        account_id: i64,
        chat_id: i64,
    ) -> Result<AccountChat, LedgerError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO account_chats (account_id, chat_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(account_id, chat_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(chat_id)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        let row = sqlx::query(&format!(
            "{SELECT_LINK} WHERE l.account_id = ? AND l.chat_id = ?"
        ))
        .bind(account_id)
        .bind(chat_id)
        .fetch_one(self.pool())
        .await?;
        rows::account_chat(&row)
    }

    /// A link together with its account and chat.
    pub async fn get_account_chat(
        &self,
        id: i64,
    ) -> Result<Option<AccountChatDetails>, LedgerError> {
        let row = sqlx::query(&format!("{SELECT_LINK_DETAILS} WHERE l.id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(link_details).transpose()
    }

    pub async fn list_account_chats_for_chat(
        &self,
        chat_id: i64,
    ) -> Result<Vec<AccountChatDetails>, LedgerError> {
        let rows = sqlx::query(&format!("{SELECT_LINK_DETAILS} WHERE l.chat_id = ? ORDER BY l.id"))
            .bind(chat_id)
            .fetch_all(self.pool())
            .await?;

        rows.iter().map(link_details).collect()
    }

    /// Remove a link and, with it, its settings and sent notifications.
    pub async fn delete_account_chat(&self, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM account_chats WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankwatch_core::{AccountProvider, NewAccount};
    use pretty_assertions::assert_eq;

    fn telegram_chat(external_id: &str) -> NewChat {
        NewChat {
            name: "Team".to_string(),
            provider: ChatProvider::Telegram,
            external_id: external_id.to_string(),
        }
    }

    async fn account(db: &Database, name: &str) -> i64 {
        db.create_account(&NewAccount {
            name: name.to_string(),
            provider: AccountProvider::PrivatBankFop,
            configuration: serde_json::json!({"token": "t", "iban": "UA00"}),
            interval_seconds: 3600,
            currency: 980,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_create_or_get_chat_is_idempotent() {
        let db = Database::connect("sqlite::memory:").await.unwrap();

        let first = db.create_or_get_chat(&telegram_chat("-100123")).await.unwrap();
        let second = db.create_or_get_chat(&telegram_chat("-100123")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(db.list_chats(None, None).await.unwrap().len(), 1);
        assert_eq!(
            db.get_chat_by_external_id(ChatProvider::Telegram, "-100123")
                .await
                .unwrap()
                .map(|c| c.id),
            Some(first.id)
        );
    }

    #[tokio::test]
    async fn test_link_account_chat() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let account_id = account(&db, "Main").await;
        let chat = db.create_or_get_chat(&telegram_chat("-1")).await.unwrap();
        db.create_or_get_chat(&telegram_chat("-2")).await.unwrap();

        let link = db.link_account_chat(account_id, chat.id).await.unwrap();
        let again = db.link_account_chat(account_id, chat.id).await.unwrap();
        assert_eq!(link.id, again.id);

        let details = db.get_account_chat(link.id).await.unwrap().unwrap();
        assert_eq!(details.account.name, "Main");
        assert_eq!(details.chat.external_id, "-1");

        let linked = db.list_chats(Some(ChatProvider::Telegram), Some(account_id)).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(db.list_account_chats_for_chat(chat.id).await.unwrap().len(), 1);
        assert_eq!(db.list_accounts_for_chat(chat.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_account_cascades_to_links() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let account_id = account(&db, "Main").await;
        let chat = db.create_or_get_chat(&telegram_chat("-1")).await.unwrap();
        let link = db.link_account_chat(account_id, chat.id).await.unwrap();

        db.delete_account(account_id).await.unwrap();

        assert!(db.get_account_chat(link.id).await.unwrap().is_none());
        assert!(db.get_chat(chat.id).await.unwrap().is_some());
    }
}
