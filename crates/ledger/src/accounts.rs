//! Account repository.

use crate::rows::{self, account_columns};
use crate::{Database, LedgerError};
use bankwatch_core::{Account, NewAccount};
use chrono::Utc;

const SELECT_ACCOUNT: &str = concat!("SELECT ", account_columns!("a"), " FROM accounts a");

impl Database {
    pub async fn create_account(&self, account: &NewAccount) -> Result<Account, LedgerError> {
        let now = Utc::now();
        let configuration = account.configuration.to_string();

        let id = sqlx::query(
            r#"
            INSERT INTO accounts (name, provider, configuration, interval_seconds, currency, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.name.trim())
        .bind(account.provider.as_str())
        .bind(&configuration)
        .bind(account.interval_seconds)
        .bind(i64::from(account.currency))
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?
        .last_insert_rowid();

        Ok(Account {
            id,
            name: account.name.trim().to_string(),
            provider: account.provider,
            configuration: account.configuration.clone(),
            interval_seconds: account.interval_seconds,
            currency: account.currency,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<Account>, LedgerError> {
        let row = sqlx::query(&format!("{SELECT_ACCOUNT} WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(rows::account).transpose()
    }

    /// Every account, oldest first.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let rows = sqlx::query(&format!("{SELECT_ACCOUNT} ORDER BY a.id"))
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(rows::account).collect()
    }

    /// One page of accounts plus the total number of accounts.
    pub async fn list_accounts_page(
        &self,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<Account>, i64), LedgerError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
            .fetch_one(self.pool())
            .await?;

        let rows = sqlx::query(&format!("{SELECT_ACCOUNT} ORDER BY a.id LIMIT ? OFFSET ?"))
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool())
            .await?;
        let accounts = rows.iter().map(rows::account).collect::<Result<Vec<_>, _>>()?;

        Ok((accounts, total))
    }

    /// Accounts linked to the given chat.
    pub async fn list_accounts_for_chat(&self, chat_id: i64) -> Result<Vec<Account>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ACCOUNT} JOIN account_chats l ON l.account_id = a.id WHERE l.chat_id = ? ORDER BY a.id"
        ))
        .bind(chat_id)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(rows::account).collect()
    }

    /// Replace every editable field. Returns `None` if the account does not exist.
    pub async fn update_account(
        &self,
        id: i64,
        account: &NewAccount,
    ) -> Result<Option<Account>, LedgerError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET name = ?, provider = ?, configuration = ?, interval_seconds = ?, currency = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(account.name.trim())
        .bind(account.provider.as_str())
        .bind(account.configuration.to_string())
        .bind(account.interval_seconds)
        .bind(i64::from(account.currency))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_account(id).await
    }

    /// Overwrite only the provider configuration blob.
    pub async fn update_account_configuration(
        &self,
        id: i64,
        configuration: &serde_json::Value,
    ) -> Result<bool, LedgerError> {
        let result =
            sqlx::query("UPDATE accounts SET configuration = ?, updated_at = ? WHERE id = ?")
                .bind(configuration.to_string())
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an account together with its transactions, links, settings
    /// and sent notifications.
    pub async fn delete_account(&self, id: i64) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
