//! Transaction repository.

use crate::rows::{self, transaction_columns};
use crate::{Database, LedgerError};
use bankwatch_core::{NewTransaction, Transaction};
use chrono::Utc;
use tracing::debug;

const SELECT_TRANSACTION: &str =
    concat!("SELECT ", transaction_columns!("t"), " FROM transactions t");

impl Database {
    /// Insert a transaction unless `(account_id, unique_id)` is already recorded.
    ///
    /// Returns the stored transaction only when it is new. The existence check
    /// and the insert share one database transaction, and the unique index turns
    /// a concurrent duplicate into a no-op instead of an error.
    pub async fn insert_transaction(
        &self,
        new: &NewTransaction,
    ) -> Result<Option<Transaction>, LedgerError> {
        let mut tx = self.pool().begin().await?;

        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ? AND unique_id = ?",
        )
        .bind(new.account_id)
        .bind(&new.unique_id)
        .fetch_one(&mut *tx)
        .await?
            > 0;

        if exists {
            tx.rollback().await?;
            debug!(
                account_id = new.account_id,
                unique_id = %new.unique_id,
                "Transaction already recorded"
            );
            return Ok(None);
        }

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (account_id, unique_id, transaction_type, amount, currency, description, at_time, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, unique_id) DO NOTHING
            "#,
        )
        .bind(new.account_id)
        .bind(&new.unique_id)
        .bind(new.transaction_type.as_str())
        .bind(new.amount.to_string())
        .bind(i64::from(new.currency))
        .bind(&new.description)
        .bind(new.at_time)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Transaction {
            id: result.last_insert_rowid(),
            account_id: new.account_id,
            unique_id: new.unique_id.clone(),
            transaction_type: new.transaction_type,
            amount: new.amount,
            currency: new.currency,
            description: new.description.clone(),
            at_time: new.at_time,
            created_at: now,
        }))
    }

    pub async fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, LedgerError> {
        let row = sqlx::query(&format!("{SELECT_TRANSACTION} WHERE t.id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(rows::transaction).transpose()
    }

    pub async fn transaction_exists(
        &self,
        account_id: i64,
        unique_id: &str,
    ) -> Result<bool, LedgerError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM transactions WHERE account_id = ? AND unique_id = ?",
        )
        .bind(account_id)
        .bind(unique_id)
        .fetch_one(self.pool())
        .await?;
        Ok(count > 0)
    }

    /// Transactions of one account, newest first.
    pub async fn list_transactions(
        &self,
        account_id: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let rows = sqlx::query(&format!(
            "{SELECT_TRANSACTION} WHERE t.account_id = ? ORDER BY t.at_time DESC, t.id DESC LIMIT ?"
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(rows::transaction).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankwatch_core::{AccountProvider, NewAccount, TransactionType};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    async fn setup() -> (Database, i64) {
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
        (db, account.id)
    }

    fn new_transaction(account_id: i64, unique_id: &str) -> NewTransaction {
        NewTransaction {
            account_id,
            unique_id: unique_id.to_string(),
            transaction_type: TransactionType::Withdrawal,
            amount: dec!(-125.40),
            currency: 980,
            description: "Groceries".to_string(),
            at_time: Utc.with_ymd_and_hms(2024, 5, 10, 9, 15, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_transaction_is_idempotent() {
        let (db, account_id) = setup().await;

        let first = db
            .insert_transaction(&new_transaction(account_id, "tx-1"))
            .await
            .unwrap();
        let second = db
            .insert_transaction(&new_transaction(account_id, "tx-1"))
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(db.list_transactions(account_id, 10).await.unwrap().len(), 1);
        assert!(db.transaction_exists(account_id, "tx-1").await.unwrap());
        assert!(!db.transaction_exists(account_id, "tx-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_transaction_roundtrip() {
        let (db, account_id) = setup().await;
        let inserted = db
            .insert_transaction(&new_transaction(account_id, "tx-1"))
            .await
            .unwrap()
            .unwrap();

        let loaded = db.get_transaction(inserted.id).await.unwrap().unwrap();
        assert_eq!(loaded.amount, dec!(-125.40));
        assert_eq!(loaded.transaction_type, TransactionType::Withdrawal);
        assert_eq!(loaded.description, "Groceries");
        assert_eq!(loaded.at_time, inserted.at_time);
    }

    #[tokio::test]
    async fn test_unknown_transaction_type_is_rejected() {
        let (db, account_id) = setup().await;
        let inserted = db
            .insert_transaction(&new_transaction(account_id, "tx-1"))
            .await
            .unwrap()
            .unwrap();

        sqlx::query("UPDATE transactions SET transaction_type = 'REFUND' WHERE id = ?")
            .bind(inserted.id)
            .execute(db.pool())
            .await
            .unwrap();

        assert!(matches!(
            db.get_transaction(inserted.id).await,
            Err(LedgerError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_same_unique_id_on_other_account() {
        let (db, account_id) = setup().await;
        let other = db
            .create_account(&NewAccount {
                name: "Other".to_string(),
                provider: AccountProvider::ABank,
                configuration: serde_json::json!({}),
                interval_seconds: 3600,
                currency: 980,
            })
            .await
            .unwrap();

        assert!(db
            .insert_transaction(&new_transaction(account_id, "shared"))
            .await
            .unwrap()
            .is_some());
        assert!(db
            .insert_transaction(&new_transaction(other.id, "shared"))
            .await
            .unwrap()
            .is_some());
    }
}
