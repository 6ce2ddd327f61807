//! Transaction ingestion.

use crate::alerts::{AlertEvent, AlertHandle};
use crate::error::EngineError;
use bankwatch_core::{Account, Transaction};
use bankwatch_ledger::Database;
use bankwatch_providers::ProviderFactory;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Polls every account and records transactions the ledger has not seen.
pub struct Ingestor {
    db: Database,
    providers: Arc<dyn ProviderFactory>,
    alerts: AlertHandle,
}

impl Ingestor {
    pub fn new(db: Database, providers: Arc<dyn ProviderFactory>, alerts: AlertHandle) -> Self {
        Self {
            db,
            providers,
            alerts,
        }
    }

    /// One pass over all accounts.
    ///
    /// Returns only the transactions inserted during this pass. An account
    /// whose bank fails is logged, reported and contributes nothing.
    pub async fn run_tick(&self) -> Result<Vec<Transaction>, EngineError> {
        let accounts = self.db.list_accounts().await?;
        let mut inserted = Vec::new();

        for account in &accounts {
            match self.ingest_account(account).await {
                Ok(new) => inserted.extend(new),
                Err(e) => {
                    let transient = match &e {
                        EngineError::Provider(p) => p.is_transient(),
                        _ => false,
                    };
                    error!(
                        account_id = account.id,
                        provider = %account.provider,
                        transient,
                        error = %e,
                        "Failed to ingest account"
                    );
                    self.alerts
                        .send(AlertEvent::ProviderFailure {
                            account_id: account.id,
                            account_name: account.name.clone(),
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        }

        info!(
            accounts = accounts.len(),
            new_transactions = inserted.len(),
            "Ingestion tick finished"
        );
        Ok(inserted)
    }

    /// Fetch one account and store what is new.
    pub async fn ingest_account(&self, account: &Account) -> Result<Vec<Transaction>, EngineError> {
        let adapter = self.providers.configure(account)?;
        let fetched = adapter.fetch_transactions().await?;
        let fetched_at = Utc::now();
        let total = fetched.len();

        let mut inserted = Vec::new();
        for transaction in fetched {
            let new = transaction.into_new(account, fetched_at);
            if let Some(stored) = self.db.insert_transaction(&new).await? {
                inserted.push(stored);
            }
        }

        debug!(
            account_id = account.id,
            fetched = total,
            inserted = inserted.len(),
            "Account ingested"
        );
        Ok(inserted)
    }
}
