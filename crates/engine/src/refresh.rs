//! Account configuration refresh.

use crate::alerts::{AlertEvent, AlertHandle};
use crate::error::EngineError;
use bankwatch_core::Account;
use bankwatch_ledger::Database;
use bankwatch_providers::ProviderFactory;
use std::sync::Arc;
use tracing::{error, info};

/// Asks every adapter for a rotated configuration and stores what it returns.
pub struct Refresher {
    db: Database,
    providers: Arc<dyn ProviderFactory>,
    alerts: AlertHandle,
}

impl Refresher {
    pub fn new(db: Database, providers: Arc<dyn ProviderFactory>, alerts: AlertHandle) -> Self {
        Self {
            db,
            providers,
            alerts,
        }
    }

    /// Returns the number of accounts whose configuration changed.
    pub async fn run_tick(&self) -> Result<usize, EngineError> {
        let accounts = self.db.list_accounts().await?;
        let mut refreshed = 0;

        for account in &accounts {
            match self.refresh_account(account).await {
                Ok(true) => refreshed += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(account_id = account.id, error = %e, "Failed to refresh account");
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

        info!(accounts = accounts.len(), refreshed, "Refresh tick finished");
        Ok(refreshed)
    }

    async fn refresh_account(&self, account: &Account) -> Result<bool, EngineError> {
        let adapter = self.providers.configure(account)?;
        match adapter.refresh_configuration().await? {
            Some(configuration) => Ok(self
                .db
                .update_account_configuration(account.id, &configuration)
                .await?),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ledger, linked_account, FakeBank, FakeFactory};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_rotated_configuration_is_persisted() {
        let db = ledger().await;
        let (rotating, _, _) = linked_account(&db, "Rotating", "-1").await;
        let (stable, _, _) = linked_account(&db, "Stable", "-2").await;
        let (broken, _, _) = linked_account(&db, "Broken", "-3").await;
        let factory = FakeFactory::default();
        let rotated = serde_json::json!({"token": "fresh"});
        factory.set(
            rotating.id,
            FakeBank {
                rotated_configuration: Some(rotated.clone()),
                ..Default::default()
            },
        );
        factory.set(
            broken.id,
            FakeBank {
                failing: true,
                ..Default::default()
            },
        );
        let (alerts, mut rx) = AlertHandle::channel(8);
        let refresher = Refresher::new(db.clone(), Arc::new(factory), alerts);

        assert_eq!(refresher.run_tick().await.unwrap(), 1);

        let stored = db.get_account(rotating.id).await.unwrap().unwrap();
        assert_eq!(stored.configuration, rotated);
        let untouched = db.get_account(stable.id).await.unwrap().unwrap();
        assert_eq!(untouched.configuration, serde_json::json!({}));
        assert!(matches!(
            rx.try_recv().unwrap(),
            AlertEvent::ProviderFailure { account_id, .. } if account_id == broken.id
        ));
    }
}
