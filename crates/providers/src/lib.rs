//! Bank integrations.
//!
//! This crate provides:
//! - The [`BankProvider`] capability every bank adapter implements
//! - Adapters for Monobank, PrivatBank business accounts and A-Bank
//! - [`Providers`], the factory that resolves an account to its adapter

pub mod adapter;
pub mod checkpoint;
pub mod error;

pub use adapter::{BankProvider, ProviderContext, ProviderFactory};
pub use checkpoint::BalanceCheckpoints;
pub use error::{ConfigurationError, ProviderError};

use adapter::{ABankAdapter, MonobankAdapter, PrivatBankAdapter};
use bankwatch_core::{Account, AccountProvider};

/// Resolves accounts to adapters for every supported bank.
#[derive(Debug, Clone)]
pub struct Providers {
    context: ProviderContext,
}

impl Providers {
    pub fn new(context: ProviderContext) -> Self {
        Self { context }
    }
}

impl ProviderFactory for Providers {
    fn configure(&self, account: &Account) -> Result<Box<dyn BankProvider>, ProviderError> {
        let client = self.context.client.clone();
        let adapter: Box<dyn BankProvider> = match account.provider {
            AccountProvider::Monobank => Box::new(MonobankAdapter::new(client, account)?),
            AccountProvider::PrivatBankFop => Box::new(PrivatBankAdapter::new(
                client,
                self.context.timezone,
                account,
            )?),
            AccountProvider::ABank => Box::new(ABankAdapter::new(
                client,
                BalanceCheckpoints::new(self.context.state_dir.clone(), "abank"),
                account,
            )?),
        };
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::time::Duration;

    fn providers() -> Providers {
        Providers::new(
            ProviderContext::new(
                Duration::from_secs(15),
                std::env::temp_dir(),
                chrono_tz::Europe::Kyiv,
            )
            .unwrap(),
        )
    }

    fn account(provider: AccountProvider, configuration: serde_json::Value) -> Account {
        Account {
            id: 1,
            name: "Main".to_string(),
            provider,
            configuration,
            interval_seconds: 3600,
            currency: 980,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_factory_resolves_provider() {
        let adapter = providers()
            .configure(&account(
                AccountProvider::Monobank,
                json!({"account_id": "a", "api_token": "t"}),
            ))
            .unwrap();
        assert_eq!(adapter.provider(), AccountProvider::Monobank);

        let adapter = providers()
            .configure(&account(
                AccountProvider::PrivatBankFop,
                json!({"iban": "UA00", "token": "t"}),
            ))
            .unwrap();
        assert_eq!(adapter.provider(), AccountProvider::PrivatBankFop);
    }

    #[test]
    fn test_factory_rejects_bad_configuration() {
        let result = providers().configure(&account(AccountProvider::PrivatBankFop, json!({"iban": 5})));
        assert!(matches!(result, Err(ProviderError::Configuration(_))));

        let result = providers().configure(&account(AccountProvider::ABank, json!({})));
        assert!(matches!(result, Err(ProviderError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_refresh_configuration_defaults_to_none() {
        let adapter = providers()
            .configure(&account(
                AccountProvider::Monobank,
                json!({"account_id": "a", "api_token": "t"}),
            ))
            .unwrap();
        assert!(adapter.refresh_configuration().await.unwrap().is_none());
    }
}
