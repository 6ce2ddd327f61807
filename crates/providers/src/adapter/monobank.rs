//! Monobank personal statement API.

use super::{lookback, parse_config, read_json, window_start, BankProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use bankwatch_core::{Account, AccountProvider, Balance, FetchedTransaction, TransactionType};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

const BASE_URL: &str = "https://api.monobank.ua";

#[derive(Debug, Clone, Deserialize)]
pub struct MonobankConfig {
    pub account_id: String,
    pub api_token: String,
    /// Also send the upper bound of the window.
    #[serde(default)]
    pub use_to_timestamp: bool,
}

/// Statement item. Amounts are in minor units.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementItem {
    id: String,
    time: i64,
    #[serde(default)]
    description: String,
    amount: i64,
    currency_code: u16,
    #[serde(default)]
    comment: Option<String>,
}

impl StatementItem {
    fn into_fetched(self) -> Result<FetchedTransaction, ProviderError> {
        let amount = Decimal::new(self.amount, 2);
        let at_time = DateTime::from_timestamp(self.time, 0)
            .ok_or_else(|| ProviderError::Parse(format!("invalid timestamp {}", self.time)))?;
        let description = self
            .comment
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(self.description);

        Ok(FetchedTransaction {
            unique_id: self.id,
            transaction_type: TransactionType::from_amount(amount),
            amount,
            currency: Some(self.currency_code),
            description: Some(description),
            at_time: Some(at_time),
        })
    }
}

pub struct MonobankAdapter {
    client: reqwest::Client,
    config: MonobankConfig,
    interval: TimeDelta,
}

impl MonobankAdapter {
    pub fn new(client: reqwest::Client, account: &Account) -> Result<Self, ProviderError> {
        Ok(Self {
            client,
            config: parse_config(AccountProvider::Monobank, account)?,
            interval: lookback(AccountProvider::Monobank, account)?,
        })
    }

    fn statement_path(&self, now: DateTime<Utc>) -> Result<String, ProviderError> {
        let from = window_start(AccountProvider::Monobank, now, self.interval)?.timestamp();
        let mut path = format!("/personal/statement/{}/{}", self.config.account_id, from);
        if self.config.use_to_timestamp {
            path.push_str(&format!("/{}", now.timestamp()));
        }
        Ok(path)
    }
}

fn parse_statement(body: Vec<StatementItem>) -> Result<Vec<FetchedTransaction>, ProviderError> {
    body.into_iter().map(StatementItem::into_fetched).collect()
}

#[async_trait]
impl BankProvider for MonobankAdapter {
    fn provider(&self) -> AccountProvider {
        AccountProvider::Monobank
    }

    async fn fetch_transactions(&self) -> Result<Vec<FetchedTransaction>, ProviderError> {
        let url = format!("{}{}", BASE_URL, self.statement_path(Utc::now())?);
        let response = self
            .client
            .get(&url)
            .header("X-Token", &self.config.api_token)
            .send()
            .await?;

        let items: Vec<StatementItem> = read_json(response).await?;
        debug!(count = items.len(), "Monobank statement fetched");
        parse_statement(items)
    }

    async fn fetch_balance(&self) -> Result<Option<Balance>, ProviderError> {
        Ok(None)
    }
}
