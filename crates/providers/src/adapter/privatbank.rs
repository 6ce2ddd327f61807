//! PrivatBank business (FOP) statements API.

use super::{decimal_any, localize, lookback, parse_config, read_json, window_start, BankProvider};
use crate::error::ProviderError;
use async_trait::async_trait;
use bankwatch_core::{
    currency_numeric, Account, AccountProvider, Balance, FetchedTransaction, TransactionType,
};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::{Europe::Kyiv, Tz};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

const BASE_URL: &str = "https://acp.privatbank.ua/api";
const DATE_FORMAT: &str = "%d-%m-%Y";
const TIME_FORMAT: &str = "%d.%m.%Y %H:%M:%S";
const PAGE_LIMIT: u32 = 100;
const RECEIPT_MARKER: &str = ", квитанція ";

#[derive(Debug, Clone, Deserialize)]
pub struct PrivatBankConfig {
    pub iban: String,
    pub token: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<StatementRow>,
}

#[derive(Debug, Deserialize)]
struct StatementRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "SUM", deserialize_with = "decimal_any")]
    sum: Decimal,
    #[serde(rename = "CCY")]
    currency: String,
    #[serde(rename = "OSND", default)]
    purpose: String,
    #[serde(rename = "TRANTYPE")]
    kind: String,
    #[serde(rename = "DATE_TIME_DAT_OD_TIM_P")]
    processed_at: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(default)]
    balances: Vec<BalanceRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceRow {
    currency: String,
    #[serde(deserialize_with = "decimal_any")]
    balance_in: Decimal,
    #[serde(deserialize_with = "decimal_any")]
    balance_out: Decimal,
    #[serde(deserialize_with = "decimal_any")]
    turnover_debt: Decimal,
    #[serde(deserialize_with = "decimal_any")]
    turnover_cred: Decimal,
}

/// Drop the receipt reference the bank appends to payment purposes.
fn strip_receipt(purpose: &str) -> String {
    let lower = purpose.to_lowercase();
    match lower.find(RECEIPT_MARKER) {
        // Lowercasing Cyrillic keeps byte offsets for this marker.
        Some(start) if purpose.is_char_boundary(start) => {
            let rest = &purpose[start + RECEIPT_MARKER.len()..];
            let tail = rest.find(|c: char| !c.is_ascii()).map(|i| &rest[i..]).unwrap_or("");
            format!("{}{}", &purpose[..start], tail)
        }
        _ => purpose.to_string(),
    }
}

impl StatementRow {
    fn into_fetched(self) -> Result<FetchedTransaction, ProviderError> {
        let transaction_type = match self.kind.as_str() {
            "C" => TransactionType::Deposit,
            "D" => TransactionType::Withdrawal,
            other => {
                return Err(ProviderError::Parse(format!("unknown TRANTYPE {other}")));
            }
        };
        let amount = match transaction_type {
            TransactionType::Deposit => self.sum.abs(),
            TransactionType::Withdrawal => -self.sum.abs(),
        };
        let naive = NaiveDateTime::parse_from_str(&self.processed_at, TIME_FORMAT)
            .map_err(|e| ProviderError::Parse(format!("{}: {e}", self.processed_at)))?;

        Ok(FetchedTransaction {
            unique_id: self.id,
            transaction_type,
            amount,
            currency: currency_numeric(&self.currency),
            description: Some(strip_receipt(&self.purpose)),
            at_time: Some(localize(naive, Kyiv)?),
        })
    }
}

impl BalanceRow {
    fn into_balance(self, now: DateTime<Utc>) -> Balance {
        Balance {
            currency: currency_numeric(&self.currency),
            start_balance: self.balance_in,
            end_balance: self.balance_out,
            deposited: Some(self.turnover_cred),
            withdrawn: Some(self.turnover_debt),
            at_time: Some(now),
        }
    }
}

pub struct PrivatBankAdapter {
    client: reqwest::Client,
    config: PrivatBankConfig,
    interval: TimeDelta,
    timezone: Tz,
}

impl PrivatBankAdapter {
    pub fn new(
        client: reqwest::Client,
        timezone: Tz,
        account: &Account,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            client,
            config: parse_config(AccountProvider::PrivatBankFop, account)?,
            interval: lookback(AccountProvider::PrivatBankFop, account)?,
            timezone,
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(format!("{BASE_URL}{path}"))
            .header("Content-Type", "application/json;charset=utf-8")
            .header("token", &self.config.token);
        if let Some(id) = &self.config.id {
            request = request.header("id", id);
        }
        request
    }

    fn local_date(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone).format(DATE_FORMAT).to_string()
    }
}

#[async_trait]
impl BankProvider for PrivatBankAdapter {
    fn provider(&self) -> AccountProvider {
        AccountProvider::PrivatBankFop
    }

    async fn fetch_transactions(&self) -> Result<Vec<FetchedTransaction>, ProviderError> {
        let start_date = self.local_date(window_start(
            AccountProvider::PrivatBankFop,
            Utc::now(),
            self.interval,
        )?);
        let limit = PAGE_LIMIT.to_string();
        let response = self
            .request("/statements/transactions")
            .query(&[
                ("acc", self.config.iban.as_str()),
                ("startDate", start_date.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let body: TransactionsResponse = read_json(response).await?;
        debug!(count = body.transactions.len(), "PrivatBank statement fetched");
        body.transactions
            .into_iter()
            .map(StatementRow::into_fetched)
            .collect()
    }

    async fn fetch_balance(&self) -> Result<Option<Balance>, ProviderError> {
        let now = Utc::now();
        let start_date = self.local_date(now);
        let response = self
            .request("/statements/balance")
            .query(&[("acc", self.config.iban.as_str()), ("startDate", start_date.as_str())])
            .send()
            .await?;

        let body: BalanceResponse = read_json(response).await?;
        Ok(body.balances.into_iter().next().map(|row| row.into_balance(now)))
    }
}
