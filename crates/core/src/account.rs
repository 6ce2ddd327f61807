//! Bank accounts and balance snapshots.

use crate::{CoreError, ValidationError};
use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ISO 4217 numeric code used when neither the provider nor the account says otherwise (UAH).
pub const DEFAULT_CURRENCY: u16 = 980;

/// Default look-back window for transaction fetches.
pub const DEFAULT_INTERVAL_SECONDS: i64 = 24 * 60 * 60;

/// Longest look-back window an account may ask for. No bank statement API goes further.
pub const MAX_INTERVAL_SECONDS: i64 = 31 * 24 * 60 * 60;

/// Banking integration an account is polled through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountProvider {
    #[serde(rename = "MonoBank")]
    Monobank,
    #[serde(rename = "PrivatBankFOP")]
    PrivatBankFop,
    #[serde(rename = "ABank")]
    ABank,
}

impl AccountProvider {
    pub const ALL: [AccountProvider; 3] = [
        AccountProvider::Monobank,
        AccountProvider::PrivatBankFop,
        AccountProvider::ABank,
    ];

    /// Label stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            AccountProvider::Monobank => "MonoBank",
            AccountProvider::PrivatBankFop => "PrivatBankFOP",
            AccountProvider::ABank => "ABank",
        }
    }
}

impl fmt::Display for AccountProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountProvider {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountProvider::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CoreError::UnknownLabel {
                kind: "account provider",
                label: s.to_string(),
            })
    }
}

/// A polled bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub provider: AccountProvider,
    /// Provider-specific configuration, opaque to everything but the adapter.
    pub configuration: serde_json::Value,
    /// How far back each fetch looks.
    pub interval_seconds: i64,
    /// Home currency (ISO 4217 numeric).
    pub currency: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Look-back window, or `None` when the stored value is not a valid duration.
    pub fn interval(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.interval_seconds)
    }
}

pub const NEW_ACCOUNT_SCHEMA: &str = r#"{
    "name": "string",
    "provider": "MonoBank | PrivatBankFOP | ABank",
    "configuration": { provider specific object },
    "interval_seconds": 86400,
    "currency": 980
}"#;

/// Payload for creating or editing an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub provider: AccountProvider,
    pub configuration: serde_json::Value,
    #[serde(default = "default_interval")]
    pub interval_seconds: i64,
    #[serde(default = "default_currency")]
    pub currency: u16,
}

fn default_interval() -> i64 {
    DEFAULT_INTERVAL_SECONDS
}

fn default_currency() -> u16 {
    DEFAULT_CURRENCY
}

impl NewAccount {
    /// Parse and validate an account submitted as JSON.
    pub fn from_json(input: &str) -> Result<Self, ValidationError> {
        let account: NewAccount = serde_json::from_str(input)
            .map_err(|e| ValidationError::new(e.to_string(), NEW_ACCOUNT_SCHEMA))?;
        account.validate()?;
        Ok(account)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("name must not be empty", NEW_ACCOUNT_SCHEMA));
        }
        if self.interval_seconds <= 0 {
            return Err(ValidationError::new(
                "interval_seconds must be positive",
                NEW_ACCOUNT_SCHEMA,
            ));
        }
        if self.interval_seconds > MAX_INTERVAL_SECONDS {
            return Err(ValidationError::new(
                format!("interval_seconds must not exceed {}", MAX_INTERVAL_SECONDS),
                NEW_ACCOUNT_SCHEMA,
            ));
        }
        if !self.configuration.is_object() {
            return Err(ValidationError::new(
                "configuration must be a JSON object",
                NEW_ACCOUNT_SCHEMA,
            ));
        }
        Ok(())
    }
}

/// Balance snapshot reported by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// ISO 4217 numeric code; `None` means the account's home currency.
    pub currency: Option<u16>,
    pub start_balance: Decimal,
    pub end_balance: Decimal,
    pub deposited: Option<Decimal>,
    pub withdrawn: Option<Decimal>,
    pub at_time: Option<DateTime<Utc>>,
}

impl Balance {
    pub fn net_change(&self) -> Decimal {
        self.end_balance - self.start_balance
    }
}
