//! Bank adapter trait and implementations.
//!
//! Each bank has its own statement API. Adapters normalize these into
//! [`FetchedTransaction`] and [`Balance`].

mod abank;
mod monobank;
mod privatbank;

pub use abank::{ABankAdapter, ABankConfig};
pub use monobank::{MonobankAdapter, MonobankConfig};
pub use privatbank::{PrivatBankAdapter, PrivatBankConfig};

use crate::error::{ConfigurationError, ProviderError};
use async_trait::async_trait;
use bankwatch_core::{Account, AccountProvider, Balance, FetchedTransaction};
use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// A configured connection to one account at one bank.
#[async_trait]
pub trait BankProvider: Send + Sync {
    fn provider(&self) -> AccountProvider;

    /// Transactions in the window `[now - account.interval, now]`.
    async fn fetch_transactions(&self) -> Result<Vec<FetchedTransaction>, ProviderError>;

    /// Current balance snapshot, or `None` when the bank has nothing for this account.
    async fn fetch_balance(&self) -> Result<Option<Balance>, ProviderError>;

    /// Record a delivered balance as the starting point of the next one.
    ///
    /// Fetching never moves the baseline, so a failed delivery or an ad-hoc
    /// lookup leaves the next scheduled report intact.
    async fn commit_balance(&self, _balance: &Balance) -> Result<(), ProviderError> {
        Ok(())
    }

    /// A rotated configuration blob to persist onto the account, if any.
    async fn refresh_configuration(&self) -> Result<Option<serde_json::Value>, ProviderError> {
        Ok(None)
    }
}

/// Builds a [`BankProvider`] for an account.
pub trait ProviderFactory: Send + Sync {
    /// Validates the account's configuration and returns a ready adapter.
    fn configure(&self, account: &Account) -> Result<Box<dyn BankProvider>, ProviderError>;
}

/// Shared resources handed to every adapter.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub client: reqwest::Client,
    /// Directory for per-account balance checkpoints.
    pub state_dir: PathBuf,
    /// Zone used for date-only request parameters.
    pub timezone: Tz,
}

impl ProviderContext {
    pub fn new(
        request_timeout: Duration,
        state_dir: PathBuf,
        timezone: Tz,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("bankwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            state_dir,
            timezone,
        })
    }
}

pub(crate) fn parse_config<T: DeserializeOwned>(
    provider: AccountProvider,
    account: &Account,
) -> Result<T, ConfigurationError> {
    serde_json::from_value(account.configuration.clone()).map_err(|e| ConfigurationError {
        provider,
        reason: e.to_string(),
    })
}

/// The account's look-back window, checked once when the adapter is built.
pub(crate) fn lookback(
    provider: AccountProvider,
    account: &Account,
) -> Result<TimeDelta, ConfigurationError> {
    account
        .interval()
        .filter(|interval| *interval > TimeDelta::zero())
        .ok_or_else(|| ConfigurationError {
            provider,
            reason: format!("interval_seconds {} is out of range", account.interval_seconds),
        })
}

/// Start of the look-back window ending at `now`.
pub(crate) fn window_start<Z: TimeZone>(
    provider: AccountProvider,
    now: DateTime<Z>,
    interval: TimeDelta,
) -> Result<DateTime<Z>, ProviderError> {
    now.checked_sub_signed(interval).ok_or_else(|| {
        ProviderError::from(ConfigurationError {
            provider,
            reason: format!("look-back of {}s reaches past the calendar", interval.num_seconds()),
        })
    })
}

/// Read a successful JSON response body, or turn the status into an error.
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ProviderError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProviderError::Status {
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    Ok(serde_json::from_str(&body)?)
}

/// Decimal from either a JSON string or a JSON number.
pub(crate) fn decimal_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let text = match &value {
        serde_json::Value::String(s) => s.trim().replace(',', "."),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(D::Error::custom(format!("expected a decimal, got {other}"))),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(D::Error::custom)
}

/// Interpret a bank's wall-clock time in its own zone.
pub(crate) fn localize(naive: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, ProviderError> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| ProviderError::Parse(format!("{naive} does not exist in {tz}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Kyiv;
    use rust_decimal_macros::dec;

    #[derive(Deserialize)]
    struct Amount {
        #[serde(deserialize_with = "decimal_any")]
        value: Decimal,
    }

    #[test]
    fn test_decimal_any() {
        let parsed: Amount = serde_json::from_str(r#"{"value": "1250.50"}"#).unwrap();
        assert_eq!(parsed.value, dec!(1250.50));

        let parsed: Amount = serde_json::from_str(r#"{"value": 49.5}"#).unwrap();
        assert_eq!(parsed.value, dec!(49.5));

        let parsed: Amount = serde_json::from_str(r#"{"value": "12,30"}"#).unwrap();
        assert_eq!(parsed.value, dec!(12.30));

        assert!(serde_json::from_str::<Amount>(r#"{"value": null}"#).is_err());
    }

    #[test]
    fn test_window_start_rejects_overflow() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let start = window_start(AccountProvider::Monobank, now, TimeDelta::hours(1)).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 10, 8, 0, 0).unwrap());

        let huge = TimeDelta::try_seconds(10_000_000_000_000).unwrap();
        let err = window_start(AccountProvider::Monobank, now, huge).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_localize() {
        let naive = NaiveDateTime::parse_from_str("10.05.2024 12:00:00", "%d.%m.%Y %H:%M:%S").unwrap();
        let at = localize(naive, Kyiv).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap());

        // Spring-forward gap.
        let gap = NaiveDateTime::parse_from_str("31.03.2024 03:30:00", "%d.%m.%Y %H:%M:%S").unwrap();
        assert!(localize(gap, Kyiv).is_err());
    }
}
