//! Financial transactions.

use crate::{Account, CoreError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placeholder stored when a provider reports no description.
pub const NO_DESCRIPTION: &str = "No description";

/// Direction of money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
        }
    }

    /// Direction implied by the sign of an amount (zero counts as a withdrawal).
    pub fn from_amount(amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            TransactionType::Deposit
        } else {
            TransactionType::Withdrawal
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "WITHDRAWAL" => Ok(TransactionType::Withdrawal),
            other => Err(CoreError::UnsupportedTransactionType(other.to_string())),
        }
    }
}

/// A persisted, immutable transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    /// Provider-issued id; unique per account.
    pub unique_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    /// ISO 4217 numeric code.
    pub currency: u16,
    pub description: String,
    pub at_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A transaction as reported by a provider adapter, before defaults are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedTransaction {
    pub unique_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: Option<u16>,
    pub description: Option<String>,
    pub at_time: Option<DateTime<Utc>>,
}

/// A transaction ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub account_id: i64,
    pub unique_id: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: u16,
    pub description: String,
    pub at_time: DateTime<Utc>,
}

impl FetchedTransaction {
    /// Fill in the account's home currency, the description placeholder and
    /// the fetch time where the provider left them out.
    pub fn into_new(self, account: &Account, fetched_at: DateTime<Utc>) -> NewTransaction {
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        NewTransaction {
            account_id: account.id,
            unique_id: self.unique_id,
            transaction_type: self.transaction_type,
            amount: self.amount,
            currency: self.currency.unwrap_or(account.currency),
            description,
            at_time: self.at_time.unwrap_or(fetched_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AccountProvider;
    use rust_decimal_macros::dec;

    fn account() -> Account {
        Account {
            id: 7,
            name: "Main".to_string(),
            provider: AccountProvider::Monobank,
            configuration: serde_json::json!({}),
            interval_seconds: 3600,
            currency: 840,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_into_new_applies_defaults() {
        let fetched_at = Utc::now();
        let tx = FetchedTransaction {
            unique_id: "abc".to_string(),
            transaction_type: TransactionType::Deposit,
            amount: dec!(10),
            currency: None,
            description: Some("   ".to_string()),
            at_time: None,
        }
        .into_new(&account(), fetched_at);

        assert_eq!(tx.account_id, 7);
        assert_eq!(tx.currency, 840);
        assert_eq!(tx.description, NO_DESCRIPTION);
        assert_eq!(tx.at_time, fetched_at);
    }

    #[test]
    fn test_into_new_keeps_provider_values() {
        let at = Utc::now() - chrono::Duration::minutes(5);
        let tx = FetchedTransaction {
            unique_id: "abc".to_string(),
            transaction_type: TransactionType::Withdrawal,
            amount: dec!(-10),
            currency: Some(980),
            description: Some("Coffee".to_string()),
            at_time: Some(at),
        }
        .into_new(&account(), Utc::now());

        assert_eq!(tx.currency, 980);
        assert_eq!(tx.description, "Coffee");
        assert_eq!(tx.at_time, at);
    }

    #[test]
    fn test_transaction_type_labels() {
        assert_eq!("DEPOSIT".parse::<TransactionType>().unwrap(), TransactionType::Deposit);
        assert!(matches!(
            "REFUND".parse::<TransactionType>(),
            Err(CoreError::UnsupportedTransactionType(_))
        ));
        assert_eq!(TransactionType::from_amount(dec!(0)), TransactionType::Withdrawal);
        assert_eq!(TransactionType::from_amount(dec!(0.01)), TransactionType::Deposit);
    }
}
