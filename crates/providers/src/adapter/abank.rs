//! A-Bank legal entity API.
//!
//! Every request body is signed with the client's RSA key (PKCS#1 v1.5 over
//! SHA-1) and the hex signature travels in the `signature` header. The bank
//! has no start-of-day balance, so the last observed balance is kept in a
//! checkpoint file and reported as the start balance of the next snapshot.

use super::{decimal_any, localize, lookback, parse_config, read_json, window_start, BankProvider};
use crate::checkpoint::BalanceCheckpoints;
use crate::error::{ConfigurationError, ProviderError};
use async_trait::async_trait;
use base64::prelude::*;
use bankwatch_core::{Account, AccountProvider, Balance, FetchedTransaction, TransactionType};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use chrono_tz::Europe::Kyiv;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use tracing::{debug, warn};
use uuid::Uuid;

const BASE_URL: &str = "https://open-api.a-bank.com.ua/legal-entity";
const REQUEST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const BALANCE_CURRENCY: u16 = 980;

#[derive(Debug, Clone, Deserialize)]
pub struct ABankConfig {
    pub system: String,
    pub api_key: String,
    pub iban: String,
    /// Base64 of the PKCS#1 private key (PEM or DER).
    pub private_key_base64: String,
}

#[derive(Debug, Serialize)]
struct PaymentsRequest<'a> {
    request_ref: String,
    token: &'a str,
    iban: &'a str,
    date_from: String,
    date_to: String,
}

#[derive(Debug, Serialize)]
struct AccountsRequest<'a> {
    request_ref: String,
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaymentsResponse {
    #[serde(default)]
    payments: Vec<Payment>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PaymentId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct Party {
    #[serde(default)]
    iban: String,
}

#[derive(Debug, Deserialize)]
struct Payment {
    payment_id: PaymentId,
    date_change: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "amount_eq", deserialize_with = "decimal_any")]
    amount: Decimal,
    currency: u16,
    credit: Party,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    companies: Vec<Company>,
}

#[derive(Debug, Deserialize)]
struct Company {
    #[serde(default)]
    accounts: Vec<CompanyAccount>,
}

#[derive(Debug, Deserialize)]
struct CompanyAccount {
    iban: String,
    #[serde(deserialize_with = "decimal_any")]
    balance_available: Decimal,
}

fn parse_change_time(raw: &str) -> Result<DateTime<Utc>, ProviderError> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| ProviderError::Parse(format!("unrecognized date_change {raw}")))?;
    localize(naive, Kyiv)
}

impl Payment {
    fn into_fetched(self, own_iban: &str) -> Result<FetchedTransaction, ProviderError> {
        let transaction_type = if self.credit.iban == own_iban {
            TransactionType::Deposit
        } else {
            TransactionType::Withdrawal
        };
        let amount = match transaction_type {
            TransactionType::Deposit => self.amount.abs(),
            TransactionType::Withdrawal => -self.amount.abs(),
        };
        let unique_id = match self.payment_id {
            PaymentId::Number(n) => n.to_string(),
            PaymentId::Text(s) => s,
        };

        Ok(FetchedTransaction {
            unique_id,
            transaction_type,
            amount,
            currency: Some(self.currency),
            description: Some(self.title),
            at_time: Some(parse_change_time(&self.date_change)?),
        })
    }
}

fn decode_private_key(encoded: &str) -> Result<RsaPrivateKey, String> {
    let bytes = BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("private_key_base64 is not base64: {e}"))?;
    match std::str::from_utf8(&bytes) {
        Ok(pem) if pem.contains("-----BEGIN") => {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| format!("invalid PKCS#1 PEM key: {e}"))
        }
        _ => RsaPrivateKey::from_pkcs1_der(&bytes).map_err(|e| format!("invalid PKCS#1 DER key: {e}")),
    }
}

pub struct ABankAdapter {
    client: reqwest::Client,
    config: ABankConfig,
    signing_key: SigningKey<Sha1>,
    account_id: i64,
    interval: TimeDelta,
    checkpoints: BalanceCheckpoints,
}

impl ABankAdapter {
    pub fn new(
        client: reqwest::Client,
        checkpoints: BalanceCheckpoints,
        account: &Account,
    ) -> Result<Self, ProviderError> {
        let config: ABankConfig = parse_config(AccountProvider::ABank, account)?;
        let key = decode_private_key(&config.private_key_base64).map_err(|reason| {
            ConfigurationError {
                provider: AccountProvider::ABank,
                reason,
            }
        })?;

        Ok(Self {
            client,
            config,
            signing_key: SigningKey::<Sha1>::new(key),
            account_id: account.id,
            interval: lookback(AccountProvider::ABank, account)?,
            checkpoints,
        })
    }

    /// Compact JSON body and its hex signature.
    fn sign<T: Serialize>(&self, body: &T) -> Result<(Vec<u8>, String), ProviderError> {
        let bytes = serde_json::to_vec(body)?;
        let signature = self
            .signing_key
            .try_sign(&bytes)
            .map_err(|e| ProviderError::Signing(e.to_string()))?;
        Ok((bytes, hex::encode(signature.to_bytes())))
    }

    async fn post<T: Serialize, R: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R, ProviderError> {
        let (bytes, signature) = self.sign(body)?;
        let response = self
            .client
            .post(format!("{BASE_URL}{endpoint}"))
            .header("system", &self.config.system)
            .header("signature", signature)
            .header("Content-Type", "application/json")
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                endpoint,
                status = response.status().as_u16(),
                "A-Bank request rejected"
            );
        }
        read_json(response).await
    }
}

#[async_trait]
impl BankProvider for ABankAdapter {
    fn provider(&self) -> AccountProvider {
        AccountProvider::ABank
    }

    async fn fetch_transactions(&self) -> Result<Vec<FetchedTransaction>, ProviderError> {
        let now = Utc::now().with_timezone(&Kyiv);
        let from = window_start(AccountProvider::ABank, now, self.interval)?;
        let request = PaymentsRequest {
            request_ref: Uuid::new_v4().to_string(),
            token: &self.config.api_key,
            iban: &self.config.iban,
            date_from: from.format(REQUEST_TIME_FORMAT).to_string(),
            date_to: now.format(REQUEST_TIME_FORMAT).to_string(),
        };

        let body: PaymentsResponse = self.post("/payments-list", &request).await?;
        debug!(count = body.payments.len(), "A-Bank payments fetched");
        body.payments
            .into_iter()
            .map(|payment| payment.into_fetched(&self.config.iban))
            .collect()
    }

    async fn fetch_balance(&self) -> Result<Option<Balance>, ProviderError> {
        let request = AccountsRequest {
            request_ref: Uuid::new_v4().to_string(),
            token: &self.config.api_key,
        };
        let body: AccountsResponse = self.post("/accounts-list", &request).await?;

        let Some(available) = body
            .companies
            .into_iter()
            .flat_map(|company| company.accounts)
            .find(|account| account.iban == self.config.iban)
            .map(|account| account.balance_available)
        else {
            return Ok(None);
        };

        let last = self.checkpoints.load(self.account_id).await?;

        Ok(Some(Balance {
            currency: Some(BALANCE_CURRENCY),
            start_balance: last,
            end_balance: available,
            deposited: None,
            withdrawn: None,
            at_time: Some(Utc::now()),
        }))
    }

    async fn commit_balance(&self, balance: &Balance) -> Result<(), ProviderError> {
        self.checkpoints.store(self.account_id, balance.end_balance).await
    }
}
