//! In-memory stand-ins for banks and chats.

use async_trait::async_trait;
use bankwatch_core::{
    Account, AccountProvider, Balance, Chat, ChatProvider, FetchedTransaction, NewAccount, NewChat,
    NewTransaction, Transaction, TransactionType,
};
use bankwatch_ledger::Database;
use bankwatch_notify::{DeliveryError, DispatchSink};
use bankwatch_providers::{BankProvider, ProviderError, ProviderFactory};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Records every message instead of sending it.
#[derive(Default)]
pub struct FakeSink {
    sent: Mutex<Vec<(String, String)>>,
    attempts: AtomicUsize,
    failing: AtomicBool,
}

impl FakeSink {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// `(external_chat_id, text)` of every delivered message.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DispatchSink for FakeSink {
    async fn send(
        &self,
        _provider: ChatProvider,
        external_chat_id: &str,
        text: &str,
    ) -> Result<String, DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DeliveryError::Rejected("bot was removed from the chat".to_string()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((external_chat_id.to_string(), text.to_string()));
        Ok((1000 + sent.len()).to_string())
    }
}

/// What a fake bank returns for one account.
#[derive(Clone, Default)]
pub struct FakeBank {
    pub transactions: Vec<FetchedTransaction>,
    pub balance: Option<Balance>,
    pub failing: bool,
    pub rotated_configuration: Option<serde_json::Value>,
}

struct FakeProvider {
    account_id: i64,
    bank: FakeBank,
    commits: Arc<Mutex<Vec<(i64, Decimal)>>>,
}

fn outage() -> ProviderError {
    ProviderError::Status {
        status: 503,
        body: "bank is down".to_string(),
    }
}

#[async_trait]
impl BankProvider for FakeProvider {
    fn provider(&self) -> AccountProvider {
        AccountProvider::Monobank
    }

    async fn fetch_transactions(&self) -> Result<Vec<FetchedTransaction>, ProviderError> {
        if self.bank.failing {
            return Err(outage());
        }
        Ok(self.bank.transactions.clone())
    }

    async fn fetch_balance(&self) -> Result<Option<Balance>, ProviderError> {
        if self.bank.failing {
            return Err(outage());
        }
        Ok(self.bank.balance.clone())
    }

    async fn commit_balance(&self, balance: &Balance) -> Result<(), ProviderError> {
        self.commits
            .lock()
            .unwrap()
            .push((self.account_id, balance.end_balance));
        Ok(())
    }

    async fn refresh_configuration(&self) -> Result<Option<serde_json::Value>, ProviderError> {
        if self.bank.failing {
            return Err(outage());
        }
        Ok(self.bank.rotated_configuration.clone())
    }
}

/// Hands out [`FakeBank`]s by account id. Unknown accounts get an empty bank.
#[derive(Default, Clone)]
pub struct FakeFactory {
    banks: Arc<Mutex<HashMap<i64, FakeBank>>>,
    commits: Arc<Mutex<Vec<(i64, Decimal)>>>,
}

impl FakeFactory {
    pub fn set(&self, account_id: i64, bank: FakeBank) {
        self.banks.lock().unwrap().insert(account_id, bank);
    }

    /// `(account_id, end_balance)` of every committed balance baseline.
    pub fn commits(&self) -> Vec<(i64, Decimal)> {
        self.commits.lock().unwrap().clone()
    }
}

impl ProviderFactory for FakeFactory {
    fn configure(&self, account: &Account) -> Result<Box<dyn BankProvider>, ProviderError> {
        let bank = self
            .banks
            .lock()
            .unwrap()
            .get(&account.id)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(FakeProvider {
            account_id: account.id,
            bank,
            commits: self.commits.clone(),
        }))
    }
}

/// A fresh in-memory ledger.
pub async fn ledger() -> Database {
    Database::connect("sqlite::memory:").await.unwrap()
}

/// An account linked to a Telegram chat. Returns the account, chat and link id.
pub async fn linked_account(
    db: &Database,
    name: &str,
    external_chat_id: &str,
) -> (Account, Chat, i64) {
    let account = db
        .create_account(&NewAccount {
            name: name.to_string(),
            provider: AccountProvider::Monobank,
            configuration: serde_json::json!({}),
            interval_seconds: 3600,
            currency: 980,
        })
        .await
        .unwrap();
    let chat = db
        .create_or_get_chat(&NewChat {
            name: "Team".to_string(),
            provider: ChatProvider::Telegram,
            external_id: external_chat_id.to_string(),
        })
        .await
        .unwrap();
    let link = db.link_account_chat(account.id, chat.id).await.unwrap();
    (account, chat, link.id)
}

/// Store a transaction of the given direction dated `at_time`.
pub async fn stored_transaction(
    db: &Database,
    account_id: i64,
    unique_id: &str,
    amount: Decimal,
    at_time: DateTime<Utc>,
) -> Transaction {
    db.insert_transaction(&NewTransaction {
        account_id,
        unique_id: unique_id.to_string(),
        transaction_type: TransactionType::from_amount(amount),
        amount,
        currency: 980,
        description: "Invoice 42".to_string(),
        at_time,
    })
    .await
    .unwrap()
    .unwrap()
}
