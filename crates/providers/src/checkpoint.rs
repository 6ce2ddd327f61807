//! Last observed balance per account, kept in plain files.

use crate::error::ProviderError;
use rust_decimal::Decimal;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct BalanceCheckpoints {
    dir: PathBuf,
    prefix: &'static str,
}

impl BalanceCheckpoints {
    pub fn new(dir: PathBuf, prefix: &'static str) -> Self {
        Self { dir, prefix }
    }

    fn path(&self, account_id: i64) -> PathBuf {
        self.dir.join(format!("{}_{}_balance", self.prefix, account_id))
    }

    /// The stored balance; zero when nothing was stored yet.
    pub async fn load(&self, account_id: i64) -> Result<Decimal, ProviderError> {
        match tokio::fs::read_to_string(self.path(account_id)).await {
            Ok(text) if text.trim().is_empty() => Ok(Decimal::ZERO),
            Ok(text) => Decimal::from_str(text.trim())
                .map_err(|e| ProviderError::Parse(format!("balance checkpoint: {e}"))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Decimal::ZERO),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn store(&self, account_id: i64, balance: Decimal) -> Result<(), ProviderError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path(account_id), balance.to_string()).await?;
        Ok(())
    }
}
