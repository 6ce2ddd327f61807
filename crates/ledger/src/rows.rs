//! Column lists and row decoding shared by the repositories.
//!
//! Joined queries alias every column with a table prefix (`a_`, `c_`, ...) so
//! the same decoder works for plain and joined selects.

use crate::LedgerError;
use bankwatch_core::{
    Account, AccountChat, Chat, NotificationSetting, SentNotification, Transaction,
};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

macro_rules! account_columns {
    ($t:literal) => {
        concat!(
            $t, ".id AS a_id, ",
            $t, ".name AS a_name, ",
            $t, ".provider AS a_provider, ",
            $t, ".configuration AS a_configuration, ",
            $t, ".interval_seconds AS a_interval_seconds, ",
            $t, ".currency AS a_currency, ",
            $t, ".created_at AS a_created_at, ",
            $t, ".updated_at AS a_updated_at"
        )
    };
}

macro_rules! chat_columns {
    ($t:literal) => {
        concat!(
            $t, ".id AS c_id, ",
            $t, ".name AS c_name, ",
            $t, ".provider AS c_provider, ",
            $t, ".external_id AS c_external_id, ",
            $t, ".created_at AS c_created_at, ",
            $t, ".updated_at AS c_updated_at"
        )
    };
}

macro_rules! account_chat_columns {
    ($t:literal) => {
        concat!(
            $t, ".id AS l_id, ",
            $t, ".account_id AS l_account_id, ",
            $t, ".chat_id AS l_chat_id, ",
            $t, ".created_at AS l_created_at, ",
            $t, ".updated_at AS l_updated_at"
        )
    };
}

macro_rules! setting_columns {
    ($t:literal) => {
        concat!(
            $t, ".id AS s_id, ",
            $t, ".account_chat_id AS s_account_chat_id, ",
            $t, ".notification_type AS s_notification_type, ",
            $t, ".schedule AS s_schedule, ",
            $t, ".last_sent_at AS s_last_sent_at, ",
            $t, ".created_at AS s_created_at, ",
            $t, ".updated_at AS s_updated_at"
        )
    };
}

macro_rules! transaction_columns {
    ($t:literal) => {
        concat!(
            $t, ".id AS t_id, ",
            $t, ".account_id AS t_account_id, ",
            $t, ".unique_id AS t_unique_id, ",
            $t, ".transaction_type AS t_transaction_type, ",
            $t, ".amount AS t_amount, ",
            $t, ".currency AS t_currency, ",
            $t, ".description AS t_description, ",
            $t, ".at_time AS t_at_time, ",
            $t, ".created_at AS t_created_at"
        )
    };
}

macro_rules! sent_columns {
    ($t:literal) => {
        concat!(
            $t, ".id AS n_id, ",
            $t, ".transaction_id AS n_transaction_id, ",
            $t, ".account_chat_id AS n_account_chat_id, ",
            $t, ".external_chat_id AS n_external_chat_id, ",
            $t, ".external_message_id AS n_external_message_id, ",
            $t, ".is_replied AS n_is_replied, ",
            $t, ".created_at AS n_created_at, ",
            $t, ".updated_at AS n_updated_at"
        )
    };
}

pub(crate) use {
    account_chat_columns, account_columns, chat_columns, sent_columns, setting_columns,
    transaction_columns,
};

fn currency(table: &'static str, raw: i64) -> Result<u16, LedgerError> {
    u16::try_from(raw).map_err(|_| LedgerError::decode(table, format!("currency {raw} out of range")))
}

pub(crate) fn account(row: &SqliteRow) -> Result<Account, LedgerError> {
    let provider: String = row.try_get("a_provider")?;
    let configuration: String = row.try_get("a_configuration")?;
    Ok(Account {
        id: row.try_get("a_id")?,
        name: row.try_get("a_name")?,
        provider: provider.parse()?,
        configuration: serde_json::from_str(&configuration)
            .map_err(|e| LedgerError::decode("accounts", e))?,
        interval_seconds: row.try_get("a_interval_seconds")?,
        currency: currency("accounts", row.try_get("a_currency")?)?,
        created_at: row.try_get("a_created_at")?,
        updated_at: row.try_get("a_updated_at")?,
    })
}

pub(crate) fn chat(row: &SqliteRow) -> Result<Chat, LedgerError> {
    let provider: String = row.try_get("c_provider")?;
    Ok(Chat {
        id: row.try_get("c_id")?,
        name: row.try_get("c_name")?,
        provider: provider.parse()?,
        external_id: row.try_get("c_external_id")?,
        created_at: row.try_get("c_created_at")?,
        updated_at: row.try_get("c_updated_at")?,
    })
}

pub(crate) fn account_chat(row: &SqliteRow) -> Result<AccountChat, LedgerError> {
    Ok(AccountChat {
        id: row.try_get("l_id")?,
        account_id: row.try_get("l_account_id")?,
        chat_id: row.try_get("l_chat_id")?,
        created_at: row.try_get("l_created_at")?,
        updated_at: row.try_get("l_updated_at")?,
    })
}

pub(crate) fn setting(row: &SqliteRow) -> Result<NotificationSetting, LedgerError> {
    let notification_type: String = row.try_get("s_notification_type")?;
    Ok(NotificationSetting {
        id: row.try_get("s_id")?,
        account_chat_id: row.try_get("s_account_chat_id")?,
        notification_type: notification_type.parse()?,
        schedule: row.try_get("s_schedule")?,
        last_sent_at: row.try_get("s_last_sent_at")?,
        created_at: row.try_get("s_created_at")?,
        updated_at: row.try_get("s_updated_at")?,
    })
}

pub(crate) fn transaction(row: &SqliteRow) -> Result<Transaction, LedgerError> {
    let transaction_type: String = row.try_get("t_transaction_type")?;
    let amount: String = row.try_get("t_amount")?;
    Ok(Transaction {
        id: row.try_get("t_id")?,
        account_id: row.try_get("t_account_id")?,
        unique_id: row.try_get("t_unique_id")?,
        transaction_type: transaction_type.parse()?,
        amount: Decimal::from_str(&amount).map_err(|e| LedgerError::decode("transactions", e))?,
        currency: currency("transactions", row.try_get("t_currency")?)?,
        description: row.try_get("t_description")?,
        at_time: row.try_get("t_at_time")?,
        created_at: row.try_get("t_created_at")?,
    })
}

pub(crate) fn sent(row: &SqliteRow) -> Result<SentNotification, LedgerError> {
    Ok(SentNotification {
        id: row.try_get("n_id")?,
        transaction_id: row.try_get("n_transaction_id")?,
        account_chat_id: row.try_get("n_account_chat_id")?,
        external_chat_id: row.try_get("n_external_chat_id")?,
        external_message_id: row.try_get("n_external_message_id")?,
        is_replied: row.try_get("n_is_replied")?,
        created_at: row.try_get("n_created_at")?,
        updated_at: row.try_get("n_updated_at")?,
    })
}
