//! Durable storage for accounts, chats, transactions and notifications.
//!
//! This crate provides:
//! - SQLite schema creation
//! - Repository operations, each on its own short-lived connection or transaction
//! - Dedup-safe transaction inserts

pub mod accounts;
pub mod chats;
pub mod db;
pub mod notifications;
mod rows;
pub mod transactions;

pub use db::{Database, LedgerError};
