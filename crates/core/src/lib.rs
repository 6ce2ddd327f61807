//! Core data types for the bank transaction watcher.

pub mod account;
pub mod chat;
pub mod currency;
pub mod error;
pub mod format;
pub mod message;
pub mod notification;
pub mod schedule;
pub mod transaction;

pub use account::*;
pub use chat::*;
pub use currency::*;
pub use error::*;
pub use format::*;
pub use notification::*;
pub use schedule::*;
pub use transaction::*;
