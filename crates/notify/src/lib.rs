//! Outbound message delivery.
//!
//! This crate provides:
//! - The [`DispatchSink`] capability
//! - A Telegram implementation with chunking and flood control

pub mod chunk;
pub mod sink;
pub mod telegram;

pub use chunk::split_message;
pub use sink::{DeliveryError, DispatchSink};
pub use telegram::{TelegramSink, TelegramSinkConfig, TELEGRAM_MAX_MESSAGE_CHARS};
