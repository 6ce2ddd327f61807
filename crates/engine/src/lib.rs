//! Coordination loops for the bank transaction watcher.
//!
//! This crate contains:
//! - Ingestion: polling every account and recording new transactions
//! - Scheduling: announcing new transactions and sending cron-driven summaries
//! - Reply tracking for sent notifications
//! - Account configuration refresh
//! - The management alert channel and the loop runner tying it together

pub mod alerts;
pub mod config;
pub mod error;
pub mod ingest;
pub mod refresh;
pub mod replies;
pub mod runner;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use alerts::{start_alerts, AlertConfig, AlertEvent, AlertHandle};
pub use config::{IngestConfig, RefreshConfig, SchedulerConfig};
pub use error::EngineError;
pub use ingest::Ingestor;
pub use refresh::Refresher;
pub use replies::ReplyTracker;
pub use runner::{run_loop, Engine};
pub use scheduler::Scheduler;
