//! Error types for the coordination loops.

use bankwatch_core::{NotificationType, ScheduleError};
use bankwatch_ledger::LedgerError;
use bankwatch_notify::DeliveryError;
use bankwatch_providers::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
    #[error("{0} notifications are not schedule-driven")]
    NotSchedulable(NotificationType),
}
