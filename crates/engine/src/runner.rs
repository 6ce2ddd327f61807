//! Long-running loops.

use crate::alerts::{AlertEvent, AlertHandle};
use crate::config::{IngestConfig, RefreshConfig, SchedulerConfig};
use crate::error::EngineError;
use crate::ingest::Ingestor;
use crate::refresh::Refresher;
use crate::scheduler::Scheduler;
use bankwatch_ledger::Database;
use bankwatch_notify::DispatchSink;
use bankwatch_providers::ProviderFactory;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Run `tick` every `period` forever.
///
/// A failed tick is logged and reported, then the loop waits for the next one.
pub async fn run_loop<F, Fut>(task: &'static str, period: Duration, alerts: AlertHandle, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), EngineError>>,
{
    info!(task, period_secs = period.as_secs(), "Loop started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        if let Err(e) = tick().await {
            error!(task, error = %e, "Loop tick failed");
            alerts
                .send(AlertEvent::LoopFailure {
                    task,
                    error: e.to_string(),
                })
                .await;
        }
    }
}

/// The three background loops, wired together.
pub struct Engine {
    ingestor: Arc<Ingestor>,
    scheduler: Arc<Scheduler>,
    refresher: Arc<Refresher>,
    alerts: AlertHandle,
    ingest: IngestConfig,
    refresh: RefreshConfig,
}

impl Engine {
    pub fn new(
        db: Database,
        providers: Arc<dyn ProviderFactory>,
        sink: Arc<dyn DispatchSink>,
        alerts: AlertHandle,
        ingest: IngestConfig,
        scheduler: SchedulerConfig,
        refresh: RefreshConfig,
    ) -> Self {
        Self {
            ingestor: Arc::new(Ingestor::new(db.clone(), providers.clone(), alerts.clone())),
            scheduler: Arc::new(Scheduler::new(
                db.clone(),
                providers.clone(),
                sink,
                alerts.clone(),
                scheduler,
            )),
            refresher: Arc::new(Refresher::new(db, providers, alerts.clone())),
            alerts,
            ingest,
            refresh,
        }
    }

    /// Shared with the bot for `/unanswered` and `/balances`.
    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    /// Spawn ingestion (followed by transaction notifications), scheduled
    /// notifications and account refresh.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(3);

        let ingestor = self.ingestor.clone();
        let scheduler = self.scheduler.clone();
        handles.push(tokio::spawn(run_loop(
            "ingestion",
            self.ingest.interval,
            self.alerts.clone(),
            move || {
                let ingestor = ingestor.clone();
                let scheduler = scheduler.clone();
                async move {
                    let inserted = ingestor.run_tick().await?;
                    scheduler.notify_transactions(&inserted).await;
                    Ok(())
                }
            },
        )));

        let scheduler = self.scheduler.clone();
        handles.push(tokio::spawn(run_loop(
            "notifications",
            self.scheduler.config().interval,
            self.alerts.clone(),
            move || {
                let scheduler = scheduler.clone();
                async move {
                    scheduler.run_due(Utc::now()).await?;
                    Ok(())
                }
            },
        )));

        let refresher = self.refresher.clone();
        handles.push(tokio::spawn(run_loop(
            "refresh",
            self.refresh.interval,
            self.alerts.clone(),
            move || {
                let refresher = refresher.clone();
                async move {
                    refresher.run_tick().await?;
                    Ok(())
                }
            },
        )));

        handles
    }
}
