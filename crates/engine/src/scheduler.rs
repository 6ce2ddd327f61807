//! Notification scheduling.
//!
//! Two paths share one [`Scheduler`]:
//! - event-driven: every newly ingested transaction is announced to the
//!   chats holding a DEPOSIT or WITHDRAWAL setting for its account
//! - time-driven: on every tick, settings with a cron schedule are checked
//!   and the due ones are rendered and sent
//!
//! A transaction that already has a sent-notification record is never
//! announced again. A scheduled setting only advances `last_sent_at` after a
//! successful delivery, so failures are retried on the next tick. The same
//! holds for a bank's balance baseline: it is committed only once the
//! BALANCE message went out.

use crate::alerts::{AlertEvent, AlertHandle};
use crate::config::SchedulerConfig;
use crate::error::EngineError;
use bankwatch_core::message::{
    active_message, balance_message, balances_overview, transaction_message, unanswered_message,
    NO_BALANCE_DATA,
};
use bankwatch_core::{
    escape_html, Account, Balance, CronSchedule, NewSentNotification, NotificationTarget,
    NotificationType, Transaction,
};
use bankwatch_ledger::Database;
use bankwatch_notify::DispatchSink;
use bankwatch_providers::{BankProvider, ProviderFactory};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A delivered balance waiting to become the bank's new baseline.
type PendingBalance = (Box<dyn BankProvider>, Balance);

struct Rendered {
    text: String,
    pending: Option<PendingBalance>,
}

impl From<String> for Rendered {
    fn from(text: String) -> Self {
        Self {
            text,
            pending: None,
        }
    }
}

pub struct Scheduler {
    db: Database,
    providers: Arc<dyn ProviderFactory>,
    sink: Arc<dyn DispatchSink>,
    alerts: AlertHandle,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        db: Database,
        providers: Arc<dyn ProviderFactory>,
        sink: Arc<dyn DispatchSink>,
        alerts: AlertHandle,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            db,
            providers,
            sink,
            alerts,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Announce one transaction to every matching event setting of its account.
    ///
    /// `chat_id` limits delivery to a single chat. Returns the number of
    /// messages delivered; zero when the transaction was already announced.
    pub async fn notify_transaction(
        &self,
        transaction: &Transaction,
        chat_id: Option<i64>,
    ) -> Result<usize, EngineError> {
        if self.db.sent_notification_exists(transaction.id).await? {
            debug!(transaction_id = transaction.id, "Transaction already notified");
            return Ok(0);
        }

        let notification_type = NotificationType::for_transaction(transaction.transaction_type);
        let targets = self
            .db
            .list_event_targets(notification_type, transaction.account_id, chat_id)
            .await?;

        let mut delivered = 0;
        for target in &targets {
            let text = transaction_message(&target.account.name, transaction, self.config.timezone);
            match self.sink.send_to_chat(&target.chat, &text).await {
                Ok(external_message_id) => {
                    self.db
                        .create_sent_notification(&NewSentNotification {
                            transaction_id: transaction.id,
                            account_chat_id: target.setting.account_chat_id,
                            external_chat_id: target.chat.external_id.clone(),
                            external_message_id,
                        })
                        .await?;
                    delivered += 1;
                }
                Err(e) => {
                    error!(
                        transaction_id = transaction.id,
                        chat_id = target.chat.id,
                        error = %e,
                        "Failed to deliver transaction notification"
                    );
                    self.alerts
                        .send(AlertEvent::DeliveryFailure {
                            external_chat_id: target.chat.external_id.clone(),
                            context: format!("{} transaction {}", notification_type, transaction.id),
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        }

        Ok(delivered)
    }

    /// Announce a batch of freshly ingested transactions.
    ///
    /// A failure on one transaction is logged and does not stop the rest.
    pub async fn notify_transactions(&self, transactions: &[Transaction]) -> usize {
        let mut delivered = 0;
        for transaction in transactions {
            match self.notify_transaction(transaction, None).await {
                Ok(n) => delivered += n,
                Err(e) => error!(
                    transaction_id = transaction.id,
                    error = %e,
                    "Failed to notify transaction"
                ),
            }
        }
        if !transactions.is_empty() {
            info!(
                transactions = transactions.len(),
                delivered, "Transaction notifications sent"
            );
        }
        delivered
    }

    /// Send every scheduled setting that is due at `now`.
    ///
    /// Returns the number of settings sent.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let targets = self.db.list_scheduled_targets().await?;
        let tz = self.config.timezone;
        let mut due = 0;
        let mut sent = 0;

        for target in &targets {
            let setting = &target.setting;
            let Some(expression) = setting.schedule.as_deref() else {
                continue;
            };

            let is_due = CronSchedule::parse(expression)
                .and_then(|schedule| schedule.is_due(setting.last_sent_at, now, tz));
            match is_due {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(setting_id = setting.id, error = %e, "Skipping unusable schedule");
                    continue;
                }
            }
            due += 1;

            match self.send_scheduled(target, now).await {
                Ok(pending) => {
                    self.db.mark_setting_sent(setting.id, now).await?;
                    if let Some((adapter, balance)) = pending {
                        if let Err(e) = adapter.commit_balance(&balance).await {
                            warn!(
                                account_id = target.account.id,
                                error = %e,
                                "Failed to store balance baseline"
                            );
                        }
                    }
                    sent += 1;
                }
                Err(e) => {
                    error!(
                        setting_id = setting.id,
                        notification_type = %setting.notification_type,
                        error = %e,
                        "Failed to send scheduled notification"
                    );
                    self.report(target, &e).await;
                }
            }
        }

        info!(
            settings = targets.len(),
            due, sent, "Scheduled notifications checked"
        );
        Ok(sent)
    }

    async fn send_scheduled(
        &self,
        target: &NotificationTarget,
        now: DateTime<Utc>,
    ) -> Result<Option<PendingBalance>, EngineError> {
        let rendered = self.render(target, now).await?;
        self.sink.send_to_chat(&target.chat, &rendered.text).await?;
        Ok(rendered.pending)
    }

    async fn render(
        &self,
        target: &NotificationTarget,
        now: DateTime<Utc>,
    ) -> Result<Rendered, EngineError> {
        let tz = self.config.timezone;
        let account = &target.account;
        match target.setting.notification_type {
            NotificationType::Balance => {
                let adapter = self.providers.configure(account)?;
                Ok(match adapter.fetch_balance().await? {
                    Some(balance) => Rendered {
                        text: balance_message(&account.name, &balance, account.currency, tz, now),
                        pending: Some((adapter, balance)),
                    },
                    None => format!("{} ({})", NO_BALANCE_DATA, escape_html(&account.name)).into(),
                })
            }
            NotificationType::Active => Ok(active_message(&account.name).into()),
            NotificationType::Unanswered => {
                Ok(self.unanswered_text(&target.chat.external_id).await?.into())
            }
            other @ (NotificationType::Deposit | NotificationType::Withdrawal) => {
                Err(EngineError::NotSchedulable(other))
            }
        }
    }

    async fn report(&self, target: &NotificationTarget, error: &EngineError) {
        let event = match error {
            EngineError::Provider(e) => AlertEvent::ProviderFailure {
                account_id: target.account.id,
                account_name: target.account.name.clone(),
                error: e.to_string(),
            },
            e => AlertEvent::DeliveryFailure {
                external_chat_id: target.chat.external_id.clone(),
                context: format!(
                    "{} setting {}",
                    target.setting.notification_type, target.setting.id
                ),
                error: e.to_string(),
            },
        };
        self.alerts.send(event).await;
    }

    async fn balance(&self, account: &Account) -> Result<Option<Balance>, EngineError> {
        let adapter = self.providers.configure(account)?;
        Ok(adapter.fetch_balance().await?)
    }

    /// Unanswered notifications of one external chat, rendered.
    pub async fn unanswered_text(&self, external_chat_id: &str) -> Result<String, EngineError> {
        let items = self.db.list_unanswered(external_chat_id).await?;
        Ok(unanswered_message(&items, self.config.timezone))
    }

    /// Current balances of every account linked to a chat, rendered.
    ///
    /// An account whose bank fails is shown as having no data.
    pub async fn balances_text(
        &self,
        chat_id: i64,
        now: DateTime<Utc>,
    ) -> Result<String, EngineError> {
        let accounts = self.db.list_accounts_for_chat(chat_id).await?;
        let mut entries = Vec::with_capacity(accounts.len());
        for account in accounts {
            let balance = match self.balance(&account).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(account_id = account.id, error = %e, "Failed to fetch balance");
                    None
                }
            };
            entries.push((account.name, account.currency, balance));
        }
        Ok(balances_overview(&entries, self.config.timezone, now))
    }
}
