//! Management alerts.
//!
//! Loops push [`AlertEvent`]s into a bounded channel; a background task
//! formats them with the host name and a UTC timestamp and delivers them to
//! the management chat. Delivery failures are logged and dropped.

use bankwatch_core::{escape_html, ChatProvider};
use bankwatch_notify::DispatchSink;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const CHANNEL_CAPACITY: usize = 100;

/// Something the operators should hear about.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// Process started
    Started,
    /// A bank call failed for one account
    ProviderFailure {
        account_id: i64,
        account_name: String,
        error: String,
    },
    /// A chat refused a notification
    DeliveryFailure {
        external_chat_id: String,
        context: String,
        error: String,
    },
    /// A loop tick failed as a whole
    LoopFailure { task: &'static str, error: String },
    /// Someone outside the management chat tried a management command
    Unauthorized {
        external_chat_id: String,
        user: String,
        command: String,
    },
}

impl AlertEvent {
    fn render(&self) -> String {
        match self {
            AlertEvent::Started => "✅ Service started".to_string(),
            AlertEvent::ProviderFailure {
                account_id,
                account_name,
                error,
            } => format!(
                "⚠️ Provider failure for <b>{}</b> (account {})\n<code>{}</code>",
                escape_html(account_name),
                account_id,
                escape_html(error)
            ),
            AlertEvent::DeliveryFailure {
                external_chat_id,
                context,
                error,
            } => format!(
                "📭 Delivery to chat {} failed ({})\n<code>{}</code>",
                escape_html(external_chat_id),
                escape_html(context),
                escape_html(error)
            ),
            AlertEvent::LoopFailure { task, error } => format!(
                "🚫 <b>{}</b> tick failed\n<code>{}</code>",
                task,
                escape_html(error)
            ),
            AlertEvent::Unauthorized {
                external_chat_id,
                user,
                command,
            } => format!(
                "🔒 Unauthorized {} from {} in chat {}",
                escape_html(command),
                escape_html(user),
                escape_html(external_chat_id)
            ),
        }
    }
}

/// Where management alerts go.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub provider: ChatProvider,
    pub management_chat_id: String,
}

/// Cloneable sender side of the alert channel.
#[derive(Clone)]
pub struct AlertHandle {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertHandle {
    /// A handle and the receiving end it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AlertEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub async fn send(&self, event: AlertEvent) {
        if let Err(e) = self.tx.send(event).await {
            warn!("Failed to queue alert: {}", e);
        }
    }
}

struct AlertNotifier {
    sink: Arc<dyn DispatchSink>,
    config: AlertConfig,
    hostname: String,
}

impl AlertNotifier {
    fn format(&self, event: &AlertEvent) -> String {
        let now = chrono::Utc::now();
        format!(
            "<b>{}</b>\n{}\n\n⏰ {}",
            escape_html(&self.hostname),
            event.render(),
            now.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }

    async fn notify(&self, event: &AlertEvent) {
        let message = self.format(event);
        if let Err(e) = self
            .sink
            .send(self.config.provider, &self.config.management_chat_id, &message)
            .await
        {
            error!(error = %e, "Failed to deliver management alert");
        }
    }
}

/// Start the alert task. Returns a handle that can be cloned into every loop.
pub fn start_alerts(sink: Arc<dyn DispatchSink>, config: AlertConfig) -> AlertHandle {
    let (handle, mut rx) = AlertHandle::channel(CHANNEL_CAPACITY);

    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    let notifier = AlertNotifier {
        sink,
        config,
        hostname,
    };

    tokio::spawn(async move {
        info!("Alert notifier started");

        while let Some(event) = rx.recv().await {
            notifier.notify(&event).await;
        }

        info!("Alert notifier stopped");
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeSink;
    use std::time::Duration;

    #[test]
    fn test_render_escapes_html() {
        let text = AlertEvent::ProviderFailure {
            account_id: 4,
            account_name: "Shop <main>".to_string(),
            error: "HTTP 500".to_string(),
        }
        .render();
        assert!(text.contains("Shop &lt;main&gt;"));
        assert!(text.contains("account 4"));
    }

    #[tokio::test]
    async fn test_alerts_reach_management_chat() {
        let sink = Arc::new(FakeSink::default());
        let handle = start_alerts(
            sink.clone(),
            AlertConfig {
                provider: ChatProvider::Telegram,
                management_chat_id: "-100999".to_string(),
            },
        );

        handle
            .send(AlertEvent::LoopFailure {
                task: "ingestion",
                error: "database is locked".to_string(),
            })
            .await;

        for _ in 0..50 {
            if !sink.sent().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "-100999");
        assert!(sent[0].1.contains("<b>ingestion</b> tick failed"));
        assert!(sent[0].1.contains("UTC"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        let sink = Arc::new(FakeSink::default());
        sink.set_failing(true);
        let handle = start_alerts(
            sink.clone(),
            AlertConfig {
                provider: ChatProvider::Telegram,
                management_chat_id: "-100999".to_string(),
            },
        );

        handle.send(AlertEvent::Started).await;
        handle.send(AlertEvent::Started).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(sink.sent().is_empty());
        assert_eq!(sink.attempts(), 2);
    }
}
