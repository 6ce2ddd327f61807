//! Bankwatch - bank transaction watcher
//!
//! Polls bank accounts, records new transactions and notifies Telegram chats.

mod bot;
mod config;
mod menu;

use bankwatch_engine::{start_alerts, AlertConfig, AlertEvent, Engine};
use bankwatch_ledger::Database;
use bankwatch_notify::{DispatchSink, TelegramSink};
use bankwatch_providers::{ProviderContext, ProviderFactory, Providers};
use bot::TelegramBot;
use clap::{Parser, Subcommand};
use config::{AppConfig, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use teloxide::Bot;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Bankwatch CLI
#[derive(Parser, Debug)]
#[command(name = "bankwatch")]
#[command(about = "Bank transaction watcher with Telegram notifications", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Database connection string
    #[arg(long, env = "BANKWATCH_DATABASE_URL", default_value = "sqlite://bankwatch.db")]
    database_url: String,

    /// Telegram bot token
    #[arg(long, env = "BANKWATCH_BOT_TOKEN", hide_env_values = true)]
    bot_token: Option<String>,

    /// Chat that receives alerts and may use management commands
    #[arg(long, env = "BANKWATCH_MANAGEMENT_CHAT_ID", allow_hyphen_values = true)]
    management_chat_id: Option<i64>,

    /// IANA timezone for schedules and message timestamps
    #[arg(long, env = "BANKWATCH_TIMEZONE", default_value = "Europe/Kyiv")]
    timezone: String,

    /// Directory for provider balance checkpoints
    #[arg(long, env = "BANKWATCH_STATE_DIR", default_value = "./state")]
    state_dir: PathBuf,

    /// Seconds between ingestion ticks
    #[arg(long, env = "BANKWATCH_INGEST_INTERVAL", default_value_t = 60)]
    ingest_interval: u64,

    /// Seconds between scheduled notification checks
    #[arg(long, env = "BANKWATCH_NOTIFY_INTERVAL", default_value_t = 60)]
    notify_interval: u64,

    /// Seconds between account configuration refreshes
    #[arg(long, env = "BANKWATCH_REFRESH_INTERVAL", default_value_t = 3600)]
    refresh_interval: u64,

    /// Provider HTTP request timeout in seconds
    #[arg(long, env = "BANKWATCH_REQUEST_TIMEOUT", default_value_t = 15)]
    request_timeout: u64,

    /// Pause between message chunks in milliseconds
    #[arg(long, env = "BANKWATCH_FLOOD_DELAY_MS", default_value_t = 1000)]
    flood_delay_ms: u64,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "BANKWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Start the loops and the bot (default)
    Run,
    /// Create the database tables and exit
    Migrate,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            database_url: self.database_url.clone(),
            bot_token: self.bot_token.clone(),
            management_chat_id: self.management_chat_id,
            timezone: self.timezone.clone(),
            state_dir: self.state_dir.clone(),
            ingest_interval_secs: self.ingest_interval,
            notify_interval_secs: self.notify_interval,
            refresh_interval_secs: self.refresh_interval,
            request_timeout_secs: self.request_timeout,
            flood_delay_ms: self.flood_delay_ms,
        }
    }
}

fn init_logging(level: &str) {
    let level = match level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run(config: AppConfig, db: Database) -> Result<(), Box<dyn std::error::Error>> {
    info!("🚀 Bankwatch starting...");
    info!("  Timezone: {}", config.timezone);
    info!("  Ingestion interval: {:?}", config.ingest_interval);
    info!("  Notification interval: {:?}", config.notify_interval);
    info!("  Refresh interval: {:?}", config.refresh_interval);
    info!("  State dir: {}", config.state_dir.display());

    let bot = Bot::new(&config.bot_token);
    let sink: Arc<dyn DispatchSink> = Arc::new(TelegramSink::new(bot.clone(), config.sink()));
    let providers: Arc<dyn ProviderFactory> = Arc::new(Providers::new(ProviderContext::new(
        config.request_timeout,
        config.state_dir.clone(),
        config.timezone,
    )?));

    let alerts = start_alerts(
        sink.clone(),
        AlertConfig {
            provider: bankwatch_core::ChatProvider::Telegram,
            management_chat_id: config.management_chat_id.to_string(),
        },
    );
    alerts.send(AlertEvent::Started).await;

    let engine = Engine::new(
        db.clone(),
        providers,
        sink,
        alerts.clone(),
        config.ingest(),
        config.scheduler(),
        config.refresh(),
    );
    let handles = engine.spawn();

    let telegram = Arc::new(TelegramBot::new(
        bot,
        db,
        engine.scheduler(),
        alerts,
        config.management_chat_id,
    ));
    telegram.run().await?;

    info!("Shutting down...");
    for handle in handles {
        handle.abort();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_logging(&args.log_level);

    let db = match Database::connect(&args.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Migrate => {
            info!("Database is up to date");
            ExitCode::SUCCESS
        }
        Command::Run => {
            let config = match AppConfig::from_settings(args.settings()) {
                Ok(config) => config,
                Err(e) => {
                    error!("Invalid configuration: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            match run(config, db).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Fatal error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
