//! Application configuration.

use bankwatch_engine::{IngestConfig, RefreshConfig, SchedulerConfig};
use bankwatch_notify::TelegramSinkConfig;
use chrono_tz::Tz;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),
    #[error("Unknown timezone: {0}")]
    Timezone(String),
}

/// Raw settings as they arrive from flags and the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub bot_token: Option<String>,
    pub management_chat_id: Option<i64>,
    pub timezone: String,
    pub state_dir: PathBuf,
    pub ingest_interval_secs: u64,
    pub notify_interval_secs: u64,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub flood_delay_ms: u64,
}

/// Validated, immutable configuration for a running service.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bot_token: String,
    pub management_chat_id: i64,
    pub timezone: Tz,
    pub state_dir: PathBuf,
    pub ingest_interval: Duration,
    pub notify_interval: Duration,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub flood_delay: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("bot_token", &"[REDACTED]")
            .field("management_chat_id", &self.management_chat_id)
            .field("timezone", &self.timezone)
            .field("state_dir", &self.state_dir)
            .field("ingest_interval", &self.ingest_interval)
            .field("notify_interval", &self.notify_interval)
            .field("refresh_interval", &self.refresh_interval)
            .field("request_timeout", &self.request_timeout)
            .field("flood_delay", &self.flood_delay)
            .finish()
    }
}

impl AppConfig {
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let bot_token = settings
            .bot_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("BANKWATCH_BOT_TOKEN"))?;
        let management_chat_id = settings
            .management_chat_id
            .ok_or(ConfigError::Missing("BANKWATCH_MANAGEMENT_CHAT_ID"))?;
        let timezone: Tz = settings
            .timezone
            .parse()
            .map_err(|_| ConfigError::Timezone(settings.timezone.clone()))?;

        Ok(Self {
            database_url: settings.database_url,
            bot_token,
            management_chat_id,
            timezone,
            state_dir: settings.state_dir,
            ingest_interval: Duration::from_secs(settings.ingest_interval_secs.max(1)),
            notify_interval: Duration::from_secs(settings.notify_interval_secs.max(1)),
            refresh_interval: Duration::from_secs(settings.refresh_interval_secs.max(1)),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            flood_delay: Duration::from_millis(settings.flood_delay_ms),
        })
    }

    pub fn ingest(&self) -> IngestConfig {
        IngestConfig {
            interval: self.ingest_interval,
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: self.notify_interval,
            timezone: self.timezone,
        }
    }

    pub fn refresh(&self) -> RefreshConfig {
        RefreshConfig {
            interval: self.refresh_interval,
        }
    }

    pub fn sink(&self) -> TelegramSinkConfig {
        TelegramSinkConfig {
            flood_delay: self.flood_delay,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> Settings {
        Settings {
            database_url: "sqlite::memory:".to_string(),
            bot_token: Some("123:secret".to_string()),
            management_chat_id: Some(-100500),
            timezone: "Europe/Kyiv".to_string(),
            state_dir: PathBuf::from("./state"),
            ingest_interval_secs: 60,
            notify_interval_secs: 30,
            refresh_interval_secs: 3600,
            request_timeout_secs: 15,
            flood_delay_ms: 1000,
        }
    }

    #[test]
    fn test_component_configs() {
        let config = AppConfig::from_settings(settings()).unwrap();

        assert_eq!(config.ingest().interval, Duration::from_secs(60));
        assert_eq!(config.scheduler().interval, Duration::from_secs(30));
        assert_eq!(config.scheduler().timezone, chrono_tz::Europe::Kyiv);
        assert_eq!(config.refresh().interval, Duration::from_secs(3600));
        assert_eq!(config.sink().flood_delay, Duration::from_secs(1));
        assert_eq!(config.sink().max_retries, TelegramSinkConfig::default().max_retries);
    }

    #[test]
    fn test_missing_token() {
        let mut raw = settings();
        raw.bot_token = Some("  ".to_string());
        assert!(matches!(
            AppConfig::from_settings(raw),
            Err(ConfigError::Missing("BANKWATCH_BOT_TOKEN"))
        ));
    }

    #[test]
    fn test_unknown_timezone() {
        let mut raw = settings();
        raw.timezone = "Mars/Olympus".to_string();
        assert!(matches!(
            AppConfig::from_settings(raw),
            Err(ConfigError::Timezone(_))
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = AppConfig::from_settings(settings()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
