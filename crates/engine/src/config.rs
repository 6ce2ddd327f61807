//! Per-loop configuration.

use chrono_tz::Tz;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub interval: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Zone cron expressions and message timestamps are evaluated in.
    pub timezone: Tz,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            timezone: chrono_tz::Europe::Kyiv,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
        }
    }
}
