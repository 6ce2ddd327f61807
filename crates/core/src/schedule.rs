//! Cron schedule evaluation for time-driven notifications.
//!
//! Expressions are evaluated against wall-clock time in the configured
//! timezone: the start instant is converted to a naive local time, the cron
//! iterator runs on that naive value, and the resulting occurrence is
//! localized back into the timezone before it is compared with "now".
//! An occurrence skipped by a forward clock change is read with the offset
//! in force before the jump, so it fires once the clock passes it.

use crate::ScheduleError;
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

/// A parsed cron expression.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    /// Parse a classic five-field expression (`min hour dom mon dow`, Sunday = 0 or 7)
    /// or a six/seven-field expression with leading seconds.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let normalized = match fields.len() {
            5 => {
                let dow = translate_day_of_week(fields[4]);
                format!("0 {} {} {} {} {}", fields[0], fields[1], fields[2], fields[3], dow)
            }
            6 | 7 => fields.join(" "),
            n => {
                return Err(ScheduleError::InvalidExpression {
                    expression: expression.to_string(),
                    reason: format!("expected 5 to 7 fields, got {}", n),
                })
            }
        };

        let schedule =
            Schedule::from_str(&normalized).map_err(|e| ScheduleError::InvalidExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// First occurrence strictly after `after`, as wall-clock time in `tz`.
    pub fn next_fire(&self, after: NaiveDateTime, tz: Tz) -> Result<DateTime<Tz>, ScheduleError> {
        let start = Utc.from_utc_datetime(&after);
        let next = self
            .schedule
            .after(&start)
            .next()
            .ok_or_else(|| ScheduleError::Exhausted(self.expression.clone()))?;

        let naive = next.naive_utc();
        localize(naive, tz).ok_or_else(|| ScheduleError::Localize {
            naive: naive.to_string(),
            timezone: tz.name().to_string(),
        })
    }

    /// Whether a setting last sent at `last_sent_at` should fire at `now`.
    ///
    /// A setting that was never sent is evaluated from [`schedule_epoch`], so it
    /// is due on the first check after creation.
    pub fn is_due(
        &self,
        last_sent_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> Result<bool, ScheduleError> {
        let start = last_sent_at
            .map(|t| t.with_timezone(&tz).naive_local())
            .unwrap_or_else(schedule_epoch);
        let next = self.next_fire(start, tz)?;
        Ok(now.with_timezone(&tz) >= next)
    }
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            let before = tz.from_local_datetime(&(naive - TimeDelta::hours(3))).earliest()?;
            before
                .offset()
                .fix()
                .from_local_datetime(&naive)
                .single()
                .map(|at| at.with_timezone(&tz))
        }
    }
}

/// Evaluation start for settings that have never been sent.
pub fn schedule_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Map classic cron day-of-week numbers (0-7, Sunday = 0 or 7) onto the
/// 1-7 (Sunday = 1) numbering the `cron` crate expects. Named days pass through.
fn translate_day_of_week(field: &str) -> String {
    if field.chars().any(|c| c.is_ascii_alphabetic()) {
        return field.to_string();
    }

    let shift = |n: &str| -> String {
        match n.parse::<u8>() {
            Ok(0) | Ok(7) => "1".to_string(),
            Ok(d) if d < 7 => (d + 1).to_string(),
            _ => n.to_string(),
        }
    };

    field
        .split(',')
        .map(|item| {
            let (base, step) = match item.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (item, None),
            };
            let translated = match base.split_once('-') {
                Some((start, "7")) if step.is_none() && start != "0" => {
                    format!("{}-7,1", shift(start))
                }
                Some((start, "7")) => format!("{}-7", shift(start)),
                Some((start, end)) => format!("{}-{}", shift(start), shift(end)),
                None if base == "*" || base == "?" => base.to_string(),
                None => shift(base),
            };
            match step {
                Some(step) => format!("{}/{}", translated, step),
                None => translated,
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, Timelike, Weekday};
    use chrono_tz::Europe::Kyiv;

    fn kyiv(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Kyiv.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(CronSchedule::parse("every day").is_err());
        assert!(CronSchedule::parse("0 25 * * *").is_err());
        assert!(CronSchedule::parse("0 18 * * *").is_ok());
        assert!(CronSchedule::parse("0 0 18 * * *").is_ok());
    }

    #[test]
    fn test_never_sent_is_due_immediately() {
        let daily = CronSchedule::parse("0 18 * * *").unwrap();
        let now = kyiv(2024, 5, 10, 9, 0);
        assert!(daily.is_due(None, now, Kyiv).unwrap());
    }

    #[test]
    fn test_not_due_until_next_occurrence_after_send() {
        let daily = CronSchedule::parse("0 18 * * *").unwrap();
        let sent = kyiv(2024, 5, 10, 18, 0) + Duration::seconds(5);

        assert!(!daily.is_due(Some(sent), sent, Kyiv).unwrap());
        assert!(!daily.is_due(Some(sent), kyiv(2024, 5, 11, 17, 59), Kyiv).unwrap());
        assert!(daily.is_due(Some(sent), kyiv(2024, 5, 11, 18, 0), Kyiv).unwrap());
    }

    #[test]
    fn test_next_fire_is_local_wall_clock() {
        let daily = CronSchedule::parse("30 8 * * *").unwrap();
        let after = kyiv(2024, 1, 15, 12, 0).with_timezone(&Kyiv).naive_local();
        let next = daily.next_fire(after, Kyiv).unwrap();
        assert_eq!((next.day(), next.hour(), next.minute()), (16, 8, 30));
    }

    #[test]
    fn test_occurrence_in_spring_forward_gap_still_fires() {
        // Kyiv jumps from 03:00 to 04:00 on 2024-03-31.
        let daily = CronSchedule::parse("30 3 * * *").unwrap();
        let sent = kyiv(2024, 3, 30, 3, 30);

        let next = daily
            .next_fire(sent.with_timezone(&Kyiv).naive_local(), Kyiv)
            .unwrap();
        assert_eq!(
            next.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 3, 31, 1, 30, 0).unwrap()
        );

        assert!(!daily.is_due(Some(sent), kyiv(2024, 3, 31, 2, 0), Kyiv).unwrap());
        assert!(daily.is_due(Some(sent), kyiv(2024, 3, 31, 5, 0), Kyiv).unwrap());
        assert!(daily.is_due(Some(sent), kyiv(2024, 6, 1, 12, 0), Kyiv).unwrap());

        let fired = kyiv(2024, 3, 31, 4, 31);
        assert!(!daily.is_due(Some(fired), kyiv(2024, 3, 31, 23, 0), Kyiv).unwrap());
        assert!(daily.is_due(Some(fired), kyiv(2024, 4, 1, 3, 30), Kyiv).unwrap());
    }

    #[test]
    fn test_weekday_numbers_follow_classic_cron() {
        let weekdays = CronSchedule::parse("0 9 * * 1-5").unwrap();
        // 2024-05-11 is a Saturday.
        let after = kyiv(2024, 5, 11, 10, 0).with_timezone(&Kyiv).naive_local();
        let next = weekdays.next_fire(after, Kyiv).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);

        let sunday = CronSchedule::parse("0 9 * * 0").unwrap();
        let next = sunday.next_fire(after, Kyiv).unwrap();
        assert_eq!(next.weekday(), Weekday::Sun);
    }

    #[test]
    fn test_translate_day_of_week() {
        assert_eq!(translate_day_of_week("*"), "*");
        assert_eq!(translate_day_of_week("0"), "1");
        assert_eq!(translate_day_of_week("1-5"), "2-6");
        assert_eq!(translate_day_of_week("0-6"), "1-7");
        assert_eq!(translate_day_of_week("5-7"), "6-7,1");
        assert_eq!(translate_day_of_week("1,3"), "2,4");
        assert_eq!(translate_day_of_week("*/2"), "*/2");
        assert_eq!(translate_day_of_week("MON-FRI"), "MON-FRI");
    }
}
