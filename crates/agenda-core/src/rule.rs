//! Wire-format grammar for stored recurrence text.
//!
//! A recurrence string contains one or more lines separated by
//! [`LINE_SEPARATOR`]; each line is either `RRULE:<key=value;...>` or
//! `EXDATE[;TZID=...]:<comma-separated-date-tokens>`. The format is inherited
//! from upstream calendar providers and must be accepted byte-for-byte as
//! they emit it. Parsing happens exactly once per master per query; the
//! generator only ever sees the structured [`RecurrenceRule`].

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;

/// Fixed separator between RRULE/EXDATE lines in stored recurrence text.
pub const LINE_SEPARATOR: &str = "\n";

const RRULE_MARKER: &str = "RRULE:";
const EXDATE_MARKER: &str = "EXDATE";

/// Recurrence frequency. Only the four frequencies emitted by the supported
/// providers are recognized; anything else makes the whole rule unparseable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

/// Structured form of one RRULE line.
///
/// Produced once by [`RecurrenceRule::parse`] and consumed by the occurrence
/// generator; the raw text is never re-interpreted downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    /// Step between occurrences in frequency units, always >= 1
    pub interval: u32,
    /// Advisory occurrence count; generation is additionally bounded by the
    /// hard iteration cap even when this is present and wrong
    pub count: Option<u32>,
    /// Inclusive end of the series
    pub until: Option<NaiveDateTime>,
    /// Weekday constraint for WEEKLY rules, in wire order
    pub by_day: Vec<Weekday>,
    /// Day-of-month constraint for MONTHLY rules
    pub by_month_day: Option<u32>,
}

impl RecurrenceRule {
    /// Parses the RRULE line out of stored recurrence text.
    ///
    /// Returns [`CoreError::UnparseableRule`] when no RRULE line exists or its
    /// FREQ is missing/unknown; the caller treats such a master as
    /// contributing zero occurrences for the query. Malformed UNTIL, BYDAY,
    /// INTERVAL and COUNT tokens are dropped individually and do not fail the
    /// rule.
    pub fn parse(rule_text: &str) -> Result<Self, CoreError> {
        let line = rule_text
            .split(LINE_SEPARATOR)
            .map(str::trim)
            .find(|l| l.starts_with(RRULE_MARKER))
            .ok_or_else(|| CoreError::UnparseableRule("no RRULE line".to_string()))?;

        let mut frequency: Option<Frequency> = None;
        let mut interval: u32 = 1;
        let mut count: Option<u32> = None;
        let mut until: Option<NaiveDateTime> = None;
        let mut by_day: Vec<Weekday> = Vec::new();
        let mut by_month_day: Option<u32> = None;

        for part in line[RRULE_MARKER.len()..].split(';') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key {
                "FREQ" => {
                    frequency = Some(value.parse::<Frequency>().map_err(|e| {
                        CoreError::UnparseableRule(e.to_string())
                    })?);
                }
                "INTERVAL" => {
                    // Non-positive intervals clamp to 1, non-numeric are dropped
                    if let Ok(n) = value.parse::<i64>() {
                        interval = n.max(1).min(u32::MAX as i64) as u32;
                    } else {
                        log::debug!("ignoring non-numeric INTERVAL token: {value}");
                    }
                }
                "COUNT" => {
                    if let Ok(n) = value.parse::<u32>() {
                        count = Some(n);
                    } else {
                        log::debug!("ignoring non-numeric COUNT token: {value}");
                    }
                }
                "UNTIL" => match parse_datetime_token(value) {
                    Ok(dt) => until = Some(dt),
                    Err(err) => log::debug!("dropping UNTIL token: {err}"),
                },
                "BYDAY" => {
                    for code in value.split(',') {
                        match parse_weekday_code(code) {
                            Some(day) => by_day.push(day),
                            // Ordinal forms such as "1MO" are not supported
                            None => log::debug!("skipping BYDAY token: {code}"),
                        }
                    }
                }
                "BYMONTHDAY" => {
                    if let Ok(n) = value.parse::<u32>() {
                        by_month_day = Some(n);
                    } else {
                        log::debug!("ignoring non-numeric BYMONTHDAY token: {value}");
                    }
                }
                _ => {}
            }
        }

        let frequency = frequency
            .ok_or_else(|| CoreError::UnparseableRule("missing FREQ".to_string()))?;

        Ok(Self {
            frequency,
            interval,
            count,
            until,
            by_day,
            by_month_day,
        })
    }

    /// True when this rule is MONTHLY with a BYDAY constraint and no
    /// BYMONTHDAY. Nth-weekday-of-month semantics are not computed; the
    /// generator falls back to a plain month increment, and callers can use
    /// this flag to detect the approximation rather than silently receiving
    /// wrong dates.
    pub fn monthly_byday_fallback(&self) -> bool {
        self.frequency == Frequency::Monthly
            && self.by_month_day.is_none()
            && !self.by_day.is_empty()
    }
}

/// Extracts every explicitly excluded calendar date from stored recurrence
/// text.
///
/// Scans all EXDATE lines (an optional `;TZID=...` parameter before the colon
/// is recognized and ignored), splitting each value on `,`. Timestamps are
/// truncated to their calendar date; exclusion matches by day, not by exact
/// time. Unparseable tokens are skipped individually and never invalidate the
/// rest of the set.
pub fn exception_dates(rule_text: &str) -> BTreeSet<NaiveDate> {
    let mut dates = BTreeSet::new();
    for line in rule_text.split(LINE_SEPARATOR) {
        let Some(rest) = line.trim().strip_prefix(EXDATE_MARKER) else {
            continue;
        };
        // Only EXDATE: and EXDATE;TZID=...: lines qualify
        if !(rest.starts_with(':') || rest.starts_with(';')) {
            continue;
        }
        let Some((_, value)) = rest.split_once(':') else {
            continue;
        };
        for token in value.split(',') {
            match parse_date_token(token.trim()) {
                Ok(date) => {
                    dates.insert(date);
                }
                Err(err) => log::debug!("skipping EXDATE token: {err}"),
            }
        }
    }
    dates
}

/// Parses a wire date token to a calendar date.
///
/// Accepts an 8-character `YYYYMMDD` date or a >= 15-character
/// `YYYYMMDDTHHMMSS[Z]` timestamp, discarding the time-of-day.
pub fn parse_date_token(token: &str) -> Result<NaiveDate, CoreError> {
    let digits = match token.len() {
        8 => token,
        n if n >= 15 => token
            .get(..8)
            .ok_or_else(|| CoreError::InvalidDate(token.to_string()))?,
        _ => return Err(CoreError::InvalidDate(token.to_string())),
    };
    NaiveDate::parse_from_str(digits, "%Y%m%d")
        .map_err(|_| CoreError::InvalidDate(token.to_string()))
}

/// Parses a wire date token to a date/time.
///
/// A bare `YYYYMMDD` date becomes midnight of that day; a 15-16 character
/// `YYYYMMDDTHHMMSS[Z]` timestamp keeps its time-of-day (a trailing `Z` is
/// accepted and ignored, instants are not timezone-adjusted).
pub fn parse_datetime_token(token: &str) -> Result<NaiveDateTime, CoreError> {
    let bare = token.strip_suffix('Z').unwrap_or(token);
    match bare.len() {
        8 => {
            let date = NaiveDate::parse_from_str(bare, "%Y%m%d")
                .map_err(|_| CoreError::InvalidDate(token.to_string()))?;
            Ok(date.and_hms_opt(0, 0, 0).unwrap())
        }
        15 => NaiveDateTime::parse_from_str(bare, "%Y%m%dT%H%M%S")
            .map_err(|_| CoreError::InvalidDate(token.to_string())),
        _ => Err(CoreError::InvalidDate(token.to_string())),
    }
}

fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code {
        "SU" => Some(Weekday::Sun),
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod rule_parsing_tests {
        use super::*;

        #[test]
        fn test_parse_daily_with_count() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=DAILY;INTERVAL=2;COUNT=10").unwrap();
            assert_eq!(rule.frequency, Frequency::Daily);
            assert_eq!(rule.interval, 2);
            assert_eq!(rule.count, Some(10));
            assert_eq!(rule.until, None);
            assert!(rule.by_day.is_empty());
        }

        #[test]
        fn test_parse_weekly_byday() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR").unwrap();
            assert_eq!(rule.frequency, Frequency::Weekly);
            assert_eq!(rule.interval, 1);
            assert_eq!(rule.by_day, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
        }

        #[test]
        fn test_parse_monthly_bymonthday() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=MONTHLY;BYMONTHDAY=31").unwrap();
            assert_eq!(rule.frequency, Frequency::Monthly);
            assert_eq!(rule.by_month_day, Some(31));
            assert!(!rule.monthly_byday_fallback());
        }

        #[test]
        fn test_parse_until_date_and_timestamp() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=DAILY;UNTIL=20240115").unwrap();
            assert_eq!(
                rule.until,
                Some(
                    NaiveDate::from_ymd_opt(2024, 1, 15)
                        .unwrap()
                        .and_hms_opt(0, 0, 0)
                        .unwrap()
                )
            );

            let rule = RecurrenceRule::parse("RRULE:FREQ=DAILY;UNTIL=20240115T103000Z").unwrap();
            assert_eq!(
                rule.until,
                Some(
                    NaiveDate::from_ymd_opt(2024, 1, 15)
                        .unwrap()
                        .and_hms_opt(10, 30, 0)
                        .unwrap()
                )
            );
        }

        #[test]
        fn test_bad_until_is_dropped_not_fatal() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=DAILY;UNTIL=garbage;COUNT=3").unwrap();
            assert_eq!(rule.until, None);
            assert_eq!(rule.count, Some(3));
        }

        #[test]
        fn test_missing_or_unknown_freq_is_unparseable() {
            assert!(matches!(
                RecurrenceRule::parse("RRULE:INTERVAL=2"),
                Err(CoreError::UnparseableRule(_))
            ));
            assert!(matches!(
                RecurrenceRule::parse("RRULE:FREQ=HOURLY"),
                Err(CoreError::UnparseableRule(_))
            ));
            assert!(matches!(
                RecurrenceRule::parse("not a rule at all"),
                Err(CoreError::UnparseableRule(_))
            ));
        }

        #[test]
        fn test_nonpositive_interval_clamps_to_one() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=DAILY;INTERVAL=0").unwrap();
            assert_eq!(rule.interval, 1);
            let rule = RecurrenceRule::parse("RRULE:FREQ=DAILY;INTERVAL=-4").unwrap();
            assert_eq!(rule.interval, 1);
        }

        #[test]
        fn test_ordinal_byday_tokens_are_skipped() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=MONTHLY;BYDAY=1MO,WE").unwrap();
            assert_eq!(rule.by_day, vec![Weekday::Wed]);
        }

        #[test]
        fn test_monthly_byday_fallback_flag() {
            let rule = RecurrenceRule::parse("RRULE:FREQ=MONTHLY;BYDAY=MO").unwrap();
            assert!(rule.monthly_byday_fallback());
            // BYMONTHDAY takes precedence over the fallback
            let rule = RecurrenceRule::parse("RRULE:FREQ=MONTHLY;BYDAY=MO;BYMONTHDAY=5").unwrap();
            assert!(!rule.monthly_byday_fallback());
        }

        #[test]
        fn test_rrule_found_among_exdate_lines() {
            let text = "EXDATE:20240105\nRRULE:FREQ=WEEKLY\nEXDATE:20240112";
            let rule = RecurrenceRule::parse(text).unwrap();
            assert_eq!(rule.frequency, Frequency::Weekly);
        }
    }

    mod exception_date_tests {
        use super::*;

        fn date(y: i32, m: u32, d: u32) -> NaiveDate {
            NaiveDate::from_ymd_opt(y, m, d).unwrap()
        }

        #[test]
        fn test_single_line_multiple_tokens() {
            let dates = exception_dates("RRULE:FREQ=DAILY\nEXDATE:20240103,20240105");
            assert_eq!(
                dates.into_iter().collect::<Vec<_>>(),
                vec![date(2024, 1, 3), date(2024, 1, 5)]
            );
        }

        #[test]
        fn test_tzid_parameter_is_ignored() {
            let dates = exception_dates("EXDATE;TZID=America/New_York:20240214T090000");
            assert!(dates.contains(&date(2024, 2, 14)));
        }

        #[test]
        fn test_timestamp_truncates_to_date() {
            let dates = exception_dates("EXDATE:20240301T234500Z");
            assert!(dates.contains(&date(2024, 3, 1)));
        }

        #[test]
        fn test_bad_tokens_skipped_individually() {
            let dates = exception_dates("EXDATE:oops,20240110,123");
            assert_eq!(dates.len(), 1);
            assert!(dates.contains(&date(2024, 1, 10)));
        }

        #[test]
        fn test_multiple_exdate_lines_accumulate() {
            let text = "RRULE:FREQ=DAILY\nEXDATE:20240101\nEXDATE;TZID=UTC:20240202";
            let dates = exception_dates(text);
            assert_eq!(dates.len(), 2);
        }

        #[test]
        fn test_no_exdate_lines_yields_empty_set() {
            assert!(exception_dates("RRULE:FREQ=DAILY").is_empty());
            assert!(exception_dates("").is_empty());
            // EXDATES (different property name) must not match
            assert!(exception_dates("EXDATES:20240101").is_empty());
        }
    }

    mod date_token_tests {
        use super::*;

        #[test]
        fn test_date_token_lengths() {
            assert!(parse_date_token("20240115").is_ok());
            assert!(parse_date_token("20240115T103000").is_ok());
            assert!(parse_date_token("20240115T103000Z").is_ok());
            assert!(matches!(
                parse_date_token("2024011"),
                Err(CoreError::InvalidDate(_))
            ));
        }

        #[test]
        fn test_datetime_token_rejects_odd_lengths() {
            assert!(parse_datetime_token("20240115T1030").is_err());
            assert!(parse_datetime_token("").is_err());
        }

        #[test]
        fn test_invalid_calendar_date_rejected() {
            assert!(parse_date_token("20240230").is_err());
            assert!(parse_datetime_token("20241301T000000").is_err());
        }
    }
}
