//! Bounded occurrence generation for parsed recurrence rules.
//!
//! The generator advances a structured [`RecurrenceRule`] forward from a
//! master's anchor start, emitting every start that falls inside the queried
//! range. Iteration is bounded three ways: by the rule's own COUNT/UNTIL, by
//! a fallback count when the rule carries neither, and by the unconditional
//! hard cap in [`ExpansionLimits`]. The loop therefore terminates even when
//! COUNT and UNTIL are both absent or malformed.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, Weekday};

use crate::models::ExpansionLimits;
use crate::rule::{Frequency, RecurrenceRule};

/// One generated occurrence, before override resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedOccurrence {
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
}

/// Generates the ordered, finite sequence of occurrences of `rule` anchored
/// at `anchor` that start inside `[range_start, range_end]`.
///
/// Iterations before `range_start` still count toward COUNT and the caps:
/// the walk always begins at the anchor, the range only clips what is
/// emitted. Arithmetic overflow while advancing ends the series quietly.
pub fn occurrences_between(
    anchor: NaiveDateTime,
    duration: Duration,
    rule: &RecurrenceRule,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    limits: &ExpansionLimits,
) -> Vec<GeneratedOccurrence> {
    let effective_count = rule.count.unwrap_or(limits.count_fallback);
    let mut occurrences = Vec::new();
    let mut current = anchor;
    let mut n: u32 = 0;

    while current <= range_end
        && rule.until.map_or(true, |until| current <= until)
        && n < effective_count
        && n < limits.iteration_cap
    {
        if current >= range_start {
            occurrences.push(GeneratedOccurrence {
                start_at: current,
                end_at: current + duration,
            });
        }
        let Some(next) = advance(current, rule) else {
            break;
        };
        current = next;
        n += 1;
    }

    occurrences
}

/// Advances one step per the rule's frequency. `None` means the date
/// arithmetic overflowed and the series is done.
fn advance(current: NaiveDateTime, rule: &RecurrenceRule) -> Option<NaiveDateTime> {
    let interval = rule.interval;
    match rule.frequency {
        Frequency::Daily => current.checked_add_signed(Duration::days(interval as i64)),
        Frequency::Weekly => {
            if rule.by_day.is_empty() {
                current.checked_add_signed(Duration::days(7 * interval as i64))
            } else {
                next_listed_weekday(current, &rule.by_day, interval)
            }
        }
        Frequency::Monthly => match rule.by_month_day {
            Some(day) => add_months_on_day(current, interval, day),
            // Covers both plain MONTHLY and the MONTHLY+BYDAY fallback: nth
            // weekday patterns are not computed, see
            // RecurrenceRule::monthly_byday_fallback
            None => current.checked_add_months(Months::new(interval)),
        },
        Frequency::Yearly => current.checked_add_months(Months::new(interval.checked_mul(12)?)),
    }
}

/// Moves to the next listed weekday strictly after `current`. Weeks are
/// Sunday-anchored; when no listed weekday remains in the current week the
/// walk jumps `interval` weeks ahead and resumes at the earliest listed day.
fn next_listed_weekday(
    current: NaiveDateTime,
    by_day: &[Weekday],
    interval: u32,
) -> Option<NaiveDateTime> {
    let offsets: BTreeSet<u32> = by_day.iter().map(|d| d.num_days_from_sunday()).collect();
    let today = current.weekday().num_days_from_sunday();

    if let Some(&next) = offsets.range(today + 1..).next() {
        return current.checked_add_signed(Duration::days((next - today) as i64));
    }

    let earliest = *offsets.iter().next()?;
    let week_start = current.checked_sub_signed(Duration::days(today as i64))?;
    week_start.checked_add_signed(Duration::days(7 * interval as i64 + earliest as i64))
}

/// Same day-of-month `interval` months later, clamped to the last valid day
/// of the target month on overflow (e.g. BYMONTHDAY=31 lands on Feb 29).
fn add_months_on_day(
    current: NaiveDateTime,
    interval: u32,
    day_of_month: u32,
) -> Option<NaiveDateTime> {
    let first_of_month = current.date().with_day(1)?;
    let shifted = first_of_month.checked_add_months(Months::new(interval))?;
    let day = day_of_month.clamp(1, last_day_of_month(shifted.year(), shifted.month()));
    let date = NaiveDate::from_ymd_opt(shifted.year(), shifted.month(), day)?;
    Some(date.and_time(current.time()))
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    // The 28th always exists; probe downward from 31 for the real last day
    (29..=31)
        .rev()
        .find(|&d| NaiveDate::from_ymd_opt(year, month, d).is_some())
        .unwrap_or(28)
}
