//! Range expansion: override resolution and per-query orchestration.
//!
//! [`ExpansionService`] answers one date-range query: it fetches one-time
//! events, recurring masters and override rows from the storage collaborator,
//! expands each master independently, and merges everything into a single
//! start-ordered list. Expansion results are computed fresh on every call and
//! never cached; identical inputs produce identical, order-stable output.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use log::warn;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Event, ExpansionLimits, InstanceOverride, Occurrence};
use crate::recurrence::{occurrences_between, GeneratedOccurrence};
use crate::rule::{self, RecurrenceRule};
use crate::store::CalendarStore;

/// Removes generated occurrences superseded by cancellations, modifications
/// or EXDATE exclusions.
///
/// Matching is by calendar day of the override's `original_start_at`, a
/// simplification carried for provider compatibility: two same-day
/// occurrences of one master cannot receive independent overrides. Duplicate
/// overrides for one day collapse into one suppression (first match wins).
/// The caller includes the non-canceled override rows themselves as
/// already-materialized occurrences, so a modified occurrence appears exactly
/// once, at its overridden time and content, never at its generated default.
pub fn resolve_overrides(
    master: &Event,
    generated: &[GeneratedOccurrence],
    overrides: &[InstanceOverride],
    exception_dates: &BTreeSet<NaiveDate>,
) -> Vec<Occurrence> {
    let mut superseded: HashSet<NaiveDate> = HashSet::with_capacity(overrides.len());
    for row in overrides {
        // Canceled and modified rows both suppress the generated default
        superseded.insert(row.original_start_at.date());
    }

    generated
        .iter()
        .filter(|occ| {
            let day = occ.start_at.date();
            !superseded.contains(&day) && !exception_dates.contains(&day)
        })
        .map(|occ| Occurrence::generated(master, occ.start_at, occ.end_at))
        .collect()
}

/// Expands one recurring master against its override group. Any failure here
/// is confined to this master by the caller.
fn expand_master(
    master: &Event,
    overrides: &[InstanceOverride],
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    limits: &ExpansionLimits,
) -> Result<Vec<Occurrence>, CoreError> {
    let parsed = RecurrenceRule::parse(&master.recurrence_rule)?;
    if parsed.monthly_byday_fallback() {
        warn!(
            "recurring event {}: MONTHLY BYDAY pattern approximated by plain month increments",
            master.id
        );
    }
    let exdates = rule::exception_dates(&master.recurrence_rule);
    let generated = occurrences_between(
        master.start_at,
        master.duration(),
        &parsed,
        range_start,
        range_end,
        limits,
    );
    Ok(resolve_overrides(master, &generated, overrides, &exdates))
}

/// Orchestrates date-range queries over a [`CalendarStore`].
///
/// The engine itself is pure and synchronous; only the three storage fetches
/// are awaited. Concurrent queries are safe, nothing is written back.
pub struct ExpansionService<S> {
    store: S,
    limits: ExpansionLimits,
}

impl<S: CalendarStore> ExpansionService<S> {
    pub fn new(store: S) -> Self {
        Self::with_limits(store, ExpansionLimits::default())
    }

    pub fn with_limits(store: S, limits: ExpansionLimits) -> Self {
        Self { store, limits }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Materializes every occurrence of the calendar falling inside
    /// `[range_start, range_end]`, ascending by start time.
    ///
    /// Equal starts keep the order [one-time events, generated occurrences,
    /// override rows] as produced; no further tie-break is defined. A master
    /// whose rule fails to parse is logged and contributes zero occurrences
    /// without aborting the rest of the query. Storage errors propagate
    /// unchanged.
    pub async fn expanded_events(
        &self,
        calendar_id: Uuid,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let singles = self
            .store
            .one_time_events(calendar_id, range_start, range_end)
            .await?;
        let masters = self.store.recurring_masters(calendar_id).await?;
        let overrides = self.store.instance_overrides(calendar_id).await?;

        let mut by_master: HashMap<Uuid, Vec<InstanceOverride>> = HashMap::new();
        for row in &overrides {
            by_master
                .entry(row.recurring_event_id)
                .or_default()
                .push(row.clone());
        }

        let mut occurrences: Vec<Occurrence> =
            singles.iter().map(Occurrence::from_single).collect();

        for master in &masters {
            let group = by_master
                .get(&master.id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            // Per-master isolation: one malformed rule must never prevent the
            // other masters or the one-time events from being returned
            match expand_master(master, group, range_start, range_end, &self.limits) {
                Ok(mut expanded) => occurrences.append(&mut expanded),
                Err(err) => warn!(
                    "recurring event {} ({}) contributes no occurrences: {}",
                    master.id, master.remote_id, err
                ),
            }
        }

        // Modified override rows are materialized at their own (moved) times,
        // in store order for stability
        for row in &overrides {
            if !row.deleted && row.start_at >= range_start && row.start_at <= range_end {
                occurrences.push(Occurrence::from_override(row));
            }
        }

        // Stable sort keeps the concatenation order on equal starts
        occurrences.sort_by_key(|o| o.start_at);
        Ok(occurrences)
    }
}
