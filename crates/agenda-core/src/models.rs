use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored calendar event row.
///
/// An `Event` with a non-empty [`recurrence_rule`](Event::recurrence_rule) is
/// a recurring master: it is never returned as an occurrence itself, only its
/// expansions and override rows are. An `Event` with an empty rule is a
/// one-time event and represents a single occurrence directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Primary key, UUIDv7 for time-ordered performance
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    /// Stable identifier assigned by the upstream calendar provider
    pub remote_id: String,
    #[serde(with = "uuid::serde::compact")]
    pub calendar_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Start of the first (or only) occurrence
    pub start_at: NaiveDateTime,
    /// End of the first (or only) occurrence; `end_at - start_at` defines the
    /// canonical duration applied to every generated occurrence
    pub end_at: NaiveDateTime,
    /// Raw recurrence text: one RRULE line plus zero or more EXDATE lines,
    /// empty for one-time events
    pub recurrence_rule: String,
    pub deleted: bool,
}

impl Event {
    /// Returns true if this row defines a recurring series.
    pub fn is_recurring(&self) -> bool {
        !self.recurrence_rule.trim().is_empty()
    }

    /// Canonical occurrence duration.
    pub fn duration(&self) -> chrono::Duration {
        self.end_at - self.start_at
    }
}

/// A stored deviation for one occurrence of a recurring master.
///
/// `deleted = true` means the referenced occurrence is canceled, not that the
/// row is invalid. `deleted = false` means the occurrence was moved or edited
/// and this row carries its effective content and times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceOverride {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    /// Stable identifier assigned by the upstream calendar provider
    pub remote_id: String,
    #[serde(with = "uuid::serde::compact")]
    pub calendar_id: Uuid,
    /// The master this override supersedes one occurrence of
    #[serde(with = "uuid::serde::compact")]
    pub recurring_event_id: Uuid,
    /// Scheduled time of the generated occurrence being superseded; matching
    /// against generated occurrences is by calendar day of this value
    pub original_start_at: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Effective start, possibly different from `original_start_at`
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    /// This specific occurrence is canceled
    pub deleted: bool,
}

/// Where an expanded occurrence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceSource {
    /// A one-time event returned as-is
    Single {
        #[serde(with = "uuid::serde::compact")]
        event_id: Uuid,
    },
    /// Generated by expanding a recurring master's rule
    Generated {
        #[serde(with = "uuid::serde::compact")]
        master_id: Uuid,
    },
    /// A modified override row materialized at its own time
    Override {
        #[serde(with = "uuid::serde::compact")]
        master_id: Uuid,
        #[serde(with = "uuid::serde::compact")]
        override_id: Uuid,
    },
}

/// One concrete calendar instance inside a queried range.
///
/// Computed fresh on every query and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occurrence {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub source: OccurrenceSource,
}

impl Occurrence {
    /// Materialize a one-time event.
    pub fn from_single(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_at: event.start_at,
            end_at: event.end_at,
            source: OccurrenceSource::Single { event_id: event.id },
        }
    }

    /// Materialize one generated expansion of a recurring master.
    pub fn generated(master: &Event, start_at: NaiveDateTime, end_at: NaiveDateTime) -> Self {
        Self {
            title: master.title.clone(),
            description: master.description.clone(),
            location: master.location.clone(),
            start_at,
            end_at,
            source: OccurrenceSource::Generated { master_id: master.id },
        }
    }

    /// Materialize a modified override row at its own time and content.
    pub fn from_override(row: &InstanceOverride) -> Self {
        Self {
            title: row.title.clone(),
            description: row.description.clone(),
            location: row.location.clone(),
            start_at: row.start_at,
            end_at: row.end_at,
            source: OccurrenceSource::Override {
                master_id: row.recurring_event_id,
                override_id: row.id,
            },
        }
    }
}

/// Bounds applied to occurrence generation.
///
/// `iteration_cap` is enforced unconditionally, independent of COUNT/UNTIL
/// correctness, so that every rule terminates. Hitting it silently truncates
/// the series; it is an availability guarantee, not a failure.
#[derive(Debug, Clone)]
pub struct ExpansionLimits {
    /// Iteration limit applied when the rule carries no COUNT
    pub count_fallback: u32,
    /// Hard safety cap, always enforced
    pub iteration_cap: u32,
}

impl Default for ExpansionLimits {
    fn default() -> Self {
        Self {
            count_fallback: 1000,
            iteration_cap: 10_000,
        }
    }
}
