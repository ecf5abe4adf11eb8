//! Storage collaborator interface.
//!
//! The expansion engine consumes rows at this seam only; row-level
//! persistence (insert/update/delete, synchronization with providers) lives
//! outside the crate. Implementations surface their own failures through
//! [`CoreError::Storage`], which the service propagates unchanged.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Event, InstanceOverride};

#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// Non-deleted one-time events (empty recurrence rule) of the calendar
    /// whose start falls in `[range_start, range_end]`.
    async fn one_time_events(
        &self,
        calendar_id: Uuid,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<Vec<Event>, CoreError>;

    /// Non-deleted recurring masters (non-empty recurrence rule) of the
    /// calendar, regardless of range.
    async fn recurring_masters(&self, calendar_id: Uuid) -> Result<Vec<Event>, CoreError>;

    /// All override rows of the calendar, including canceled ones
    /// (`deleted = true` marks the occurrence canceled, not the row invalid).
    async fn instance_overrides(
        &self,
        calendar_id: Uuid,
    ) -> Result<Vec<InstanceOverride>, CoreError>;
}

/// Vec-backed store for tests, benches and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    events: Vec<Event>,
    overrides: Vec<InstanceOverride>,
}

impl InMemoryStore {
    pub fn new(events: Vec<Event>, overrides: Vec<InstanceOverride>) -> Self {
        Self { events, overrides }
    }

    pub fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn push_override(&mut self, row: InstanceOverride) {
        self.overrides.push(row);
    }
}

#[async_trait]
impl CalendarStore for InMemoryStore {
    async fn one_time_events(
        &self,
        calendar_id: Uuid,
        range_start: NaiveDateTime,
        range_end: NaiveDateTime,
    ) -> Result<Vec<Event>, CoreError> {
        Ok(self
            .events
            .iter()
            .filter(|e| {
                e.calendar_id == calendar_id
                    && !e.deleted
                    && !e.is_recurring()
                    && e.start_at >= range_start
                    && e.start_at <= range_end
            })
            .cloned()
            .collect())
    }

    async fn recurring_masters(&self, calendar_id: Uuid) -> Result<Vec<Event>, CoreError> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.calendar_id == calendar_id && !e.deleted && e.is_recurring())
            .cloned()
            .collect())
    }

    async fn instance_overrides(
        &self,
        calendar_id: Uuid,
    ) -> Result<Vec<InstanceOverride>, CoreError> {
        Ok(self
            .overrides
            .iter()
            .filter(|o| o.calendar_id == calendar_id)
            .cloned()
            .collect())
    }
}
