//! # Agenda Core Library
//!
//! A recurring calendar event expansion engine: given stored recurrence
//! definitions (iCalendar-style RRULE plus EXDATE exclusions) and
//! per-instance override rows (moved, edited or canceled occurrences), it
//! materializes the concrete occurrences falling inside an arbitrary queried
//! date range.
//!
//! ## Features
//!
//! - **Bounded rule interpretation**: DAILY/WEEKLY/MONTHLY/YEARLY with
//!   INTERVAL, COUNT, UNTIL, BYDAY and BYMONTHDAY, always terminated by a
//!   hard iteration cap regardless of rule correctness
//! - **Three-way merge**: generated occurrences, explicit exceptions and
//!   cancellations combined so each occurrence appears exactly once
//! - **Failure isolation**: one malformed master never aborts a query; it is
//!   logged and contributes zero occurrences
//! - **Pure expansion**: results are recomputed per query, never cached, and
//!   inputs are never mutated
//!
//! ## Core Modules
//!
//! - [`models`]: event, override and occurrence data structures
//! - [`rule`]: the RRULE/EXDATE wire-format grammar
//! - [`recurrence`]: bounded occurrence generation
//! - [`expansion`]: override resolution and query orchestration
//! - [`store`]: the storage collaborator interface
//! - [`error`]: error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use agenda_core::{
//!     expansion::ExpansionService,
//!     models::Event,
//!     store::InMemoryStore,
//! };
//! use chrono::NaiveDate;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let calendar_id = Uuid::now_v7();
//!     let mut store = InMemoryStore::default();
//!     store.push_event(Event {
//!         id: Uuid::now_v7(),
//!         remote_id: "prov-123".to_string(),
//!         calendar_id,
//!         title: "Daily standup".to_string(),
//!         description: None,
//!         location: None,
//!         start_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 0, 0).unwrap(),
//!         end_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(10, 15, 0).unwrap(),
//!         recurrence_rule: "RRULE:FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR".to_string(),
//!         deleted: false,
//!     });
//!
//!     let service = ExpansionService::new(store);
//!     let occurrences = service
//!         .expanded_events(
//!             calendar_id,
//!             NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
//!             NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().and_hms_opt(23, 59, 59).unwrap(),
//!         )
//!         .await?;
//!     println!("{} occurrences in January", occurrences.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod expansion;
pub mod models;
pub mod recurrence;
pub mod rule;
pub mod store;
