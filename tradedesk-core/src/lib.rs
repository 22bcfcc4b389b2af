//! Tradedesk Core: configuration records, schemas and client-side state logic.
//!
//! This crate is IO-free and holds the pieces the editing client is built on:
//! - Configuration records and field values
//! - Per-resource schemas (defaults, validation tables, search fields)
//! - Declarative validation engine
//! - Current/original snapshot pair for dirty tracking
//! - TTL cache and debouncer over an injectable clock
//! - List filtering and sorting
//! - Dashboard widget configurations and CSV export

pub mod cache;
pub mod clock;
pub mod debounce;
pub mod listing;
pub mod record;
pub mod schema;
pub mod snapshot;
pub mod validation;
pub mod widget;

pub use cache::{TtlCache, DEFAULT_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use debounce::{Debouncer, DEFAULT_QUIET_PERIOD};
pub use listing::{CategoryFilter, ListQuery, SortDirection, SortSpec};
pub use record::{ConfigRecord, ConfigValue, RecordError};
pub use schema::ResourceKind;
pub use snapshot::SnapshotPair;
pub use validation::{validate, FieldRule, Rule, ValidationErrors};
pub use widget::{ChartKind, ExportSheet, Widget, WidgetConfig};
