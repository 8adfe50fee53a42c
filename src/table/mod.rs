//! The snapshot table.
//!
//! Raw records from the collector are unified into a [`Frame`] with the fixed snapshot columns,
//! then validated into typed [`UnifiedRecord`]s. Snapshot files are read back into frames and go
//! through the same validation.

mod column;
mod frame;
mod record;
mod timestamp;
mod unify;
mod validate;

pub use column::{Column, ColumnType};
pub use frame::{Cell, Frame};
pub use record::{Snapshot, UnifiedRecord};
pub use timestamp::{format_timestamp, parse_timestamp};
pub use unify::{RawRecord, unify, unify_records};
pub use validate::{Check, HeaderProblem, SchemaError, Violation, validate};
