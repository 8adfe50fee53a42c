//! Dated snapshot files.
//!
//! A snapshot is written once, as CSV, to `tech_metrics_YYYYMMDD_HHMMSS.csv` in the snapshot
//! directory. The timestamp in the name is the run's collection instant in UTC. An existing file
//! is never overwritten or appended to.

mod csv;

pub use self::csv::{file_name, read, read_snapshot, write, write_snapshot};
