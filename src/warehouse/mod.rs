//! Loading snapshots into a warehouse table.
//!
//! The [`WarehouseLoader`] owns its connection and creates the target table when it does not
//! exist. [`SqlApiLoader`] talks to Snowflake's SQL API over HTTPS.

mod snowflake;

use crate::Result;
use crate::table::Snapshot;
use ohno::bail;
use regex::Regex;
use std::sync::LazyLock;

pub use snowflake::{SnowflakeOptions, SqlApiLoader};

/// Table loaded when none is configured.
pub const DEFAULT_TABLE: &str = "TECH_METRICS";

static TABLE_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*){0,2}$").expect("invalid regex")
});

/// A destination for snapshot rows.
pub trait WarehouseLoader {
    /// Append the snapshot's rows to `table`, or to [`DEFAULT_TABLE`].
    fn load(&self, snapshot: &Snapshot, table: Option<&str>) -> impl Future<Output = Result<()>> + Send;
}

/// Accept plain and `database.schema.table` qualified identifiers only.
pub fn validate_table_name(name: &str) -> Result<()> {
    if !TABLE_NAME_REGEX.is_match(name) {
        bail!("invalid warehouse table name '{name}'");
    }

    Ok(())
}
