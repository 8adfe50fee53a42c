use super::Column;
use super::timestamp::format_timestamp;
use crate::Result;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use ohno::bail;
use strum::IntoEnumIterator;

/// A single value in a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Null,
    Int(i64),
    Str(String),
    Timestamp(DateTime<Utc>),
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Timestamp(t) => write!(f, "{}", format_timestamp(*t)),
        }
    }
}

/// An ordered header plus rows of cells, each row as wide as the header.
///
/// Frames are loosely typed: the unifier produces them from raw records and the snapshot reader
/// produces them from files. Only validation turns a frame into typed records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// An empty frame with the snapshot columns as its header.
    #[must_use]
    pub fn with_schema() -> Self {
        Self::new(Column::iter().map(|c| c.name().to_string()).collect())
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            bail!("row has {} cells but the frame has {} columns", row.len(), self.columns.len());
        }

        self.rows.push(row);
        Ok(())
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }
}
