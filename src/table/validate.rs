//! Schema validation: the last gate before a snapshot is persisted.
//!
//! Validation is strict about the header (exactly the snapshot columns, in order) and lenient about
//! cell types: compatible values are coerced in place. Every rule is checked for every row so one
//! run reports all problems at once.

use super::timestamp::{format_timestamp, parse_timestamp};
use super::unify::parse_count;
use super::{Cell, Column, ColumnType, Frame, UnifiedRecord};
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// Offending values shown per violation before the rest is elided.
const MAX_SHOWN: usize = 5;

/// A rule a column's values must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Check {
    NotNull,
    MinLength(usize),
    NonNegative,
    Type(ColumnType),
}

impl Display for Check {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotNull => write!(f, "not_nullable"),
            Self::MinLength(n) => write!(f, "str_length(min={n})"),
            Self::NonNegative => write!(f, "greater_than_or_equal_to(0)"),
            Self::Type(ty) => write!(f, "coerce_dtype('{ty}')"),
        }
    }
}

/// A problem with the frame's header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderProblem {
    Missing(Column),
    Unexpected(String),
    Duplicate(String),
    OutOfOrder { column: Column, position: usize },
}

impl Display for HeaderProblem {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Missing(column) => write!(f, "column '{column}' is missing"),
            Self::Unexpected(name) => write!(f, "column '{name}' is not in the schema"),
            Self::Duplicate(name) => write!(f, "column '{name}' appears more than once"),
            Self::OutOfOrder { column, position } => {
                write!(f, "column '{column}' is at position {position}, expected {}", *column as usize)
            }
        }
    }
}

/// All rows of one column that failed one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub column: Column,
    pub check: Check,

    /// Row index and offending value.
    pub failures: Vec<(usize, Cell)>,
}

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "column '{}' failed {} for {} row(s):", self.column, self.check, self.failures.len())?;
        for (row, value) in self.failures.iter().take(MAX_SHOWN) {
            write!(f, " [{row}] {value}")?;
        }

        if self.failures.len() > MAX_SHOWN {
            write!(f, " ...")?;
        }

        Ok(())
    }
}

/// Why a frame does not conform to the snapshot schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    header: Vec<HeaderProblem>,
    violations: Vec<Violation>,
}

impl SchemaError {
    #[must_use]
    pub fn header_problems(&self) -> &[HeaderProblem] {
        &self.header
    }

    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let count = self.header.len() + self.violations.len();
        write!(f, "schema validation failed with {count} problem(s)")?;

        for problem in &self.header {
            write!(f, "\n  - {problem}")?;
        }

        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }

        Ok(())
    }
}

impl core::error::Error for SchemaError {}

/// Check that `frame` matches the snapshot schema and convert its rows to records.
pub fn validate(frame: Frame) -> Result<Vec<UnifiedRecord>, SchemaError> {
    let (columns, rows) = frame.into_parts();

    let header = check_header(&columns);
    if !header.is_empty() {
        return Err(SchemaError {
            header,
            violations: Vec::new(),
        });
    }

    let mut failures: BTreeMap<(Column, Check), Vec<(usize, Cell)>> = BTreeMap::new();
    let mut records = Vec::with_capacity(rows.len());

    for (index, row) in rows.into_iter().enumerate() {
        let mut typed = Vec::with_capacity(Column::COUNT);
        for (column, cell) in Column::iter().zip(row) {
            match coerce(column, cell) {
                Ok(cell) => typed.push(cell),
                Err((check, cell)) => {
                    failures.entry((column, check)).or_default().push((index, cell));
                    typed.push(Cell::Null);
                }
            }
        }

        records.push(UnifiedRecord::from_typed_row(&typed));
    }

    if failures.is_empty() {
        return Ok(records);
    }

    Err(SchemaError {
        header: Vec::new(),
        violations: failures
            .into_iter()
            .map(|((column, check), failures)| Violation { column, check, failures })
            .collect(),
    })
}

fn check_header(columns: &[String]) -> Vec<HeaderProblem> {
    let mut problems = Vec::new();
    let mut seen = Vec::new();

    for name in columns {
        if seen.contains(&name) {
            problems.push(HeaderProblem::Duplicate(name.clone()));
        } else if Column::from_str(name).is_err() {
            problems.push(HeaderProblem::Unexpected(name.clone()));
        }
        seen.push(name);
    }

    for column in Column::iter() {
        match columns.iter().position(|name| name == column.name()) {
            None => problems.push(HeaderProblem::Missing(column)),
            Some(position) if position != column as usize => problems.push(HeaderProblem::OutOfOrder { column, position }),
            Some(_) => {}
        }
    }

    problems
}

/// Coerce one cell to its column's type, or report the check it fails along with the value.
fn coerce(column: Column, cell: Cell) -> Result<Cell, (Check, Cell)> {
    let ty = column.column_type();

    let coerced = match (ty, cell) {
        (_, Cell::Null) if column.nullable() => {
            return Ok(if ty == ColumnType::Str { Cell::Str(String::new()) } else { Cell::Null });
        }
        (_, Cell::Null) => return Err((Check::NotNull, Cell::Null)),

        (ColumnType::Str, Cell::Str(s)) => Cell::Str(s),
        (ColumnType::Str, Cell::Int(v)) => Cell::Str(v.to_string()),
        (ColumnType::Str, Cell::Timestamp(t)) => Cell::Str(format_timestamp(t)),

        (ColumnType::Int, Cell::Int(v)) => Cell::Int(v),
        (ColumnType::Int, Cell::Str(s)) => match parse_count(&s) {
            Some(v) => Cell::Int(v),
            None => return Err((Check::Type(ty), Cell::Str(s))),
        },

        (ColumnType::Timestamp, Cell::Timestamp(t)) => Cell::Timestamp(t),
        (ColumnType::Timestamp, Cell::Str(s)) if s.trim().is_empty() && column.nullable() => Cell::Null,
        (ColumnType::Timestamp, Cell::Str(s)) => match parse_timestamp(&s) {
            Some(t) => Cell::Timestamp(t),
            None => return Err((Check::Type(ty), Cell::Str(s))),
        },

        (_, other) => return Err((Check::Type(ty), other)),
    };

    let failed = match &coerced {
        Cell::Int(v) if *v < 0 => Some(Check::NonNegative),
        Cell::Str(s) if column.requires_text() && s.is_empty() => Some(Check::MinLength(1)),
        _ => None,
    };

    match failed {
        Some(check) => Err((check, coerced)),
        None => Ok(coerced),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::unify;
    use chrono::DateTime;
    use serde_json::json;

    fn foo_row() -> serde_json::Value {
        json!({
            "TECHNOLOGY": "Foo",
            "GITHUB_REPO": "org/foo",
            "GITHUB_STARS": 10,
            "GITHUB_FORKS": 2,
            "GITHUB_OPEN_ISSUES": 1,
            "GITHUB_DEFAULT_BRANCH": "main",
            "GITHUB_LATEST_RELEASED_AT": "2024-01-01T00:00:00Z",
            "GITHUB_LAST_COMMIT_AT": "2024-06-01T00:00:00Z",
            "PYPI_PACKAGE": "foo",
            "PYPI_DOWNLOADS_LAST_DAY": 5,
            "PYPI_DOWNLOADS_LAST_WEEK": 40,
            "PYPI_DOWNLOADS_LAST_MONTH": 150,
            "INGESTED_AT": "2024-06-02T10:00:00Z"
        })
    }

    fn schema_frame(rows: Vec<Vec<Cell>>) -> Frame {
        let mut frame = Frame::with_schema();
        for row in rows {
            frame.push_row(row).unwrap();
        }
        frame
    }

    fn valid_cells() -> Vec<Cell> {
        unify(&json!([foo_row()])).unwrap().rows()[0].clone()
    }

    #[test]
    fn test_valid_frame_passes() {
        let records = validate(unify(&json!([foo_row()])).unwrap()).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.technology, "Foo");
        assert_eq!(record.github_stars, 10);
        assert_eq!(record.github_watchers, 0);
        assert_eq!(record.github_default_branch, "main");
        assert_eq!(record.github_latest_released_at, DateTime::from_timestamp(1_704_067_200, 0));
        assert_eq!(record.github_last_commit_at, DateTime::from_timestamp(1_717_200_000, 0));
        assert_eq!(record.pypi_downloads_last_week, 40);
    }

    #[test]
    fn test_missing_and_extra_columns_are_reported() {
        let mut columns: Vec<String> = Column::iter().skip(1).map(|c| c.name().to_string()).collect();
        columns.push("LICENSE".to_string());

        let err = validate(Frame::new(columns)).unwrap_err();
        assert!(err.header_problems().contains(&HeaderProblem::Missing(Column::Technology)));
        assert!(err.header_problems().contains(&HeaderProblem::Unexpected("LICENSE".to_string())));
    }

    #[test]
    fn test_reordered_columns_are_reported() {
        let mut columns: Vec<String> = Column::iter().map(|c| c.name().to_string()).collect();
        columns.swap(0, 1);

        let err = validate(Frame::new(columns)).unwrap_err();
        assert_eq!(
            err.header_problems(),
            [
                HeaderProblem::OutOfOrder {
                    column: Column::Technology,
                    position: 1
                },
                HeaderProblem::OutOfOrder {
                    column: Column::GithubRepo,
                    position: 0
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_column_is_reported() {
        let mut columns: Vec<String> = Column::iter().map(|c| c.name().to_string()).collect();
        columns.push("TECHNOLOGY".to_string());

        let err = validate(Frame::new(columns)).unwrap_err();
        assert!(err.header_problems().contains(&HeaderProblem::Duplicate("TECHNOLOGY".to_string())));
    }

    #[test]
    fn test_empty_identity_strings_fail() {
        let mut cells = valid_cells();
        cells[Column::Technology as usize] = Cell::Str(String::new());
        cells[Column::PypiPackage as usize] = Cell::Null;

        let err = validate(schema_frame(vec![valid_cells(), cells])).unwrap_err();
        let violations = err.violations();
        assert_eq!(violations.len(), 2);

        assert_eq!(violations[0].column, Column::Technology);
        assert_eq!(violations[0].check, Check::MinLength(1));
        assert_eq!(violations[0].failures, [(1, Cell::Str(String::new()))]);

        assert_eq!(violations[1].column, Column::PypiPackage);
        assert_eq!(violations[1].check, Check::NotNull);
    }

    #[test]
    fn test_negative_counts_fail() {
        let mut cells = valid_cells();
        cells[Column::GithubForks as usize] = Cell::Int(-1);

        let err = validate(schema_frame(vec![cells])).unwrap_err();
        assert_eq!(err.violations()[0].check, Check::NonNegative);
        assert_eq!(err.violations()[0].column, Column::GithubForks);
    }

    #[test]
    fn test_null_ingested_at_fails() {
        let mut cells = valid_cells();
        cells[Column::IngestedAt as usize] = Cell::Null;

        let err = validate(schema_frame(vec![cells])).unwrap_err();
        assert_eq!(err.violations()[0].column, Column::IngestedAt);
        assert_eq!(err.violations()[0].check, Check::NotNull);
    }

    #[test]
    fn test_compatible_strings_are_coerced() {
        let mut cells = valid_cells();
        cells[Column::GithubStars as usize] = Cell::Str("12".to_string());
        cells[Column::GithubLastCommitAt as usize] = Cell::Str(String::new());
        cells[Column::IngestedAt as usize] = Cell::Str("2024-06-02 10:00:00".to_string());
        cells[Column::GithubDefaultBranch as usize] = Cell::Null;

        let records = validate(schema_frame(vec![cells])).unwrap();
        assert_eq!(records[0].github_stars, 12);
        assert_eq!(records[0].github_last_commit_at, None);
        assert_eq!(records[0].github_default_branch, "");
        assert_eq!(records[0].ingested_at, DateTime::from_timestamp(1_717_322_400, 0).unwrap());
    }

    #[test]
    fn test_incompatible_values_fail() {
        let mut cells = valid_cells();
        cells[Column::GithubStars as usize] = Cell::Str("many".to_string());
        cells[Column::GithubLatestReleasedAt as usize] = Cell::Int(5);

        let err = validate(schema_frame(vec![cells])).unwrap_err();
        let checks: Vec<_> = err.violations().iter().map(|v| (v.column, v.check)).collect();
        assert_eq!(
            checks,
            [
                (Column::GithubStars, Check::Type(ColumnType::Int)),
                (Column::GithubLatestReleasedAt, Check::Type(ColumnType::Timestamp)),
            ]
        );
    }

    #[test]
    fn test_error_message_lists_rows() {
        let mut bad = valid_cells();
        bad[Column::GithubRepo as usize] = Cell::Str(String::new());

        let err = validate(schema_frame(vec![valid_cells(), bad.clone(), bad])).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("schema validation failed with 1 problem(s)"));
        assert!(message.contains("column 'GITHUB_REPO' failed str_length(min=1) for 2 row(s): [1] \"\" [2] \"\""));
    }

    #[test]
    fn test_empty_frame_is_valid() {
        assert!(validate(Frame::with_schema()).unwrap().is_empty());
    }
}
