//! Unification of raw per-technology records into the snapshot columns.
//!
//! Raw records are JSON objects keyed by column name. Unification is forgiving: missing columns
//! are treated as null, unknown keys are dropped, and every value is coerced to its column's type
//! with a fixed defaulting rule. Counts that are null, non-numeric or negative become 0;
//! unparsable timestamps become null; null strings become empty.

use super::timestamp::parse_timestamp;
use super::{Cell, Column, ColumnType, Frame};
use crate::Result;
use ohno::bail;
use serde_json::{Map, Number, Value};
use strum::IntoEnumIterator;

/// A raw record as assembled by the collector.
pub type RawRecord = Map<String, Value>;

/// Unify a JSON array of raw records supplied from outside the collector.
///
/// This is the entry point for records produced by other tools. Fails if `value` is not an
/// array or if any element is not an object.
pub fn unify(value: &Value) -> Result<Frame> {
    let Value::Array(items) = value else {
        bail!("expected an array of records, found {}", kind(value));
    };

    let mut frame = Frame::with_schema();
    for (index, item) in items.iter().enumerate() {
        let Value::Object(record) = item else {
            bail!("record {index} is not an object: found {}", kind(item));
        };

        frame.push_row(unify_record(record))?;
    }

    Ok(frame)
}

/// Unify records that are already known to be objects.
#[must_use]
pub fn unify_records(records: &[RawRecord]) -> Frame {
    let mut frame = Frame::with_schema();
    for record in records {
        // unify_record always yields one cell per column
        let _ = frame.push_row(unify_record(record));
    }
    frame
}

fn unify_record(record: &RawRecord) -> Vec<Cell> {
    Column::iter()
        .map(|column| coerce(column, record.get(column.name()).unwrap_or(&Value::Null)))
        .collect()
}

fn coerce(column: Column, value: &Value) -> Cell {
    match column.column_type() {
        ColumnType::Int => Cell::Int(to_count(value)),
        ColumnType::Str => Cell::Str(to_text(value)),
        ColumnType::Timestamp => match value {
            Value::String(s) => parse_timestamp(s).map_or(Cell::Null, Cell::Timestamp),
            _ => Cell::Null,
        },
    }
}

fn to_count(value: &Value) -> i64 {
    let count = match value {
        Value::Number(n) => number_to_count(n),
        Value::String(s) => parse_count(s),
        _ => None,
    };

    count.unwrap_or(0).max(0)
}

fn number_to_count(n: &Number) -> Option<i64> {
    n.as_i64()
        .or_else(|| n.as_u64().map(|_| i64::MAX))
        .or_else(|| n.as_f64().and_then(truncate))
}

/// Parse a numeric string, accepting integers and decimals.
pub(super) fn parse_count(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>().ok().or_else(|| text.parse::<f64>().ok().and_then(truncate))
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "float to int casts saturate, which is the clamping we want"
)]
fn truncate(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use serde_json::json;

    fn cell(frame: &Frame, row: usize, column: Column) -> Cell {
        frame.rows()[row][column as usize].clone()
    }

    #[test]
    fn test_unify_full_record() {
        let raw = json!([{
            "TECHNOLOGY": "Foo",
            "GITHUB_REPO": "org/foo",
            "GITHUB_STARS": 10,
            "GITHUB_FORKS": 2,
            "GITHUB_WATCHERS": null,
            "GITHUB_OPEN_ISSUES": 1,
            "GITHUB_DEFAULT_BRANCH": "main",
            "GITHUB_LATEST_RELEASED_AT": "2024-01-01T00:00:00Z",
            "GITHUB_LAST_COMMIT_AT": "2024-06-01T00:00:00Z",
            "PYPI_PACKAGE": "foo",
            "PYPI_DOWNLOADS_LAST_DAY": 5,
            "PYPI_DOWNLOADS_LAST_WEEK": 40,
            "PYPI_DOWNLOADS_LAST_MONTH": 150,
            "INGESTED_AT": "2024-06-02T10:00:00+00:00"
        }]);

        let frame = unify(&raw).unwrap();
        assert_eq!(frame.len(), 1);
        assert_eq!(cell(&frame, 0, Column::Technology), Cell::Str("Foo".to_string()));
        assert_eq!(cell(&frame, 0, Column::GithubStars), Cell::Int(10));
        assert_eq!(cell(&frame, 0, Column::GithubWatchers), Cell::Int(0));
        assert_eq!(
            cell(&frame, 0, Column::GithubLatestReleasedAt),
            Cell::Timestamp(DateTime::from_timestamp(1_704_067_200, 0).unwrap())
        );
        assert_eq!(cell(&frame, 0, Column::PypiDownloadsLastMonth), Cell::Int(150));
    }

    #[test]
    fn test_missing_columns_are_synthesized() {
        let frame = unify(&json!([{"TECHNOLOGY": "Bare"}])).unwrap();
        let row = &frame.rows()[0];
        assert_eq!(row.len(), Column::COUNT);
        assert_eq!(cell(&frame, 0, Column::GithubRepo), Cell::Str(String::new()));
        assert_eq!(cell(&frame, 0, Column::GithubForks), Cell::Int(0));
        assert_eq!(cell(&frame, 0, Column::GithubLastCommitAt), Cell::Null);
        assert_eq!(cell(&frame, 0, Column::IngestedAt), Cell::Null);
    }

    #[test]
    fn test_extra_keys_are_dropped() {
        let frame = unify(&json!([{"TECHNOLOGY": "Foo", "LICENSE": "MIT"}])).unwrap();
        assert_eq!(frame.columns().len(), Column::COUNT);
        assert!(!frame.columns().iter().any(|c| c == "LICENSE"));
    }

    #[test]
    fn test_counts_are_never_negative() {
        let raw = json!([{
            "GITHUB_STARS": -5,
            "GITHUB_FORKS": "12",
            "GITHUB_WATCHERS": "lots",
            "GITHUB_OPEN_ISSUES": 3.9,
            "PYPI_DOWNLOADS_LAST_DAY": "-7.5",
            "PYPI_DOWNLOADS_LAST_WEEK": true,
            "PYPI_DOWNLOADS_LAST_MONTH": 18_446_744_073_709_551_615_u64
        }]);

        let frame = unify(&raw).unwrap();
        assert_eq!(cell(&frame, 0, Column::GithubStars), Cell::Int(0));
        assert_eq!(cell(&frame, 0, Column::GithubForks), Cell::Int(12));
        assert_eq!(cell(&frame, 0, Column::GithubWatchers), Cell::Int(0));
        assert_eq!(cell(&frame, 0, Column::GithubOpenIssues), Cell::Int(3));
        assert_eq!(cell(&frame, 0, Column::PypiDownloadsLastDay), Cell::Int(0));
        assert_eq!(cell(&frame, 0, Column::PypiDownloadsLastWeek), Cell::Int(0));
        assert_eq!(cell(&frame, 0, Column::PypiDownloadsLastMonth), Cell::Int(i64::MAX));

        for row in frame.rows() {
            for c in row {
                if let Cell::Int(v) = c {
                    assert!(*v >= 0);
                }
            }
        }
    }

    #[test]
    fn test_strings_are_coerced() {
        let frame = unify(&json!([{"TECHNOLOGY": 42, "GITHUB_DEFAULT_BRANCH": null, "PYPI_PACKAGE": false}])).unwrap();
        assert_eq!(cell(&frame, 0, Column::Technology), Cell::Str("42".to_string()));
        assert_eq!(cell(&frame, 0, Column::GithubDefaultBranch), Cell::Str(String::new()));
        assert_eq!(cell(&frame, 0, Column::PypiPackage), Cell::Str("false".to_string()));
    }

    #[test]
    fn test_unparsable_timestamps_become_null() {
        let frame = unify(&json!([{"GITHUB_LATEST_RELEASED_AT": "soon", "GITHUB_LAST_COMMIT_AT": 1_700_000_000}])).unwrap();
        assert_eq!(cell(&frame, 0, Column::GithubLatestReleasedAt), Cell::Null);
        assert_eq!(cell(&frame, 0, Column::GithubLastCommitAt), Cell::Null);
    }

    #[test]
    fn test_unify_rejects_non_array() {
        let err = unify(&json!({"TECHNOLOGY": "Foo"})).unwrap_err();
        assert!(err.to_string().contains("expected an array of records"));
    }

    #[test]
    fn test_unify_rejects_non_object_element() {
        let err = unify(&json!([{"TECHNOLOGY": "Foo"}, "Bar"])).unwrap_err();
        assert!(err.to_string().contains("record 1 is not an object"));
    }

    #[test]
    fn test_unify_empty() {
        assert!(unify(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_unify_is_deterministic() {
        let raw = json!([{"TECHNOLOGY": "Foo", "GITHUB_STARS": "7", "GITHUB_LAST_COMMIT_AT": "2024-06-01"}]);
        assert_eq!(unify(&raw).unwrap(), unify(&raw).unwrap());
    }

    #[test]
    fn test_unify_records_matches_unify() {
        let raw = json!([{"TECHNOLOGY": "Foo", "GITHUB_STARS": 3}]);
        let Value::Array(items) = &raw else { unreachable!() };
        let records: Vec<RawRecord> = items.iter().filter_map(|v| v.as_object().cloned()).collect();
        assert_eq!(unify_records(&records), unify(&raw).unwrap());
    }
}
