use super::{Cell, Column, Frame};
use chrono::{DateTime, Utc};
use strum::IntoEnumIterator;

/// One validated row of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedRecord {
    pub technology: String,
    pub github_repo: String,
    pub github_stars: i64,
    pub github_forks: i64,
    pub github_watchers: i64,
    pub github_open_issues: i64,
    /// Empty when the repository reported none.
    pub github_default_branch: String,
    pub github_latest_released_at: Option<DateTime<Utc>>,
    pub github_last_commit_at: Option<DateTime<Utc>>,
    pub pypi_package: String,
    pub pypi_downloads_last_day: i64,
    pub pypi_downloads_last_week: i64,
    pub pypi_downloads_last_month: i64,
    pub ingested_at: DateTime<Utc>,
}

impl UnifiedRecord {
    /// The value of one column.
    #[must_use]
    pub fn cell(&self, column: Column) -> Cell {
        let text = |s: &str| Cell::Str(s.to_string());
        let instant = |t: Option<DateTime<Utc>>| t.map_or(Cell::Null, Cell::Timestamp);

        match column {
            Column::Technology => text(&self.technology),
            Column::GithubRepo => text(&self.github_repo),
            Column::GithubStars => Cell::Int(self.github_stars),
            Column::GithubForks => Cell::Int(self.github_forks),
            Column::GithubWatchers => Cell::Int(self.github_watchers),
            Column::GithubOpenIssues => Cell::Int(self.github_open_issues),
            Column::GithubDefaultBranch => text(&self.github_default_branch),
            Column::GithubLatestReleasedAt => instant(self.github_latest_released_at),
            Column::GithubLastCommitAt => instant(self.github_last_commit_at),
            Column::PypiPackage => text(&self.pypi_package),
            Column::PypiDownloadsLastDay => Cell::Int(self.pypi_downloads_last_day),
            Column::PypiDownloadsLastWeek => Cell::Int(self.pypi_downloads_last_week),
            Column::PypiDownloadsLastMonth => Cell::Int(self.pypi_downloads_last_month),
            Column::IngestedAt => Cell::Timestamp(self.ingested_at),
        }
    }

    /// All values in column order.
    #[must_use]
    pub fn cells(&self) -> Vec<Cell> {
        Column::iter().map(|c| self.cell(c)).collect()
    }

    /// Build a record from a row whose cells already carry their column's type.
    pub(super) fn from_typed_row(row: &[Cell]) -> Self {
        let get = |column: Column| row.get(column as usize).unwrap_or(&Cell::Null);
        let text = |column| match get(column) {
            Cell::Str(s) => s.clone(),
            _ => String::new(),
        };
        let count = |column| match get(column) {
            Cell::Int(v) => *v,
            _ => 0,
        };
        let instant = |column| match get(column) {
            Cell::Timestamp(t) => Some(*t),
            _ => None,
        };

        Self {
            technology: text(Column::Technology),
            github_repo: text(Column::GithubRepo),
            github_stars: count(Column::GithubStars),
            github_forks: count(Column::GithubForks),
            github_watchers: count(Column::GithubWatchers),
            github_open_issues: count(Column::GithubOpenIssues),
            github_default_branch: text(Column::GithubDefaultBranch),
            github_latest_released_at: instant(Column::GithubLatestReleasedAt),
            github_last_commit_at: instant(Column::GithubLastCommitAt),
            pypi_package: text(Column::PypiPackage),
            pypi_downloads_last_day: count(Column::PypiDownloadsLastDay),
            pypi_downloads_last_week: count(Column::PypiDownloadsLastWeek),
            pypi_downloads_last_month: count(Column::PypiDownloadsLastMonth),
            ingested_at: instant(Column::IngestedAt).unwrap_or_default(),
        }
    }
}

/// The validated output of one collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    collected_at: DateTime<Utc>,
    records: Vec<UnifiedRecord>,
}

impl Snapshot {
    #[must_use]
    pub const fn new(collected_at: DateTime<Utc>, records: Vec<UnifiedRecord>) -> Self {
        Self { collected_at, records }
    }

    /// When the run started; this names the snapshot file.
    #[must_use]
    pub const fn collected_at(&self) -> DateTime<Utc> {
        self.collected_at
    }

    #[must_use]
    pub fn records(&self) -> &[UnifiedRecord] {
        &self.records
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records as a frame with the snapshot header.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::with_schema();
        for record in &self.records {
            // Every record yields exactly one cell per column.
            let _ = frame.push_row(record.cells());
        }
        frame
    }
}
