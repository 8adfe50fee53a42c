use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The columns of a snapshot, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Column {
    Technology,
    GithubRepo,
    GithubStars,
    GithubForks,
    GithubWatchers,
    GithubOpenIssues,
    GithubDefaultBranch,
    GithubLatestReleasedAt,
    GithubLastCommitAt,
    PypiPackage,
    PypiDownloadsLastDay,
    PypiDownloadsLastWeek,
    PypiDownloadsLastMonth,
    IngestedAt,
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ColumnType {
    #[strum(to_string = "string")]
    Str,
    #[strum(to_string = "int64")]
    Int,
    Timestamp,
}

impl Column {
    pub const COUNT: usize = 14;

    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub const fn column_type(self) -> ColumnType {
        match self {
            Self::Technology | Self::GithubRepo | Self::GithubDefaultBranch | Self::PypiPackage => ColumnType::Str,
            Self::GithubLatestReleasedAt | Self::GithubLastCommitAt | Self::IngestedAt => ColumnType::Timestamp,
            Self::GithubStars
            | Self::GithubForks
            | Self::GithubWatchers
            | Self::GithubOpenIssues
            | Self::PypiDownloadsLastDay
            | Self::PypiDownloadsLastWeek
            | Self::PypiDownloadsLastMonth => ColumnType::Int,
        }
    }

    /// Whether the column may hold null.
    ///
    /// A null default branch is stored as an empty string.
    #[must_use]
    pub const fn nullable(self) -> bool {
        matches!(
            self,
            Self::GithubDefaultBranch | Self::GithubLatestReleasedAt | Self::GithubLastCommitAt
        )
    }

    /// Whether the column must hold at least one character.
    #[must_use]
    pub const fn requires_text(self) -> bool {
        matches!(self, Self::Technology | Self::GithubRepo | Self::PypiPackage)
    }
}
