use crate::facts::RepoName;
use serde::{Deserialize, Serialize};

/// A technology whose popularity signals are collected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrackedTechnology {
    /// Display name, written to the `TECHNOLOGY` column.
    pub name: String,

    #[serde(alias = "repo")]
    pub github_repo: RepoName,

    #[serde(alias = "package")]
    pub pypi_package: String,
}
