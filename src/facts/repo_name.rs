use crate::Result;
use core::fmt::{Display, Formatter};
use core::str::FromStr;
use ohno::bail;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A GitHub repository identifier in `owner/repo` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName {
    owner: Arc<str>,
    repo: Arc<str>,
}

impl RepoName {
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let Some((owner, repo)) = trimmed.split_once('/') else {
            bail!("invalid repository identifier '{text}': expected 'owner/repo'");
        };

        let repo = repo.strip_suffix(".git").unwrap_or(repo);
        if owner.is_empty() || repo.is_empty() {
            bail!("invalid repository identifier '{text}': empty owner or repo name");
        }

        if repo.contains('/') {
            bail!("invalid repository identifier '{text}': too many path segments");
        }

        if owner.chars().chain(repo.chars()).any(char::is_whitespace) {
            bail!("invalid repository identifier '{text}': contains whitespace");
        }

        Ok(Self {
            owner: Arc::from(owner),
            repo: Arc::from(repo),
        })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn repo(&self) -> &str {
        &self.repo
    }
}

impl Display for RepoName {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for RepoName {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoName {
    type Error = ohno::AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoName> for String {
    fn from(value: RepoName) -> Self {
        value.to_string()
    }
}
