//! Response payloads of the GitHub endpoints we call.
//!
//! Only the fields we need are declared and every one of them is optional: a missing or null
//! value is a normal answer from the API and gets defaulted when the record is unified.

use serde::Deserialize;

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub stargazers_count: Option<i64>,
    pub forks_count: Option<i64>,
    pub subscribers_count: Option<i64>,
    pub watchers_count: Option<i64>,
    pub open_issues_count: Option<i64>,
    pub default_branch: Option<String>,
}

impl Repository {
    /// Watcher count, preferring `subscribers_count` since GitHub's `watchers_count` mirrors stars.
    #[must_use]
    pub fn watchers(&self) -> Option<i64> {
        self.subscribers_count.or(self.watchers_count)
    }
}

/// `GET /repos/{owner}/{repo}/releases/latest`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub published_at: Option<String>,
}

/// One element of `GET /repos/{owner}/{repo}/commits`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Commit {
    pub commit: Option<CommitDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CommitDetail {
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Signature {
    pub date: Option<String>,
}

impl Commit {
    /// The author date, falling back to the committer date.
    #[must_use]
    pub fn timestamp(&self) -> Option<&str> {
        let detail = self.commit.as_ref()?;
        date_of(detail.author.as_ref()).or_else(|| date_of(detail.committer.as_ref()))
    }
}

fn date_of(signature: Option<&Signature>) -> Option<&str> {
    signature.and_then(|s| s.date.as_deref()).filter(|d| !d.is_empty())
}
