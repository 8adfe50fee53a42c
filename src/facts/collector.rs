use super::downloads::{self, RecentDownloads};
use super::hosting::{self, Release, Repository};
use super::progress::Progress;
use crate::Result;
use crate::config::TrackedTechnology;
use crate::table::{Column, RawRecord, format_timestamp};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use ohno::EnrichableExt;
use serde_json::Value;
use std::sync::Arc;

const LOG_TARGET: &str = " collector";

/// Outcome of a collection run.
#[derive(Debug, Default)]
pub struct Collection {
    /// One raw record per successfully collected technology, in configuration order.
    pub records: Vec<RawRecord>,

    /// Names of the technologies that could not be collected.
    pub failed: Vec<String>,
}

/// Gathers one raw record per tracked technology from GitHub and pypistats.
pub struct Collector {
    github: hosting::Client,
    pypi: downloads::Client,
    progress: Arc<dyn Progress>,
    max_concurrent: usize,
}

impl core::fmt::Debug for Collector {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collector")
            .field("github", &self.github)
            .field("pypi", &self.pypi)
            .field("progress", &"<dyn Progress>")
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}

impl Collector {
    #[must_use]
    pub fn new(github: hosting::Client, pypi: downloads::Client, progress: impl Progress + 'static, max_concurrent: usize) -> Self {
        Self {
            github,
            pypi,
            progress: Arc::new(progress),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Collect every technology, skipping the ones that fail.
    ///
    /// Up to `max_concurrent` technologies are in flight at once. Each one is reported to the progress
    /// observer as soon as it finishes; records come back in the order of `techs` regardless of completion order.
    pub async fn collect(&self, techs: &[TrackedTechnology], ingested_at: DateTime<Utc>) -> Collection {
        self.progress.started(techs.len());

        let outcomes: Vec<_> = stream::iter(techs)
            .map(|tech| async move {
                self.progress.collecting(&tech.name);
                match self.collect_one(tech, ingested_at).await {
                    Ok(record) => {
                        self.progress.collected(&tech.name);
                        Ok(record)
                    }
                    Err(e) => {
                        log::warn!(target: LOG_TARGET, "could not collect '{}': {e:#}", tech.name);
                        self.progress.failed(&tech.name, &e);
                        Err(tech.name.clone())
                    }
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut collection = Collection::default();
        for outcome in outcomes {
            match outcome {
                Ok(record) => collection.records.push(record),
                Err(name) => collection.failed.push(name),
            }
        }

        self.progress.done();
        collection
    }

    /// Collect one technology.
    ///
    /// Missing repositories, releases, commits and packages are not errors: they leave their columns
    /// null and the unifier fills in the defaults.
    pub async fn collect_one(&self, tech: &TrackedTechnology, ingested_at: DateTime<Utc>) -> Result<RawRecord> {
        let repo = &tech.github_repo;
        let enrich = |what: &'static str| move |e: ohno::AppError| e.enrich_with(|| format!("could not fetch {what} for '{}'", tech.name));

        let repository = self.github.get_repository(repo).await.map_err(enrich("repository metadata"))?;
        let release = self.github.get_latest_release(repo).await.map_err(enrich("the latest release"))?;

        let branch = repository.as_ref().and_then(|r| r.default_branch.as_deref());
        let last_commit = self
            .github
            .get_latest_commit_timestamp(repo, branch)
            .await
            .map_err(enrich("the latest commit"))?;

        let downloads = self.pypi.get_recent(&tech.pypi_package).await.map_err(enrich("download counts"))?;

        log::debug!(target: LOG_TARGET, "collected '{}'", tech.name);
        Ok(build_record(
            tech,
            repository.as_ref(),
            release.as_ref(),
            last_commit,
            downloads,
            ingested_at,
        ))
    }
}

/// Assemble the raw record for one technology, keyed by column name.
fn build_record(
    tech: &TrackedTechnology,
    repository: Option<&Repository>,
    release: Option<&Release>,
    last_commit: Option<String>,
    downloads: Option<RecentDownloads>,
    ingested_at: DateTime<Utc>,
) -> RawRecord {
    let count = |v: Option<i64>| v.map_or(Value::Null, Value::from);
    let text = |v: Option<String>| v.map_or(Value::Null, Value::String);
    let repo_count = |f: fn(&Repository) -> Option<i64>| count(repository.and_then(f));
    let downloads = downloads.unwrap_or_default();

    let mut record = RawRecord::new();
    let mut set = |column: Column, value: Value| {
        let _ = record.insert(column.name().to_string(), value);
    };

    set(Column::Technology, Value::String(tech.name.clone()));
    set(Column::GithubRepo, Value::String(tech.github_repo.to_string()));
    set(Column::GithubStars, repo_count(|r| r.stargazers_count));
    set(Column::GithubForks, repo_count(|r| r.forks_count));
    set(Column::GithubWatchers, repo_count(Repository::watchers));
    set(Column::GithubOpenIssues, repo_count(|r| r.open_issues_count));
    set(Column::GithubDefaultBranch, text(repository.and_then(|r| r.default_branch.clone())));
    set(Column::GithubLatestReleasedAt, text(release.and_then(|r| r.published_at.clone())));
    set(Column::GithubLastCommitAt, text(last_commit));
    set(Column::PypiPackage, Value::String(tech.pypi_package.clone()));
    set(Column::PypiDownloadsLastDay, count(downloads.last_day));
    set(Column::PypiDownloadsLastWeek, count(downloads.last_week));
    set(Column::PypiDownloadsLastMonth, count(downloads.last_month));
    set(Column::IngestedAt, Value::String(format_timestamp(ingested_at)));

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::RepoName;
    use crate::facts::retry::{Clock, TokioClock};
    use ohno::AppError;
    use serde_json::json;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Records every progress event as a line of text.
    #[derive(Debug, Clone, Default)]
    struct RecordingProgress {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingProgress {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Progress for RecordingProgress {
        fn started(&self, total: usize) {
            self.push(format!("started {total}"));
        }

        fn collecting(&self, name: &str) {
            self.push(format!("collecting {name}"));
        }

        fn collected(&self, name: &str) {
            self.push(format!("collected {name}"));
        }

        fn failed(&self, name: &str, _error: &AppError) {
            self.push(format!("failed {name}"));
        }

        fn done(&self) {
            self.push("done".to_string());
        }
    }

    fn tracked(name: &str, repo: &str) -> TrackedTechnology {
        TrackedTechnology {
            name: name.to_string(),
            github_repo: RepoName::parse(repo).unwrap(),
            pypi_package: name.to_lowercase(),
        }
    }

    fn collector(server: &MockServer, progress: RecordingProgress) -> Collector {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);
        let github = hosting::Client::new(
            &hosting::ClientOptions {
                base_url: server.uri(),
                ..hosting::ClientOptions::default()
            },
            Arc::clone(&clock),
        )
        .unwrap();
        let pypi = downloads::Client::new(
            &downloads::ClientOptions {
                base_url: server.uri(),
                ..downloads::ClientOptions::default()
            },
            clock,
        )
        .unwrap();

        Collector::new(github, pypi, progress, 1)
    }

    fn tech() -> TrackedTechnology {
        TrackedTechnology {
            name: "Foo".to_string(),
            github_repo: RepoName::parse("org/foo").unwrap(),
            pypi_package: "foo".to_string(),
        }
    }

    fn ingested_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-02T10:00:00Z").unwrap().to_utc()
    }

    #[test]
    fn test_build_record_full() {
        let repository = Repository {
            stargazers_count: Some(10),
            forks_count: Some(2),
            subscribers_count: None,
            watchers_count: Some(3),
            open_issues_count: Some(1),
            default_branch: Some("main".to_string()),
        };
        let release = Release {
            published_at: Some("2024-01-01T00:00:00Z".to_string()),
        };
        let downloads = RecentDownloads {
            last_day: Some(5),
            last_week: Some(40),
            last_month: Some(150),
        };

        let record = build_record(
            &tech(),
            Some(&repository),
            Some(&release),
            Some("2024-06-01T00:00:00Z".to_string()),
            Some(downloads),
            ingested_at(),
        );

        assert_eq!(
            Value::Object(record),
            json!({
                "TECHNOLOGY": "Foo",
                "GITHUB_REPO": "org/foo",
                "GITHUB_STARS": 10,
                "GITHUB_FORKS": 2,
                "GITHUB_WATCHERS": 3,
                "GITHUB_OPEN_ISSUES": 1,
                "GITHUB_DEFAULT_BRANCH": "main",
                "GITHUB_LATEST_RELEASED_AT": "2024-01-01T00:00:00Z",
                "GITHUB_LAST_COMMIT_AT": "2024-06-01T00:00:00Z",
                "PYPI_PACKAGE": "foo",
                "PYPI_DOWNLOADS_LAST_DAY": 5,
                "PYPI_DOWNLOADS_LAST_WEEK": 40,
                "PYPI_DOWNLOADS_LAST_MONTH": 150,
                "INGESTED_AT": "2024-06-02T10:00:00Z",
            })
        );
    }

    #[test]
    fn test_build_record_everything_missing() {
        let record = build_record(&tech(), None, None, None, None, ingested_at());

        assert_eq!(record.len(), Column::COUNT);
        assert_eq!(record["TECHNOLOGY"], json!("Foo"));
        assert_eq!(record["GITHUB_STARS"], Value::Null);
        assert_eq!(record["GITHUB_DEFAULT_BRANCH"], Value::Null);
        assert_eq!(record["GITHUB_LAST_COMMIT_AT"], Value::Null);
        assert_eq!(record["PYPI_DOWNLOADS_LAST_MONTH"], Value::Null);
        assert_eq!(record["INGESTED_AT"], json!("2024-06-02T10:00:00Z"));
    }

    #[test]
    fn test_missing_record_still_validates() {
        let record = build_record(&tech(), None, None, None, None, ingested_at());
        let frame = crate::table::unify_records(&[record]);
        let records = crate::table::validate(frame).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].github_stars, 0);
        assert_eq!(records[0].github_default_branch, "");
        assert_eq!(records[0].github_latest_released_at, None);
    }

    #[tokio::test]
    async fn test_progress_reports_each_technology_as_it_finishes() {
        // unmatched requests get 404, so A and C are collected with empty facts
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/b"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let progress = RecordingProgress::default();
        let events = Arc::clone(&progress.events);
        let techs = [tracked("A", "org/a"), tracked("B", "org/b"), tracked("C", "org/c")];

        let collection = collector(&server, progress).collect(&techs, ingested_at()).await;

        assert_eq!(
            *events.lock().unwrap(),
            [
                "started 3",
                "collecting A",
                "collected A",
                "collecting B",
                "failed B",
                "collecting C",
                "collected C",
                "done",
            ]
        );
        assert_eq!(collection.records.len(), 2);
        assert_eq!(collection.records[1]["TECHNOLOGY"], json!("C"));
        assert_eq!(collection.failed, ["B"]);
    }

    #[test]
    fn test_repo_column_holds_normalized_identifier() {
        let tech = TrackedTechnology {
            github_repo: RepoName::parse(" org/foo.git ").unwrap(),
            ..tech()
        };

        let record = build_record(&tech, None, None, None, None, ingested_at());
        assert_eq!(record["GITHUB_REPO"], json!("org/foo"));
    }
}
