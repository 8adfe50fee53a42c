//! Facts about tracked technologies.
//!
//! Two API clients feed the [`Collector`]: [`hosting`] talks to GitHub for repository metadata,
//! the latest release and the latest commit, and [`downloads`] talks to pypistats.org for recent
//! download counts. Both share the retry policies in [`retry`].

mod collector;
pub mod downloads;
pub mod hosting;
pub(crate) mod http;
mod progress;
mod repo_name;
pub mod retry;

pub use collector::{Collection, Collector};
pub use progress::Progress;
pub use repo_name::RepoName;
