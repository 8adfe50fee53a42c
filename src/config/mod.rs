//! Configuration: the tracked technologies and how they are collected.

#[expect(clippy::module_inception, reason = "the file holds the Config type")]
mod config;
mod technology;

pub use config::{Config, DEFAULT_CONFIG_FILE, DEFAULT_CONFIG_YAML, GithubSettings, PypiSettings};
pub use technology::TrackedTechnology;
