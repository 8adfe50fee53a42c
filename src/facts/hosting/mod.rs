//! GitHub repository facts.

mod client;
mod models;

pub use client::{Client, ClientOptions, DEFAULT_BASE_URL};
pub use models::{Commit, CommitDetail, Release, Repository, Signature};
