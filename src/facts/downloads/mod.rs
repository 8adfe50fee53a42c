//! Package download statistics from pypistats.org.

mod client;

pub use client::{Client, ClientOptions, DEFAULT_BASE_URL, RecentDownloads};
