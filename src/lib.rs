#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! tech-metrics crate
//!
//! This crate is an implementation detail of the `tech-metrics` tool. Its API is fluid and may change without warning
//! and in a semver-incompatible way.
//!
//! # Module Organization
//!
//! - [`config`]: The list of tracked technologies and collection settings
//! - [`facts`]: API clients, retry policies and per-technology collection
//! - [`table`]: Unification of raw records into the fixed schema, and schema validation
//! - [`snapshot`]: Dated snapshot files
//! - [`warehouse`]: Optional loading of a snapshot into a warehouse table
//! - [`commands`]: Command-line interface and orchestration

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[doc(hidden)]
pub mod commands;

#[doc(hidden)]
pub mod config;

#[doc(hidden)]
pub mod facts;

#[doc(hidden)]
pub mod snapshot;

#[doc(hidden)]
pub mod table;

#[doc(hidden)]
pub mod warehouse;

pub use crate::commands::{Host, run};
