//! Command-line interface and orchestration for tech-metrics
//!
//! # Commands
//!
//! - **collect**: Fetch GitHub and pypistats facts for every configured technology, unify them
//!   into the snapshot table, validate it, write a dated CSV snapshot and optionally load it
//!   into Snowflake
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file and, optionally, re-check a snapshot file
//!
//! The `run` function parses command-line arguments using clap and routes to the appropriate
//! command handler. All user-facing output goes through a [`Host`] so commands can be tested
//! without touching the process streams.

mod collect;
mod common;
mod host;
mod init;
mod progress_reporter;
mod run;
mod validate;

pub use collect::{CollectArgs, process_collect};
pub use common::{ColorMode, LogLevel};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use run::run;
pub use validate::{ValidateArgs, validate_config};
