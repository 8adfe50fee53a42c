//! Collects popularity and health signals for a configured list of technologies.
//!
//! # Overview
//!
//! `tech-metrics` reads a list of technologies (a display name, a GitHub repository and a `PyPI`
//! package each), fetches repository statistics from GitHub and recent download counts from
//! pypistats.org, normalizes everything into one 14-column table, validates it, and writes a
//! dated CSV snapshot. The snapshot can optionally be loaded into a Snowflake table.
//!
//! # Quick Start
//!
//! ```bash
//! tech-metrics init                # writes technologies.yml
//! export GITHUB_TOKEN=ghp_xxxxxxxx
//! tech-metrics collect
//! ```
//!
//! Snapshots land in `artifacts/tech_metrics_YYYYMMDD_HHMMSS.csv` and are never overwritten.
//!
//! # Warehouse Loading
//!
//! ```bash
//! export SNOWFLAKE_ACCOUNT=myorg-myaccount
//! export SNOWFLAKE_TOKEN=...
//! tech-metrics collect --load
//! ```
//!
//! # Exit Codes
//!
//! A technology that cannot be collected is reported and skipped. The run fails only when the
//! table does not pass schema validation, the snapshot cannot be written, or the warehouse load fails.

use std::io::Write;
use std::io::{stderr, stdout};
use tech_metrics::{Host, run};

/// Default host that writes to the process streams.
#[derive(Debug, Clone, Default)]
pub struct RealHost;

impl Host for RealHost {
    fn output(&mut self) -> impl Write {
        stdout()
    }

    fn error(&mut self) -> impl Write {
        stderr()
    }

    fn exit(&mut self, code: i32) {
        std::process::exit(code);
    }
}

#[tokio::main]
async fn main() -> Result<(), ohno::AppError> {
    run(&mut RealHost, std::env::args()).await
}
