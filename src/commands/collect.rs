use super::common::{ColorMode, LogLevel, init_logging};
use super::{Host, ProgressReporter};
use crate::Result;
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::facts::retry::{Clock, TokioClock};
use crate::facts::{Collector, downloads, hosting};
use crate::snapshot::write_snapshot;
use crate::table::{Snapshot, unify_records, validate};
use crate::warehouse::{SnowflakeOptions, SqlApiLoader, WarehouseLoader};
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Parser;
use ohno::{IntoAppError, app_err, bail};
use std::io::Write;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const LOG_TARGET: &str = "   collect";

#[derive(Parser, Debug)]
pub struct CollectArgs {
    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: Utf8PathBuf,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Load the snapshot into the Snowflake table after writing it
    #[arg(long, env = "SNOWFLAKE_LOAD")]
    pub load: bool,

    /// Directory receiving the snapshot file, overriding the configuration
    #[arg(long, value_name = "PATH")]
    pub snapshot_dir: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: LogLevel,
}

/// Collect every configured technology, write a snapshot and optionally load it.
pub async fn process_collect<H: Host>(host: &mut H, args: &CollectArgs) -> Result<()> {
    init_logging(args.log_level);

    let (config, warnings) = Config::load(&args.config)?;
    for warning in &warnings {
        let _ = writeln!(host.error(), "warning: {warning}");
    }

    let cancel = CancellationToken::new();
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let github = hosting::Client::new(&config.github.client_options(args.github_token.clone()), Arc::clone(&clock))?
        .with_cancellation(cancel.clone());
    let pypi = downloads::Client::new(&config.pypi.client_options(), clock)?;

    if args.github_token.as_deref().is_none_or(str::is_empty) {
        log::warn!(target: LOG_TARGET, "no GitHub token configured, requests are subject to the anonymous rate limit");
    }

    let progress = ProgressReporter::new(args.color.use_colors(), args.log_level < LogLevel::Debug);
    let collector = Collector::new(github, pypi, progress, config.max_concurrent);

    let _ = writeln!(host.output(), "Collecting data for {} technologies", config.techs.len());

    // Once installed, the SIGINT handler stays for the rest of the process, so every
    // long-running step below must race the token.
    let _interrupt = InterruptWatcher::spawn(cancel.clone());

    let collected_at = Utc::now();
    let collection = until_cancelled(&cancel, "collecting", collector.collect(&config.techs, collected_at)).await?;

    if !collection.failed.is_empty() {
        let _ = writeln!(
            host.error(),
            "{} of {} technologies could not be collected: {}",
            collection.failed.len(),
            config.techs.len(),
            collection.failed.join(", ")
        );
    }

    let records = validate(unify_records(&collection.records)).into_app_err("collected data failed schema validation")?;
    let snapshot = Snapshot::new(collected_at, records);

    if cancel.is_cancelled() {
        bail!("interrupted before writing the snapshot");
    }

    let snapshot_dir = args.snapshot_dir.as_ref().unwrap_or(&config.snapshot_dir);
    let path = write_snapshot(snapshot_dir, &snapshot)?;
    let _ = writeln!(host.output(), "Wrote snapshot: {path}");

    if args.load {
        let _ = writeln!(host.output(), "Loading to Snowflake ...");
        let loader = SqlApiLoader::new(SnowflakeOptions::from_env()?)?;
        until_cancelled(&cancel, "loading to Snowflake", loader.load(&snapshot, Some(&config.warehouse_table))).await??;
        let _ = writeln!(host.output(), "Snowflake load complete.");
    } else {
        let _ = writeln!(host.output(), "SNOWFLAKE_LOAD is not 'true'; skipping load.");
    }

    Ok(())
}

/// Cancels a token on Ctrl-C until dropped.
struct InterruptWatcher(JoinHandle<()>);

impl InterruptWatcher {
    fn spawn(cancel: CancellationToken) -> Self {
        Self(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::debug!(target: LOG_TARGET, "interrupt received");
                cancel.cancel();
            }
        }))
    }
}

impl Drop for InterruptWatcher {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `task` to completion unless `cancel` fires first.
async fn until_cancelled<T>(cancel: &CancellationToken, what: &str, task: impl Future<Output = T>) -> Result<T> {
    tokio::select! {
        value = task => Ok(value),
        () = cancel.cancelled() => Err(app_err!("interrupted while {what}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_until_cancelled_returns_task_output() {
        let cancel = CancellationToken::new();
        let value = until_cancelled(&cancel, "loading", async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_until_cancelled_abandons_pending_task() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = until_cancelled(&cancel, "loading to Snowflake", core::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("interrupted while loading to Snowflake"), "{err}");
    }

    #[tokio::test]
    async fn test_interrupt_watcher_stops_on_drop() {
        let cancel = CancellationToken::new();
        let watcher = InterruptWatcher::spawn(cancel.clone());
        let handle = watcher.0.abort_handle();

        drop(watcher);
        let stopped = tokio::time::timeout(core::time::Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await;

        assert!(stopped.is_ok());
        assert!(!cancel.is_cancelled());
    }
}
