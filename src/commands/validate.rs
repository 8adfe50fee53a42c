use super::Host;
use crate::Result;
use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::snapshot::read_snapshot;
use crate::table::validate;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file (default is `technologies.yml` unless only a snapshot is checked)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Snapshot CSV file to check against the table schema
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<Utf8PathBuf>,
}

fn validate_config_file<H: Host>(host: &mut H, path: &Utf8Path) -> Result<()> {
    let (config, warnings) = Config::load(path)?;

    for warning in &warnings {
        let _ = writeln!(host.output(), "warning: {warning}");
    }

    let _ = writeln!(
        host.output(),
        "Configuration file is valid: {path} ({} technologies)",
        config.techs.len()
    );
    Ok(())
}

fn validate_snapshot_file<H: Host>(host: &mut H, path: &Utf8Path) -> Result<()> {
    let frame = read_snapshot(path)?;
    let records = validate(frame).into_app_err_with(|| format!("snapshot '{path}' failed schema validation"))?;

    let _ = writeln!(host.output(), "Snapshot is valid: {path} ({} rows)", records.len());
    Ok(())
}

fn validate_inner<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    let config = match (&args.config, &args.snapshot) {
        (Some(path), _) => Some(path.clone()),
        (None, None) => Some(Utf8PathBuf::from(DEFAULT_CONFIG_FILE)),
        (None, Some(_)) => None,
    };

    if let Some(path) = config {
        validate_config_file(host, &path)?;
    }

    if let Some(path) = &args.snapshot {
        validate_snapshot_file(host, path)?;
    }

    Ok(())
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    match validate_inner(host, args) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
