use super::TrackedTechnology;
use crate::Result;
use crate::facts::{downloads, hosting};
use crate::warehouse::validate_table_name;
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;

/// The default configuration YAML content, embedded from `default_config.yml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../default_config.yml");

/// Configuration file used when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "technologies.yml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Technologies to collect, in snapshot row order
    pub techs: Vec<TrackedTechnology>,

    #[serde(default)]
    pub github: GithubSettings,

    #[serde(default)]
    pub pypi: PypiSettings,

    /// Directory receiving the dated snapshot files
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: Utf8PathBuf,

    /// Warehouse table loaded with each snapshot
    #[serde(default = "default_warehouse_table")]
    pub warehouse_table: String,

    /// Technologies collected concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

/// GitHub API client settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct GithubSettings {
    pub base_url: String,
    pub timeout_secs: u64,

    /// Total attempts per request
    pub max_retries: u32,
    pub backoff_base: f64,
    pub max_rate_limit_wait_secs: u64,
    pub max_rate_limit_waits: Option<u32>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            base_url: hosting::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 20,
            max_retries: 3,
            backoff_base: 1.5,
            max_rate_limit_wait_secs: 3600,
            max_rate_limit_waits: None,
        }
    }
}

impl GithubSettings {
    #[must_use]
    pub fn client_options(&self, token: Option<String>) -> hosting::ClientOptions {
        hosting::ClientOptions {
            token,
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
            max_rate_limit_wait: Duration::from_secs(self.max_rate_limit_wait_secs),
            max_rate_limit_waits: self.max_rate_limit_waits,
        }
    }
}

/// pypistats client settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PypiSettings {
    pub base_url: String,
    pub timeout_secs: u64,

    /// Retries after the first attempt
    pub max_retries: u32,
    pub backoff_base: f64,
}

impl Default for PypiSettings {
    fn default() -> Self {
        Self {
            base_url: downloads::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 20,
            max_retries: 0,
            backoff_base: 1.5,
        }
    }
}

impl PypiSettings {
    #[must_use]
    pub fn client_options(&self) -> downloads::ClientOptions {
        downloads::ClientOptions {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
        }
    }
}

fn default_snapshot_dir() -> Utf8PathBuf {
    Utf8PathBuf::from("artifacts")
}

fn default_warehouse_table() -> String {
    crate::warehouse::DEFAULT_TABLE.to_string()
}

const fn default_max_concurrent() -> usize {
    1
}

impl Config {
    /// Load and validate a configuration file
    ///
    /// Returns the configuration along with warnings about suspicious but legal settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a setting is invalid
    pub fn load(path: &Utf8Path) -> Result<(Self, Vec<String>)> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration from '{path}'"))?;
        let config: Self = serde_yaml::from_str(&text).into_app_err_with(|| format!("parsing YAML configuration from '{path}'"))?;

        let warnings = config.validate()?;
        Ok((config, warnings))
    }

    /// Write the default configuration, refusing to replace an existing file
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists or cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output_path)
            .into_app_err_with(|| format!("creating configuration file '{output_path}'"))?;

        file.write_all(DEFAULT_CONFIG_YAML.as_bytes())
            .into_app_err_with(|| format!("writing default configuration to '{output_path}'"))?;
        Ok(())
    }

    /// Check settings, returning warnings for anything legal but likely unintended
    fn validate(&self) -> Result<Vec<String>> {
        if self.techs.is_empty() {
            bail!("no technologies configured: 'techs' is empty");
        }

        for (index, tech) in self.techs.iter().enumerate() {
            if tech.name.trim().is_empty() {
                bail!("technology #{} ({}) has an empty name", index + 1, tech.github_repo);
            }

            if tech.pypi_package.trim().is_empty() {
                bail!("technology '{}' has an empty PyPI package name", tech.name);
            }
        }

        if self.max_concurrent == 0 {
            bail!("max_concurrent must be at least 1");
        }

        if self.github.backoff_base < 1.0 || self.pypi.backoff_base < 1.0 {
            bail!("backoff_base must be at least 1.0");
        }

        if self.github.timeout_secs == 0 || self.pypi.timeout_secs == 0 {
            bail!("timeout_secs must be at least 1");
        }

        validate_table_name(&self.warehouse_table)?;

        let mut warnings = Vec::new();
        let mut names = HashSet::new();
        for tech in &self.techs {
            if !names.insert(tech.name.as_str()) {
                warnings.push(format!("technology '{}' is listed more than once", tech.name));
            }
        }

        if self.github.max_retries == 0 {
            warnings.push("github.max_retries is 0 and is treated as a single attempt".to_string());
        }

        Ok(warnings)
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_yaml::from_str(DEFAULT_CONFIG_YAML).expect("default_config.yml should be valid YAML that deserializes to Config")
    }
}
