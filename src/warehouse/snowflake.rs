//! Snowflake SQL API v2 loader.
//!
//! Each load runs two statements through `POST /api/v2/statements`: a `CREATE TABLE IF NOT EXISTS`
//! and a single `INSERT` whose bindings carry one array per column, so all rows travel in one
//! request. Statements that outlive the synchronous window come back as `202 Accepted` and are
//! polled through their status URL until they finish.

use super::{DEFAULT_TABLE, WarehouseLoader, validate_table_name};
use crate::Result;
use crate::facts::http::USER_AGENT;
use crate::table::{Cell, Column, ColumnType, Snapshot, format_timestamp};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err, bail};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use url::Url;

const LOG_TARGET: &str = " warehouse";

const DEFAULT_TOKEN_TYPE: &str = "PROGRAMMATIC_ACCESS_TOKEN";

/// Connection settings for [`SqlApiLoader`].
#[derive(Clone)]
pub struct SnowflakeOptions {
    /// Account identifier, such as `myorg-myaccount`.
    pub account: Option<String>,

    /// Endpoint override. Defaults to `https://{account}.snowflakecomputing.com`.
    pub url: Option<String>,
    pub token: String,

    /// Value of `X-Snowflake-Authorization-Token-Type`.
    pub token_type: String,
    pub warehouse: Option<String>,
    pub database: Option<String>,
    pub schema: Option<String>,
    pub role: Option<String>,

    /// Server-side timeout for each statement.
    pub statement_timeout: Duration,

    /// Delay between status checks of a running statement.
    pub poll_interval: Duration,
}

impl core::fmt::Debug for SnowflakeOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnowflakeOptions")
            .field("account", &self.account)
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("statement_timeout", &self.statement_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl SnowflakeOptions {
    /// Read the `SNOWFLAKE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build options from a variable lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let account = get("SNOWFLAKE_ACCOUNT");
        let url = get("SNOWFLAKE_URL");
        if account.is_none() && url.is_none() {
            bail!("SNOWFLAKE_ACCOUNT is not set");
        }

        let token = get("SNOWFLAKE_TOKEN").ok_or_else(|| app_err!("SNOWFLAKE_TOKEN is not set"))?;

        Ok(Self {
            account,
            url,
            token,
            token_type: get("SNOWFLAKE_TOKEN_TYPE").unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
            warehouse: get("SNOWFLAKE_WAREHOUSE"),
            database: get("SNOWFLAKE_DATABASE"),
            schema: get("SNOWFLAKE_SCHEMA"),
            role: get("SNOWFLAKE_ROLE"),
            statement_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(500),
        })
    }

    fn endpoint(&self) -> Result<Url> {
        let base = match (&self.url, &self.account) {
            (Some(url), _) => url.clone(),
            (None, Some(account)) => format!("https://{account}.snowflakecomputing.com"),
            (None, None) => bail!("neither SNOWFLAKE_URL nor SNOWFLAKE_ACCOUNT is set"),
        };

        let base = crate::facts::http::parse_base_url(&base)?;
        crate::facts::http::endpoint(&base, &["api", "v2", "statements"], &[])
    }
}

/// Request body of `POST /api/v2/statements`.
#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    bindings: BTreeMap<String, Binding>,
}

/// One positional binding. `value` is an array to bind one value per row.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct Binding {
    #[serde(rename = "type")]
    kind: &'static str,
    value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    code: Option<String>,
    message: Option<String>,
    statement_handle: Option<String>,
    statement_status_url: Option<String>,
}

/// Loads snapshots through Snowflake's SQL API.
#[derive(Debug, Clone)]
pub struct SqlApiLoader {
    http: reqwest::Client,
    endpoint: Url,
    options: SnowflakeOptions,
}

impl SqlApiLoader {
    pub fn new(options: SnowflakeOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth_val = HeaderValue::from_str(&format!("Bearer {}", options.token))?;
        auth_val.set_sensitive(true);
        let _ = headers.insert(AUTHORIZATION, auth_val);
        let _ = headers.insert("x-snowflake-authorization-token-type", HeaderValue::from_str(&options.token_type)?);

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            // leave headroom over the server-side statement timeout
            .timeout(options.statement_timeout + Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            endpoint: options.endpoint()?,
            options,
        })
    }

    async fn execute(&self, statement: &str, bindings: BTreeMap<String, Binding>) -> Result<()> {
        let request = StatementRequest {
            statement,
            timeout: self.options.statement_timeout.as_secs(),
            warehouse: self.options.warehouse.as_deref(),
            database: self.options.database.as_deref(),
            schema: self.options.schema.as_deref(),
            role: self.options.role.as_deref(),
            bindings,
        };

        log::debug!(target: LOG_TARGET, "executing: {statement}");
        let response = self.http.post(self.endpoint.clone()).json(&request).send().await?;
        let (mut status, mut body) = read_response(response).await?;

        let max_polls = max_polls(self.options.statement_timeout, self.options.poll_interval);
        let mut polls = 0;

        while is_pending(status, &body) {
            polls += 1;
            if polls > max_polls {
                bail!("statement did not finish within {}s", self.options.statement_timeout.as_secs());
            }

            let url = self.status_url(&body)?;
            tokio::time::sleep(self.options.poll_interval).await;

            log::trace!(target: LOG_TARGET, "polling {url}");
            (status, body) = read_response(self.http.get(url).send().await?).await?;
        }

        if !status.is_success() {
            return Err(statement_error(status, &body));
        }

        Ok(())
    }

    fn status_url(&self, body: &StatementResponse) -> Result<Url> {
        if let Some(path) = &body.statement_status_url {
            return self.endpoint.join(path).into_app_err_with(|| format!("invalid statement status URL '{path}'"));
        }

        let handle = body
            .statement_handle
            .as_deref()
            .ok_or_else(|| app_err!("pending statement response carries no statement handle"))?;
        crate::facts::http::endpoint(&self.endpoint, &[handle], &[])
    }
}

impl WarehouseLoader for SqlApiLoader {
    fn load(&self, snapshot: &Snapshot, table: Option<&str>) -> impl Future<Output = Result<()>> + Send {
        async move {
            let table = table.unwrap_or(DEFAULT_TABLE);
            validate_table_name(table)?;

            self.execute(&create_table_sql(table), BTreeMap::new())
                .await
                .map_err(|e| e.enrich_with(|| format!("creating table {table}")))?;

            if snapshot.is_empty() {
                log::info!(target: LOG_TARGET, "snapshot has no rows, nothing to insert into {table}");
                return Ok(());
            }

            self.execute(&insert_sql(table), insert_bindings(snapshot))
                .await
                .map_err(|e| e.enrich_with(|| format!("inserting {} row(s) into {table}", snapshot.len())))?;

            log::info!(target: LOG_TARGET, "loaded {} row(s) into {table}", snapshot.len());
            Ok(())
        }
    }
}

async fn read_response(response: reqwest::Response) -> Result<(StatusCode, StatementResponse)> {
    let status = response.status();
    let bytes = response.bytes().await?;

    // Error bodies are not always JSON; the status alone still tells the story.
    let body = serde_json::from_slice(&bytes).unwrap_or_default();
    Ok((status, body))
}

fn is_pending(status: StatusCode, body: &StatementResponse) -> bool {
    status == StatusCode::ACCEPTED && (body.statement_status_url.is_some() || body.statement_handle.is_some())
}

fn statement_error(status: StatusCode, body: &StatementResponse) -> ohno::AppError {
    match (&body.code, &body.message) {
        (Some(code), Some(message)) => app_err!("Snowflake returned {status} ({code}): {message}"),
        (None, Some(message)) => app_err!("Snowflake returned {status}: {message}"),
        _ => app_err!("Snowflake returned {status}"),
    }
}

fn max_polls(timeout: Duration, interval: Duration) -> u32 {
    let interval = interval.max(Duration::from_millis(1));
    u32::try_from(timeout.as_millis() / interval.as_millis()).unwrap_or(u32::MAX).max(1)
}

fn sql_type(column: Column) -> &'static str {
    match column.column_type() {
        ColumnType::Str => "VARCHAR",
        ColumnType::Int => "NUMBER(38,0)",
        ColumnType::Timestamp => "TIMESTAMP_TZ",
    }
}

fn create_table_sql(table: &str) -> String {
    let columns: Vec<String> = Column::iter()
        .map(|c| {
            let null = if c.nullable() { "" } else { " NOT NULL" };
            format!("  {} {}{null}", c.name(), sql_type(c))
        })
        .collect();

    format!("CREATE TABLE IF NOT EXISTS {table} (\n{}\n)", columns.join(",\n"))
}

fn insert_sql(table: &str) -> String {
    let names: Vec<&str> = Column::iter().map(Column::name).collect();
    let params = vec!["?"; names.len()];
    format!("INSERT INTO {table} ({}) VALUES ({})", names.join(", "), params.join(", "))
}

/// One array binding per column; timestamps travel as RFC 3339 text.
fn insert_bindings(snapshot: &Snapshot) -> BTreeMap<String, Binding> {
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(snapshot.len()); Column::COUNT];

    for record in snapshot.records() {
        for (values, cell) in columns.iter_mut().zip(record.cells()) {
            values.push(match cell {
                Cell::Null => Value::Null,
                Cell::Int(v) => Value::String(v.to_string()),
                Cell::Str(s) => Value::String(s),
                Cell::Timestamp(t) => Value::String(format_timestamp(t)),
            });
        }
    }

    Column::iter()
        .zip(columns)
        .enumerate()
        .map(|(index, (column, values))| {
            let kind = if column.column_type() == ColumnType::Int { "FIXED" } else { "TEXT" };
            ((index + 1).to_string(), Binding { kind, value: Value::Array(values) })
        })
        .collect()
}
