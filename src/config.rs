//进程配置，启动时从环境变量读取一次
use std::path::PathBuf;
use std::time::Duration;

use crate::alerts::NormalizeOptions;
use crate::handlers::{BodyLimit, DEFAULT_MAX_BODY_BYTES};
use crate::sheets::{RetryPolicy, SheetsSink, SinkError, TokenSource, DEFAULT_SHEETS_API_URL};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_WORKSHEET: &str = "Sheet1";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Cannot load sheets credentials: {0}")]
    Credentials(SinkError),

    #[error("Cannot build sheets client: {0}")]
    Sink(SinkError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CredentialSource {
    /// Service-account key file (GOOGLE_APPLICATION_CREDENTIALS)
    KeyFile(PathBuf),
    /// Pre-issued bearer token (SHEETS_ACCESS_TOKEN)
    AccessToken(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub spreadsheet_id: String,
    pub worksheet: String,
    pub sheets_api_url: String,
    pub credentials: CredentialSource,
    /// Drop `1`/`0`/`1e+00`/`0e+00` values before appending (DROP_DEGENERATE_VALUES)
    pub drop_degenerate_values: bool,
    /// Total append attempts per request, first try included (APPEND_RETRIES)
    pub append_retries: u32,
    pub append_backoff: Duration,
    pub http_timeout: Duration,
    /// Largest accepted webhook body (MAX_BODY_BYTES)
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 空字符串按未设置处理
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (get("GOOGLE_APPLICATION_CREDENTIALS"), get("SHEETS_ACCESS_TOKEN")) {
            (Some(path), _) => CredentialSource::KeyFile(PathBuf::from(path)),
            (None, Some(token)) => CredentialSource::AccessToken(token),
            (None, None) => {
                return Err(ConfigError::Missing(
                    "GOOGLE_APPLICATION_CREDENTIALS or SHEETS_ACCESS_TOKEN".to_string(),
                ))
            }
        };

        Ok(Self {
            host: get("WEBHOOK_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or("WEBHOOK_PORT", get("WEBHOOK_PORT"), DEFAULT_PORT, "must be a valid port number")?,
            spreadsheet_id: get("SPREADSHEET_ID")
                .ok_or_else(|| ConfigError::Missing("SPREADSHEET_ID".to_string()))?,
            worksheet: get("WORKSHEET_NAME").unwrap_or_else(|| DEFAULT_WORKSHEET.to_string()),
            sheets_api_url: get("SHEETS_API_URL").unwrap_or_else(|| DEFAULT_SHEETS_API_URL.to_string()),
            credentials,
            drop_degenerate_values: parse_flag("DROP_DEGENERATE_VALUES", get("DROP_DEGENERATE_VALUES"))?,
            append_retries: parse_or("APPEND_RETRIES", get("APPEND_RETRIES"), 3, "must be a whole number")?,
            append_backoff: Duration::from_millis(parse_or(
                "APPEND_BACKOFF_MS",
                get("APPEND_BACKOFF_MS"),
                200,
                "must be milliseconds",
            )?),
            http_timeout: Duration::from_secs(parse_or(
                "HTTP_TIMEOUT_SECS",
                get("HTTP_TIMEOUT_SECS"),
                10,
                "must be seconds",
            )?),
            max_body_bytes: parse_or(
                "MAX_BODY_BYTES",
                get("MAX_BODY_BYTES"),
                DEFAULT_MAX_BODY_BYTES,
                "must be a byte count",
            )?,
        })
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            drop_degenerate_values: self.drop_degenerate_values,
        }
    }

    pub fn body_limit(&self) -> BodyLimit {
        BodyLimit(self.max_body_bytes)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.append_retries.max(1),
            initial_backoff: self.append_backoff,
        }
    }

    /// Loads credentials and builds the sink. Any failure here is fatal.
    pub fn build_sink(&self) -> Result<SheetsSink, ConfigError> {
        let tokens = match &self.credentials {
            CredentialSource::KeyFile(path) => {
                TokenSource::from_key_file(path).map_err(ConfigError::Credentials)?
            }
            CredentialSource::AccessToken(token) => TokenSource::Static(token.clone()),
        };
        let sink = SheetsSink::new(
            &self.sheets_api_url,
            &self.spreadsheet_id,
            &self.worksheet,
            tokens,
            self.retry_policy(),
            self.http_timeout,
        )
        .map_err(ConfigError::Sink)?;
        Ok(sink)
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
    reason: &'static str,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value, reason }),
    }
}

fn parse_flag(var: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected true or false",
        }),
    }
}
