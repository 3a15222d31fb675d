//核心 Trait 定义（RowSink）以及 Google Sheets 实现
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;

use super::credentials::TokenSource;
use super::sheets_error::SinkError;
use crate::alerts::OutputRow;

pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";

#[async_trait]
pub trait RowSink: Send + Sync {
    /// Appends `rows` in order, as a single batch.
    async fn append_rows(&self, rows: &[OutputRow]) -> Result<(), SinkError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    // 200ms, 400ms, 800ms ...
    fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

//HTTP 客户端实现
pub struct SheetsSink {
    client: reqwest::Client,
    append_url: Url,
    tokens: TokenSource,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct AppendResponse {
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: Option<String>,
    updated_rows: Option<u64>,
}

impl SheetsSink {
    pub fn new(
        api_base: &str,
        spreadsheet_id: &str,
        worksheet: &str,
        tokens: TokenSource,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::transport("build HTTP client", e))?;

        Ok(Self {
            client,
            append_url: append_url(api_base, spreadsheet_id, worksheet)?,
            tokens,
            retry,
        })
    }

    #[cfg(test)]
    pub fn append_url(&self) -> &Url {
        &self.append_url
    }

    async fn try_append(&self, body: &serde_json::Value) -> Result<(), SinkError> {
        let token = self.tokens.access_token(&self.client).await?;

        let resp = self
            .client
            .post(self.append_url.clone())
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| SinkError::transport("append request", e))?;

        let status = resp.status();
        // 读响应体失败属于连接问题，可重试
        let text = resp
            .text()
            .await
            .map_err(|e| SinkError::transport("read append response", e))?;

        if !status.is_success() {
            return Err(SinkError::HttpError(status, text));
        }

        // 响应体只用于日志，解析失败不影响结果
        if let Ok(AppendResponse { updates: Some(updates) }) = serde_json::from_str::<AppendResponse>(&text) {
            log::info!(
                "Appended {} row(s) at {}",
                updates.updated_rows.unwrap_or_default(),
                updates.updated_range.as_deref().unwrap_or("?")
            );
        }
        Ok(())
    }
}

#[async_trait]
impl RowSink for SheetsSink {
    async fn append_rows(&self, rows: &[OutputRow]) -> Result<(), SinkError> {
        if rows.is_empty() {
            return Ok(());
        }
        let values: Vec<[&str; 5]> = rows.iter().map(OutputRow::cells).collect();
        let body = serde_json::json!({ "values": values });

        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let start = std::time::Instant::now();
            match self.try_append(&body).await {
                Ok(()) => {
                    log::debug!(
                        "append_rows [{} rows] took: {:.4}s",
                        rows.len(),
                        start.elapsed().as_secs_f64()
                    );
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let wait = self.retry.backoff(attempt);
                    log::warn!(
                        "Append failed ({}/{}), retrying in {:?}: {}",
                        attempt,
                        max_attempts,
                        wait,
                        e
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Append failed after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }
}

// {api_base}/v4/spreadsheets/{id}/values/{worksheet}!A1:append
fn append_url(api_base: &str, spreadsheet_id: &str, worksheet: &str) -> Result<Url, SinkError> {
    let mut url = Url::parse(api_base).map_err(|e| SinkError::Url(format!("{}: {}", api_base, e)))?;
    let range = format!("{}!A1:append", worksheet);
    url.path_segments_mut()
        .map_err(|_| SinkError::Url(format!("{} cannot be a base URL", api_base)))?
        .pop_if_empty()
        .extend(["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()]);
    url.query_pairs_mut()
        .append_pair("valueInputOption", "RAW")
        .append_pair("insertDataOption", "INSERT_ROWS");
    Ok(url)
}
