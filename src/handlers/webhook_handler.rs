//Grafana webhook 处理器实现
// webhook_handler.rs
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::alerts::{normalize, NormalizeOptions};
use crate::error::RelayError;
use crate::sheets::RowSink;

pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Upper bound on a webhook body, registered as app data (MAX_BODY_BYTES).
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

impl Default for BodyLimit {
    fn default() -> Self {
        BodyLimit(DEFAULT_MAX_BODY_BYTES)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
}

impl WebhookResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/webhook").route(web::post().to(handle_webhook)))
        .service(web::resource("/health").route(web::get().to(health)));
}

pub async fn handle_webhook(
    payload: web::Payload, //不依赖 Content-Type，自己读 body、解析 json
    sink: web::Data<dyn RowSink>, //注入接口
    options: web::Data<NormalizeOptions>,
    limit: Option<web::Data<BodyLimit>>,
) -> Result<HttpResponse, RelayError> {
    let limit = limit.map(|l| *l.get_ref()).unwrap_or_default();
    let result = match read_body(payload, limit).await {
        Ok(body) => relay(&body, sink.get_ref(), options.get_ref()).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(count) => Ok(HttpResponse::Ok().json(WebhookResponse::success(format!(
            "{} row(s) added to Google Sheets",
            count
        )))),
        Err(e) => {
            log::error!("Webhook failed: {}", e);
            Err(e)
        }
    }
}

// 超限和读取失败都走统一的错误响应
async fn read_body(payload: web::Payload, limit: BodyLimit) -> Result<web::Bytes, RelayError> {
    match payload.to_bytes_limited(limit.0).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(e)) => Err(RelayError::Payload(e.to_string())),
        Err(_) => Err(RelayError::PayloadTooLarge(limit.0)),
    }
}

async fn relay(
    body: &[u8],
    sink: &dyn RowSink,
    options: &NormalizeOptions,
) -> Result<usize, RelayError> {
    let payload: serde_json::Value = serde_json::from_slice(body)?;
    let rows = normalize(&payload, options)?;

    for row in &rows {
        log::info!("Processing row: {:?}", row.cells());
    }

    sink.append_rows(&rows).await?;
    Ok(rows.len())
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
