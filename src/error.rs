// 请求边界的错误类型，统一转成 {"status":"error","message":...}
use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::handlers::webhook_handler::WebhookResponse;
use crate::sheets::sheets_error::SinkError;

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Cannot read request body: {0}")]
    Payload(String),

    #[error("Failed to append rows: {0}")]
    Sink(#[from] SinkError),
}

impl ResponseError for RelayError {
    fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MalformedPayload(_) | RelayError::Json(_) | RelayError::Payload(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Sink(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(WebhookResponse::error(self.to_string()))
    }
}
