use reqwest::StatusCode;
use serde_json::Error as JsonError;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("HTTP error ({0}): {1}")]
    HttpError(StatusCode, String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] JsonError),

    #[error("Invalid sheets URL: {0}")]
    Url(String),
}

impl SinkError {
    pub fn transport(context: &str, err: impl std::fmt::Display) -> Self {
        SinkError::Transport(format!("{}: {}", context, err))
    }

    /// 连接失败、429 和 5xx 可以重试，其余直接返回
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::Transport(_) => true,
            SinkError::HttpError(status, _) => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            _ => false,
        }
    }
}
