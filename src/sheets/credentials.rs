//Google 凭证：静态 token 或 service account JWT 换取 access token
use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::sheets_error::SinkError;

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
// 提前刷新，避免请求途中过期
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Fields read from a Google service-account key file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

pub enum TokenSource {
    Static(String),
    ServiceAccount(ServiceAccount),
}

pub struct ServiceAccount {
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    exp: i64,
    iat: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl TokenSource {
    pub fn from_key_file(path: &Path) -> Result<Self, SinkError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            SinkError::Credentials(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_service_account_json(&json)
    }

    /// Parses the key and its PEM up front so a bad key fails at startup.
    pub fn from_service_account_json(json: &str) -> Result<Self, SinkError> {
        let key: ServiceAccountKey = serde_json::from_str(json)?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(TokenSource::ServiceAccount(ServiceAccount {
            client_email: key.client_email,
            token_uri: key.token_uri,
            signing_key,
            cached: Mutex::new(None),
        }))
    }

    pub async fn access_token(&self, client: &reqwest::Client) -> Result<String, SinkError> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::ServiceAccount(account) => account.access_token(client).await,
        }
    }
}

impl ServiceAccount {
    async fn access_token(&self, client: &reqwest::Client) -> Result<String, SinkError> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(entry.token.clone());
            }
        }

        let fresh = self.fetch_token(client).await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self, client: &reqwest::Client) -> Result<CachedToken, SinkError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            exp: now + TOKEN_LIFETIME_SECS,
            iat: now,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)?;

        let resp = client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| SinkError::transport("token exchange", e))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SinkError::transport("read token response", e))?;
        if status != StatusCode::OK {
            return Err(SinkError::HttpError(status, body));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        let lifetime = parsed.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64);
        log::info!(
            "Obtained sheets access token for {} (expires in {}s)",
            self.client_email,
            lifetime
        );
        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        })
    }
}
