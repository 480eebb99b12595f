//! Google service-account authentication.
//!
//! Signs an RS256 JWT assertion with the service-account key and exchanges
//! it for an OAuth access token (JWT bearer grant). Tokens are cached until
//! shortly before they expire.

use std::path::Path;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{DialogflowError, DialogflowResult};

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account JSON key that signing needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    ASSERTION_LIFETIME_SECS as u64
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Service-account signer with a token cache
pub struct ServiceAccountAuth {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.key.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey) -> DialogflowResult<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DialogflowError::Auth(format!("Invalid private key: {}", e)))?;

        Ok(Self {
            key,
            encoding_key,
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self) -> DialogflowResult<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| DialogflowError::Auth(format!("Failed to sign assertion: {}", e)))
    }

    /// Return a valid access token, exchanging a fresh assertion if needed
    pub async fn access_token(&self, client: &reqwest::Client) -> DialogflowResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        tracing::debug!("Requesting access token for {}", self.key.client_email);

        let assertion = self.sign_assertion()?;
        let response = client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DialogflowError::Auth(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DialogflowError::Auth(format!("Invalid token response: {}", e)))?;

        *cached = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: token_expiry(Instant::now(), token.expires_in),
        });

        Ok(token.access_token)
    }
}

/// Expiry instant for a token issued at `now`. Lifetimes that would overflow
/// `Instant` are clamped to the assertion lifetime.
fn token_expiry(now: Instant, expires_in: u64) -> Instant {
    now.checked_add(Duration::from_secs(expires_in))
        .unwrap_or_else(|| {
            tracing::warn!("Token lifetime {}s out of range, clamping", expires_in);
            now + Duration::from_secs(ASSERTION_LIFETIME_SECS as u64)
        })
}

/// Where bearer tokens for Dialogflow requests come from
#[derive(Debug)]
pub enum Credentials {
    /// A pre-issued access token used as-is
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl Credentials {
    /// Load a service-account JSON key from disk
    pub fn service_account_from_file(path: &Path) -> DialogflowResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DialogflowError::Auth(format!(
                "Failed to read key file {}: {}",
                path.display(),
                e
            ))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            DialogflowError::Auth(format!("Invalid key file {}: {}", path.display(), e))
        })?;

        tracing::info!("Loaded service account {}", key.client_email);
        Ok(Self::ServiceAccount(ServiceAccountAuth::new(key)?))
    }

    pub async fn bearer_token(&self, client: &reqwest::Client) -> DialogflowResult<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount(auth) => auth.access_token(client).await,
        }
    }
}
