//! Session providers.
//!
//! A provider reads the session cookie through a [`CookieBridge`], verifies
//! it, refreshes it when close to expiry, and stages any cookie rewrites.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use cookie::{Cookie, SameSite};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{Environment, SessionConfig};
use crate::session::cookies::{CookieBridge, SessionCookieSet};
use crate::store::Clock;

/// Browsers cap a cookie at ~4KB; stay well under it per chunk.
const CHUNK_SIZE: usize = 3180;
const BASE64_PREFIX: &str = "base64-";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed session cookie: {0}")]
    Malformed(String),
    #[error("session expired and carries no refresh token")]
    Expired,
    #[error("auth service rejected the session ({0})")]
    Rejected(StatusCode),
    #[error("auth service returned {0}")]
    Upstream(StatusCode),
    #[error("auth service request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid auth configuration: {0}")]
    Config(String),
}

/// Authentication state handed to the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Anonymous,
    Active { user_id: String, refreshed: bool },
}

impl SessionState {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionState::Active { user_id, .. } => Some(user_id),
            SessionState::Anonymous => None,
        }
    }
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn refresh(&self, cookies: &mut CookieBridge) -> Result<SessionState, SessionError>;
}

/// Used when session handling is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionProvider;

#[async_trait]
impl SessionProvider for NoopSessionProvider {
    async fn refresh(&self, _cookies: &mut CookieBridge) -> Result<SessionState, SessionError> {
        Ok(SessionState::Anonymous)
    }
}

/// Session as stored in the cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Epoch seconds.
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<SessionUser>,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Bearer-token sessions backed by a remote auth service.
pub struct TokenSessionProvider {
    client: reqwest::Client,
    token_url: Url,
    user_url: Url,
    api_key: String,
    cookie_name: String,
    refresh_margin_secs: i64,
    cookie_max_age_secs: i64,
    secure: bool,
    clock: Arc<dyn Clock>,
}

impl TokenSessionProvider {
    pub fn new(
        config: &SessionConfig,
        environment: Environment,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let base = config.auth_url.trim_end_matches('/');
        let mut token_url = Url::parse(&format!("{}/token", base))
            .map_err(|e| SessionError::Config(format!("auth_url: {}", e)))?;
        token_url.set_query(Some("grant_type=refresh_token"));
        let user_url = Url::parse(&format!("{}/user", base))
            .map_err(|e| SessionError::Config(format!("auth_url: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            token_url,
            user_url,
            api_key: config.api_key.clone(),
            cookie_name: config.cookie_name.clone(),
            refresh_margin_secs: config.refresh_margin_secs as i64,
            cookie_max_age_secs: config.cookie_max_age_secs,
            secure: environment.is_production(),
            clock,
        })
    }

    /// The raw session value and the cookie names that carried it. A single
    /// cookie wins over chunks.
    fn read_raw(&self, cookies: &SessionCookieSet) -> Option<(String, Vec<String>)> {
        if let Some(cookie) = cookies.get(&self.cookie_name) {
            return Some((cookie.value().to_string(), vec![self.cookie_name.clone()]));
        }

        let mut value = String::new();
        let mut names = Vec::new();
        loop {
            let name = format!("{}.{}", self.cookie_name, names.len());
            match cookies.get(&name) {
                Some(chunk) => {
                    value.push_str(chunk.value());
                    names.push(name);
                }
                None => break,
            }
        }
        (!names.is_empty()).then_some((value, names))
    }

    /// Stage the new session, clearing any cookie from the old layout that the
    /// new one no longer uses.
    fn write(&self, cookies: &mut CookieBridge, session: &StoredSession, previous: &[String]) {
        let encoded = encode_session(session);
        let chunks: Vec<(String, String)> = if encoded.len() <= CHUNK_SIZE {
            vec![(self.cookie_name.clone(), encoded)]
        } else {
            encoded
                .as_bytes()
                .chunks(CHUNK_SIZE)
                .enumerate()
                .map(|(i, chunk)| {
                    // base64 output is ASCII, so byte chunks are valid UTF-8.
                    (
                        format!("{}.{}", self.cookie_name, i),
                        String::from_utf8_lossy(chunk).into_owned(),
                    )
                })
                .collect()
        };

        for stale in previous {
            if !chunks.iter().any(|(name, _)| name == stale) {
                cookies.remove(stale);
            }
        }

        let written = chunks.into_iter().map(|(name, value)| {
            Cookie::build((name, value))
                .path("/")
                .same_site(SameSite::Lax)
                .http_only(true)
                .secure(self.secure)
                .max_age(cookie::time::Duration::seconds(self.cookie_max_age_secs))
                .build()
        });
        cookies.set_all(written);
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<StoredSession, SessionError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .header("apikey", &self.api_key)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(SessionError::Rejected(status));
        }
        if !status.is_success() {
            return Err(SessionError::Upstream(status));
        }

        let tokens: TokenResponse = response.json().await?;
        let expires_at = match (tokens.expires_at, tokens.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => self.clock.now_secs().checked_add(secs).ok_or_else(|| {
                SessionError::Malformed(format!("expires_in out of range: {}", secs))
            })?,
            (None, None) => {
                return Err(SessionError::Malformed(
                    "token response has no expiry".to_string(),
                ))
            }
        };

        Ok(StoredSession {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at,
            user: tokens.user,
        })
    }

    /// Ask the auth service who the access token belongs to.
    async fn verify_user(&self, access_token: &str) -> Result<SessionUser, SessionError> {
        let response = self
            .client
            .get(self.user_url.clone())
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SessionError::Rejected(status));
        }
        if !status.is_success() {
            return Err(SessionError::Upstream(status));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SessionProvider for TokenSessionProvider {
    async fn refresh(&self, cookies: &mut CookieBridge) -> Result<SessionState, SessionError> {
        let Some((raw, names)) = self.read_raw(cookies.get_all()) else {
            return Ok(SessionState::Anonymous);
        };
        let mut session = decode_session(&raw)?;
        let mut refreshed = false;

        let now = self.clock.now_secs();
        // expires_at is client-controlled; never let it overflow.
        if session.expires_at.saturating_sub(now) <= self.refresh_margin_secs {
            if session.refresh_token.is_empty() {
                return Err(SessionError::Expired);
            }
            match self.refresh_tokens(&session.refresh_token).await {
                Ok(fresh) => {
                    self.write(cookies, &fresh, &names);
                    session = fresh;
                    refreshed = true;
                }
                Err(SessionError::Rejected(status)) => {
                    for name in &names {
                        cookies.remove(name);
                    }
                    return Err(SessionError::Rejected(status));
                }
                // The current token may still be usable for a little while.
                Err(e) if session.expires_at > now => {
                    tracing::warn!(error = %e, "Session refresh failed, using current token");
                }
                Err(e) => return Err(e),
            }
        }

        let user = self.verify_user(&session.access_token).await?;
        Ok(SessionState::Active {
            user_id: user.id,
            refreshed,
        })
    }
}

/// Decode a cookie value: raw JSON or `base64-` prefixed base64url JSON.
pub fn decode_session(raw: &str) -> Result<StoredSession, SessionError> {
    let json = match raw.strip_prefix(BASE64_PREFIX) {
        Some(encoded) => {
            let bytes = URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))
                .map_err(|e| SessionError::Malformed(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| SessionError::Malformed(e.to_string()))?
        }
        None => raw.to_string(),
    };
    serde_json::from_str(&json).map_err(|e| SessionError::Malformed(e.to_string()))
}

pub fn encode_session(session: &StoredSession) -> String {
    // Serializing a struct of strings and integers cannot fail.
    let json = serde_json::to_string(session).unwrap_or_default();
    format!("{}{}", BASE64_PREFIX, URL_SAFE_NO_PAD.encode(json))
}
