//! Session refresh subsystem.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → cookies.rs (SessionCookieSet, CookieBridge)
//!     → provider.rs (decode, refresh near expiry, verify)
//!     → SessionState + staged cookie writes
//!         → forwarded request Cookie header
//!         → response Set-Cookie headers
//! ```
//!
//! # Design Decisions
//! - Never blocks the routing decision: any failure degrades to Anonymous
//! - The provider is injected; the router owns no auth business rules

pub mod cookies;
pub mod provider;

use std::sync::Arc;

use crate::observability::metrics;

pub use cookies::{CookieBridge, SessionCookieSet};
pub use provider::{
    NoopSessionProvider, SessionError, SessionProvider, SessionState, TokenSessionProvider,
};

/// Runs the provider and swallows its failures.
#[derive(Clone)]
pub struct SessionRefresher {
    provider: Arc<dyn SessionProvider>,
}

impl SessionRefresher {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    pub async fn refresh(&self, cookies: &mut CookieBridge) -> SessionState {
        match self.provider.refresh(cookies).await {
            Ok(state) => {
                let outcome = match &state {
                    SessionState::Anonymous => "anonymous",
                    SessionState::Active { refreshed: true, .. } => "refreshed",
                    SessionState::Active { refreshed: false, .. } => "valid",
                };
                metrics::record_session_refresh(outcome);
                state
            }
            Err(error) => {
                match &error {
                    SessionError::Malformed(_) | SessionError::Expired | SessionError::Rejected(_) => {
                        tracing::debug!(error = %error, "No active session")
                    }
                    _ => tracing::warn!(error = %error, "Session refresh failed, continuing anonymously"),
                }
                metrics::record_session_refresh("failed");
                SessionState::Anonymous
            }
        }
    }
}
