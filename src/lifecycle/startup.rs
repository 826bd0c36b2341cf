//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the counter store the config asks for
//! - Build the session provider (or the no-op one when sessions are off)
//! - Hand both to the pipeline as injected [`Components`]
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Redis is only dialled when the store kind is `redis`

use std::sync::Arc;

use thiserror::Error;

use crate::config::{EdgeConfig, StoreKind};
use crate::pipeline::Components;
use crate::session::{NoopSessionProvider, SessionError, SessionProvider, TokenSessionProvider};
use crate::store::{Clock, CounterStore, MemoryStore, RedisStore, StoreError, SystemClock};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("rate-limit store: {0}")]
    Store(#[from] StoreError),

    #[error("session provider: {0}")]
    Session(#[from] SessionError),

    #[error("store kind is redis but no redis_url is configured")]
    MissingRedisUrl,
}

/// Build the long-lived collaborators for `config`.
pub async fn build_components(config: &EdgeConfig) -> Result<Components, StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn CounterStore> = match config.rate_limit.store {
        StoreKind::Memory => {
            if config.environment.is_production() {
                tracing::warn!("In-memory rate-limit store in production; limits are per instance");
            }
            Arc::new(MemoryStore::new())
        }
        StoreKind::Redis => {
            let url = config.rate_limit.redis_url.trim();
            if url.is_empty() {
                return Err(StartupError::MissingRedisUrl);
            }
            Arc::new(RedisStore::connect(url).await?)
        }
    };

    let sessions: Arc<dyn SessionProvider> = if config.session.enabled {
        Arc::new(TokenSessionProvider::new(
            &config.session,
            config.environment,
            clock.clone(),
        )?)
    } else {
        Arc::new(NoopSessionProvider)
    };

    tracing::info!(
        store = store.name(),
        sessions = config.session.enabled,
        "Components initialised"
    );

    Ok(Components {
        store,
        sessions,
        clock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_uses_memory_store() {
        let components = build_components(&EdgeConfig::default()).await.unwrap();
        assert_eq!(components.store.name(), "memory");
    }

    #[tokio::test]
    async fn test_redis_without_url_fails() {
        let mut config = EdgeConfig::default();
        config.rate_limit.store = StoreKind::Redis;
        config.rate_limit.redis_url = String::new();

        let err = build_components(&config).await.err().unwrap();
        assert!(matches!(err, StartupError::MissingRedisUrl));
    }
}
