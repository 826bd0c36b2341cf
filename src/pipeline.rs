//! The per-request admission and routing pipeline.
//!
//! ```text
//! HostValidator → RateLimiter → TenantResolver → SessionRefresher → HeaderInjector → RoutingEngine
//! ```
//!
//! Stages run strictly in order. Host and rate-limit failures short-circuit
//! with a `Reject` directive; nothing after them runs. Header injection is
//! carried out by the caller on whatever response the directive produces.

use std::sync::Arc;

use axum::http::StatusCode;

use crate::config::{EdgeConfig, Environment};
use crate::http::request::RequestContext;
use crate::routing::{ResponseDirective, RoutingEngine};
use crate::security::{validate_host, Admission, HeaderInjector, RateLimiter, Tier, TierClassifier};
use crate::session::{CookieBridge, SessionCookieSet, SessionProvider, SessionRefresher, SessionState};
use crate::store::{Clock, CounterStore};
use crate::tenant::{TenantId, TenantResolver};

/// Injected collaborators that outlive any one configuration.
#[derive(Clone)]
pub struct Components {
    pub store: Arc<dyn CounterStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Everything the pipeline learned about one request.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub directive: ResponseDirective,
    pub tier: Option<Tier>,
    pub admission: Option<Admission>,
    pub tenant: Option<TenantId>,
    pub session: SessionState,
    pub cookies: CookieBridge,
}

impl PipelineOutcome {
    fn rejected(status: StatusCode, tier: Option<Tier>, admission: Option<Admission>, cookies: CookieBridge) -> Self {
        Self {
            directive: ResponseDirective::Reject(status),
            tier,
            admission,
            tenant: None,
            session: SessionState::Anonymous,
            cookies,
        }
    }
}

pub struct EdgePipeline {
    environment: Environment,
    classifier: TierClassifier,
    limiter: RateLimiter,
    resolver: TenantResolver,
    sessions: SessionRefresher,
    headers: HeaderInjector,
    engine: RoutingEngine,
}

impl EdgePipeline {
    pub fn new(config: &EdgeConfig, components: &Components) -> Self {
        let environment = config.environment;
        Self {
            environment,
            classifier: TierClassifier::new(&config.rate_limit.sensitive_prefixes),
            limiter: RateLimiter::new(
                &config.rate_limit,
                environment,
                components.store.clone(),
                components.clock.clone(),
            ),
            resolver: TenantResolver::new(&config.tenancy),
            sessions: SessionRefresher::new(components.sessions.clone()),
            headers: HeaderInjector::new(environment),
            engine: RoutingEngine::new(&config.tenancy),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn header_injector(&self) -> &HeaderInjector {
        &self.headers
    }

    /// Whether `path` lies under the internal rewrite prefix. Such paths must
    /// always go through the pipeline, never the static bypass.
    pub fn is_internal_path(&self, path: &str) -> bool {
        self.engine.is_internal(path)
    }

    pub async fn run(&self, ctx: &RequestContext, cookies: SessionCookieSet) -> PipelineOutcome {
        let cookies = CookieBridge::new(cookies);

        let host = match validate_host(ctx.hostname()) {
            Ok(host) => host,
            Err(error) => {
                tracing::debug!(request_id = %ctx.request_id(), error = %error, "Rejecting request");
                return PipelineOutcome::rejected(StatusCode::BAD_REQUEST, None, None, cookies);
            }
        };

        let tier = self.classifier.classify(ctx.path());
        let admission = self.limiter.check(ctx.client_key(), tier).await;
        if !admission.is_allowed() {
            return PipelineOutcome::rejected(
                StatusCode::TOO_MANY_REQUESTS,
                Some(tier),
                Some(admission),
                cookies,
            );
        }

        let tenant = self.resolver.resolve(&host, ctx.query_params());

        let mut cookies = cookies;
        let session = self.sessions.refresh(&mut cookies).await;

        let directive = self.engine.decide(&tenant, &host, ctx);

        tracing::debug!(
            request_id = %ctx.request_id(),
            host = %host,
            tenant = %tenant,
            tier = tier.as_str(),
            admission = admission.label(),
            directive = ?directive,
            "Pipeline decision"
        );

        PipelineOutcome {
            directive,
            tier: Some(tier),
            admission: Some(admission),
            tenant: Some(tenant),
            session,
            cookies,
        }
    }
}
