//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the edge handler and middleware
//! - Reject `.`/`..` path segments, then skip the pipeline for excluded (static) paths
//! - Run the pipeline and materialise its directive
//! - Forward Continue/Rewrite requests to the upstream application
//! - Swap in reloaded configuration without dropping connections

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        header::COOKIE,
        request::Parts,
        uri::{PathAndQuery, Scheme},
        HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri, Version,
    },
    response::Response,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::EdgeConfig;
use crate::http::request::RequestContext;
use crate::http::response;
use crate::observability::metrics;
use crate::pipeline::{Components, EdgePipeline, PipelineOutcome};
use crate::routing::{has_dot_segments, PathExclusion, ResponseDirective};
use crate::session::SessionCookieSet;

/// Resolved tenant slug handed to the upstream.
pub const X_TENANT: HeaderName = HeaderName::from_static("x-tenant");
/// Authenticated subject handed to the upstream.
pub const X_SESSION_USER: HeaderName = HeaderName::from_static("x-session-user");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Everything derived from one configuration generation.
pub struct EdgeRuntime {
    pub config: EdgeConfig,
    pub pipeline: EdgePipeline,
    pub exclusions: PathExclusion,
    upstream_timeout: Duration,
}

impl EdgeRuntime {
    pub fn build(config: EdgeConfig, components: &Components) -> Self {
        Self {
            pipeline: EdgePipeline::new(&config, components),
            exclusions: PathExclusion::new(&config.routing.excluded_prefixes),
            upstream_timeout: Duration::from_secs(config.upstream.request_timeout_secs),
            config,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<EdgeRuntime>>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the edge router.
pub struct HttpServer {
    state: AppState,
    components: Components,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and collaborators.
    pub fn new(config: EdgeConfig, components: Components) -> Self {
        let runtime = EdgeRuntime::build(config, &components);
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(runtime)),
            client,
        };
        Self { state, components }
    }

    /// The Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(edge_handler)
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Replace the running configuration.
    pub fn reload(&self, config: EdgeConfig) {
        apply_reload(&self.state, &self.components, config);
    }

    pub fn config(&self) -> Arc<EdgeRuntime> {
        self.state.inner.load_full()
    }

    /// Serve until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let components = self.components.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(config) = config_updates.recv() => {
                        apply_reload(&state, &components, config);
                    }
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn apply_reload(state: &AppState, components: &Components, config: EdgeConfig) {
    let ignored = startup_only_changes(&state.inner.load().config, &config);
    if !ignored.is_empty() {
        tracing::warn!(
            fields = ?ignored,
            "Reload changes settings fixed at startup; they stay partly applied until restart"
        );
    }
    tracing::info!(
        environment = config.environment.as_str(),
        root_domain = %config.tenancy.root_domain,
        "Applying reloaded configuration"
    );
    state
        .inner
        .store(Arc::new(EdgeRuntime::build(config, components)));
}

/// Settings captured by the startup components (store, session provider,
/// listener, subscriber) that a reload cannot fully apply.
fn startup_only_changes(current: &EdgeConfig, next: &EdgeConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.environment != next.environment {
        changed.push("environment");
    }
    if current.rate_limit.store != next.rate_limit.store
        || current.rate_limit.redis_url != next.rate_limit.redis_url
    {
        changed.push("rate_limit.store");
    }
    if current.session != next.session {
        changed.push("session");
    }
    if current.listener.bind_address != next.listener.bind_address {
        changed.push("listener.bind_address");
    }
    if current.observability != next.observability {
        changed.push("observability");
    }
    changed
}

/// Runs the pipeline for every non-excluded request.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let runtime = state.inner.load_full();
    let (mut parts, body) = request.into_parts();

    if has_dot_segments(parts.uri.path()) {
        tracing::debug!(path = %parts.uri.path(), "Rejecting path with dot segments");
        let mut response = response::reject(StatusCode::BAD_REQUEST, None);
        runtime.pipeline.header_injector().apply(response.headers_mut());
        metrics::record_request("reject", response.status().as_u16(), start);
        return response;
    }

    let path = parts.uri.path();
    if runtime.exclusions.is_excluded(path) && !runtime.pipeline.is_internal_path(path) {
        let response = forward(&state, &runtime, parts, body, None).await;
        metrics::record_request("excluded", response.status().as_u16(), start);
        return response;
    }

    let ctx = RequestContext::from_parts(&parts, runtime.config.environment);
    let outcome = runtime
        .pipeline
        .run(&ctx, SessionCookieSet::from_headers(&parts.headers))
        .await;

    let mut response = match &outcome.directive {
        ResponseDirective::Reject(status) => response::reject(*status, outcome.admission.as_ref()),
        ResponseDirective::Redirect(target) => response::redirect(target),
        ResponseDirective::Continue => {
            prepare_upstream_headers(&mut parts.headers, &ctx, &outcome);
            forward(&state, &runtime, parts, body, None).await
        }
        ResponseDirective::Rewrite(target) => match target.parse::<PathAndQuery>() {
            Ok(rewritten) => {
                prepare_upstream_headers(&mut parts.headers, &ctx, &outcome);
                forward(&state, &runtime, parts, body, Some(rewritten)).await
            }
            Err(e) => {
                tracing::error!(request_id = %ctx.request_id(), target = %target, error = %e, "Invalid rewrite target");
                response::reject(StatusCode::BAD_REQUEST, None)
            }
        },
    };

    if !matches!(outcome.directive, ResponseDirective::Reject(_)) {
        outcome.cookies.apply_to_response(response.headers_mut());
    }
    runtime.pipeline.header_injector().apply(response.headers_mut());

    metrics::record_request(outcome.directive.label(), response.status().as_u16(), start);
    response
}

/// Replace identity headers (never trusted from the client) and propagate
/// refreshed cookies to the upstream's view of the request.
fn prepare_upstream_headers(headers: &mut HeaderMap, ctx: &RequestContext, outcome: &PipelineOutcome) {
    headers.remove(X_TENANT);
    headers.remove(X_SESSION_USER);

    if let Some(tenant) = &outcome.tenant {
        if let Ok(value) = HeaderValue::from_str(tenant.slug()) {
            headers.insert(X_TENANT, value);
        }
    }
    if let Some(user) = outcome.session.user_id() {
        match HeaderValue::from_str(user) {
            Ok(value) => {
                headers.insert(X_SESSION_USER, value);
            }
            Err(_) => tracing::warn!(request_id = %ctx.request_id(), "Session user id is not a valid header value"),
        }
    }
    if let Ok(value) = HeaderValue::from_str(ctx.hostname()) {
        headers.insert(X_FORWARDED_HOST, value);
    }

    if outcome.cookies.is_dirty() {
        headers.remove(COOKIE);
        if let Some(value) = outcome.cookies.request_view().to_header_value() {
            headers.insert(COOKIE, value);
        }
    }
}

/// Forward a request to the upstream, optionally with a rewritten path.
async fn forward(
    state: &AppState,
    runtime: &EdgeRuntime,
    parts: Parts,
    body: Body,
    rewrite: Option<PathAndQuery>,
) -> Response {
    let path_and_query = rewrite
        .or_else(|| parts.uri.path_and_query().cloned())
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    let uri = match Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(runtime.config.upstream.address.as_str())
        .path_and_query(path_and_query)
        .build()
    {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(upstream = %runtime.config.upstream.address, error = %e, "Invalid upstream URI");
            return response::upstream_error(StatusCode::BAD_GATEWAY);
        }
    };

    let mut request = Request::from_parts(parts, body);
    *request.uri_mut() = uri;
    *request.version_mut() = Version::HTTP_11;

    match tokio::time::timeout(runtime.upstream_timeout, state.client.request(request)).await {
        Ok(Ok(upstream)) => {
            let (parts, body) = upstream.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(upstream = %runtime.config.upstream.address, error = %e, "Upstream error");
            response::upstream_error(StatusCode::BAD_GATEWAY)
        }
        Err(_) => {
            tracing::warn!(upstream = %runtime.config.upstream.address, "Upstream timed out");
            response::upstream_error(StatusCode::GATEWAY_TIMEOUT)
        }
    }
}
