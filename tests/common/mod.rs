//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower::ServiceExt;

use storefront_edge::config::{EdgeConfig, Environment};
use storefront_edge::session::NoopSessionProvider;
use storefront_edge::store::{MemoryStore, SystemClock};
use storefront_edge::{Components, HttpServer};

pub const ROOT_DOMAIN: &str = "shop.example";

/// What the upstream saw, as echoed back in its response body.
#[derive(Debug, Deserialize)]
pub struct Echo {
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
}

impl Echo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

async fn echo(request: Request<Body>) -> Response {
    let headers: BTreeMap<String, String> = request
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    Json(serde_json::json!({
        "method": request.method().as_str(),
        "uri": request.uri().to_string(),
        "headers": headers,
    }))
    .into_response()
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Upstream that answers every request with a JSON echo of its head.
pub async fn start_echo_upstream() -> SocketAddr {
    serve(Router::new().fallback(echo)).await
}

/// Upstream that waits `delay` before answering.
pub async fn start_slow_upstream(delay: Duration) -> SocketAddr {
    serve(Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        (StatusCode::OK, "late")
    }))
    .await
}

/// An address nothing listens on.
pub async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn edge_config(environment: Environment, upstream: SocketAddr) -> EdgeConfig {
    let mut config = EdgeConfig::default();
    config.environment = environment;
    config.tenancy.root_domain = ROOT_DOMAIN.to_string();
    config.upstream.address = upstream.to_string();
    config
}

pub fn components() -> Components {
    Components {
        store: Arc::new(MemoryStore::new()),
        sessions: Arc::new(NoopSessionProvider),
        clock: Arc::new(SystemClock),
    }
}

pub fn get(host: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri(uri)
        .header("host", host)
        .header("x-forwarded-for", "203.0.113.7")
}

pub async fn send(server: &HttpServer, request: Request<Body>) -> Response {
    server.router().oneshot(request).await.unwrap()
}

pub async fn read_echo(response: Response) -> Echo {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
