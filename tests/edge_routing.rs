//! End-to-end routing through the edge router against a live upstream.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{LOCATION, STRICT_TRANSPORT_SECURITY};
use axum::http::{Request, StatusCode};

use storefront_edge::config::Environment;
use storefront_edge::HttpServer;

mod common;
use common::{header, read_echo, send};

async fn production_server() -> HttpServer {
    let upstream = common::start_echo_upstream().await;
    HttpServer::new(
        common::edge_config(Environment::Production, upstream),
        common::components(),
    )
}

#[tokio::test]
async fn test_tenant_subdomain_is_rewritten() {
    let server = production_server().await;
    let request = common::get("acme.shop.example", "/products?page=2")
        .body(Body::empty())
        .unwrap();

    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(response.headers(), "x-frame-options"), Some("SAMEORIGIN"));
    assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    assert!(response.headers().contains_key("x-request-id"));

    let echo = read_echo(response).await;
    assert_eq!(echo.uri, "/sites/acme/products?page=2");
    assert_eq!(echo.header("x-tenant"), Some("acme"));
    assert_eq!(echo.header("x-forwarded-host"), Some("acme.shop.example"));
    assert!(echo.header("x-session-user").is_none());
}

#[tokio::test]
async fn test_root_domain_and_aliases_pass_through() {
    let server = production_server().await;

    for host in ["shop.example", "www.shop.example", "app.shop.example"] {
        let request = common::get(host, "/pricing").body(Body::empty()).unwrap();
        let response = send(&server, request).await;
        assert_eq!(response.status(), StatusCode::OK, "{}", host);

        let echo = read_echo(response).await;
        assert_eq!(echo.uri, "/pricing", "{}", host);
        assert_eq!(echo.header("x-tenant"), Some("app"), "{}", host);
    }
}

#[tokio::test]
async fn test_tenant_admin_redirects_to_root() {
    let server = production_server().await;
    let request = common::get("acme.shop.example", "/admin/orders?status=open")
        .body(Body::empty())
        .unwrap();

    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        header(response.headers(), LOCATION.as_str()),
        Some("https://shop.example/admin/orders?status=open")
    );
    assert_eq!(header(response.headers(), "x-content-type-options"), Some("nosniff"));
}

#[tokio::test]
async fn test_missing_host_is_rejected() {
    let server = production_server().await;
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();

    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header(response.headers(), "x-frame-options"), Some("SAMEORIGIN"));
    assert_eq!(header(response.headers(), "x-content-type-options"), Some("nosniff"));
    assert_eq!(
        header(response.headers(), "referrer-policy"),
        Some("strict-origin-when-cross-origin")
    );
    assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    assert!(!response.headers().contains_key("x-ratelimit-limit"));
}

#[tokio::test]
async fn test_malformed_host_is_rejected() {
    let server = production_server().await;
    let request = common::get("evil.example/../x", "/").body(Body::empty()).unwrap();

    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_sensitive_path_is_rate_limited_per_client() {
    let server = production_server().await;

    for _ in 0..5 {
        let request = common::get("acme.shop.example", "/login").body(Body::empty()).unwrap();
        assert_eq!(send(&server, request).await.status(), StatusCode::OK);
    }

    let request = common::get("acme.shop.example", "/login").body(Body::empty()).unwrap();
    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(response.headers(), "x-ratelimit-limit"), Some("5"));
    assert_eq!(header(response.headers(), "x-ratelimit-remaining"), Some("0"));
    assert!(response.headers().contains_key("x-ratelimit-reset"));
    assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));

    // Public tier has its own bucket.
    let request = common::get("acme.shop.example", "/").body(Body::empty()).unwrap();
    assert_eq!(send(&server, request).await.status(), StatusCode::OK);

    // So does another client.
    let request = Request::builder()
        .uri("/login")
        .header("host", "acme.shop.example")
        .header("x-forwarded-for", "198.51.100.1")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&server, request).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_development_skips_limits_and_hsts() {
    let upstream = common::start_echo_upstream().await;
    let server = HttpServer::new(
        common::edge_config(Environment::Development, upstream),
        common::components(),
    );

    for _ in 0..30 {
        let request = common::get("localhost:3000", "/login").body(Body::empty()).unwrap();
        let response = send(&server, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    }
}

#[tokio::test]
async fn test_excluded_paths_bypass_pipeline() {
    let server = production_server().await;
    let request = common::get("acme.shop.example", "/_next/static/chunk.js")
        .header("x-tenant", "spoofed")
        .body(Body::empty())
        .unwrap();

    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("x-frame-options"));

    let echo = read_echo(response).await;
    assert_eq!(echo.uri, "/_next/static/chunk.js");
    assert!(echo.header("x-forwarded-host").is_none());
}

#[tokio::test]
async fn test_client_identity_headers_are_replaced() {
    let server = production_server().await;
    let request = common::get("acme.shop.example", "/account")
        .header("x-tenant", "other-store")
        .header("x-session-user", "admin")
        .body(Body::empty())
        .unwrap();

    let echo = read_echo(send(&server, request).await).await;
    assert_eq!(echo.method, "GET");
    assert_eq!(echo.header("x-tenant"), Some("acme"));
    assert!(echo.header("x-session-user").is_none());
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let upstream = common::closed_address().await;
    let server = HttpServer::new(
        common::edge_config(Environment::Production, upstream),
        common::components(),
    );

    let request = common::get("acme.shop.example", "/").body(Body::empty()).unwrap();
    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(header(response.headers(), "x-frame-options"), Some("SAMEORIGIN"));
}

#[tokio::test]
async fn test_slow_upstream_times_out() {
    let upstream = common::start_slow_upstream(Duration::from_secs(3)).await;
    let mut config = common::edge_config(Environment::Production, upstream);
    config.upstream.request_timeout_secs = 1;
    let server = HttpServer::new(config, common::components());

    let request = common::get("acme.shop.example", "/").body(Body::empty()).unwrap();
    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_reload_changes_root_domain() {
    let server = production_server().await;
    let upstream = server.config().config.upstream.address.clone();

    let mut config = server.config().config.clone();
    config.tenancy.root_domain = "mall.example".to_string();
    server.reload(config);
    assert_eq!(server.config().config.upstream.address, upstream);

    let request = common::get("acme.mall.example", "/").body(Body::empty()).unwrap();
    let echo = read_echo(send(&server, request).await).await;
    assert_eq!(echo.uri, "/sites/acme/");

    // The old root no longer matches, so its subdomains fall back to the root app.
    let request = common::get("acme.shop.example", "/").body(Body::empty()).unwrap();
    let echo = read_echo(send(&server, request).await).await;
    assert_eq!(echo.uri, "/");
}

#[tokio::test]
async fn test_root_host_cannot_reach_tenant_scope() {
    let server = production_server().await;

    for uri in ["/sites/victim/account", "/sites/victim/logo.png"] {
        let request = common::get("shop.example", uri).body(Body::empty()).unwrap();
        let response = send(&server, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(header(response.headers(), "x-frame-options"), Some("SAMEORIGIN"));
    }

    // On a tenant host the same path stays inside that tenant's scope.
    let request = common::get("acme.shop.example", "/sites/victim/account")
        .body(Body::empty())
        .unwrap();
    let echo = read_echo(send(&server, request).await).await;
    assert_eq!(echo.uri, "/sites/acme/sites/victim/account");
    assert_eq!(echo.header("x-tenant"), Some("acme"));
}

#[tokio::test]
async fn test_dot_segments_are_rejected() {
    let server = production_server().await;

    for uri in ["/x/../../sites/victim/account", "/./account", "/a/%2e%2e/b"] {
        let request = common::get("acme.shop.example", uri).body(Body::empty()).unwrap();
        let response = send(&server, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert!(response.headers().contains_key(STRICT_TRANSPORT_SECURITY));
    }
}
