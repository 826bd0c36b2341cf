//! Session refresh against a mocked auth service.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_edge::config::{EdgeConfig, Environment};
use storefront_edge::session::provider::{encode_session, SessionUser, StoredSession};
use storefront_edge::session::TokenSessionProvider;
use storefront_edge::store::{MemoryStore, SystemClock};
use storefront_edge::{Components, HttpServer};

mod common;
use common::{read_echo, send};

const API_KEY: &str = "anon-key";

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

fn session_cookie(access: &str, refresh: &str, expires_at: i64) -> String {
    let session = StoredSession {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        expires_at,
        user: Some(SessionUser { id: "user-42".to_string() }),
    };
    format!("sb-auth-token={}; theme=dark", encode_session(&session))
}

async fn server_with_auth(auth: &MockServer) -> HttpServer {
    let upstream = common::start_echo_upstream().await;
    let mut config: EdgeConfig = common::edge_config(Environment::Development, upstream);
    config.session.enabled = true;
    config.session.api_key = API_KEY.to_string();
    config.session.auth_url = format!("{}/auth/v1", auth.uri());

    let clock = Arc::new(SystemClock);
    let sessions = TokenSessionProvider::new(&config.session, config.environment, clock.clone()).unwrap();
    let components = Components {
        store: Arc::new(MemoryStore::new()),
        sessions: Arc::new(sessions),
        clock,
    };
    HttpServer::new(config, components)
}

async fn mount_user(auth: &MockServer, token: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "id": "user-42" })))
        .mount(auth)
        .await;
}

#[tokio::test]
async fn test_valid_session_identifies_user() {
    let auth = MockServer::start().await;
    mount_user(&auth, "current-access", 200).await;
    let server = server_with_auth(&auth).await;

    let request = common::get("acme.shop.example", "/account")
        .header("cookie", session_cookie("current-access", "r1", now_secs() + 3600))
        .body(Body::empty())
        .unwrap();
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(SET_COOKIE).is_none());
    let echo = read_echo(response).await;
    assert_eq!(echo.header("x-session-user"), Some("user-42"));
}

#[tokio::test]
async fn test_expiring_session_is_refreshed() {
    let auth = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(header("apikey", API_KEY))
        .and(body_json(json!({ "refresh_token": "old-refresh" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 3600,
            "user": { "id": "user-42" }
        })))
        .expect(1)
        .mount(&auth)
        .await;
    mount_user(&auth, "new-access", 200).await;
    let server = server_with_auth(&auth).await;

    let request = common::get("acme.shop.example", "/account")
        .header("cookie", session_cookie("old-access", "old-refresh", now_secs() + 10))
        .body(Body::empty())
        .unwrap();
    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("sb-auth-token=base64-"));
    assert!(set_cookie.contains("HttpOnly"));

    let echo = read_echo(response).await;
    assert_eq!(echo.header("x-session-user"), Some("user-42"));
    // The upstream sees the refreshed cookie, not the one the client sent.
    let forwarded = echo.header("cookie").unwrap();
    let new_value = set_cookie.split(';').next().unwrap();
    assert!(forwarded.contains(new_value));
    assert!(forwarded.contains("theme=dark"));
}

#[tokio::test]
async fn test_rejected_refresh_clears_cookie() {
    let auth = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })))
        .mount(&auth)
        .await;
    let server = server_with_auth(&auth).await;

    let request = common::get("acme.shop.example", "/account")
        .header("cookie", session_cookie("old-access", "revoked", now_secs() - 10))
        .body(Body::empty())
        .unwrap();
    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("sb-auth-token=;"));
    assert!(set_cookie.contains("Max-Age=0"));

    let echo = read_echo(response).await;
    assert!(echo.header("x-session-user").is_none());
    assert_eq!(echo.header("cookie"), Some("theme=dark"));
}

#[tokio::test]
async fn test_auth_outage_degrades_to_anonymous() {
    let auth = MockServer::start().await;
    mount_user(&auth, "current-access", 503).await;
    let server = server_with_auth(&auth).await;

    let request = common::get("acme.shop.example", "/account")
        .header("cookie", session_cookie("current-access", "r1", now_secs() + 3600))
        .body(Body::empty())
        .unwrap();
    let response = send(&server, request).await;

    assert_eq!(response.status(), StatusCode::OK);
    let echo = read_echo(response).await;
    assert_eq!(echo.uri, "/sites/acme/account");
    assert!(echo.header("x-session-user").is_none());
}

#[tokio::test]
async fn test_no_cookie_never_calls_auth() {
    let auth = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&auth)
        .await;
    let server = server_with_auth(&auth).await;

    let request = common::get("acme.shop.example", "/").body(Body::empty()).unwrap();
    let echo = read_echo(send(&server, request).await).await;
    assert!(echo.header("x-session-user").is_none());
}
