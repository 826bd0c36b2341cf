//! Per-request context.
//!
//! # Responsibilities
//! - Capture host, path, query and client identity once per request
//! - Derive the rate-limit client key from forwarding headers
//! - Carry the environment flag to every stage
//!
//! # Design Decisions
//! - Immutable after construction; stages read, never write
//! - A missing client address collapses into one shared fallback bucket

use std::collections::HashMap;

use axum::http::header::HOST;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use uuid::Uuid;

use crate::config::Environment;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_REAL_IP: &str = "x-real-ip";

/// Client key used when no forwarding header names the client.
pub const FALLBACK_CLIENT_KEY: &str = "127.0.0.1";

#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    hostname: String,
    path: String,
    query: Option<String>,
    query_params: HashMap<String, String>,
    client_key: String,
    scheme: String,
    environment: Environment,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts, environment: Environment) -> Self {
        let headers = &parts.headers;
        let hostname = headers
            .get(HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            // HTTP/2 carries the host in :authority instead
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default();

        let query = parts.uri.query().map(str::to_string);
        let query_params = query
            .as_deref()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let scheme = header_str(headers, X_FORWARDED_PROTO)
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| v == "http" || v == "https")
            .unwrap_or_else(|| {
                if environment.is_production() { "https" } else { "http" }.to_string()
            });

        Self {
            request_id: header_str(headers, X_REQUEST_ID)
                .map(str::to_string)
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            hostname,
            path: parts.uri.path().to_string(),
            query,
            query_params,
            client_key: client_key(headers),
            scheme,
            environment,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Raw Host header (empty when absent).
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// First hop of `X-Forwarded-For`, then `X-Real-IP`, then the fallback.
pub fn client_key(headers: &HeaderMap) -> String {
    header_str(headers, X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .or_else(|| header_str(headers, X_REAL_IP))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(FALLBACK_CLIENT_KEY)
        .to_string()
}
