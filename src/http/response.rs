//! Response construction for pipeline directives.
//!
//! # Responsibilities
//! - Build terminal 400/404/429 responses (with advisory rate-limit headers)
//! - Build redirects
//! - Map upstream failures to 502/504
//!
//! # Design Decisions
//! - Bodies are short plain text; the upstream owns real error pages
//! - Hardening headers are added by the caller, after this module

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::security::Admission;

/// Terminal rejection. A 429 carries the limit, remaining and reset headers.
pub fn reject(status: StatusCode, admission: Option<&Admission>) -> Response {
    let body = match status {
        StatusCode::BAD_REQUEST => "Bad Request",
        StatusCode::NOT_FOUND => "Not Found",
        StatusCode::TOO_MANY_REQUESTS => "Too Many Requests",
        _ => "Request rejected",
    };
    let mut response = (status, body).into_response();

    if status == StatusCode::TOO_MANY_REQUESTS {
        if let Some(decision) = admission.and_then(Admission::decision) {
            for (name, value) in decision.headers() {
                response.headers_mut().insert(name, value);
            }
        }
    }
    response
}

/// Method-preserving redirect to `target`.
pub fn redirect(target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
            response.headers_mut().insert(LOCATION, location);
            response
        }
        Err(_) => {
            tracing::error!(target = %target, "Redirect target is not a valid header value");
            reject(StatusCode::BAD_REQUEST, None)
        }
    }
}

pub fn upstream_error(status: StatusCode) -> Response {
    let body = match status {
        StatusCode::GATEWAY_TIMEOUT => "Upstream timed out",
        _ => "Upstream request failed",
    };
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}
