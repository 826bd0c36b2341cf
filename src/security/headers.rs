//! Security response headers.
//!
//! # Responsibilities
//! - Attach the fixed hardening header set to every pipeline response
//! - Add HSTS in production only
//!
//! # Design Decisions
//! - Applied after the directive is materialised, so 400/429/redirects and
//!   forwarded responses all carry the same set
//! - Overwrites any value the upstream set for the same header

use axum::http::header::{
    REFERRER_POLICY, STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::Environment;

const HSTS_VALUE: &str = "max-age=31536000; includeSubDomains; preload";

#[derive(Debug, Clone, Copy)]
pub struct HeaderInjector {
    hsts: bool,
}

impl HeaderInjector {
    pub fn new(environment: Environment) -> Self {
        Self {
            hsts: environment.is_production(),
        }
    }

    /// The headers this injector adds, in order.
    pub fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
            (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (
                REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
        ];
        if self.hsts {
            headers.push((STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS_VALUE)));
        }
        headers
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        for (name, value) in self.headers() {
            headers.insert(name, value);
        }
    }
}
