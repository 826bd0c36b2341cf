//! Routing decision table.
//!
//! | Tenant      | Path                 | Directive                          |
//! |-------------|----------------------|------------------------------------|
//! | store       | admin prefix         | Redirect to the same URL on root   |
//! | root app    | rewrite prefix       | Reject 404 (internal only)         |
//! | root app    | any other            | Continue                           |
//! | store       | any other            | Rewrite to `/sites/{slug}{path}`   |
//!
//! Each request is evaluated on its own; the engine holds only configuration.

use axum::http::StatusCode;
use serde::{Serialize, Serializer};

use crate::config::TenancyConfig;
use crate::http::request::RequestContext;
use crate::security::ValidatedHost;
use crate::tenant::TenantId;

/// The single terminal decision of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "directive", content = "target", rename_all = "snake_case")]
pub enum ResponseDirective {
    /// Serve the request as-is.
    Continue,
    /// Client-visible redirect to an absolute URL.
    Redirect(String),
    /// Internal rewrite to a path (plus query).
    Rewrite(String),
    /// Terminal error status.
    Reject(#[serde(serialize_with = "serialize_status")] StatusCode),
}

fn serialize_status<S: Serializer>(status: &StatusCode, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u16(status.as_u16())
}

impl ResponseDirective {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseDirective::Continue => "continue",
            ResponseDirective::Redirect(_) => "redirect",
            ResponseDirective::Rewrite(_) => "rewrite",
            ResponseDirective::Reject(_) => "reject",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingEngine {
    root_hostname: String,
    admin_prefix: String,
    rewrite_prefix: String,
}

impl RoutingEngine {
    pub fn new(config: &TenancyConfig) -> Self {
        Self {
            root_hostname: config.root_hostname(),
            admin_prefix: config.admin_path_prefix.clone(),
            rewrite_prefix: config.rewrite_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Pure decision over already-validated inputs; cannot fail.
    pub fn decide(
        &self,
        tenant: &TenantId,
        host: &ValidatedHost,
        ctx: &RequestContext,
    ) -> ResponseDirective {
        match tenant {
            TenantId::RootApp if self.is_internal(ctx.path()) => {
                ResponseDirective::Reject(StatusCode::NOT_FOUND)
            }
            TenantId::RootApp => ResponseDirective::Continue,
            TenantId::Tenant(_) if ctx.path().starts_with(&self.admin_prefix) => {
                ResponseDirective::Redirect(self.root_url(host, ctx))
            }
            TenantId::Tenant(slug) => ResponseDirective::Rewrite(format!(
                "{}/{}{}",
                self.rewrite_prefix,
                slug,
                ctx.path_and_query()
            )),
        }
    }

    /// Paths under the rewrite prefix are only ever produced by a rewrite.
    pub fn is_internal(&self, path: &str) -> bool {
        path.strip_prefix(self.rewrite_prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    /// The request URL with the host swapped for the root domain.
    fn root_url(&self, host: &ValidatedHost, ctx: &RequestContext) -> String {
        let port = host.port().map(|p| format!(":{}", p)).unwrap_or_default();
        format!(
            "{}://{}{}{}",
            ctx.scheme(),
            self.root_hostname,
            port,
            ctx.path_and_query()
        )
    }
}
