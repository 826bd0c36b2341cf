//! Tenant identification.
//!
//! # Data Flow
//! ```text
//! ValidatedHost + query parameters
//!     → resolver.rs (local dev check, root-domain suffix strip, dev override)
//!     → TenantId::RootApp | TenantId::Tenant(slug)
//!     → routing engine
//! ```
//!
//! # Design Decisions
//! - The root application is a variant, not a magic string
//! - Resolution is deterministic: no time, randomness or I/O
//! - Unknown hosts fall back to the root application rather than being rejected

pub mod resolver;

use std::fmt;

use serde::Serialize;

pub use resolver::TenantResolver;

/// Slug reported for the shared root application.
pub const ROOT_APP_SLUG: &str = "app";

/// Sentinel subdomains that denote the root application.
const ROOT_ALIASES: [&str; 2] = ["app", "www"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "slug", rename_all = "snake_case")]
pub enum TenantId {
    /// The shared application (marketing site, admin).
    RootApp,
    /// One store, by normalized slug.
    Tenant(String),
}

impl TenantId {
    /// Build from a raw subdomain. Root aliases map to `RootApp`; anything that
    /// is not a usable slug yields `None`.
    pub fn from_slug(raw: &str) -> Option<Self> {
        let slug = raw.trim().to_ascii_lowercase();
        if !is_valid_slug(&slug) {
            return None;
        }
        if ROOT_ALIASES.contains(&slug.as_str()) {
            Some(TenantId::RootApp)
        } else {
            Some(TenantId::Tenant(slug))
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, TenantId::RootApp)
    }

    pub fn slug(&self) -> &str {
        match self {
            TenantId::RootApp => ROOT_APP_SLUG,
            TenantId::Tenant(slug) => slug,
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Lowercase DNS labels joined by dots; each label alphanumeric or '-',
/// never starting or ending with '-'.
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= 253
        && slug.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        })
}
