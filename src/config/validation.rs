//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Validation is a pure function
//! over `EdgeConfig` and reports every problem, not just the first.

use url::Url;

use crate::config::schema::{EdgeConfig, StoreKind};

/// Longest accepted rate-limit window.
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting all errors.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let tenancy = &config.tenancy;
    let root = tenancy.root_domain.trim();
    if root.is_empty() {
        errors.push(ValidationError::new("tenancy.root_domain", "must not be empty"));
    } else if root.starts_with('.') || root.contains('/') {
        errors.push(ValidationError::new(
            "tenancy.root_domain",
            format!("'{}' is not a bare host name", root),
        ));
    }
    if !tenancy.admin_path_prefix.starts_with('/') {
        errors.push(ValidationError::new("tenancy.admin_path_prefix", "must start with '/'"));
    }
    if !tenancy.rewrite_prefix.starts_with('/') || tenancy.rewrite_prefix.len() < 2 {
        errors.push(ValidationError::new(
            "tenancy.rewrite_prefix",
            "must start with '/' and name a path",
        ));
    }
    if tenancy.override_param.is_empty() {
        errors.push(ValidationError::new("tenancy.override_param", "must not be empty"));
    }
    if tenancy.allow_dev_override && config.environment.is_production() {
        errors.push(ValidationError::new(
            "tenancy.allow_dev_override",
            "the tenant override cannot be enabled in production",
        ));
    }

    let rate = &config.rate_limit;
    if rate.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    } else if rate.window_secs > MAX_WINDOW_SECS {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be at most 86400 (one day)"));
    }
    if rate.public_limit == 0 {
        errors.push(ValidationError::new("rate_limit.public_limit", "must be greater than 0"));
    }
    if rate.sensitive_limit == 0 {
        errors.push(ValidationError::new("rate_limit.sensitive_limit", "must be greater than 0"));
    }
    if rate.store_timeout_ms == 0 {
        errors.push(ValidationError::new("rate_limit.store_timeout_ms", "must be greater than 0"));
    }
    for prefix in &rate.sensitive_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "rate_limit.sensitive_prefixes",
                format!("'{}' must start with '/'", prefix),
            ));
        }
    }
    if rate.store == StoreKind::Redis && Url::parse(&rate.redis_url).is_err() {
        errors.push(ValidationError::new(
            "rate_limit.redis_url",
            format!("'{}' is not a valid URL", rate.redis_url),
        ));
    }

    let session = &config.session;
    if session.enabled {
        if session.cookie_name.is_empty() {
            errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
        }
        if Url::parse(&session.auth_url).is_err() {
            errors.push(ValidationError::new(
                "session.auth_url",
                format!("'{}' is not a valid URL", session.auth_url),
            ));
        }
        if session.timeout_ms == 0 {
            errors.push(ValidationError::new("session.timeout_ms", "must be greater than 0"));
        }
    }

    for prefix in &config.routing.excluded_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "routing.excluded_prefixes",
                format!("'{}' must start with '/'", prefix),
            ));
        }
    }

    if config.upstream.address.parse::<std::net::SocketAddr>().is_err()
        && !config.upstream.address.contains(':')
    {
        errors.push(ValidationError::new(
            "upstream.address",
            format!("'{}' must be host:port", config.upstream.address),
        ));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "upstream.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
