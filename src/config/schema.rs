//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Deployment environment. Gates rate limiting and HSTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Root configuration for the edge router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Deployment environment.
    pub environment: Environment,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Downstream application the router forwards to.
    pub upstream: UpstreamConfig,

    /// Tenant resolution settings.
    pub tenancy: TenancyConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Session refresh settings.
    pub session: SessionConfig,

    /// Paths that bypass the pipeline entirely.
    pub routing: RoutingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Total time allowed for the upstream request/response, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Tenant resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Root domain, optionally with a port (e.g., "shop.example" or "localhost:3000").
    pub root_domain: String,

    /// Path prefix of the shared admin surface; only served on the root domain.
    pub admin_path_prefix: String,

    /// Internal prefix tenant-scoped paths are rewritten under.
    pub rewrite_prefix: String,

    /// Honour the tenant override query parameter. Never allowed in production.
    pub allow_dev_override: bool,

    /// Name of the tenant override query parameter.
    pub override_param: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            root_domain: "localhost:3000".to_string(),
            admin_path_prefix: "/admin".to_string(),
            rewrite_prefix: "/sites".to_string(),
            allow_dev_override: false,
            override_param: "subdomain".to_string(),
        }
    }
}

impl TenancyConfig {
    /// Root domain without any port, lowercased.
    pub fn root_hostname(&self) -> String {
        let domain = self.root_domain.trim().to_ascii_lowercase();
        match domain.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
                host.to_string()
            }
            _ => domain,
        }
    }
}

/// Backend used for the shared rate-limit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Redis,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Counter store backend.
    pub store: StoreKind,

    /// Redis connection URL (used when `store = "redis"`).
    pub redis_url: String,

    /// Prefix for every counter key.
    pub key_prefix: String,

    /// Length of the sliding window in seconds.
    pub window_secs: u64,

    /// Admitted requests per window on the public tier.
    pub public_limit: u64,

    /// Admitted requests per window on the sensitive tier.
    pub sensitive_limit: u64,

    /// Path prefixes classified as the sensitive tier.
    pub sensitive_prefixes: Vec<String>,

    /// Upper bound on a single counter store call, in milliseconds.
    pub store_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "edge:ratelimit".to_string(),
            window_secs: 10,
            public_limit: 20,
            sensitive_limit: 5,
            sensitive_prefixes: vec![
                "/checkout".to_string(),
                "/login".to_string(),
                "/api/auth".to_string(),
            ],
            store_timeout_ms: 50,
        }
    }
}

/// Session refresh configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Enable session refresh. When disabled every request is anonymous.
    pub enabled: bool,

    /// Base name of the session cookie (chunks are `name.0`, `name.1`, ...).
    pub cookie_name: String,

    /// Base URL of the auth service (token endpoint lives under it).
    pub auth_url: String,

    /// API key sent to the auth service.
    pub api_key: String,

    /// Refresh sessions expiring within this many seconds.
    pub refresh_margin_secs: u64,

    /// Timeout for the refresh call in milliseconds.
    pub timeout_ms: u64,

    /// Max-Age of written session cookies.
    pub cookie_max_age_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: "sb-auth-token".to_string(),
            auth_url: "http://127.0.0.1:54321/auth/v1".to_string(),
            api_key: String::new(),
            refresh_margin_secs: 60,
            timeout_ms: 500,
            // 400 days, the browser cap
            cookie_max_age_secs: 400 * 24 * 60 * 60,
        }
    }
}

/// Paths excluded from the pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Static asset and framework prefixes forwarded untouched.
    pub excluded_prefixes: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: vec![
                "/_next".to_string(),
                "/_static".to_string(),
                "/static".to_string(),
            ],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
