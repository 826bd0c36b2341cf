//! Host to tenant resolution.

use std::collections::HashMap;

use crate::config::TenancyConfig;
use crate::security::ValidatedHost;
use crate::tenant::TenantId;

/// Host names treated as local development.
const LOCAL_MARKERS: [&str; 2] = ["localhost", "127.0.0.1"];

#[derive(Debug, Clone)]
pub struct TenantResolver {
    root_hostname: String,
    allow_dev_override: bool,
    override_param: String,
}

impl TenantResolver {
    pub fn new(config: &TenancyConfig) -> Self {
        if config.allow_dev_override {
            tracing::warn!(
                param = %config.override_param,
                "Tenant override query parameter is enabled"
            );
        }
        Self {
            root_hostname: config.root_hostname(),
            allow_dev_override: config.allow_dev_override,
            override_param: config.override_param.clone(),
        }
    }

    pub fn resolve(&self, host: &ValidatedHost, query: &HashMap<String, String>) -> TenantId {
        if let Some(tenant) = self.dev_override(query) {
            return tenant;
        }
        self.from_host(host)
    }

    /// Resolution from the host alone.
    pub fn from_host(&self, host: &ValidatedHost) -> TenantId {
        let hostname = host.hostname();
        if LOCAL_MARKERS.iter().any(|marker| hostname.contains(marker)) {
            return TenantId::RootApp;
        }

        // Anything outside the root domain (including spoofed hosts and the
        // bare domain itself) is served as the root application.
        hostname
            .strip_suffix(self.root_hostname.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .and_then(TenantId::from_slug)
            .unwrap_or(TenantId::RootApp)
    }

    fn dev_override(&self, query: &HashMap<String, String>) -> Option<TenantId> {
        if !self.allow_dev_override {
            return None;
        }
        let raw = query.get(&self.override_param)?;
        let tenant = TenantId::from_slug(raw);
        if tenant.is_none() {
            tracing::debug!(value = %raw, "Ignoring malformed tenant override");
        }
        tenant
    }
}
