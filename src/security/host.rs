//! Host header validation.
//!
//! # Responsibilities
//! - Reject requests whose Host header is missing, empty or malformed
//! - Split the header into a lowercase host name and optional port
//!
//! # Design Decisions
//! - Membership in the root domain is not checked here: tenant subdomains are
//!   unbounded, so that decision belongs to tenant resolution
//! - Failure is terminal (400) and no later stage runs

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("missing or empty Host header")]
    MissingHost,
    #[error("malformed Host header '{0}'")]
    InvalidHost(String),
}

/// A structurally valid Host header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedHost {
    hostname: String,
    port: Option<u16>,
}

impl ValidatedHost {
    /// Lowercase host name without the port.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl fmt::Display for ValidatedHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.hostname, port),
            None => f.write_str(&self.hostname),
        }
    }
}

/// Validate a raw Host header value.
pub fn validate_host(raw: &str) -> Result<ValidatedHost, HostError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(HostError::MissingHost);
    }
    let invalid = || HostError::InvalidHost(raw.to_string());

    let (hostname, port) = if let Some(rest) = raw.strip_prefix('[') {
        // IPv6 literal: [::1]:8080
        let (addr, after) = rest.split_once(']').ok_or_else(invalid)?;
        if addr.is_empty() || !addr.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '.') {
            return Err(invalid());
        }
        let port = match after {
            "" => None,
            p => Some(parse_port(p.strip_prefix(':').ok_or_else(invalid)?).ok_or_else(invalid)?),
        };
        (format!("[{}]", addr.to_ascii_lowercase()), port)
    } else {
        let (name, port) = match raw.rsplit_once(':') {
            Some((name, port)) => (name, Some(parse_port(port).ok_or_else(invalid)?)),
            None => (raw, None),
        };
        if name.is_empty()
            || name.starts_with('.')
            || name.contains("..")
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
        {
            return Err(invalid());
        }
        (name.trim_end_matches('.').to_ascii_lowercase(), port)
    };

    Ok(ValidatedHost { hostname, port })
}

fn parse_port(port: &str) -> Option<u16> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    port.parse().ok()
}
