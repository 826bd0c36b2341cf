//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → host.rs (reject missing/malformed Host, 400)
//!     → rate_limit.rs (tier by path, shared counter check, 429)
//!     → [tenant resolution, session refresh, routing]
//!     → headers.rs (hardening headers on every response)
//! ```
//!
//! # Design Decisions
//! - Cheap checks first: a rejected client costs one counter round trip at most
//! - Rate-limit store failures fail open and are logged distinctly
//! - No trust in client input: Host is validated, identity headers are stripped

pub mod headers;
pub mod host;
pub mod rate_limit;

pub use headers::HeaderInjector;
pub use host::{validate_host, HostError, ValidatedHost};
pub use rate_limit::{Admission, RateLimitDecision, RateLimiter, Tier, TierClassifier};
