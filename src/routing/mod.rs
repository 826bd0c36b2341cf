//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming path
//!     → matcher.rs (exclusion rule: static assets, framework prefix, dotted segments)
//!     → excluded: forwarded untouched, pipeline skipped
//!
//! After tenant resolution:
//!     (TenantId, path, query)
//!     → engine.rs (decision table)
//!     → ResponseDirective: Continue | Redirect | Rewrite | Reject
//! ```
//!
//! # Design Decisions
//! - Rules compiled from config at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always yields the same directive

pub mod engine;
pub mod matcher;

pub use engine::{ResponseDirective, RoutingEngine};
pub use matcher::{has_dot_segments, Matcher, PathExclusion};
