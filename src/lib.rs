//! Multi-tenant storefront edge router.
//!
//! Every request passes host validation, rate limiting, tenant resolution
//! and session refresh before a routing directive is chosen.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod security;
pub mod session;
pub mod store;
pub mod tenant;

pub use config::EdgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Components, EdgePipeline, PipelineOutcome};
