//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, exclusion check)
//!     → request.rs (RequestContext: host, path, query, client key)
//!     → [pipeline decides a directive]
//!     → response.rs (reject / redirect) or forward to upstream
//!     → security headers + Set-Cookie
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{HttpServer, X_FORWARDED_HOST, X_SESSION_USER, X_TENANT};
