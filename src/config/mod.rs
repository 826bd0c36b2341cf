//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, EDGE_* overrides)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → shared via Arc to the pipeline
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the running pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - The tenant override can never be switched on in production

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{
    force_environment, load_config, load_startup_config, load_with_overrides, parse_config,
    ConfigError,
};
pub use schema::{
    EdgeConfig, Environment, ListenerConfig, LogFormat, ObservabilityConfig, RateLimitConfig,
    RoutingConfig, SessionConfig, StoreKind, TenancyConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
