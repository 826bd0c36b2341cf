//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{EdgeConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid {name}: {message}")]
    Env { name: &'static str, message: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub const ENV_ENVIRONMENT: &str = "EDGE_ENVIRONMENT";
pub const ENV_ROOT_DOMAIN: &str = "EDGE_ROOT_DOMAIN";
pub const ENV_REDIS_URL: &str = "EDGE_REDIS_URL";

/// Parse a TOML file without any semantic checks.
pub fn parse_config(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let config = parse_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the file if given (otherwise defaults), apply overrides from `lookup`
/// and only then validate. Startup and hot reload both go through here so a
/// file that needs its overrides to be valid behaves the same in both.
pub fn load_with_overrides<F>(path: Option<&Path>, lookup: F) -> Result<EdgeConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_config(path)?,
        None => EdgeConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// [`load_with_overrides`] against the process environment.
pub fn load_startup_config(path: Option<&Path>) -> Result<EdgeConfig, ConfigError> {
    load_with_overrides(path, |name| std::env::var(name).ok())
}

/// Switch environments and re-check, since rules such as the tenant override
/// depend on the environment.
pub fn force_environment(config: &mut EdgeConfig, environment: Environment) -> Result<(), ConfigError> {
    config.environment = environment;
    validate_config(config).map_err(ConfigError::Validation)
}

/// Apply `EDGE_*` overrides. The lookup is injected so tests never touch
/// the process environment.
pub fn apply_env_overrides<F>(config: &mut EdgeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_ENVIRONMENT) {
        config.environment = value.parse().map_err(|message| ConfigError::Env {
            name: ENV_ENVIRONMENT,
            message,
        })?;
    }
    if let Some(value) = lookup(ENV_ROOT_DOMAIN) {
        config.tenancy.root_domain = value;
    }
    if let Some(value) = lookup(ENV_REDIS_URL) {
        config.rate_limit.redis_url = value;
    }
    Ok(())
}
