use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use clap::{Parser, Subcommand};
use serde_json::json;
use url::Url;

use storefront_edge::config::{
    force_environment, load_config, ConfigError, EdgeConfig, Environment,
};
use storefront_edge::http::RequestContext;
use storefront_edge::pipeline::{Components, EdgePipeline};
use storefront_edge::routing::PathExclusion;
use storefront_edge::session::{NoopSessionProvider, SessionCookieSet};
use storefront_edge::store::{MemoryStore, SystemClock};

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Inspect routing decisions and configuration for the storefront edge router", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the directive the pipeline would produce for a URL
    Explain {
        url: String,

        /// Configuration file to evaluate against
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Evaluate as production (enables rate limiting and HSTS)
        #[arg(long)]
        production: bool,

        /// Client address used as the rate-limit key
        #[arg(long, default_value = "127.0.0.1")]
        client_key: String,
    },
    /// Parse and validate a configuration file
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Explain {
            url,
            config,
            production,
            client_key,
        } => {
            let mut config = match config {
                Some(path) => load_config(&path)?,
                None => EdgeConfig::default(),
            };
            if production {
                force_environment(&mut config, Environment::Production)?;
            }
            explain(&config, &url, &client_key).await?;
        }
        Commands::CheckConfig { path } => match load_config(&path) {
            Ok(config) => {
                println!(
                    "{} is valid ({} environment, root domain {})",
                    path.display(),
                    config.environment.as_str(),
                    config.tenancy.root_domain
                );
            }
            Err(ConfigError::Validation(errors)) => {
                eprintln!("{} is invalid:", path.display());
                for error in errors {
                    eprintln!("  - {}", error);
                }
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

async fn explain(
    config: &EdgeConfig,
    raw_url: &str,
    client_key: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse(raw_url)?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    let path_and_query = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    if PathExclusion::new(&config.routing.excluded_prefixes).is_excluded(url.path()) {
        let report = json!({
            "url": raw_url,
            "excluded": true,
            "directive": { "directive": "continue" },
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let request = Request::builder()
        .uri(path_and_query)
        .header("host", host)
        .header("x-forwarded-for", client_key)
        .header("x-forwarded-proto", url.scheme())
        .body(Body::empty())?;
    let (parts, _) = request.into_parts();

    let components = Components {
        store: Arc::new(MemoryStore::new()),
        sessions: Arc::new(NoopSessionProvider),
        clock: Arc::new(SystemClock),
    };
    let pipeline = EdgePipeline::new(config, &components);
    let ctx = RequestContext::from_parts(&parts, config.environment);
    let outcome = pipeline.run(&ctx, SessionCookieSet::default()).await;

    let security_headers: serde_json::Map<String, serde_json::Value> = pipeline
        .header_injector()
        .headers()
        .into_iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                json!(value.to_str().unwrap_or_default()),
            )
        })
        .collect();

    let report = json!({
        "url": raw_url,
        "excluded": false,
        "environment": config.environment.as_str(),
        "tier": outcome.tier,
        "admission": outcome.admission.as_ref().map(|a| a.label()),
        "rate_limit": outcome.admission.as_ref().and_then(|a| a.decision()),
        "tenant": outcome.tenant,
        "directive": outcome.directive,
        "security_headers": security_headers,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
