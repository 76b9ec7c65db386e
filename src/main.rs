//! ordo-site: deployment verification for the Ordo marketing site.
//!
//! This is the application entry point. It initializes tracing, loads
//! configuration from a TOML file plus environment overrides, and then either
//! serves the API, runs a one-off deployment check, or runs the deploy banner
//! check against a running server.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ordo_site::banner::{BannerSettings, DeployBanner, FileStore, HttpStatusSource, StatusCache};
use ordo_site::config::{AppConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use ordo_site::deployment::{CheckerSettings, DeploymentChecker};
use ordo_site::http::start_server;
use ordo_site::routes::create_router;
use ordo_site::state::AppState;
use ordo_site::templates::init_templates;
use ordo_site::AppError;

/// ordo-site: health and deployment status for the Ordo site
#[derive(Parser, Debug)]
#[command(name = "ordo-site", version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level filter (e.g., "ordo_site=debug,tower_http=info")
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the health and deployment status API (default)
    Serve,
    /// Check the production deployment once and print the result as JSON
    Check,
    /// Run the deploy banner check and print the banner if it is still shown
    Banner {
        /// Route the banner is rendered on
        #[arg(long, default_value = "/")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));
    if config.logging.is_json() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!(
        site_url = config.site.url.as_deref().unwrap_or("<unset>"),
        app_id_configured = config.site.app_id.is_some(),
        environment = ?config.site.environment,
        "Loaded configuration"
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await?,
        Command::Check => check(config).await?,
        Command::Banner { path } => banner(config, &path).await?,
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<(), AppError> {
    let checker = DeploymentChecker::new(CheckerSettings::from(&config))?;
    let state = AppState::new(config.clone(), checker);
    let app = create_router(state);

    start_server(app, &config).await?;
    Ok(())
}

async fn check(config: AppConfig) -> Result<(), AppError> {
    let checker = DeploymentChecker::new(CheckerSettings::from(&config))?;
    let status = checker.check().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

async fn banner(config: AppConfig, path: &str) -> Result<(), AppError> {
    let tera = init_templates()?;
    let store = Arc::new(FileStore::new(&config.banner.state_dir));
    let cache = StatusCache::new(store, config.banner.cache_ttl());
    let source = Arc::new(HttpStatusSource::new(
        reqwest::Client::new(),
        config.banner.status_url.clone(),
    ));

    let banner = DeployBanner::new(BannerSettings::from(&config), cache, source);
    let outcome = banner.mount().finished().await;
    tracing::debug!(?outcome, "Banner check finished");

    if let Some(html) = banner.render(&tera, Some(path))? {
        println!("{}", html);
    }
    Ok(())
}
