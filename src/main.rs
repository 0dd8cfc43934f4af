//! Application router (v1)
//!
//! Command-line front end for the routing core.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────┐
//!                     │                    APP ROUTER                    │
//!                     │                                                  │
//!   GET /users/7      │  ┌──────────┐    ┌──────────┐    ┌────────────┐  │
//!   ──────────────────┼─▶│   http   │───▶│  router  │───▶│  matcher   │  │
//!                     │  │  server  │    │          │    │  + tree    │  │
//!                     │  └──────────┘    └────┬─────┘    └────────────┘  │
//!                     │                       │                          │
//!                     │                       ▼                          │
//!                     │                ┌─────────────┐   ┌────────────┐  │
//!                     │                │ middleware  │──▶│ data cache │  │
//!                     │                │   chain     │   │ + revalid. │  │
//!                     │                └──────┬──────┘   └────────────┘  │
//!   JSON navigation   │                       │                          │
//!   ◀─────────────────┼───────────────────────┘                          │
//!                     │                                                  │
//!                     │  ┌────────────────────────────────────────────┐  │
//!                     │  │  config · events/plugins · observability   │  │
//!                     │  └────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use app_router::config::{load_config, AppConfig};
use app_router::http::HttpServer;
use app_router::middleware::{Middleware, Next};
use app_router::observability::{logging, MetricsPlugin};
use app_router::routing::{MiddlewareRegistry, RouteContext, Router};
use app_router::DataCache;

#[derive(Parser)]
#[command(name = "app-router")]
#[command(about = "Route matching, middleware and data caching core", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve navigations over HTTP
    Serve,
    /// Run one navigation and print the result
    Match { path: String },
    /// List registered routes
    Routes,
    /// Validate the configuration and build the router
    Check,
}

/// Middleware that configuration files may refer to by name.
fn registry() -> MiddlewareRegistry {
    let mut registry = MiddlewareRegistry::new();
    registry.register(Middleware::new("logger", |ctx: RouteContext, next: Next| async move {
        tracing::info!(
            pathname = %ctx.pathname(),
            route = ctx.route().unwrap_or("-"),
            request_id = ctx.request_id().unwrap_or("unknown"),
            "navigation"
        );
        next.run(ctx).await
    }));
    registry
}

fn build_router(config: &AppConfig) -> Result<Router, Box<dyn std::error::Error>> {
    let cache = DataCache::new(&config.cache);
    let router = Router::from_config(config, cache, &registry())?;
    if config.observability.metrics_enabled {
        router.register_plugin(Arc::new(MetricsPlugin));
    }
    Ok(router)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    logging::init(&config.observability)?;

    tracing::info!("app-router v0.1.0 starting");

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::Match { path } => {
            let router = build_router(&config)?;
            let result = router.execute(&path).await;
            match &result {
                Ok(navigation) => println!("{}", serde_json::to_string_pretty(&navigation.view())?),
                Err(err) => {
                    eprintln!("Error: {}", err);
                    std::process::exit(1);
                }
            }
        }
        Commands::Routes => {
            let router = build_router(&config)?;
            let summaries: Vec<_> = router.routes().iter().map(|r| r.summary()).collect();
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::Check => {
            let router = build_router(&config)?;
            println!("ok: {} routes", router.len());
        }
    }

    Ok(())
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let router = Arc::new(build_router(&config)?);
    let shutdown = CancellationToken::new();

    if config.cache.sweep_interval_secs > 0 {
        router.cache().spawn_sweeper(
            Duration::from_secs(config.cache.sweep_interval_secs),
            shutdown.child_token(),
        );
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        routes = router.len(),
        "Listening for connections"
    );

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => signal.cancel(),
            Err(err) => tracing::error!(error = %err, "failed to listen for Ctrl+C"),
        }
    });

    HttpServer::new(router, &config).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
