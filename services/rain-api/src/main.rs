//! Rain-grid HTTP API.
//!
//! Optional, read-only surface (§4.8/§6) in front of the files and
//! metadata rows the scheduler's writer (C7) produces: PNG directory
//! listing and serving, a health check, and a point-value query that
//! answers a single grid cell without re-running interpolation.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use rain_api::config::Config;
use rain_api::handlers;
use rain_api::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "rain-api")]
#[command(about = "Read-only HTTP surface for rain-grid images and point values")]
struct Args {
    /// Path to the flat YAML configuration file (§6).
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).json().finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("starting rain-api");

    let config = Config::load(&args.config).context("loading configuration")?;

    let catalog = cml_store::Catalog::connect(&config.mariadb.database_url())
        .await
        .context("connecting to metadata store")?;

    let state = Arc::new(AppState::new(catalog, config.directories.outputs_web.clone(), config.directories.outputs_raw.clone()));

    let app = Router::new()
        .route("/", get(handlers::static_files::list_pngs))
        .route("/api/hello", get(handlers::health::hello_handler))
        .route("/api/gridvalue", get(handlers::gridvalue::gridvalue_handler))
        .route("/:filename", get(handlers::static_files::serve_png))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.listen.address, config.listen.port)
        .parse()
        .context("parsing listen address")?;
    info!(address = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
