//! CLI entry point for the rainfall scheduler (C8): drives a one-shot
//! historic calculation or starts the periodic realtime loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cml_common::LinkSetFile;
use metrics_exporter_prometheus::PrometheusBuilder;
use rain_scheduler::app;
use rain_scheduler::calculation::CalculationParams;
use rain_scheduler::config::Config;
use rain_scheduler::scheduler::{self, RealtimeSettings};
use rain_scheduler::status::{self, StatusBoard};
use rain_scheduler::writer::ManagerLock;

#[derive(Parser, Debug)]
#[command(name = "rain-scheduler")]
#[command(about = "Drives historic and realtime CML rainfall calculations")]
struct Args {
    /// Path to the flat YAML configuration file (§6).
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Path to the hierarchical link-sets file (§6). When omitted, every
    /// loaded CML is selected with the default flag (both channels).
    #[arg(long)]
    linkset: Option<PathBuf>,

    /// Named subsection of the link-sets file to resolve; `default` if
    /// omitted.
    #[arg(long, default_value = "default")]
    set: String,

    /// Port for the process-local `/health`, `/status`, `/metrics`
    /// surface. Only served in realtime mode.
    #[arg(long, default_value_t = 9200)]
    status_port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single calculation over an explicit time window and persist
    /// its output under a newly allocated run.
    Historic {
        /// Inclusive start, RFC 3339.
        #[arg(long)]
        start: DateTime<Utc>,
        /// Exclusive end, RFC 3339.
        #[arg(long)]
        end: DateTime<Utc>,
        /// Calculation step, minutes.
        #[arg(long)]
        step: Option<i64>,
        /// Output/animation step, minutes; defaults to `step`.
        #[arg(long)]
        output_step: Option<i64>,
        /// Forced-rewrite flow (§8 scenario 6): wipes the output bucket
        /// and writes every frame regardless of watermarks.
        #[arg(long, default_value_t = false)]
        forced: bool,
        /// Produce the long-horizon accumulation field (spec §1 core
        /// output (c)) over the whole window instead of a sequence of
        /// animation frames.
        #[arg(long, default_value_t = false)]
        total: bool,
    },
    /// Start the periodic realtime loop; runs until interrupted (Ctrl+C).
    Realtime {
        /// Wipe all prior realtime output before starting a fresh run.
        #[arg(long, default_value_t = false)]
        fresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = Config::load(&args.config).context("loading configuration")?;
    init_logging(&config.logging.init_level)?;

    info!(config = %args.config.display(), "starting rain-scheduler");

    let ctx = app::build_context(&config).await.context("building calculation context")?;
    let lock = ManagerLock::new();

    let selection = match &args.linkset {
        Some(path) => LinkSetFile::load(path).context("loading link-sets file")?.selection(&args.set),
        None => ctx.descriptors.keys().map(|id| (*id, 3u8)).collect(),
    };

    match args.command {
        Commands::Historic { start, end, step, output_step, forced, total } => {
            let step_minutes = step.unwrap_or(config.realtime.step_minutes);
            let output_step_minutes = output_step.unwrap_or(step_minutes);

            let run_id = scheduler::start_new_run(
                &ctx.catalog,
                start,
                config.realtime.retention_hours * 60,
                step_minutes,
                config.realtime.resolution_deg,
                config.rendering.bbox(),
                None,
                false,
            )
            .await
            .context("allocating historic run")?;

            let params = CalculationParams {
                start,
                end,
                step_minutes,
                output_step_minutes,
                is_realtime: false,
                rolling_hours: config.realtime.rolling_hours,
                rolling_sigma: config.realtime.rolling_sigma,
                rolling_center: config.realtime.rolling_center,
                correlation_mode: parse_correlation_mode(config.realtime.correlation_mode.as_deref()),
                correlation_threshold: config.realtime.correlation_threshold,
                baseline_dry_samples: config.realtime.baseline_dry_samples,
                waa_max: config.realtime.waa_max,
                waa_tau_minutes: config.realtime.waa_tau_minutes,
                selection,
                last_processed: None,
                is_output_total: config.realtime.output_total,
            };

            let outcome = if total {
                scheduler::run_historic_total(
                    &ctx,
                    &lock,
                    run_id,
                    params,
                    &config.influx2.bucket_out_cml,
                    &config.directories.outputs_web,
                    &config.directories.outputs_raw,
                )
                .await
                .context("running historic accumulation")?
            } else {
                scheduler::run_historic(
                    &ctx,
                    &lock,
                    run_id,
                    params,
                    &config.influx2.bucket_out_cml,
                    &config.directories.outputs_web,
                    &config.directories.outputs_raw,
                    forced,
                )
                .await
                .context("running historic calculation")?
            };

            info!(
                run_id,
                raingrids = outcome.raingrids_written,
                points = outcome.points_written,
                "historic run complete"
            );
        }
        Commands::Realtime { fresh } => {
            let run_id = scheduler::start_new_run(
                &ctx.catalog,
                Utc::now(),
                config.realtime.retention_hours * 60,
                config.realtime.step_minutes,
                config.realtime.resolution_deg,
                config.rendering.bbox(),
                None,
                fresh,
            )
            .await
            .context("allocating realtime run")?;

            let settings = RealtimeSettings {
                run_id,
                step_minutes: config.realtime.step_minutes,
                output_step_minutes: config.realtime.output_step_minutes,
                retention_minutes: config.realtime.retention_hours * 60,
                rolling_hours: config.realtime.rolling_hours,
                rolling_sigma: config.realtime.rolling_sigma,
                rolling_center: config.realtime.rolling_center,
                correlation_mode: parse_correlation_mode(config.realtime.correlation_mode.as_deref()),
                correlation_threshold: config.realtime.correlation_threshold,
                baseline_dry_samples: config.realtime.baseline_dry_samples,
                waa_max: config.realtime.waa_max,
                waa_tau_minutes: config.realtime.waa_tau_minutes,
                selection,
                out_cml_bucket: config.influx2.bucket_out_cml.clone(),
                outputs_web: config.directories.outputs_web.clone(),
                outputs_raw: config.directories.outputs_raw.clone(),
                is_output_total: config.realtime.output_total,
            };

            let prometheus = PrometheusBuilder::new()
                .install_recorder()
                .context("installing Prometheus recorder")?;
            let board = StatusBoard::new();
            let status_addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.status_port));
            let status_router = status::router(board.clone(), prometheus);
            tokio::spawn(async move {
                match tokio::net::TcpListener::bind(status_addr).await {
                    Ok(listener) => {
                        if let Err(e) = axum::serve(listener, status_router).await {
                            tracing::error!(%e, "status server exited");
                        }
                    }
                    Err(e) => tracing::error!(%e, "failed to bind status server"),
                }
            });

            let ctx = std::sync::Arc::new(ctx);
            let mut handle = scheduler::spawn_realtime(ctx, lock, settings);

            info!(run_id, port = args.status_port, "realtime loop started, press Ctrl+C to stop");
            loop {
                tokio::select! {
                    event = handle.events.recv() => {
                        match event {
                            Some(event) => {
                                info!(run_id = event.run_id, kind = %event.kind, progress = event.progress, "{}", event.message);
                                board.record(event).await;
                            }
                            None => break,
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("received Ctrl+C, cancelling realtime loop");
                        handle.cancel();
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn parse_correlation_mode(value: Option<&str>) -> Option<cml_rain::correlation::CorrelationMode> {
    match value {
        Some("filter") => Some(cml_rain::correlation::CorrelationMode::Filter),
        Some("compensate") => Some(cml_rain::correlation::CorrelationMode::Compensate),
        _ => None,
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).json().finish();
    tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;
    Ok(())
}
