//! Scheduler (C8): drives one-shot (historic) or periodic (realtime)
//! calculation runs, owns the tick timer, and exposes cooperative
//! cancellation and a status-event channel (§4.8, §5, §7).
//!
//! A single task runs the realtime loop; writes are dispatched to a
//! worker thread via [`tokio::task::spawn_blocking`]-free `tokio::spawn`
//! (the writer's own I/O is already async) so the loop can arm the next
//! tick without waiting on disk/DB writes to finish, modulo the
//! `manager_locked` precondition the next iteration must observe.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::Duration as StdDuration;
use tracing::{error, info, warn};

use cml_common::{BoundingBox, CmlError, CmlResult, LinkSelection, StatusEvent};
use cml_store::Catalog;

use crate::calculation::{self, CalculationContext, CalculationParams};
use crate::writer::{self, ManagerLock, WriteRequest};

/// Fixed parameters of a realtime run, resolved once at start-up and
/// reused by every tick.
#[derive(Clone)]
pub struct RealtimeSettings {
    pub run_id: i64,
    pub step_minutes: i64,
    pub output_step_minutes: i64,
    pub retention_minutes: i64,
    pub rolling_hours: f64,
    pub rolling_sigma: f64,
    pub rolling_center: bool,
    pub correlation_mode: Option<cml_rain::correlation::CorrelationMode>,
    pub correlation_threshold: f64,
    pub baseline_dry_samples: usize,
    pub waa_max: f64,
    pub waa_tau_minutes: f64,
    pub selection: LinkSelection,
    pub out_cml_bucket: String,
    pub outputs_web: std::path::PathBuf,
    pub outputs_raw: std::path::PathBuf,
    pub is_output_total: bool,
}

/// Handle to a running realtime loop: send `()` to request cancellation
/// (the in-flight iteration, if any, is allowed to finish), and receive
/// [`StatusEvent`]s for the user-visible surface (§7).
pub struct RealtimeHandle {
    pub cancel: watch::Sender<bool>,
    pub events: mpsc::Receiver<StatusEvent>,
}

impl RealtimeHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

/// Runs a single historic (one-shot) calculation and persists its result,
/// returning once the writer has finished. `forced` mirrors the
/// forced-rewrite flow of §8 boundary scenario 6: every frame is written
/// regardless of watermarks, and the output bucket is wiped first.
pub async fn run_historic(
    ctx: &CalculationContext,
    lock: &ManagerLock,
    run_id: i64,
    params: CalculationParams,
    out_cml_bucket: &str,
    outputs_web: &std::path::Path,
    outputs_raw: &std::path::Path,
    forced: bool,
) -> CmlResult<writer::WriteOutcome> {
    calculation::validate_params(&params, None)?;

    let wipe_handle = if forced {
        Some(ctx.samples.wipe_output_bucket())
    } else {
        None
    };

    let result = calculation::run_once(ctx, params).await?;

    if !result.skipped.is_empty() {
        for skip in &result.skipped {
            warn!(link_id = skip.link_id, reason = %skip.reason, "link skipped during assembly");
        }
    }

    let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
    let req = WriteRequest {
        run_id,
        frames: &result.frames,
        datasets: &result.datasets,
        write_historic: forced,
        since_time: epoch,
        skip_influx: false,
        out_cml_bucket: out_cml_bucket.to_string(),
        outputs_web,
        outputs_raw,
        wipe_handle,
    };

    writer::write_results(lock, &ctx.catalog, &ctx.samples, req).await
}

/// Runs the long-horizon accumulation field (spec §1 core output (c)) over
/// an explicit time window and persists the resulting single grid through
/// the same writer path as a realtime frame, time-stamped at `params.end`.
/// Unlike [`run_historic`], there is no meaningful per-CML time series to
/// publish for a whole-run total, so the time-series write is skipped.
pub async fn run_historic_total(
    ctx: &CalculationContext,
    lock: &ManagerLock,
    run_id: i64,
    params: CalculationParams,
    out_cml_bucket: &str,
    outputs_web: &std::path::Path,
    outputs_raw: &std::path::Path,
) -> CmlResult<writer::WriteOutcome> {
    calculation::validate_params(&params, None)?;

    let result = calculation::run_accumulation(ctx, params).await?;

    if !result.skipped.is_empty() {
        for skip in &result.skipped {
            warn!(link_id = skip.link_id, reason = %skip.reason, "link skipped during assembly");
        }
    }

    let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
    let req = WriteRequest {
        run_id,
        frames: &result.frames,
        datasets: &result.datasets,
        write_historic: true,
        since_time: epoch,
        skip_influx: true,
        out_cml_bucket: out_cml_bucket.to_string(),
        outputs_web,
        outputs_raw,
        wipe_handle: None,
    };

    writer::write_results(lock, &ctx.catalog, &ctx.samples, req).await
}

/// Starts the periodic realtime loop as a background task and returns a
/// handle for cancellation and status observation. The precondition
/// before each iteration (§4.8) is `!manager_locked` and a healthy
/// sample-store ping; when either fails, the tick is skipped and retried
/// at the next scheduled time rather than aborting the loop.
pub fn spawn_realtime(ctx: Arc<CalculationContext>, lock: ManagerLock, settings: RealtimeSettings) -> RealtimeHandle {
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    let (events_tx, events_rx) = mpsc::channel(64);

    tokio::spawn(async move {
        loop {
            if *cancel_rx.borrow() {
                info!("realtime loop cancelled");
                break;
            }

            let tick_start = Utc::now();
            run_realtime_tick(&ctx, &lock, &settings, &events_tx).await;

            let next_tick = tick_start
                + ChronoDuration::minutes(settings.output_step_minutes)
                + ChronoDuration::seconds(10);
            let now = Utc::now();
            let wait = (next_tick - now).to_std().unwrap_or(StdDuration::from_secs(0));

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel_rx.changed() => {
                    if *cancel_rx.borrow() {
                        info!("realtime loop cancelled during wait");
                        break;
                    }
                }
            }
        }
    });

    RealtimeHandle { cancel: cancel_tx, events: events_rx }
}

async fn run_realtime_tick(
    ctx: &CalculationContext,
    lock: &ManagerLock,
    settings: &RealtimeSettings,
    events: &mpsc::Sender<StatusEvent>,
) {
    if lock.is_locked() {
        info!("skipping tick: writer still holds the manager lock");
        return;
    }
    if ctx.samples.check_connection().await.is_err() {
        warn!("skipping tick: sample store is unhealthy");
        let _ = events
            .send(StatusEvent::new(settings.run_id, CmlError::StoreUnavailable("sample store".into()).kind(), "sample store ping failed".into(), 0))
            .await;
        return;
    }

    let _ = events.send(StatusEvent::new(settings.run_id, "Progress", "starting iteration".into(), 5)).await;

    let end = Utc::now();
    let start = end - ChronoDuration::minutes(settings.retention_minutes);
    let last_grid_time = match ctx.catalog.get_last_raingrid_time(settings.run_id).await {
        Ok(t) => Some(t),
        Err(e) => {
            warn!(%e, "could not read last raingrid time");
            None
        }
    };

    let params = CalculationParams {
        start,
        end,
        step_minutes: settings.step_minutes,
        output_step_minutes: settings.output_step_minutes,
        is_realtime: true,
        rolling_hours: settings.rolling_hours,
        rolling_sigma: settings.rolling_sigma,
        rolling_center: settings.rolling_center,
        correlation_mode: settings.correlation_mode,
        correlation_threshold: settings.correlation_threshold,
        baseline_dry_samples: settings.baseline_dry_samples,
        waa_max: settings.waa_max,
        waa_tau_minutes: settings.waa_tau_minutes,
        selection: settings.selection.clone(),
        last_processed: last_grid_time,
        is_output_total: settings.is_output_total,
    };

    if let Err(e) = calculation::validate_params(&params, None) {
        error!(%e, "invalid realtime run parameters");
        let _ = events.send(StatusEvent::new(settings.run_id, e.kind(), e.to_string(), 0)).await;
        return;
    }

    let result = match calculation::run_once(ctx, params).await {
        Ok(r) => r,
        Err(e) => {
            error!(%e, "realtime calculation iteration failed");
            let _ = events.send(StatusEvent::new(settings.run_id, e.kind(), e.to_string(), 0)).await;
            return;
        }
    };

    let _ = events.send(StatusEvent::new(settings.run_id, "Progress", "writing results".into(), 80)).await;

    // Dispatched to a worker task rather than awaited here (§5): the loop
    // is free to arm the next tick while the write is in flight. The next
    // iteration's own precondition check (`manager_locked`) is what
    // actually serializes against this write finishing.
    let catalog = ctx.catalog.clone();
    let samples = ctx.samples.clone();
    let lock = lock.clone();
    let run_id = settings.run_id;
    let since = end - ChronoDuration::minutes(settings.retention_minutes);
    let out_cml_bucket = settings.out_cml_bucket.clone();
    let outputs_web = settings.outputs_web.clone();
    let outputs_raw = settings.outputs_raw.clone();
    let frames = result.frames;
    let datasets = result.datasets;
    let events = events.clone();

    tokio::spawn(async move {
        let req = WriteRequest {
            run_id,
            frames: &frames,
            datasets: &datasets,
            write_historic: false,
            since_time: since,
            skip_influx: false,
            out_cml_bucket,
            outputs_web: &outputs_web,
            outputs_raw: &outputs_raw,
            wipe_handle: None,
        };

        match writer::write_results(&lock, &catalog, &samples, req).await {
            Ok(outcome) => {
                info!(raingrids = outcome.raingrids_written, points = outcome.points_written, "realtime iteration complete");
                let _ = events
                    .send(StatusEvent::new(
                        run_id,
                        "Progress",
                        format!("wrote {} raingrids, {} points", outcome.raingrids_written, outcome.points_written),
                        99,
                    ))
                    .await;
            }
            Err(e) => {
                error!(%e, "writer failed");
                let _ = events.send(StatusEvent::new(run_id, e.kind(), e.to_string(), 50)).await;
            }
        }
    });
}

/// Allocates a new realtime run row from a bounding box and resolution,
/// wipes any prior realtime output when `fresh`, and returns the run ID
/// together with the resolved grid dimensions (§4.1).
pub async fn start_new_run(
    catalog: &Catalog,
    start: DateTime<Utc>,
    retention_minutes: i64,
    step_minutes: i64,
    resolution_deg: f64,
    bbox: BoundingBox,
    viewer_url: Option<&str>,
    fresh: bool,
) -> CmlResult<i64> {
    if fresh {
        catalog.wipe_realtime().await?;
    }
    catalog
        .insert_run(start, retention_minutes, step_minutes, resolution_deg, bbox, viewer_url)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_lock_blocks_a_tick_conceptually() {
        let lock = ManagerLock::new();
        assert!(!lock.is_locked());
    }
}
