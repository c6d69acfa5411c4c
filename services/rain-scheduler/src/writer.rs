//! Writer (C7): PNG + raw-grid rendering, metadata persistence, and
//! per-CML time-series publishing, guarded by `manager_locked` (§4.7,
//! §4.12). Grounded on `handlers/realtime_writer.py` /
//! `writers/realtime_writer.py` in the original implementation: two
//! streams (raingrids into the metadata store, individual-CML series
//! into the sample store), both gated by the same watermark rule.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cml_common::model::{LinkDataset, RainGrid};
use cml_common::{CmlError, CmlResult};
use cml_field::animate::Frame;
use cml_render::raw;
use cml_store::samples::RainPoint;
use cml_store::{Catalog, SampleStore};

/// The single shared mutual-exclusion flag between the scheduler and the
/// writer (§4.7, §5 "shared state").
#[derive(Clone, Default)]
pub struct ManagerLock(Arc<AtomicBool>);

impl ManagerLock {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_locked(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Acquire the lock for the duration of a write, releasing it
    /// unconditionally when the guard drops (including on an error path),
    /// the idiomatic substitute for the Python original's `finally`.
    fn guard(&self) -> ManagerLockGuard {
        self.0.store(true, Ordering::SeqCst);
        ManagerLockGuard(self.0.clone())
    }
}

struct ManagerLockGuard(Arc<AtomicBool>);

impl Drop for ManagerLockGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct WriteRequest<'a> {
    pub run_id: i64,
    pub frames: &'a [Frame],
    pub datasets: &'a [LinkDataset],
    /// Forced-rewrite mode: write every frame regardless of the "since"
    /// watermark, per §8 boundary scenario 6.
    pub write_historic: bool,
    pub since_time: DateTime<Utc>,
    pub skip_influx: bool,
    pub out_cml_bucket: String,
    pub outputs_web: &'a Path,
    pub outputs_raw: &'a Path,
    /// A background bucket-wipe task in flight for a forced rewrite,
    /// joined before any time-series point is written (§4.7).
    pub wipe_handle: Option<JoinHandle<CmlResult<()>>>,
}

pub struct WriteOutcome {
    pub raingrids_written: usize,
    pub points_written: usize,
}

/// Persists one iteration's results. Acquires `lock` for the duration of
/// the call and always releases it on return, per §4.7.
pub async fn write_results(
    lock: &ManagerLock,
    catalog: &Catalog,
    samples: &SampleStore,
    req: WriteRequest<'_>,
) -> CmlResult<WriteOutcome> {
    let _guard = lock.guard();

    let last_time = catalog.get_last_raingrid_time(req.run_id).await?;
    let raingrids_written = write_raingrids(catalog, &req, last_time).await?;

    let points_written = if req.skip_influx {
        0
    } else {
        if let Some(handle) = req.wipe_handle {
            info!("waiting for output bucket wipe to finish before writing time series");
            let _ = handle.await;
        }
        write_timeseries(samples, &req, last_time).await?
    };

    Ok(WriteOutcome { raingrids_written, points_written })
}

async fn write_raingrids(catalog: &Catalog, req: &WriteRequest<'_>, last_time: DateTime<Utc>) -> CmlResult<usize> {
    std::fs::create_dir_all(req.outputs_web).map_err(CmlError::Io)?;
    std::fs::create_dir_all(req.outputs_raw).map_err(CmlError::Io)?;

    let cml_ids: Vec<i64> = req.datasets.iter().map(|d| d.cml_id).collect();

    let mut written = 0;
    for frame in req.frames {
        if frame.time <= last_time {
            continue;
        }
        if !req.write_historic && frame.time <= req.since_time {
            continue;
        }

        let filename_stem = frame.time.format("%Y-%m-%d_%H%M").to_string();
        let height = frame.grid.len();
        let width = frame.grid.first().map(|r| r.len()).unwrap_or(0);
        let flat: Vec<f64> = frame.grid.iter().flatten().copied().collect();

        let png_bytes = cml_render::render_rain_grid(&flat, width, height)
            .map_err(CmlError::WriterFailure)?;
        let png_path = req.outputs_web.join(format!("{filename_stem}.png"));
        std::fs::write(&png_path, png_bytes).map_err(CmlError::Io)?;

        let raw_path = req.outputs_raw.join(format!("{filename_stem}.bin"));
        let mut raw_file = std::fs::File::create(&raw_path).map_err(CmlError::Io)?;
        raw::write_grid(&mut raw_file, &frame.grid).map_err(CmlError::Io)?;

        let (median, mean, max) = grid_stats(&flat);
        let grid_row = RainGrid {
            time: frame.time,
            run_id: req.run_id,
            cml_ids: cml_ids.clone(),
            filename: format!("{filename_stem}.png"),
            median,
            mean,
            max,
        };
        catalog.insert_raingrid(req.run_id, &grid_row).await?;
        written += 1;
        info!(time = %frame.time, "wrote raingrid");
    }
    Ok(written)
}

async fn write_timeseries(samples: &SampleStore, req: &WriteRequest<'_>, last_time: DateTime<Utc>) -> CmlResult<usize> {
    let compare_time = if !req.write_historic && req.since_time > last_time {
        req.since_time
    } else {
        last_time
    };

    let mut points = Vec::new();
    for dataset in req.datasets {
        let means = dataset.channel_mean_rain_rate();
        for (i, &t) in dataset.time.iter().enumerate() {
            if t <= compare_time {
                continue;
            }
            let value = means[i];
            if value.is_nan() {
                continue;
            }
            points.push(RainPoint {
                cml_id: dataset.cml_id,
                rain_intensity: value,
                timestamp_s: t.timestamp(),
            });
        }
    }

    if points.is_empty() {
        return Ok(0);
    }

    match samples.write_points(&points, &req.out_cml_bucket).await {
        Ok(()) => Ok(points.len()),
        Err(err) => {
            warn!(%err, "failed to write rain time series");
            Err(err)
        }
    }
}

/// NaN-aware median/mean/max over a flattened grid, for the metadata row.
fn grid_stats(values: &[f64]) -> (f64, f64, f64) {
    let mut valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = valid.len() / 2;
    let median = if valid.len() % 2 == 0 {
        (valid[mid - 1] + valid[mid]) / 2.0
    } else {
        valid[mid]
    };
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let max = valid[valid.len() - 1];
    (median, mean, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_stats_ignores_nan() {
        let values = [1.0, f64::NAN, 3.0, 5.0];
        let (median, mean, max) = grid_stats(&values);
        assert_eq!(median, 3.0);
        assert!((mean - 3.0).abs() < 1e-9);
        assert_eq!(max, 5.0);
    }

    #[test]
    fn grid_stats_all_nan_returns_zero() {
        let values = [f64::NAN, f64::NAN];
        assert_eq!(grid_stats(&values), (0.0, 0.0, 0.0));
    }

    #[test]
    fn manager_lock_releases_on_guard_drop() {
        let lock = ManagerLock::new();
        assert!(!lock.is_locked());
        {
            let _guard = lock.guard();
            assert!(lock.is_locked());
        }
        assert!(!lock.is_locked());
    }
}
