//! One calculation iteration (§4.13): assembly → rain-rate pipeline →
//! segmentation → field generation. Historic and realtime modes share
//! this function; the scheduler only differs in how it computes
//! `start`/`end` and what it does with the result.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cml_common::model::CmlDescriptor;
use cml_common::{CmlError, CmlResult, LinkSelection};
use cml_field::accumulate::GridSpec;
use cml_field::animate::{self, AnimationConfig, Frame};
use cml_field::crop;
use cml_field::idw::IdwParams;
use cml_rain::correlation::CorrelationMode;
use cml_rain::pipeline::{self, ExternalFilterConfig, PipelineConfig, WetDryStrategy};
use cml_segment::SegmentMode;
use cml_store::samples::{RealtimeWindow, SampleStore};
use cml_store::Catalog;

use crate::config::Config;

/// Everything a calculation needs that is constant across iterations of
/// the same process: the loaded descriptor map, the two stores, and the
/// static knobs resolved once from configuration.
pub struct CalculationContext {
    pub catalog: Arc<Catalog>,
    pub samples: Arc<SampleStore>,
    pub descriptors: Arc<HashMap<i64, CmlDescriptor>>,
    pub tech_policy: cml_assembler::TechPolicy,
    pub segment_mode: SegmentMode,
    pub grid: GridSpec,
    pub idw: IdwParams,
    pub min_rain_value: f64,
    pub external_filter: Option<ExternalFilterConfig>,
    pub polygons: Option<geo::MultiPolygon<f64>>,
}

/// Parameters that vary per iteration.
pub struct CalculationParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step_minutes: i64,
    pub output_step_minutes: i64,
    pub is_realtime: bool,
    pub rolling_hours: f64,
    pub rolling_sigma: f64,
    pub rolling_center: bool,
    pub correlation_mode: Option<CorrelationMode>,
    pub correlation_threshold: f64,
    pub baseline_dry_samples: usize,
    pub waa_max: f64,
    pub waa_tau_minutes: f64,
    pub selection: LinkSelection,
    pub last_processed: Option<DateTime<Utc>>,
    /// When true, animation-frame cells hold millimetres accumulated over
    /// `output_step_minutes` rather than mm/h rates (§4.6).
    pub is_output_total: bool,
}

pub struct CalculationResult {
    pub frames: Vec<Frame>,
    pub datasets: Vec<cml_common::model::LinkDataset>,
    pub skipped: Vec<cml_assembler::SkippedLink>,
}

/// Shared by [`run_once`] and [`run_accumulation`]: queries samples for
/// the selected links, assembles per-link datasets, runs the rain-rate
/// pipeline, and attaches segment geometry. Everything downstream of this
/// point (animation frames vs. the overall accumulation field) is just a
/// different reduction over the same prepared datasets.
async fn prepare_datasets(
    ctx: &CalculationContext,
    params: &CalculationParams,
) -> CmlResult<(Vec<cml_common::model::LinkDataset>, Vec<cml_assembler::SkippedLink>)> {
    if params.selection.is_empty() {
        return Err(CmlError::SelectionEmpty);
    }

    let ips: Vec<String> = params
        .selection
        .keys()
        .filter_map(|id| ctx.descriptors.get(id))
        .flat_map(|d| [d.ip_a.clone(), d.ip_b.clone()])
        .collect();

    let endpoint_samples = if params.is_realtime {
        let window = nearest_realtime_window(params.end - params.start);
        ctx.samples.query_units_realtime(&ips, window, params.step_minutes).await?
    } else {
        ctx.samples.query_units(&ips, params.start, params.end, params.step_minutes).await?
    };

    let mut report = cml_assembler::assemble_links(&params.selection, &ctx.descriptors, &endpoint_samples, &ctx.tech_policy);
    if report.datasets.is_empty() {
        return Err(CmlError::SelectionEmpty);
    }

    let filter = ctx.external_filter.clone();
    let config = pipeline_config(params, filter);
    pipeline::run_pipeline(&mut report.datasets, &config)
        .await
        .map_err(|e| CmlError::RainCalcFailure(e.to_string()))?;

    cml_segment::segment(&mut report.datasets, ctx.segment_mode);

    Ok((report.datasets, report.skipped))
}

/// Input validation rules from §4.8, checked before any I/O is issued.
pub fn validate_params(params: &CalculationParams, cnn_trim: Option<usize>) -> CmlResult<()> {
    let span = params.end - params.start;
    if params.end <= params.start {
        return Err(CmlError::InvalidParameters("end must be after start".into()));
    }
    if span < chrono::Duration::hours(1) {
        return Err(CmlError::InvalidParameters("run window must span at least 1 hour".into()));
    }
    if span.num_seconds() / (params.step_minutes * 60) < 12 {
        return Err(CmlError::InvalidParameters("run window must contain at least 12 steps".into()));
    }
    let rolling_window_values = (params.rolling_hours * 60.0 / params.step_minutes as f64).floor() as i64;
    if rolling_window_values < 6 {
        return Err(CmlError::InvalidParameters("rolling window must cover at least 6 samples".into()));
    }
    if (params.rolling_hours * 3600.0) as i64 > span.num_seconds() {
        return Err(CmlError::InvalidParameters("rolling window must not exceed the run window".into()));
    }
    if params.output_step_minutes < params.step_minutes {
        return Err(CmlError::InvalidParameters("output step must be at least the calculation step".into()));
    }
    if params.step_minutes > 59 {
        return Err(CmlError::InvalidParameters("calculation step must be at most 59 minutes".into()));
    }
    if let Some(n_trim) = cnn_trim {
        if span.num_seconds() / (params.step_minutes * 60) <= n_trim as i64 {
            return Err(CmlError::InvalidParameters("run window too short for the convolutional detector's warm-up trim".into()));
        }
    }
    Ok(())
}

fn pipeline_config(params: &CalculationParams, external_filter: Option<ExternalFilterConfig>) -> PipelineConfig {
    PipelineConfig {
        step_minutes: params.step_minutes,
        correlation_mode: params.correlation_mode,
        correlation_threshold: params.correlation_threshold,
        wetdry: WetDryStrategy::RollingStd {
            rolling_hours: params.rolling_hours,
            center: params.rolling_center,
            sigma: params.rolling_sigma,
        },
        baseline_dry_samples: params.baseline_dry_samples,
        waa_max: params.waa_max,
        waa_tau_minutes: params.waa_tau_minutes,
        external_filter,
    }
}

/// Runs one full iteration: queries samples for the selected links,
/// assembles, runs the rain-rate pipeline, segments, and interpolates
/// animation frames.
pub async fn run_once(ctx: &CalculationContext, params: CalculationParams) -> CmlResult<CalculationResult> {
    let (datasets, skipped) = prepare_datasets(ctx, &params).await?;

    let animation_config = AnimationConfig {
        step_minutes: params.step_minutes,
        output_step_minutes: params.output_step_minutes,
        is_output_total: params.is_output_total,
        min_rain_value: ctx.min_rain_value,
        last_processed: params.last_processed,
    };
    let mut frames = animate::build_frames(&datasets, &ctx.grid, &ctx.idw, &animation_config);

    if let Some(polygons) = &ctx.polygons {
        let lons = ctx.grid.lons();
        let lats = ctx.grid.lats();
        for frame in &mut frames {
            crop::crop_to_polygons(&mut frame.grid, &lons, &lats, polygons);
        }
    }

    Ok(CalculationResult { frames, datasets, skipped })
}

/// Runs the long-horizon accumulation field (spec §1 core output (c),
/// §4.6 "Accumulation field"): the same assembly/pipeline/segmentation as
/// [`run_once`], reduced to a single total-millimetres grid over the run
/// window instead of a sequence of animation frames. Returned as a
/// one-frame [`CalculationResult`] (time-stamped at `params.end`) so it can
/// be persisted through the same writer path as a realtime frame.
pub async fn run_accumulation(ctx: &CalculationContext, params: CalculationParams) -> CmlResult<CalculationResult> {
    let (datasets, skipped) = prepare_datasets(ctx, &params).await?;

    let mut grid = cml_field::accumulate::accumulate(&datasets, &ctx.grid, &ctx.idw);

    if let Some(polygons) = &ctx.polygons {
        let lons = ctx.grid.lons();
        let lats = ctx.grid.lats();
        crop::crop_to_polygons(&mut grid, &lons, &lats, polygons);
    }

    let frame = Frame { time: params.end, grid };

    Ok(CalculationResult { frames: vec![frame], datasets, skipped })
}

/// Maps a calculation window's length onto the closed realtime-window
/// enumeration (§4.2), rounding up to the smallest window that covers it.
fn nearest_realtime_window(span: chrono::Duration) -> RealtimeWindow {
    let hours = span.num_minutes() as f64 / 60.0;
    if hours <= 1.0 {
        RealtimeWindow::OneHour
    } else if hours <= 3.0 {
        RealtimeWindow::ThreeHours
    } else if hours <= 6.0 {
        RealtimeWindow::SixHours
    } else if hours <= 12.0 {
        RealtimeWindow::TwelveHours
    } else if hours <= 24.0 {
        RealtimeWindow::OneDay
    } else if hours <= 48.0 {
        RealtimeWindow::TwoDays
    } else if hours <= 24.0 * 7.0 {
        RealtimeWindow::SevenDays
    } else {
        RealtimeWindow::ThirtyDays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params(start: DateTime<Utc>, end: DateTime<Utc>) -> CalculationParams {
        CalculationParams {
            start,
            end,
            step_minutes: 10,
            output_step_minutes: 10,
            is_realtime: false,
            rolling_hours: 10.0,
            rolling_sigma: 0.1,
            rolling_center: false,
            correlation_mode: None,
            correlation_threshold: 0.7,
            baseline_dry_samples: 15,
            waa_max: 2.3,
            waa_tau_minutes: 15.0,
            selection: LinkSelection::new(),
            last_processed: None,
            is_output_total: false,
        }
    }

    #[test]
    fn rejects_too_short_window() {
        let start = "2024-06-01T00:00:00Z".parse().unwrap();
        let end = "2024-06-01T00:30:00Z".parse().unwrap();
        let params = base_params(start, end);
        let err = validate_params(&params, None).unwrap_err();
        assert!(err.to_string().contains("at least 1 hour"));
    }

    #[test]
    fn accepts_a_valid_window() {
        let start = "2024-06-01T00:00:00Z".parse().unwrap();
        let end = "2024-06-01T04:00:00Z".parse().unwrap();
        let params = base_params(start, end);
        assert!(validate_params(&params, None).is_ok());
    }

    #[test]
    fn rejects_output_step_smaller_than_step() {
        let start = "2024-06-01T00:00:00Z".parse().unwrap();
        let end = "2024-06-01T04:00:00Z".parse().unwrap();
        let mut params = base_params(start, end);
        params.output_step_minutes = 5;
        assert!(validate_params(&params, None).is_err());
    }

    #[test]
    fn maps_span_to_nearest_realtime_window() {
        assert!(matches!(nearest_realtime_window(chrono::Duration::minutes(30)), RealtimeWindow::OneHour));
        assert!(matches!(nearest_realtime_window(chrono::Duration::hours(20)), RealtimeWindow::OneDay));
    }
}
