//! Animation frames: a sequence of gridded rain fields at a coarser
//! output cadence than the native calculation step (§4.6).

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use cml_common::model::LinkDataset;

use crate::accumulate::GridSpec;
use crate::idw::{self, IdwParams};
use crate::resample::resample_step_mean;

#[derive(Debug, Clone)]
pub struct Frame {
    pub time: DateTime<Utc>,
    pub grid: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct AnimationConfig {
    /// Native calculation step, minutes.
    pub step_minutes: i64,
    /// Output cadence frames are resampled to, minutes.
    pub output_step_minutes: i64,
    /// When true, per-frame values are millimetres accumulated over
    /// `output_step_minutes`; when false, they remain mm/h rates.
    pub is_output_total: bool,
    /// Grid cells below this value (mm or mm/h, per `is_output_total`)
    /// are zeroed, to avoid rendering numerical noise as drizzle.
    pub min_rain_value: f64,
    /// Only frames strictly after this timestamp are emitted, so a
    /// realtime run does not re-emit frames a prior tick already wrote.
    pub last_processed: Option<DateTime<Utc>>,
}

/// Builds one frame per output step, resampling each link's rain-rate
/// series independently before interpolating.
pub fn build_frames(datasets: &[LinkDataset], grid: &GridSpec, params: &IdwParams, config: &AnimationConfig) -> Vec<Frame> {
    let mut per_link: HashMap<i64, BTreeMap<DateTime<Utc>, f64>> = HashMap::new();
    for dataset in datasets {
        let rates = dataset.channel_mean_rain_rate();
        let resampled = resample_step_mean(&dataset.time, &rates, config.output_step_minutes);
        let series = per_link.entry(dataset.cml_id).or_default();
        for (t, v) in resampled {
            let value = if config.is_output_total {
                v * (config.output_step_minutes as f64 / 60.0)
            } else {
                v
            };
            series.insert(t, value);
        }
    }

    let mut all_times: Vec<DateTime<Utc>> = per_link.values().flat_map(|m| m.keys().copied()).collect();
    all_times.sort();
    all_times.dedup();
    if let Some(cutoff) = config.last_processed {
        all_times.retain(|t| *t > cutoff);
    }

    let mut frames = Vec::with_capacity(all_times.len());
    for time in all_times {
        let mut points = Vec::new();
        for dataset in datasets {
            let Some(segment) = &dataset.segment else { continue };
            let Some(series) = per_link.get(&dataset.cml_id) else { continue };
            let Some(&value) = series.get(&time) else { continue };
            for i in 0..segment.segment_points.len() {
                if segment.cml_reference[i] != dataset.cml_id {
                    continue;
                }
                points.push((segment.lon_array[i], segment.lat_array[i], value));
            }
        }

        let mut cell_grid = idw::interpolate_grid(&points, &grid.lons(), &grid.lats(), params);
        for row in &mut cell_grid {
            for cell in row.iter_mut() {
                if !cell.is_nan() && *cell < config.min_rain_value {
                    *cell = 0.0;
                }
            }
        }
        frames.push(Frame { time, grid: cell_grid });
    }

    frames
}

/// Drops the oldest frames beyond `retain`, keeping a realtime run's
/// animation at a stable frame count.
pub fn retain_latest(frames: &mut Vec<Frame>, retain: usize) {
    if frames.len() > retain {
        let drop = frames.len() - retain;
        frames.drain(0..drop);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cml_common::model::{ChannelSeries, Polarization, SegmentGeometry};

    fn dataset(cml_id: i64) -> LinkDataset {
        let time: Vec<_> = (0..3).map(|i| Utc.timestamp_opt(1_700_000_000 + i * 600, 0).unwrap()).collect();
        let mut a_to_b = ChannelSeries::with_len(3, false);
        a_to_b.rain_rate = vec![1.0, 2.0, 3.0];
        let b_to_a = ChannelSeries::with_len(3, true);
        LinkDataset {
            cml_id,
            time,
            a_to_b,
            b_to_a,
            length_km: 1.0,
            freq_a_ghz: 18.0,
            freq_b_ghz: 18.001,
            polarization: Polarization::Vertical,
            lat_a: 0.0,
            lon_a: 0.0,
            lat_b: 0.0,
            lon_b: 0.0,
            dummy_lat_a: 0.0,
            dummy_lon_a: 0.0,
            dummy_lat_b: 0.0,
            dummy_lon_b: 0.0,
            wet_fraction: 0.0,
            segment: Some(SegmentGeometry {
                segment_points: vec![1],
                lon_array: vec![0.0],
                lat_array: vec![0.0],
                cml_reference: vec![cml_id],
            }),
        }
    }

    #[test]
    fn frames_after_last_processed_are_emitted() {
        let ds = dataset(1);
        let grid = GridSpec { x_min: 0.0, x_max: 0.0, y_min: 0.0, y_max: 0.0, resolution: 1.0 };
        let config = AnimationConfig {
            step_minutes: 10,
            output_step_minutes: 10,
            is_output_total: false,
            min_rain_value: 0.0,
            last_processed: None,
        };
        let frames = build_frames(&[ds], &grid, &IdwParams::default(), &config);
        assert_eq!(frames.len(), 3);
    }

    #[test]
    fn cutoff_excludes_earlier_frames() {
        let ds = dataset(1);
        let grid = GridSpec { x_min: 0.0, x_max: 0.0, y_min: 0.0, y_max: 0.0, resolution: 1.0 };
        let cutoff = Utc.timestamp_opt(1_700_000_600, 0).unwrap();
        let config = AnimationConfig {
            step_minutes: 10,
            output_step_minutes: 10,
            is_output_total: false,
            min_rain_value: 0.0,
            last_processed: Some(cutoff),
        };
        let frames = build_frames(&[ds], &grid, &IdwParams::default(), &config);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn retain_latest_drops_oldest() {
        let mut frames = vec![
            Frame { time: Utc.timestamp_opt(1, 0).unwrap(), grid: vec![] },
            Frame { time: Utc.timestamp_opt(2, 0).unwrap(), grid: vec![] },
            Frame { time: Utc.timestamp_opt(3, 0).unwrap(), grid: vec![] },
        ];
        retain_latest(&mut frames, 2);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].time, Utc.timestamp_opt(2, 0).unwrap());
    }

    #[test]
    fn below_threshold_cells_are_zeroed() {
        let ds = dataset(1);
        let grid = GridSpec { x_min: 0.0, x_max: 0.0, y_min: 0.0, y_max: 0.0, resolution: 1.0 };
        let config = AnimationConfig {
            step_minutes: 10,
            output_step_minutes: 10,
            is_output_total: false,
            min_rain_value: 1.5,
            last_processed: None,
        };
        let frames = build_frames(&[ds], &grid, &IdwParams::default(), &config);
        assert_eq!(frames[0].grid[0][0], 0.0);
    }
}
