//! Synthetic data generators for CML rainfall tests.
//!
//! Produces [`cml_common::model::CmlDescriptor`] and
//! [`cml_common::model::LinkDataset`] values without touching the metadata
//! store or the sample store, so the rain-rate pipeline, segmenter, and
//! field generator can be exercised deterministically.

use chrono::{DateTime, Duration, TimeZone, Utc};

use cml_common::model::CmlDescriptor;

/// A synthetic rain event: a window of the time series with lowered
/// received signal level (higher attenuation), embedded into an otherwise
/// dry trace.
#[derive(Debug, Clone, Copy)]
pub struct RainEvent {
    /// Index of the first affected sample.
    pub start: usize,
    /// Number of affected samples.
    pub len: usize,
    /// Peak attenuation added at the middle of the event, in dB.
    pub peak_attenuation_db: f64,
}

/// Builds one synthetic two-site descriptor. `link_id` doubles as a seed
/// for the endpoint identifiers and frequency so batches of descriptors
/// don't collide.
pub fn synthetic_descriptor(link_id: i64, lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> CmlDescriptor {
    CmlDescriptor::new(
        link_id,
        format!("10.0.{}.1", link_id % 250),
        format!("10.0.{}.2", link_id % 250),
        format!("site-{link_id}-a"),
        format!("site-{link_id}-b"),
        "generic".into(),
        17000 + (link_id % 4) * 100,
        17000 + (link_id % 4) * 100,
        if link_id % 2 == 0 { 'H' } else { 'V' },
        lat_a,
        lon_a,
        lat_b,
        lon_b,
        lat_a,
        lon_a,
        lat_b,
        lon_b,
    )
}

/// Scatters `n` descriptors on an evenly spaced line inside `bbox`
/// (lon_min, lat_min, lon_max, lat_max), useful for IDW and segmentation
/// stress tests that need more than a handful of links.
pub fn synthetic_descriptor_grid(n: usize, bbox: (f64, f64, f64, f64)) -> Vec<CmlDescriptor> {
    let (lon_min, lat_min, lon_max, lat_max) = bbox;
    let step = if n > 1 { 1.0 / (n - 1) as f64 } else { 0.0 };
    (0..n)
        .map(|i| {
            let t = i as f64 * step;
            let lat_a = lat_min + t * (lat_max - lat_min);
            let lon_a = lon_min + t * (lon_max - lon_min);
            let lat_b = lat_a + 0.01;
            let lon_b = lon_a + 0.01;
            synthetic_descriptor(100 + i as i64, lat_a, lon_a, lat_b, lon_b)
        })
        .collect()
}

fn synthetic_timestamps(start: DateTime<Utc>, step_minutes: i64, len: usize) -> Vec<DateTime<Utc>> {
    (0..len).map(|i| start + Duration::minutes(step_minutes * i as i64)).collect()
}

fn rain_dip(index: usize, event: Option<RainEvent>) -> f64 {
    let Some(event) = event else { return 0.0 };
    if index < event.start || index >= event.start + event.len {
        return 0.0;
    }
    let mid = event.len as f64 / 2.0;
    let offset = (index - event.start) as f64;
    let triangular = 1.0 - ((offset - mid).abs() / mid).min(1.0);
    event.peak_attenuation_db * triangular
}

/// Builds a raw, unprocessed two-channel dataset (TSL constant, RSL with an
/// optional injected rain dip, everything else untouched) suitable for
/// feeding `cml_rain::pipeline::run_pipeline`.
///
/// `tx_power_dbm` and `baseline_rx_dbm` are the steady-state transmit power
/// and dry-weather received level; `event`, if present, subtracts a
/// triangular attenuation bump from RSL over its window.
pub fn synthetic_raw_dataset(
    descriptor: &CmlDescriptor,
    start: DateTime<Utc>,
    step_minutes: i64,
    len: usize,
    tx_power_dbm: f64,
    baseline_rx_dbm: f64,
    event: Option<RainEvent>,
) -> cml_common::model::LinkDataset {
    use cml_common::model::{ChannelSeries, LinkDataset};

    let time = synthetic_timestamps(start, step_minutes, len);

    let mut build_channel = || {
        let mut series = ChannelSeries::with_len(len, false);
        for i in 0..len {
            series.tsl[i] = tx_power_dbm;
            series.rsl[i] = baseline_rx_dbm - rain_dip(i, event);
            series.temperature_rx[i] = 25.0;
            series.temperature_tx[i] = 25.0;
            series.trsl[i] = series.tsl[i] - series.rsl[i];
        }
        series
    };

    LinkDataset {
        cml_id: descriptor.link_id,
        time,
        a_to_b: build_channel(),
        b_to_a: build_channel(),
        length_km: descriptor.distance_km,
        freq_a_ghz: descriptor.freq_a_ghz(),
        freq_b_ghz: descriptor.freq_b_ghz(),
        polarization: descriptor.polarization,
        lat_a: descriptor.lat_a,
        lon_a: descriptor.lon_a,
        lat_b: descriptor.lat_b,
        lon_b: descriptor.lon_b,
        dummy_lat_a: descriptor.dummy_lat_a,
        dummy_lon_a: descriptor.dummy_lon_a,
        dummy_lat_b: descriptor.dummy_lat_b,
        dummy_lon_b: descriptor.dummy_lon_b,
        wet_fraction: 0.0,
        segment: None,
    }
}

/// Builds a fully post-pipeline dataset with `rain_rate` populated
/// directly (constant value across both real channels), bypassing the
/// rain-rate pipeline entirely. Intended for `cml-segment` and
/// `cml-field` tests that only care about spatial geometry and
/// already-computed rain rates.
pub fn synthetic_rain_dataset(
    descriptor: &CmlDescriptor,
    start: DateTime<Utc>,
    step_minutes: i64,
    len: usize,
    rain_rate_mm_h: f64,
) -> cml_common::model::LinkDataset {
    use cml_common::model::{ChannelSeries, LinkDataset};

    let time = synthetic_timestamps(start, step_minutes, len);
    let mut build_channel = || {
        let mut series = ChannelSeries::with_len(len, false);
        series.rain_rate = vec![rain_rate_mm_h; len];
        series.wet = vec![rain_rate_mm_h > 0.0; len];
        series
    };

    LinkDataset {
        cml_id: descriptor.link_id,
        time,
        a_to_b: build_channel(),
        b_to_a: build_channel(),
        length_km: descriptor.distance_km,
        freq_a_ghz: descriptor.freq_a_ghz(),
        freq_b_ghz: descriptor.freq_b_ghz(),
        polarization: descriptor.polarization,
        lat_a: descriptor.lat_a,
        lon_a: descriptor.lon_a,
        lat_b: descriptor.lat_b,
        lon_b: descriptor.lon_b,
        dummy_lat_a: descriptor.dummy_lat_a,
        dummy_lon_a: descriptor.dummy_lon_a,
        dummy_lat_b: descriptor.dummy_lat_b,
        dummy_lon_b: descriptor.dummy_lon_b,
        wet_fraction: if rain_rate_mm_h > 0.0 { 1.0 } else { 0.0 },
        segment: None,
    }
}

/// A fixed reference timestamp (2024-06-01 00:00 UTC) for deterministic
/// fixtures, since `Utc::now()` would make tests non-reproducible.
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("valid reference timestamp")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_descriptor_has_requested_coordinates() {
        let d = synthetic_descriptor(1, 50.0, 14.0, 50.1, 14.1);
        assert_eq!(d.link_id, 1);
        assert_eq!(d.lat_a, 50.0);
        assert_eq!(d.lon_b, 14.1);
        assert!(d.distance_km > 0.0);
    }

    #[test]
    fn synthetic_descriptor_grid_produces_n_distinct_links() {
        let grid = synthetic_descriptor_grid(5, (14.0, 50.0, 15.0, 51.0));
        assert_eq!(grid.len(), 5);
        let ids: std::collections::HashSet<i64> = grid.iter().map(|d| d.link_id).collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn synthetic_raw_dataset_dips_rsl_during_event() {
        let d = synthetic_descriptor(1, 50.0, 14.0, 50.1, 14.1);
        let event = RainEvent { start: 10, len: 10, peak_attenuation_db: 8.0 };
        let ds = synthetic_raw_dataset(&d, reference_time(), 1, 30, 5.0, -40.0, Some(event));
        assert_eq!(ds.a_to_b.rsl[0], -40.0);
        assert!(ds.a_to_b.rsl[15] < -40.0);
        assert_eq!(ds.a_to_b.rsl[25], -40.0);
    }

    #[test]
    fn synthetic_rain_dataset_marks_both_channels_wet() {
        let d = synthetic_descriptor(2, 50.0, 14.0, 50.1, 14.1);
        let ds = synthetic_rain_dataset(&d, reference_time(), 10, 3, 2.5);
        assert_eq!(ds.channel_mean_rain_rate(), vec![2.5, 2.5, 2.5]);
        assert!(ds.a_to_b.wet.iter().all(|&w| w));
    }
}
