//! The core in-memory data model (§3): immutable CML descriptors, the
//! per-link two-channel dataset mutated by the rain-rate pipeline, and the
//! metadata rows persisted by the writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::geo::haversine_km;

/// Antenna polarization. `X` (cross-polar) is remapped to `V` at load time
/// per §3, since the k-R coefficient tables only distinguish H and V.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarization {
    Horizontal,
    Vertical,
}

impl Polarization {
    /// Parse the raw descriptor character, folding `X` into `V`.
    pub fn from_code(code: char) -> Self {
        match code.to_ascii_uppercase() {
            'H' => Polarization::Horizontal,
            _ => Polarization::Vertical,
        }
    }
}

/// Which channel(s) of a link a selection flag requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRequest {
    Skip,
    AtoB,
    BtoA,
    Both,
}

impl ChannelRequest {
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            0 => ChannelRequest::Skip,
            1 => ChannelRequest::AtoB,
            2 => ChannelRequest::BtoA,
            _ => ChannelRequest::Both,
        }
    }
}

/// Identifies one of the two directional channels of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Receiver at endpoint A, transmitter at endpoint B.
    ARxBTx,
    /// Receiver at endpoint B, transmitter at endpoint A.
    BRxATx,
}

/// Immutable CML descriptor, loaded once per process by the metadata store
/// (C1) and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmlDescriptor {
    pub link_id: i64,
    /// Sample-store tag identifying endpoint A.
    pub ip_a: String,
    /// Sample-store tag identifying endpoint B.
    pub ip_b: String,
    pub display_addr_a: String,
    pub display_addr_b: String,
    /// Free-form technology string, used as an exception-list key in C3.
    pub tech: String,
    pub freq_a_mhz: i64,
    pub freq_b_mhz: i64,
    pub polarization: Polarization,
    pub distance_km: f64,
    pub lat_a: f64,
    pub lon_a: f64,
    pub lat_b: f64,
    pub lon_b: f64,
    /// Display-only substitute coordinates (never used for physics).
    pub dummy_lat_a: f64,
    pub dummy_lon_a: f64,
    pub dummy_lat_b: f64,
    pub dummy_lon_b: f64,
}

impl CmlDescriptor {
    /// Build a descriptor from raw site rows, applying the invariants from
    /// §3: two-channel frequency arity and haversine distance.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        link_id: i64,
        ip_a: String,
        ip_b: String,
        display_addr_a: String,
        display_addr_b: String,
        tech: String,
        mut freq_a_mhz: i64,
        freq_b_mhz: i64,
        polarization_code: char,
        lat_a: f64,
        lon_a: f64,
        lat_b: f64,
        lon_b: f64,
        dummy_lat_a: f64,
        dummy_lon_a: f64,
        dummy_lat_b: f64,
        dummy_lon_b: f64,
    ) -> Self {
        if freq_a_mhz == freq_b_mhz {
            freq_a_mhz += 1;
        }
        let distance_km = haversine_km(lat_a, lon_a, lat_b, lon_b);
        Self {
            link_id,
            ip_a,
            ip_b,
            display_addr_a,
            display_addr_b,
            tech,
            freq_a_mhz,
            freq_b_mhz,
            polarization: Polarization::from_code(polarization_code),
            distance_km,
            lat_a,
            lon_a,
            lat_b,
            lon_b,
            dummy_lat_a,
            dummy_lon_a,
            dummy_lat_b,
            dummy_lon_b,
        }
    }

    pub fn freq_a_ghz(&self) -> f64 {
        self.freq_a_mhz as f64 / 1000.0
    }

    pub fn freq_b_ghz(&self) -> f64 {
        self.freq_b_mhz as f64 / 1000.0
    }

    pub fn midpoint(&self) -> (f64, f64) {
        crate::geo::midpoint(self.lat_a, self.lon_a, self.lat_b, self.lon_b)
    }
}

/// One directional channel's time series, mutated in place by the rain-rate
/// pipeline (C4) in the order documented in §4.4.
#[derive(Debug, Clone, Default)]
pub struct ChannelSeries {
    pub tsl: Vec<f64>,
    pub rsl: Vec<f64>,
    pub temperature_rx: Vec<f64>,
    pub temperature_tx: Vec<f64>,
    pub trsl: Vec<f64>,
    pub wet: Vec<bool>,
    pub baseline: Vec<f64>,
    pub waa: Vec<f64>,
    /// Path attenuation `A = trsl − baseline − waa`.
    pub attenuation: Vec<f64>,
    /// Rain rate in mm/h, always `>= 0`.
    pub rain_rate: Vec<f64>,
    /// True for the zero-filled second channel synthesized when only one
    /// side of a link was requested (§3 design notes, dummy second channel).
    pub dummy_channel: bool,
}

impl ChannelSeries {
    pub fn with_len(len: usize, dummy: bool) -> Self {
        Self {
            tsl: vec![0.0; len],
            rsl: vec![0.0; len],
            temperature_rx: vec![0.0; len],
            temperature_tx: vec![0.0; len],
            trsl: vec![0.0; len],
            wet: vec![false; len],
            baseline: vec![f64::NAN; len],
            waa: vec![f64::NAN; len],
            attenuation: vec![f64::NAN; len],
            rain_rate: vec![f64::NAN; len],
            dummy_channel: dummy,
        }
    }

    pub fn len(&self) -> usize {
        self.tsl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tsl.is_empty()
    }
}

/// Segment geometry attached by the segmenter (C5): one coordinate per
/// `segment_points` entry plus the CML ID that a spatially-interpolated
/// value at that point should be attributed to.
#[derive(Debug, Clone, Default)]
pub struct SegmentGeometry {
    pub segment_points: Vec<u32>,
    pub lon_array: Vec<f64>,
    pub lat_array: Vec<f64>,
    pub cml_reference: Vec<i64>,
}

/// The primary in-memory object of the core: a two-channel dataset for one
/// selected link, born during assembly and dropped at run end.
#[derive(Debug, Clone)]
pub struct LinkDataset {
    pub cml_id: i64,
    pub time: Vec<DateTime<Utc>>,
    pub a_to_b: ChannelSeries,
    pub b_to_a: ChannelSeries,
    pub length_km: f64,
    pub freq_a_ghz: f64,
    pub freq_b_ghz: f64,
    pub polarization: Polarization,
    pub lat_a: f64,
    pub lon_a: f64,
    pub lat_b: f64,
    pub lon_b: f64,
    pub dummy_lat_a: f64,
    pub dummy_lon_a: f64,
    pub dummy_lat_b: f64,
    pub dummy_lon_b: f64,
    /// Fraction of timestamps classified wet, across both real channels.
    pub wet_fraction: f64,
    pub segment: Option<SegmentGeometry>,
}

impl LinkDataset {
    pub fn channel(&self, which: Channel) -> &ChannelSeries {
        match which {
            Channel::ARxBTx => &self.a_to_b,
            Channel::BRxATx => &self.b_to_a,
        }
    }

    pub fn channel_mut(&mut self, which: Channel) -> &mut ChannelSeries {
        match which {
            Channel::ARxBTx => &mut self.a_to_b,
            Channel::BRxATx => &mut self.b_to_a,
        }
    }

    pub fn midpoint(&self) -> (f64, f64) {
        crate::geo::midpoint(self.lat_a, self.lon_a, self.lat_b, self.lon_b)
    }

    /// Per-timestamp mean rain rate across the two real channels (dummy
    /// channels are excluded from cross-channel reductions, per the design
    /// notes on the synthesized second channel).
    pub fn channel_mean_rain_rate(&self) -> Vec<f64> {
        let real_channels: Vec<&ChannelSeries> = [&self.a_to_b, &self.b_to_a]
            .into_iter()
            .filter(|c| !c.dummy_channel)
            .collect();
        let len = self.time.len();
        let mut out = vec![0.0; len];
        if real_channels.is_empty() {
            return out;
        }
        for i in 0..len {
            let mut sum = 0.0;
            let mut n = 0.0;
            for c in &real_channels {
                let v = c.rain_rate[i];
                if !v.is_nan() {
                    sum += v;
                    n += 1.0;
                }
            }
            out[i] = if n > 0.0 { sum / n } else { f64::NAN };
        }
        out
    }
}

/// A periodic (or one-shot) calculation run, persisted in C1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeRun {
    pub id: i64,
    pub start: DateTime<Utc>,
    pub retention_minutes: i64,
    pub step_minutes: i64,
    pub resolution_deg: f64,
    pub bbox: BoundingBox,
    pub cols: i64,
    pub rows: i64,
    pub viewer_url: Option<String>,
}

impl RealtimeRun {
    /// Column/row counts per §4.1: `⌊(max−min)/resolution⌋+1`.
    pub fn compute_dims(resolution_deg: f64, bbox: &BoundingBox) -> (i64, i64) {
        let (cols, rows) = bbox.grid_dims(resolution_deg);
        (cols as i64, rows as i64)
    }
}

/// One produced frame, persisted as a row in `realtime_rain_grids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RainGrid {
    pub time: DateTime<Utc>,
    pub run_id: i64,
    pub cml_ids: Vec<i64>,
    pub filename: String,
    pub median: f64,
    pub mean: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_coercion_adds_one_mhz() {
        let d = CmlDescriptor::new(
            1,
            "10.0.0.1".into(),
            "10.0.0.2".into(),
            "A".into(),
            "B".into(),
            "generic".into(),
            18000,
            18000,
            'V',
            50.0,
            14.0,
            50.1,
            14.1,
            50.0,
            14.0,
            50.1,
            14.1,
        );
        assert_eq!(d.freq_a_mhz, 18001);
        assert_eq!(d.freq_b_mhz, 18000);
    }

    #[test]
    fn cross_polarization_remaps_to_vertical() {
        assert_eq!(Polarization::from_code('X'), Polarization::Vertical);
        assert_eq!(Polarization::from_code('H'), Polarization::Horizontal);
    }

    #[test]
    fn dummy_channel_excluded_from_mean() {
        let mut ds = LinkDataset {
            cml_id: 1,
            time: vec![Utc::now()],
            a_to_b: ChannelSeries::with_len(1, false),
            b_to_a: ChannelSeries::with_len(1, true),
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
            segment: None,
        };
        ds.a_to_b.rain_rate[0] = 4.0;
        ds.b_to_a.rain_rate[0] = 0.0;
        assert_eq!(ds.channel_mean_rain_rate(), vec![4.0]);
    }
}
