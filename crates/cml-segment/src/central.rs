//! Central-point segmenter, §4.5: one point per link at its midpoint.

use cml_common::model::{LinkDataset, SegmentGeometry};

pub fn segment(datasets: &mut [LinkDataset]) {
    for dataset in datasets.iter_mut() {
        let (lat, lon) = dataset.midpoint();
        dataset.segment = Some(SegmentGeometry {
            segment_points: vec![1],
            lon_array: vec![lon],
            lat_array: vec![lat],
            cml_reference: vec![dataset.cml_id],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cml_common::model::{ChannelSeries, Polarization};

    fn link(id: i64, lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> LinkDataset {
        LinkDataset {
            cml_id: id,
            time: vec![],
            a_to_b: ChannelSeries::with_len(0, false),
            b_to_a: ChannelSeries::with_len(0, false),
            length_km: 1.0,
            freq_a_ghz: 18.0,
            freq_b_ghz: 18.001,
            polarization: Polarization::Vertical,
            lat_a,
            lon_a,
            lat_b,
            lon_b,
            dummy_lat_a: lat_a,
            dummy_lon_a: lon_a,
            dummy_lat_b: lat_b,
            dummy_lon_b: lon_b,
            wet_fraction: 0.0,
            segment: None,
        }
    }
    #[test]
    fn midpoint_is_arithmetic_mean() {
        let mut links = vec![link(1, 50.0, 14.0, 50.2, 14.2)];
        segment(&mut links);
        let seg = links[0].segment.as_ref().unwrap();
        assert_eq!(seg.lat_array, vec![50.1]);
        assert_eq!(seg.lon_array, vec![14.1]);
        assert_eq!(seg.cml_reference, vec![1]);
    }
}
