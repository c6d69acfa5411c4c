//! Uniform linear segmenter, §4.5: split a path into equal-length segments
//! along the straight line from endpoint A to endpoint B.

use cml_common::model::{LinkDataset, SegmentGeometry};

/// Segment every dataset with [`segment_one`].
pub fn segment(datasets: &mut [LinkDataset], seg_size_m: f64) {
    for dataset in datasets.iter_mut() {
        segment_one(dataset, seg_size_m);
    }
}

/// `n = length_m / seg_size`; emits `⌊n⌋+1` points evenly spaced from A to
/// B when `length_m >= seg_size`, otherwise a single midpoint (too short
/// to split).
pub fn segment_one(dataset: &mut LinkDataset, seg_size_m: f64) {
    let length_m = dataset.length_km * 1000.0;
    let own_id = dataset.cml_id;

    if seg_size_m <= 0.0 || length_m < seg_size_m {
        let (lat, lon) = dataset.midpoint();
        dataset.segment = Some(SegmentGeometry {
            segment_points: vec![1],
            lon_array: vec![lon],
            lat_array: vec![lat],
            cml_reference: vec![own_id],
        });
        return;
    }

    let n = length_m / seg_size_m;
    let points = n.floor() as usize + 1;

    let mut lon_array = Vec::with_capacity(points);
    let mut lat_array = Vec::with_capacity(points);
    let denom = (points - 1).max(1) as f64;
    for i in 0..points {
        let t = i as f64 / denom;
        lon_array.push(dataset.lon_a + (dataset.lon_b - dataset.lon_a) * t);
        lat_array.push(dataset.lat_a + (dataset.lat_b - dataset.lat_a) * t);
    }

    dataset.segment = Some(SegmentGeometry {
        segment_points: (1..=points as u32).collect(),
        lon_array,
        lat_array,
        cml_reference: vec![own_id; points],
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use cml_common::model::{ChannelSeries, Polarization};

    fn link(length_km: f64) -> LinkDataset {
        LinkDataset {
            cml_id: 1,
            time: vec![],
            a_to_b: ChannelSeries::with_len(0, false),
            b_to_a: ChannelSeries::with_len(0, false),
            length_km,
            freq_a_ghz: 18.0,
            freq_b_ghz: 18.001,
            polarization: Polarization::Vertical,
            lat_a: 50.0,
            lon_a: 14.0,
            lat_b: 50.0,
            lon_b: 14.2,
            dummy_lat_a: 50.0,
            dummy_lon_a: 14.0,
            dummy_lat_b: 50.0,
            dummy_lon_b: 14.2,
            wet_fraction: 0.0,
            segment: None,
        }
    }

    #[test]
    fn short_link_collapses_to_midpoint() {
        let mut dataset = link(0.1);
        segment_one(&mut dataset, 500.0);
        let seg = dataset.segment.as_ref().unwrap();
        assert_eq!(seg.segment_points, vec![1]);
        assert_eq!(seg.cml_reference, vec![1]);
    }

    #[test]
    fn points_are_evenly_spaced() {
        let mut dataset = link(1.0);
        segment_one(&mut dataset, 250.0);
        let seg = dataset.segment.as_ref().unwrap();
        assert_eq!(seg.segment_points.len(), 5);
        let d0 = seg.lon_array[1] - seg.lon_array[0];
        let d1 = seg.lon_array[2] - seg.lon_array[1];
        assert!((d0 - d1).abs() < 1e-9);
        assert_eq!(seg.lon_array[0], dataset.lon_a);
        assert_eq!(*seg.lon_array.last().unwrap(), dataset.lon_b);
    }
}
