//! Integration test: segment a batch of synthetic descriptors scattered
//! across a bounding box and check that every link ends up with
//! geometry attached and attributed to itself.

use cml_segment::{segment, SegmentMode};
use test_utils::generators::{reference_time, synthetic_descriptor_grid, synthetic_rain_dataset};

#[test]
fn central_segmentation_attaches_one_point_per_link() {
    let descriptors = synthetic_descriptor_grid(6, (14.0, 50.0, 15.0, 51.0));
    let mut datasets: Vec<_> = descriptors
        .iter()
        .map(|d| synthetic_rain_dataset(d, reference_time(), 10, 3, 1.5))
        .collect();

    segment(&mut datasets, SegmentMode::Central);

    for ds in &datasets {
        let geom = ds.segment.as_ref().expect("central segmentation should attach geometry");
        assert_eq!(geom.cml_reference.len(), geom.lon_array.len());
        assert!(geom.cml_reference.iter().all(|&id| id == ds.cml_id));
    }
}

#[test]
fn linear_segmentation_subdivides_longer_links_more() {
    let descriptors = synthetic_descriptor_grid(4, (14.0, 50.0, 16.0, 52.0));
    let mut datasets: Vec<_> = descriptors
        .iter()
        .map(|d| synthetic_rain_dataset(d, reference_time(), 10, 3, 1.0))
        .collect();

    segment(&mut datasets, SegmentMode::Linear { seg_size_m: 250.0 });

    for ds in &datasets {
        let geom = ds.segment.as_ref().expect("linear segmentation should attach geometry");
        assert!(!geom.lon_array.is_empty());
    }
}
