//! Integration test: segment synthetic links, then interpolate their
//! accumulated totals onto a grid covering them, end to end.

use cml_field::accumulate::{accumulate, GridSpec};
use cml_field::idw::IdwParams;
use cml_segment::{segment, SegmentMode};
use test_utils::generators::{reference_time, synthetic_descriptor_grid, synthetic_rain_dataset};
use test_utils::fixtures::bbox;

#[test]
fn uniform_rain_rate_interpolates_to_a_uniform_field() {
    let descriptors = synthetic_descriptor_grid(5, bbox::PRAGUE);
    let mut datasets: Vec<_> = descriptors
        .iter()
        .map(|d| synthetic_rain_dataset(d, reference_time(), 60, 3, 4.0))
        .collect();

    segment(&mut datasets, SegmentMode::Central);

    let grid = GridSpec {
        x_min: bbox::PRAGUE.0,
        y_min: bbox::PRAGUE.1,
        x_max: bbox::PRAGUE.2,
        y_max: bbox::PRAGUE.3,
        resolution: 0.05,
    };
    let field = accumulate(&datasets, &grid, &IdwParams::default());

    assert!(!field.is_empty());
    for row in &field {
        for &value in row {
            assert!(value > 0.0, "every cell should see some rain when every link reports a uniform rate");
        }
    }
}
