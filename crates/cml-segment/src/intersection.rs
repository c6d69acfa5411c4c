//! Intersection-aware segmenter, §4.5: paths are cut at every crossing
//! with another CML path, the longest resulting sub-path on each link is
//! split further, and the rain value attributed to points adjacent to a
//! crossing is taken from whichever of the crossing links reports the
//! lower mean rain rate over the run.
//!
//! The source couples every link to every other link through shared break
//! points and carries duplicate code paths for the split rules; §9(b)
//! leaves the internal representation open, so this implementation
//! computes pairwise segment intersections independently rather than
//! reconstructing one shared sweep-line event list — a crossing of three
//! or more paths at (nearly) the same point degenerates into its
//! constituent pairs.

use cml_common::model::{LinkDataset, SegmentGeometry};

use crate::linear;

const EPS: f64 = 1e-9;

struct Crossing {
    link_a: usize,
    link_b: usize,
    t_a: f64,
    t_b: f64,
}

/// A break point on one link's own `t ∈ [0, 1]` axis from A to B: either an
/// endpoint or a crossing with another link (index into `crossings`).
#[derive(Clone, Copy)]
struct BreakPoint {
    t: f64,
    crossing_with: Option<usize>,
}

fn point_at(dataset: &LinkDataset, t: f64) -> (f64, f64) {
    (
        dataset.lon_a + (dataset.lon_b - dataset.lon_a) * t,
        dataset.lat_a + (dataset.lat_b - dataset.lat_a) * t,
    )
}

fn euclid_deg(p: (f64, f64), q: (f64, f64)) -> f64 {
    ((p.0 - q.0).powi(2) + (p.1 - q.1).powi(2)).sqrt()
}

/// Parametric segment intersection; returns `(t, u)` when the segments
/// cross strictly inside both spans (collinear/parallel segments, and
/// crossings at a shared endpoint, are not counted as crossings).
fn segment_intersection(p: (f64, f64), p2: (f64, f64), q: (f64, f64), q2: (f64, f64)) -> Option<(f64, f64)> {
    let r = (p2.0 - p.0, p2.1 - p.1);
    let s = (q2.0 - q.0, q2.1 - q.1);
    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() < EPS {
        return None;
    }
    let qp = (q.0 - p.0, q.1 - p.1);
    let t = (qp.0 * s.1 - qp.1 * s.0) / denom;
    let u = (qp.0 * r.1 - qp.1 * r.0) / denom;
    if (EPS..=1.0 - EPS).contains(&t) && (EPS..=1.0 - EPS).contains(&u) {
        Some((t, u))
    } else {
        None
    }
}

/// Mean of the per-timestamp channel-mean rain rate, NaNs excluded;
/// `+inf` for a dataset with no valid samples so it never wins a
/// lowest-rain-mean comparison.
fn mean_rain(dataset: &LinkDataset) -> f64 {
    let valid: Vec<f64> = dataset.channel_mean_rain_rate().into_iter().filter(|v| !v.is_nan()).collect();
    if valid.is_empty() {
        return f64::INFINITY;
    }
    valid.iter().sum::<f64>() / valid.len() as f64
}

/// Segment every dataset, cutting at crossings between links; a link with
/// no crossings falls back to the uniform linear segmenter (if
/// `fallback_linear`) or the central-point segmenter.
pub fn segment(datasets: &mut [LinkDataset], seg_size_m: f64, fallback_linear: bool) {
    let n = datasets.len();
    let mut crossings: Vec<Crossing> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a1, a2) = ((datasets[i].lon_a, datasets[i].lat_a), (datasets[i].lon_b, datasets[i].lat_b));
            let (b1, b2) = ((datasets[j].lon_a, datasets[j].lat_a), (datasets[j].lon_b, datasets[j].lat_b));
            if let Some((t_a, t_b)) = segment_intersection(a1, a2, b1, b2) {
                crossings.push(Crossing { link_a: i, link_b: j, t_a, t_b });
            }
        }
    }

    let mut involved = vec![false; n];
    for c in &crossings {
        involved[c.link_a] = true;
        involved[c.link_b] = true;
    }

    // Lowest-mean-rain-rate CML ID at each crossing; ties keep the first
    // link encountered in iteration order (`link_a`), per §4.5 tie-break.
    let winners: Vec<i64> = crossings
        .iter()
        .map(|c| {
            let mean_a = mean_rain(&datasets[c.link_a]);
            let mean_b = mean_rain(&datasets[c.link_b]);
            if mean_b < mean_a {
                datasets[c.link_b].cml_id
            } else {
                datasets[c.link_a].cml_id
            }
        })
        .collect();

    for idx in 0..n {
        if !involved[idx] {
            if fallback_linear {
                linear::segment_one(&mut datasets[idx], seg_size_m);
            } else {
                let (lat, lon) = datasets[idx].midpoint();
                datasets[idx].segment = Some(SegmentGeometry {
                    segment_points: vec![1],
                    lon_array: vec![lon],
                    lat_array: vec![lat],
                    cml_reference: vec![datasets[idx].cml_id],
                });
            }
            continue;
        }

        segment_one_involved(datasets, idx, &crossings, &winners);
    }
}

fn segment_one_involved(datasets: &mut [LinkDataset], idx: usize, crossings: &[Crossing], winners: &[i64]) {
    let mut breaks: Vec<BreakPoint> = vec![
        BreakPoint { t: 0.0, crossing_with: None },
        BreakPoint { t: 1.0, crossing_with: None },
    ];
    for (ci, c) in crossings.iter().enumerate() {
        if c.link_a == idx {
            breaks.push(BreakPoint { t: c.t_a, crossing_with: Some(ci) });
        } else if c.link_b == idx {
            breaks.push(BreakPoint { t: c.t_b, crossing_with: Some(ci) });
        }
    }
    breaks.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap());
    breaks.dedup_by(|a, b| (a.t - b.t).abs() < EPS);

    let own_id = datasets[idx].cml_id;
    let reference_for = |bp: &BreakPoint| -> i64 {
        match bp.crossing_with {
            Some(ci) => winners[ci],
            None => own_id,
        }
    };

    let mut longest_k = 0usize;
    let mut longest_len = -1.0;
    for k in 0..breaks.len() - 1 {
        let p0 = point_at(&datasets[idx], breaks[k].t);
        let p1 = point_at(&datasets[idx], breaks[k + 1].t);
        let len = euclid_deg(p0, p1);
        if len > longest_len {
            longest_len = len;
            longest_k = k;
        }
    }

    let mut lon_array = Vec::new();
    let mut lat_array = Vec::new();
    let mut cml_reference = Vec::new();

    for k in 0..breaks.len() - 1 {
        let b0 = breaks[k];
        let b1 = breaks[k + 1];
        let b0_is_crossing = b0.crossing_with.is_some();
        let b1_is_crossing = b1.crossing_with.is_some();

        if k == longest_k {
            if b0_is_crossing && b1_is_crossing {
                for frac in [1.0 / 3.0, 2.0 / 3.0] {
                    let t = b0.t + (b1.t - b0.t) * frac;
                    let (lon, lat) = point_at(&datasets[idx], t);
                    lon_array.push(lon);
                    lat_array.push(lat);
                    cml_reference.push(if frac < 0.5 { reference_for(&b0) } else { reference_for(&b1) });
                }
            } else {
                let t = (b0.t + b1.t) / 2.0;
                let (lon, lat) = point_at(&datasets[idx], t);
                lon_array.push(lon);
                lat_array.push(lat);
                cml_reference.push(if b0_is_crossing { reference_for(&b0) } else { reference_for(&b1) });
            }
        } else if !b0_is_crossing && !b1_is_crossing {
            // Neither end is a crossing: emit only endpoint annotations.
            for bp in [b0, b1] {
                let (lon, lat) = point_at(&datasets[idx], bp.t);
                lon_array.push(lon);
                lat_array.push(lat);
                cml_reference.push(own_id);
            }
        } else {
            let t = (b0.t + b1.t) / 2.0;
            let (lon, lat) = point_at(&datasets[idx], t);
            lon_array.push(lon);
            lat_array.push(lat);
            cml_reference.push(if b0_is_crossing { reference_for(&b0) } else { reference_for(&b1) });
        }
    }

    let segment_points: Vec<u32> = (1..=lon_array.len() as u32).collect();
    assert_eq!(segment_points.len(), lon_array.len());
    assert_eq!(lon_array.len(), lat_array.len());
    assert_eq!(lat_array.len(), cml_reference.len());

    datasets[idx].segment = Some(SegmentGeometry {
        segment_points,
        lon_array,
        lat_array,
        cml_reference,
    });
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
    fn non_intersecting_links_fall_back_to_central() {
        let mut links = vec![link(1, 50.0, 14.0, 50.1, 14.1), link(2, 60.0, 20.0, 60.1, 20.1)];
        segment(&mut links, 500.0, false);
        assert_eq!(links[0].segment.as_ref().unwrap().segment_points, vec![1]);
        assert_eq!(links[1].segment.as_ref().unwrap().segment_points, vec![1]);
    }

    #[test]
    fn crossing_links_produce_equal_length_parallel_arrays() {
        // Two links crossing in an X shape.
        let mut links = vec![
            link(1, 50.0, 14.0, 50.2, 14.2),
            link(2, 50.0, 14.2, 50.2, 14.0),
        ];
        links[0].a_to_b.rain_rate = vec![];
        segment(&mut links, 500.0, false);
        for dataset in &links {
            let seg = dataset.segment.as_ref().unwrap();
            assert_eq!(seg.segment_points.len(), seg.lon_array.len());
            assert_eq!(seg.lon_array.len(), seg.lat_array.len());
            assert_eq!(seg.lat_array.len(), seg.cml_reference.len());
            assert!(!seg.segment_points.is_empty());
        }
    }
}
