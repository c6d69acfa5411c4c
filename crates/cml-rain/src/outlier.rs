//! Outlier filtering and gap fill, the first stage of §4.4.

/// `tsl ← where(tsl < 40) else NaN`, then nearest-neighbour fill.
pub fn filter_tsl(tsl: &mut [f64]) {
    for v in tsl.iter_mut() {
        if !(*v < 40.0) {
            *v = f64::NAN;
        }
    }
    fill_nearest(tsl);
}

/// `rsl ← where(rsl ≠ 0 ∧ rsl > −70) else NaN`, then nearest-neighbour fill.
pub fn filter_rsl(rsl: &mut [f64]) {
    for v in rsl.iter_mut() {
        if *v == 0.0 || !(*v > -70.0) {
            *v = f64::NAN;
        }
    }
    fill_nearest(rsl);
}

/// Linear NaN interpolation, used for the temperature channels.
pub fn interpolate_linear(series: &mut [f64]) {
    let n = series.len();
    if n == 0 {
        return;
    }
    let mut i = 0;
    while i < n {
        if series[i].is_nan() {
            let start = i;
            while i < n && series[i].is_nan() {
                i += 1;
            }
            let end = i; // first non-nan index after the gap, or n
            let left = if start > 0 { Some(series[start - 1]) } else { None };
            let right = if end < n { Some(series[end]) } else { None };
            match (left, right) {
                (Some(l), Some(r)) => {
                    let span = (end - start + 1) as f64;
                    for (k, slot) in series[start..end].iter_mut().enumerate() {
                        let t = (k as f64 + 1.0) / span;
                        *slot = l + (r - l) * t;
                    }
                }
                (Some(l), None) => {
                    for slot in series[start..end].iter_mut() {
                        *slot = l;
                    }
                }
                (None, Some(r)) => {
                    for slot in series[start..end].iter_mut() {
                        *slot = r;
                    }
                }
                (None, None) => {}
            }
        } else {
            i += 1;
        }
    }
}

/// Nearest-neighbour NaN fill with no maximum gap width.
fn fill_nearest(series: &mut [f64]) {
    let n = series.len();
    if n == 0 {
        return;
    }
    let mut prev: Option<usize> = None;
    let mut next_valid = vec![None; n];
    let mut next: Option<usize> = None;
    for i in (0..n).rev() {
        if !series[i].is_nan() {
            next = Some(i);
        }
        next_valid[i] = next;
    }
    for i in 0..n {
        if series[i].is_nan() {
            let nv = next_valid[i];
            series[i] = match (prev, nv) {
                (Some(p), Some(nxt)) => {
                    if i - p <= nxt - i {
                        series_value_at(series, p)
                    } else {
                        series_value_at(series, nxt)
                    }
                }
                (Some(p), None) => series_value_at(series, p),
                (None, Some(nxt)) => series_value_at(series, nxt),
                (None, None) => 0.0,
            };
        } else {
            prev = Some(i);
        }
    }
}

fn series_value_at(series: &[f64], idx: usize) -> f64 {
    series[idx]
}

/// `trsl = tsl − rsl`.
pub fn compute_trsl(tsl: &[f64], rsl: &[f64]) -> Vec<f64> {
    tsl.iter().zip(rsl).map(|(t, r)| t - r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_tsl_replaces_and_fills() {
        let mut tsl = vec![41.0, 20.0, 42.0, 21.0];
        filter_tsl(&mut tsl);
        assert_eq!(tsl, vec![20.0, 20.0, 21.0, 21.0]);
    }

    #[test]
    fn filter_rsl_rejects_zero_and_above_threshold() {
        let mut rsl = vec![-60.0, 0.0, -50.0];
        filter_rsl(&mut rsl);
        assert_eq!(rsl, vec![-60.0, -60.0, -50.0]);
    }

    #[test]
    fn interpolate_linear_fills_interior_gap() {
        let mut s = vec![0.0, f64::NAN, f64::NAN, 3.0];
        interpolate_linear(&mut s);
        assert!((s[1] - 1.0).abs() < 1e-9);
        assert!((s[2] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn trsl_is_tsl_minus_rsl() {
        let trsl = compute_trsl(&[10.0, 20.0], &[-5.0, -6.0]);
        assert_eq!(trsl, vec![15.0, 26.0]);
    }
}
