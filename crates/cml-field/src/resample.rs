//! Right-labelled, NaN-aware bucket averaging used to align a link's
//! native sample cadence to the step the field generator works at
//! (§4.6).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Buckets `(times[i], values[i])` into `step_minutes`-wide windows and
/// averages the non-NaN values in each window. The returned timestamp is
/// the bucket's right edge (the convention the accumulation and
/// animation stages both assume). Buckets with no valid samples are
/// omitted rather than emitted as NaN.
pub fn resample_step_mean(times: &[DateTime<Utc>], values: &[f64], step_minutes: i64) -> Vec<(DateTime<Utc>, f64)> {
    assert_eq!(times.len(), values.len());
    let step_seconds = step_minutes * 60;
    if step_seconds <= 0 {
        return Vec::new();
    }

    let mut buckets: BTreeMap<i64, (f64, u32)> = BTreeMap::new();
    for (t, v) in times.iter().zip(values.iter()) {
        if v.is_nan() {
            continue;
        }
        let epoch = t.timestamp();
        let bucket_end = ((epoch + step_seconds - 1) / step_seconds) * step_seconds;
        let entry = buckets.entry(bucket_end).or_insert((0.0, 0));
        entry.0 += v;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(epoch, (sum, count))| {
            let mean = sum / count as f64;
            let ts = DateTime::<Utc>::from_timestamp(epoch, 0).unwrap_or_else(Utc::now);
            (ts, mean)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap()
    }

    #[test]
    fn averages_within_step_and_labels_right_edge() {
        let times = vec![t(0), t(1), t(2), t(9)];
        let values = vec![1.0, 2.0, 3.0, 10.0];
        let out = resample_step_mean(&times, &values, 10);
        assert_eq!(out.len(), 1);
        assert!((out[0].1 - 4.0).abs() < 1e-9);
    }

    #[test]
    fn nan_samples_are_excluded() {
        let times = vec![t(0), t(1)];
        let values = vec![f64::NAN, 5.0];
        let out = resample_step_mean(&times, &values, 10);
        assert_eq!(out.len(), 1);
        assert!((out[0].1 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn all_nan_bucket_is_omitted() {
        let times = vec![t(0)];
        let values = vec![f64::NAN];
        let out = resample_step_mean(&times, &values, 10);
        assert!(out.is_empty());
    }
}
