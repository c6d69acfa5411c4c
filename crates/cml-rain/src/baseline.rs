//! Constant-baseline estimator, §4.4.

/// At each wet-period boundary, fix the baseline to the mean of the last
/// `n` dry samples; hold it constant through the wet period; follow the
/// signal outside any wet period.
pub fn constant_baseline(trsl: &[f64], wet: &[bool], n: usize) -> Vec<f64> {
    let len = trsl.len();
    let mut baseline = vec![f64::NAN; len];
    let mut held: Option<f64> = None;

    for i in 0..len {
        if wet[i] {
            if held.is_none() {
                let start = i.saturating_sub(n);
                let window = &trsl[start..i];
                let avg = if window.is_empty() {
                    trsl[i]
                } else {
                    window.iter().sum::<f64>() / window.len() as f64
                };
                held = Some(avg);
            }
            baseline[i] = held.unwrap();
        } else {
            held = None;
            baseline[i] = trsl[i];
        }
    }
    baseline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_follows_signal_when_dry() {
        let trsl = vec![1.0, 2.0, 3.0];
        let wet = vec![false, false, false];
        assert_eq!(constant_baseline(&trsl, &wet, 2), trsl);
    }

    #[test]
    fn baseline_holds_through_wet_period() {
        let trsl = vec![1.0, 1.0, 10.0, 12.0, 1.5];
        let wet = vec![false, false, true, true, false];
        let baseline = constant_baseline(&trsl, &wet, 2);
        assert_eq!(baseline[2], 1.0);
        assert_eq!(baseline[3], 1.0);
        assert_eq!(baseline[4], 1.5);
    }
}
