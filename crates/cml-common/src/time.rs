//! Time handling shared by the sample store and scheduler.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Round `t` down to the nearest multiple of `step_minutes` since the Unix
/// epoch. Used to snap a sample-store query's `end` boundary (§4.2).
pub fn snap_step_floor(t: DateTime<Utc>, step_minutes: i64) -> DateTime<Utc> {
    snap_step(t, step_minutes, false)
}

/// Round `t` up to the nearest multiple of `step_minutes`. Used to snap a
/// sample-store query's `start` boundary (§4.2).
pub fn snap_step_ceil(t: DateTime<Utc>, step_minutes: i64) -> DateTime<Utc> {
    snap_step(t, step_minutes, true)
}

fn snap_step(t: DateTime<Utc>, step_minutes: i64, ceil: bool) -> DateTime<Utc> {
    let step_secs = step_minutes * 60;
    let epoch_secs = t.timestamp();
    let remainder = epoch_secs.rem_euclid(step_secs);
    let floored = epoch_secs - remainder;
    let snapped = if ceil && remainder != 0 {
        floored + step_secs
    } else {
        floored
    };
    Utc.timestamp_opt(snapped, 0).single().unwrap_or(t)
}

/// Snap a timestamp down to the nearest 10-minute multiple, as used by the
/// external-wetness filter (C9) to compose upstream image filenames.
pub fn snap_10min_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    snap_step_floor(t, 10)
}

/// One decrement of the C9 history-lookup backoff (10 minutes earlier).
pub fn step_back_10min(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::minutes(10)
}

/// A status event on the monotone-progress channel described in §7:
/// `{run_id, kind, message}` plus a progress integer in `[0, 99]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub run_id: i64,
    pub kind: String,
    pub message: String,
    pub progress: u8,
}

impl StatusEvent {
    pub fn new(run_id: i64, kind: impl Into<String>, message: impl Into<String>, progress: u8) -> Self {
        Self {
            run_id,
            kind: kind.into(),
            message: message.into(),
            progress: progress.min(99),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snap_floor_rounds_down() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 7, 30).unwrap();
        let snapped = snap_step_floor(t, 10);
        assert_eq!(snapped, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn snap_ceil_rounds_up() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 7, 30).unwrap();
        let snapped = snap_step_ceil(t, 10);
        assert_eq!(snapped, Utc.with_ymd_and_hms(2024, 6, 1, 12, 10, 0).unwrap());
    }

    #[test]
    fn snap_exact_multiple_is_unchanged() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 10, 0).unwrap();
        assert_eq!(snap_step_floor(t, 10), t);
        assert_eq!(snap_step_ceil(t, 10), t);
    }

    #[test]
    fn progress_is_clamped_below_100() {
        let e = StatusEvent::new(1, "RainCalcFailure", "boom", 150);
        assert_eq!(e.progress, 99);
    }
}
