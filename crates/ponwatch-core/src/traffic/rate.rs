// ── Counter-to-rate math ──
//
// Cumulative byte counters become kbps:
//
//   rate = Δbytes × 8 / Δt / 1000
//
// A counter smaller than its predecessor wrapped or reset; the new raw
// value is taken as the delta. Rates above `MAX_PLAUSIBLE_KBPS` come from
// corrupted reads and are suppressed to zero.

use chrono::{DateTime, Utc};

/// Anything faster than 1 Gbps on one terminal is a bad read.
pub const MAX_PLAUSIBLE_KBPS: f64 = 1_000_000.0;

/// Bytes moved between two readings of one counter. Never negative.
pub fn counter_delta(previous: u64, current: u64) -> u64 {
    if current < previous {
        current
    } else {
        current - previous
    }
}

/// Rate between two readings, or `None` when no time has passed.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn rate_kbps(
    previous_bytes: u64,
    previous_at: DateTime<Utc>,
    current_bytes: u64,
    current_at: DateTime<Utc>,
) -> Option<f64> {
    let elapsed_ms = (current_at - previous_at).num_milliseconds();
    if elapsed_ms <= 0 {
        return None;
    }
    let seconds = elapsed_ms as f64 / 1000.0;
    let bits = counter_delta(previous_bytes, current_bytes) as f64 * 8.0;
    let kbps = bits / seconds / 1000.0;
    Some(if kbps > MAX_PLAUSIBLE_KBPS { 0.0 } else { kbps })
}

/// Exponential moving average step.
pub fn ema(previous: f64, instant: f64, alpha: f64) -> f64 {
    alpha * instant + (1.0 - alpha) * previous
}

/// Fade a smoothed value when no valid sample arrived.
pub fn decay(previous: f64, factor: f64) -> f64 {
    previous * factor
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn rate_from_counters() {
        let kbps = rate_kbps(1000, at(0), 9000, at(10)).unwrap();
        assert!(close(kbps, 6.4), "{kbps}");
    }

    #[test]
    fn wraparound_uses_new_raw_value() {
        assert_eq!(counter_delta(u64::from(u32::MAX) - 10, 500), 500);
        assert_eq!(counter_delta(100, 100), 0);
        let kbps = rate_kbps(u64::from(u32::MAX) - 10, at(0), 1250, at(10)).unwrap();
        assert!(close(kbps, 1.0), "{kbps}");
    }

    #[test]
    fn no_elapsed_time_means_no_rate() {
        assert_eq!(rate_kbps(0, at(5), 100, at(5)), None);
        assert_eq!(rate_kbps(0, at(5), 100, at(4)), None);
    }

    #[test]
    fn implausible_rate_suppressed() {
        // 10 GB in one second.
        assert_eq!(rate_kbps(0, at(0), 10_000_000_000, at(1)), Some(0.0));
    }

    #[test]
    fn ema_step() {
        assert!(close(ema(100.0, 200.0, 0.3), 130.0));
        assert!(close(decay(100.0, 0.9), 90.0));
    }
}
