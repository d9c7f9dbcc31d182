//! Reduction of raw per-request samples into a statistical summary.
//!
//! [`compute`] is pure and total: every input, including the empty one, has
//! a defined output. Malformed records are rejected upstream by the artifact
//! reader, never here.

use serde::{Deserialize, Serialize};

use crate::numeric::{guard_denominator, round6};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: f64 = 1e9;
/// Nanoseconds per millisecond.
pub const NANOS_PER_MS: f64 = 1e6;

/// Divisor used for RPS when all samples share one timestamp.
///
/// This is a deliberate floor, not a derived constant: a zero-spread run is
/// treated as if it lasted one second.
pub const DEFAULT_ZERO_DURATION_DIVISOR_S: f64 = 1.0;

/// One request attempt reported by a benchmark client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub latency_ms: f64,
    pub timestamp_ns: i64,
    pub ok: bool,
}

impl Sample {
    /// Build a sample from the raw nanosecond fields of an artifact record.
    pub fn from_nanos(latency_ns: i64, timestamp_ns: i64, ok: bool) -> Self {
        Self {
            latency_ms: latency_ns as f64 / NANOS_PER_MS,
            timestamp_ns,
            ok,
        }
    }
}

/// Statistical summary of one benchmark run.
///
/// Serialized with the field names benchmark clients use for their own
/// summaries (`Samples`, `OKRatePct`, `P50ms`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "Samples")]
    pub samples: u64,
    #[serde(rename = "OKRatePct")]
    pub ok_rate_pct: f64,
    #[serde(rename = "RPS")]
    pub rps: f64,
    #[serde(rename = "DurationS")]
    pub duration_s: f64,
    #[serde(rename = "P50ms")]
    pub p50_ms: f64,
    #[serde(rename = "P90ms")]
    pub p90_ms: f64,
    #[serde(rename = "P95ms")]
    pub p95_ms: f64,
    #[serde(rename = "P99ms")]
    pub p99_ms: f64,
    #[serde(rename = "Meanms")]
    pub mean_ms: f64,
    #[serde(rename = "Minms")]
    pub min_ms: f64,
    #[serde(rename = "Maxms")]
    pub max_ms: f64,
}

/// Tunable policy for [`compute_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryOptions {
    /// Divisor (seconds) used for RPS when the timestamp spread is zero.
    pub zero_duration_divisor_s: f64,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            zero_duration_divisor_s: DEFAULT_ZERO_DURATION_DIVISOR_S,
        }
    }
}

/// Compute a summary with the default policy.
pub fn compute(samples: &[Sample]) -> Summary {
    compute_with(samples, &SummaryOptions::default())
}

/// Compute a summary.
///
/// Duration is the spread between the smallest and largest sample timestamp,
/// not wall-clock time. All reported floats are rounded to six decimals.
pub fn compute_with(samples: &[Sample], options: &SummaryOptions) -> Summary {
    if samples.is_empty() {
        return Summary::default();
    }

    let mut latencies: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
    latencies.sort_by(f64::total_cmp);

    let (min_ts, max_ts) = samples
        .iter()
        .fold((i64::MAX, i64::MIN), |(lo, hi), s| {
            (lo.min(s.timestamp_ns), hi.max(s.timestamp_ns))
        });
    let duration_s = (i128::from(max_ts) - i128::from(min_ts)) as f64 / NANOS_PER_SEC;
    let rps_divisor = if duration_s == 0.0 {
        guard_denominator(options.zero_duration_divisor_s)
    } else {
        duration_s
    };

    let count = samples.len() as f64;
    let ok_count = samples.iter().filter(|s| s.ok).count() as f64;
    let mean_ms = latencies.iter().sum::<f64>() / count;

    Summary {
        samples: samples.len() as u64,
        ok_rate_pct: round6(ok_count / count * 100.0),
        rps: round6(count / rps_divisor),
        duration_s: round6(duration_s),
        p50_ms: round6(percentile(&latencies, 0.50)),
        p90_ms: round6(percentile(&latencies, 0.90)),
        p95_ms: round6(percentile(&latencies, 0.95)),
        p99_ms: round6(percentile(&latencies, 0.99)),
        mean_ms: round6(mean_ms),
        min_ms: round6(latencies[0]),
        max_ms: round6(latencies[latencies.len() - 1]),
    }
}

/// Linearly interpolated percentile of an ascending slice.
///
/// `p` is a fraction in `[0, 1]`. The fractional rank is `p * (n - 1)`; the
/// result interpolates between the two neighbouring values. Returns `0.0`
/// for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let i = pos.floor() as usize;
    let f = pos - i as f64;
    if i + 1 < sorted.len() {
        sorted[i] + f * (sorted[i + 1] - sorted[i])
    } else {
        sorted[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(latency_ms: f64, timestamp_ns: i64, ok: bool) -> Sample {
        Sample {
            latency_ms,
            timestamp_ns,
            ok,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn empty_input_yields_all_zero_summary() {
        let s = compute(&[]);
        assert_eq!(s, Summary::default());
        assert_eq!(s.samples, 0);
        assert_eq!(s.rps, 0.0);
        assert!(!s.ok_rate_pct.is_nan());
    }

    #[test]
    fn three_sample_scenario() {
        let samples = [
            sample(100.0, 1_000_000_000, true),
            sample(200.0, 1_500_000_000, true),
            sample(300.0, 2_000_000_000, false),
        ];
        let s = compute(&samples);
        assert_eq!(s.samples, 3);
        assert_eq!(s.ok_rate_pct, 66.666667);
        assert_eq!(s.duration_s, 1.0);
        assert_eq!(s.rps, 3.0);
        assert_eq!(s.p50_ms, 200.0);
        assert_eq!(s.mean_ms, 200.0);
        assert_eq!(s.min_ms, 100.0);
        assert_eq!(s.max_ms, 300.0);
    }

    #[test]
    fn uniform_distribution_matches_closed_form() {
        // Latencies 1..=1000 ms, supplied in reverse to exercise sorting.
        let samples: Vec<Sample> = (1..=1000)
            .rev()
            .map(|ms| sample(ms as f64, ms as i64 * 1_000_000, true))
            .collect();
        let s = compute(&samples);

        // rank = p * 999; value = floor(rank) + 1 + frac(rank)
        assert_close(s.p50_ms, 500.5);
        assert_close(s.p90_ms, 900.1);
        assert_close(s.p95_ms, 950.05);
        assert_close(s.p99_ms, 990.01);
        assert_close(s.mean_ms, 500.5);
        assert_close(s.min_ms, 1.0);
        assert_close(s.max_ms, 1000.0);
        assert_close(s.duration_s, 0.999);
    }

    #[test]
    fn percentile_endpoints_are_min_and_max() {
        let sorted = [3.0, 7.5, 9.0, 12.25, 40.0];
        assert_eq!(percentile(&sorted, 0.0), 3.0);
        assert_eq!(percentile(&sorted, 1.0), 40.0);
    }

    #[test]
    fn percentile_is_monotonic_in_p() {
        let sorted = [1.0, 1.0, 2.0, 5.0, 8.0, 13.0, 21.0];
        let mut previous = f64::NEG_INFINITY;
        for step in 0..=100 {
            let value = percentile(&sorted, step as f64 / 100.0);
            assert!(value >= previous, "P({step}%) decreased");
            previous = value;
        }
    }

    #[test]
    fn percentile_interpolates_between_neighbours() {
        let sorted = [10.0, 20.0];
        assert_eq!(percentile(&sorted, 0.25), 12.5);
        assert_eq!(percentile(&[42.0], 0.99), 42.0);
    }

    #[test]
    fn zero_duration_uses_divisor_floor() {
        let samples = [sample(5.0, 10, true), sample(6.0, 10, true)];
        let s = compute(&samples);
        assert_eq!(s.duration_s, 0.0);
        assert_eq!(s.rps, 2.0);

        let strict = SummaryOptions {
            zero_duration_divisor_s: 0.5,
        };
        assert_eq!(compute_with(&samples, &strict).rps, 4.0);
    }

    #[test]
    fn zero_divisor_option_never_produces_infinity() {
        let samples = [sample(5.0, 10, true)];
        let options = SummaryOptions {
            zero_duration_divisor_s: 0.0,
        };
        assert!(compute_with(&samples, &options).rps.is_finite());
    }

    #[test]
    fn from_nanos_converts_to_milliseconds() {
        let s = Sample::from_nanos(1_500_000, 42, true);
        assert_eq!(s.latency_ms, 1.5);
        assert_eq!(s.timestamp_ns, 42);
    }

    #[test]
    fn serializes_with_client_field_names() {
        let json = serde_json::to_value(compute(&[sample(1.0, 0, true)])).unwrap();
        for key in [
            "Samples", "OKRatePct", "RPS", "DurationS", "P50ms", "P90ms", "P95ms", "P99ms",
            "Meanms", "Minms", "Maxms",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
