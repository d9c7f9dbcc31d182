//! Run-to-run stability of each protocol within one scenario.
//!
//! Stability is measured by the coefficient of variation (CV) of p50 latency
//! and of RPS across historical runs. A protocol's score is the mean of the
//! two CVs; lower is more stable.

use serde::Serialize;

use crate::numeric::{guard_denominator, mean, sample_stddev};
use crate::protocol::{Protocol, Winner};
use crate::store::RunWithResults;

/// Variability of one protocol across the runs that recorded it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProtocolStability {
    #[serde(rename = "p50CV")]
    pub p50_cv: f64,
    #[serde(rename = "rpsCV")]
    pub rps_cv: f64,
    pub score: f64,
    /// Number of runs contributing to the series.
    pub runs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StabilityScore {
    pub h2: ProtocolStability,
    pub h3: ProtocolStability,
    /// Strictly lower score wins.
    pub winner: Winner,
}

/// Stability report for one scenario.
///
/// All three fields are `None` when the scenario has no runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioStability {
    pub earliest: Option<RunWithResults>,
    pub latest: Option<RunWithResults>,
    pub stability: Option<StabilityScore>,
}

/// Coefficient of variation: sample std-dev over the mean.
///
/// A mean of exactly zero (which includes the empty series) is floored to
/// [`DIVISION_EPSILON`](crate::numeric::DIVISION_EPSILON).
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    sample_stddev(values) / guard_denominator(mean(values))
}

fn protocol_stability(runs: &[RunWithResults], protocol: Protocol) -> ProtocolStability {
    let (p50, rps): (Vec<f64>, Vec<f64>) = runs
        .iter()
        .filter_map(|r| r.results.get(protocol))
        .map(|record| (record.summary.p50_ms, record.summary.rps))
        .unzip();

    let p50_cv = coefficient_of_variation(&p50);
    let rps_cv = coefficient_of_variation(&rps);
    ProtocolStability {
        p50_cv,
        rps_cv,
        score: (p50_cv + rps_cv) / 2.0,
        runs: p50.len(),
    }
}

/// Analyze the runs of one scenario, ordered oldest first.
///
/// A protocol absent from every run has empty series and therefore a score
/// of zero.
pub fn analyze(runs: &[RunWithResults]) -> ScenarioStability {
    let (Some(earliest), Some(latest)) = (runs.first(), runs.last()) else {
        return ScenarioStability {
            earliest: None,
            latest: None,
            stability: None,
        };
    };

    let h2 = protocol_stability(runs, Protocol::H2);
    let h3 = protocol_stability(runs, Protocol::H3);

    ScenarioStability {
        earliest: Some(earliest.clone()),
        latest: Some(latest.clone()),
        stability: Some(StabilityScore {
            winner: Winner::lower_is_better(h2.score, h3.score),
            h2,
            h3,
        }),
    }
}
