//! Win/loss tallies across the historical runs of one or more scenarios.
//!
//! Only runs holding both protocol results are compared. Improvements are
//! reported in percent relative to HTTP/2.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::numeric::{mean, round6};
use crate::protocol::Winner;
use crate::store::RunWithResults;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    pub total_runs: usize,
    pub comparable_pairs: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyTally {
    pub h2_wins: usize,
    pub h3_wins: usize,
    pub ties: usize,
    pub avg_p50_h2_ms: f64,
    pub avg_p50_h3_ms: f64,
    /// Mean of `(h2.p50 - h3.p50) / h2.p50 * 100` over pairs with `h2.p50 > 0`.
    pub avg_improvement_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputTally {
    pub h2_wins: usize,
    pub h3_wins: usize,
    pub ties: usize,
    pub avg_rps_h2: f64,
    pub avg_rps_h3: f64,
    /// Mean of `(h3.rps - h2.rps) / h2.rps * 100` over pairs with `h2.rps > 0`.
    pub avg_gain_pct: f64,
}

/// Fraction of comparable pairs won by HTTP/3, in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinRates {
    pub latency_h3: f64,
    pub rps_h3: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MajorityWinner {
    pub latency: Winner,
    pub rps: Winner,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHead {
    pub counts: RunCounts,
    pub latency: LatencyTally,
    pub throughput: ThroughputTally,
    pub win_rates: WinRates,
    pub winner: MajorityWinner,
}

/// Head-to-head over every scenario that has at least one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllScenariosSummary {
    pub overall: HeadToHead,
    pub per_scenario: BTreeMap<String, HeadToHead>,
    /// Scenarios included in `per_scenario`, sorted.
    pub scenarios: Vec<String>,
}

/// Tally the runs of one scenario (or any mixed set of runs).
pub fn summarize<'a>(runs: impl IntoIterator<Item = &'a RunWithResults>) -> HeadToHead {
    let mut total_runs = 0;
    let mut latency = LatencyTally::default();
    let mut throughput = ThroughputTally::default();
    let (mut h2_p50, mut h3_p50, mut h2_rps, mut h3_rps) = (vec![], vec![], vec![], vec![]);
    let (mut improvements, mut gains) = (vec![], vec![]);

    for run in runs {
        total_runs += 1;
        let Some((h2, h3)) = run.results.both() else {
            continue;
        };

        match Winner::lower_is_better(h2.p50_ms, h3.p50_ms) {
            Winner::H2 => latency.h2_wins += 1,
            Winner::H3 => latency.h3_wins += 1,
            Winner::Tie => latency.ties += 1,
        }
        match Winner::higher_is_better(h2.rps, h3.rps) {
            Winner::H2 => throughput.h2_wins += 1,
            Winner::H3 => throughput.h3_wins += 1,
            Winner::Tie => throughput.ties += 1,
        }

        if h2.p50_ms > 0.0 {
            improvements.push((h2.p50_ms - h3.p50_ms) / h2.p50_ms * 100.0);
        }
        if h2.rps > 0.0 {
            gains.push((h3.rps - h2.rps) / h2.rps * 100.0);
        }

        h2_p50.push(h2.p50_ms);
        h3_p50.push(h3.p50_ms);
        h2_rps.push(h2.rps);
        h3_rps.push(h3.rps);
    }

    let pairs = h2_p50.len();
    latency.avg_p50_h2_ms = round6(mean(&h2_p50));
    latency.avg_p50_h3_ms = round6(mean(&h3_p50));
    latency.avg_improvement_pct = round6(mean(&improvements));
    throughput.avg_rps_h2 = round6(mean(&h2_rps));
    throughput.avg_rps_h3 = round6(mean(&h3_rps));
    throughput.avg_gain_pct = round6(mean(&gains));

    let rate = |wins: usize| {
        if pairs == 0 {
            0.0
        } else {
            round6(wins as f64 / pairs as f64)
        }
    };

    HeadToHead {
        counts: RunCounts {
            total_runs,
            comparable_pairs: pairs,
        },
        win_rates: WinRates {
            latency_h3: rate(latency.h3_wins),
            rps_h3: rate(throughput.h3_wins),
        },
        winner: MajorityWinner {
            latency: majority(latency.h2_wins, latency.h3_wins),
            rps: majority(throughput.h2_wins, throughput.h3_wins),
        },
        latency,
        throughput,
    }
}

/// Tally each scenario separately and all of them together.
///
/// Scenarios with no runs are left out of `per_scenario` and `scenarios`.
pub fn summarize_all(grouped: &[(String, Vec<RunWithResults>)]) -> AllScenariosSummary {
    let per_scenario: BTreeMap<String, HeadToHead> = grouped
        .iter()
        .filter(|(_, runs)| !runs.is_empty())
        .map(|(scenario, runs)| (scenario.clone(), summarize(runs)))
        .collect();

    AllScenariosSummary {
        overall: summarize(grouped.iter().flat_map(|(_, runs)| runs)),
        scenarios: per_scenario.keys().cloned().collect(),
        per_scenario,
    }
}

fn majority(h2_wins: usize, h3_wins: usize) -> Winner {
    if h3_wins > h2_wins {
        Winner::H3
    } else if h2_wins > h3_wins {
        Winner::H2
    } else {
        Winner::Tie
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;
    use crate::store::{ResultPair, ResultRecord, Run};
    use crate::summary::Summary;
    use crate::types::RunConfig;

    fn run(scenario: &str, h2: Option<(f64, f64)>, h3: Option<(f64, f64)>) -> RunWithResults {
        let record = |protocol, (p50_ms, rps)| ResultRecord {
            id: 1,
            run_id: 1,
            protocol,
            summary: Summary {
                p50_ms,
                rps,
                ..Summary::default()
            },
        };
        RunWithResults {
            run: Run {
                id: 1,
                ui_scenario: scenario.into(),
                backend_scenario: scenario.into(),
                config: RunConfig::new(),
                created_at: chrono::Utc::now(),
            },
            results: ResultPair::from_options(
                h2.map(|v| record(Protocol::H2, v)),
                h3.map(|v| record(Protocol::H3, v)),
            ),
        }
    }

    #[test]
    fn empty_history_is_all_zero_ties() {
        let s = summarize(&[]);
        assert_eq!(s.counts, RunCounts::default());
        assert_eq!(s.win_rates, WinRates::default());
        assert_eq!(s.winner.latency, Winner::Tie);
        assert_eq!(s.winner.rps, Winner::Tie);
    }

    #[test]
    fn counts_wins_ties_and_skips_incomplete_runs() {
        let runs = vec![
            run("burst", Some((10.0, 100.0)), Some((5.0, 200.0))),
            run("burst", Some((10.0, 100.0)), Some((10.0, 50.0))),
            run("burst", Some((4.0, 100.0)), Some((8.0, 100.0))),
            run("burst", Some((1.0, 1.0)), None),
        ];
        let s = summarize(&runs);

        assert_eq!(s.counts.total_runs, 4);
        assert_eq!(s.counts.comparable_pairs, 3);
        assert_eq!((s.latency.h2_wins, s.latency.h3_wins, s.latency.ties), (1, 1, 1));
        assert_eq!(
            (s.throughput.h2_wins, s.throughput.h3_wins, s.throughput.ties),
            (1, 1, 1)
        );
        assert_eq!(s.winner.latency, Winner::Tie);
        assert_eq!(s.latency.avg_p50_h2_ms, 8.0);
        // Improvements: +50, 0, -100 -> mean -16.666667
        assert_eq!(s.latency.avg_improvement_pct, -16.666667);
        // Gains: +100, -50, 0 -> mean 16.666667
        assert_eq!(s.throughput.avg_gain_pct, 16.666667);
        assert_eq!(s.win_rates.latency_h3, 0.333333);
    }

    #[test]
    fn zero_baseline_pairs_are_excluded_from_improvement() {
        let runs = vec![
            run("baseline", Some((0.0, 0.0)), Some((5.0, 10.0))),
            run("baseline", Some((10.0, 100.0)), Some((5.0, 150.0))),
        ];
        let s = summarize(&runs);
        assert_eq!(s.latency.avg_improvement_pct, 50.0);
        assert_eq!(s.throughput.avg_gain_pct, 50.0);
        assert_eq!(s.winner.latency, Winner::Tie);
        assert_eq!(s.winner.rps, Winner::H3);
    }

    #[test]
    fn summarize_all_groups_and_skips_empty_scenarios() {
        let grouped = vec![
            (
                "burst".to_string(),
                vec![run("burst", Some((10.0, 100.0)), Some((5.0, 200.0)))],
            ),
            ("header_bloat".to_string(), vec![]),
            (
                "baseline".to_string(),
                vec![run("baseline", Some((5.0, 200.0)), Some((10.0, 100.0)))],
            ),
        ];
        let all = summarize_all(&grouped);

        assert_eq!(all.scenarios, vec!["baseline", "burst"]);
        assert_eq!(all.per_scenario["burst"].winner.latency, Winner::H3);
        assert_eq!(all.per_scenario["baseline"].winner.latency, Winner::H2);
        assert_eq!(all.overall.counts.comparable_pairs, 2);
        assert_eq!(all.overall.winner.latency, Winner::Tie);

        let json = serde_json::to_value(&all).unwrap();
        assert!(json.get("perScenario").is_some());
        assert!(json["overall"]["latency"].get("avgImprovementPct").is_some());
    }
}
