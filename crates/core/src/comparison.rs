//! Head-to-head comparison of two protocol summaries.
//!
//! Every relative metric uses variant A (HTTP/2) as the baseline. A zero
//! baseline is replaced by [`DIVISION_EPSILON`](crate::numeric::DIVISION_EPSILON).

use serde::{Deserialize, Serialize};

use crate::numeric::{guard_denominator, round6};
use crate::protocol::{Protocol, Winner};
use crate::summary::Summary;

/// Derived comparison between the HTTP/2 and HTTP/3 summaries of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonMetrics {
    /// Lower p50 wins.
    pub latency_winner: Winner,
    /// Higher RPS wins.
    pub throughput_winner: Winner,
    /// `(a.p50 - b.p50) / a.p50 * 100`; positive means HTTP/3 is faster.
    pub p50_diff: f64,
    /// `(a.p99 - b.p99) / a.p99 * 100`.
    pub p99_diff: f64,
    /// `(b.rps - a.rps) / a.rps * 100`; positive means HTTP/3 serves more.
    pub rps_diff: f64,
    /// Mean of `p50_diff` and `p99_diff`.
    pub latency_improvement: f64,
}

/// Compare variant A (`a`, HTTP/2) against variant B (`b`, HTTP/3).
pub fn compare(a: &Summary, b: &Summary) -> ComparisonMetrics {
    let p50_diff = (a.p50_ms - b.p50_ms) / guard_denominator(a.p50_ms) * 100.0;
    let p99_diff = (a.p99_ms - b.p99_ms) / guard_denominator(a.p99_ms) * 100.0;
    let rps_diff = (b.rps - a.rps) / guard_denominator(a.rps) * 100.0;

    ComparisonMetrics {
        latency_winner: Winner::lower_is_better(a.p50_ms, b.p50_ms),
        throughput_winner: Winner::higher_is_better(a.rps, b.rps),
        p50_diff: round6(p50_diff),
        p99_diff: round6(p99_diff),
        rps_diff: round6(rps_diff),
        latency_improvement: round6((p50_diff + p99_diff) / 2.0),
    }
}

/// Summary of one protocol inside a [`ComparisonResult`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProtocolSummary {
    /// Display label, e.g. `"HTTP/2"`.
    pub protocol: &'static str,
    pub summary: Summary,
}

impl ProtocolSummary {
    pub fn new(protocol: Protocol, summary: Summary) -> Self {
        Self {
            protocol: protocol.label(),
            summary,
        }
    }
}

/// The final payload of a successful comparison run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub h2: ProtocolSummary,
    pub h3: ProtocolSummary,
    pub comparison: ComparisonMetrics,
}

impl ComparisonResult {
    /// Assemble the payload and compute the comparison metrics.
    pub fn new(h2: Summary, h3: Summary) -> Self {
        Self {
            comparison: compare(&h2, &h3),
            h2: ProtocolSummary::new(Protocol::H2, h2),
            h3: ProtocolSummary::new(Protocol::H3, h3),
        }
    }
}
