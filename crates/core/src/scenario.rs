//! Benchmark scenario catalog.
//!
//! Each scenario is a fixed configuration profile baked into a dedicated
//! client binary; the harness only chooses which binary to run and, for a
//! few scenarios, adds a mode flag.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A named benchmark configuration profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Baseline,
    Burst,
    ColdVsResumed,
    ParallelStreams,
    HeaderBloat,
    UplinkLoss,
    ConnectionChurn,
    NatRebinding,
    MixedLoad,
    StressTest,
}

impl Scenario {
    /// Every known scenario, in catalog order.
    pub const ALL: [Scenario; 10] = [
        Scenario::Baseline,
        Scenario::Burst,
        Scenario::ColdVsResumed,
        Scenario::ParallelStreams,
        Scenario::HeaderBloat,
        Scenario::UplinkLoss,
        Scenario::ConnectionChurn,
        Scenario::NatRebinding,
        Scenario::MixedLoad,
        Scenario::StressTest,
    ];

    /// Identifier used on the wire and in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Burst => "burst",
            Self::ColdVsResumed => "cold_vs_resumed",
            Self::ParallelStreams => "parallel_streams",
            Self::HeaderBloat => "header_bloat",
            Self::UplinkLoss => "uplink_loss",
            Self::ConnectionChurn => "connection_churn",
            Self::NatRebinding => "nat_rebinding",
            Self::MixedLoad => "mixed_load",
            Self::StressTest => "stress_test",
        }
    }

    /// Name of the client executable implementing this scenario.
    pub fn binary_name(self) -> &'static str {
        match self {
            Self::Baseline => "bench-client",
            Self::Burst => "bench-burst",
            Self::ColdVsResumed => "bench-coldstart",
            Self::ParallelStreams => "bench-parallel",
            Self::HeaderBloat => "bench-header-bloat",
            Self::UplinkLoss => "bench-uplink",
            Self::ConnectionChurn => "bench-churn",
            Self::NatRebinding => "bench-migration",
            Self::MixedLoad => "bench-mixed",
            Self::StressTest => "bench-stress",
        }
    }

    /// Scenario-specific flags appended after the common client arguments.
    pub fn mode_args(self) -> &'static [&'static str] {
        match self {
            Self::ColdVsResumed => &["--mode", "cold"],
            _ => &[],
        }
    }

    /// Comma-separated list of valid identifiers, for error messages.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == s)
            .ok_or_else(|| {
                CoreError::InvalidInput(format!(
                    "Invalid scenario '{s}'. Valid: {}",
                    Self::valid_names()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn every_scenario_round_trips_through_its_name() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.as_str().parse::<Scenario>().unwrap(), scenario);
        }
    }

    #[test]
    fn unknown_scenario_lists_valid_names() {
        let err = "warp_speed".parse::<Scenario>().unwrap_err();
        assert_matches!(&err, CoreError::InvalidInput(msg) if msg.contains("baseline, burst"));
    }

    #[test]
    fn only_cold_vs_resumed_has_mode_flag() {
        assert_eq!(Scenario::ColdVsResumed.mode_args(), &["--mode", "cold"]);
        for scenario in Scenario::ALL {
            if scenario != Scenario::ColdVsResumed {
                assert!(scenario.mode_args().is_empty(), "{scenario} has mode args");
            }
        }
    }

    #[test]
    fn binary_names() {
        assert_eq!(Scenario::Baseline.binary_name(), "bench-client");
        assert_eq!(Scenario::NatRebinding.binary_name(), "bench-migration");
        assert_eq!(Scenario::StressTest.binary_name(), "bench-stress");
    }

    #[test]
    fn serde_uses_snake_case_identifiers() {
        let json = serde_json::to_string(&Scenario::ColdVsResumed).unwrap();
        assert_eq!(json, "\"cold_vs_resumed\"");
    }
}
