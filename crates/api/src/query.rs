//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// `?scenario=` filter used by the run history endpoints.
///
/// Absent or blank means "every scenario".
#[derive(Debug, Default, Deserialize)]
pub struct ScenarioFilter {
    pub scenario: Option<String>,
}

impl ScenarioFilter {
    pub fn scenario(&self) -> Option<&str> {
        self.scenario
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_scenario_means_all() {
        let filter = ScenarioFilter {
            scenario: Some("  ".into()),
        };
        assert_eq!(filter.scenario(), None);
        assert_eq!(ScenarioFilter::default().scenario(), None);
    }

    #[test]
    fn scenario_is_trimmed() {
        let filter = ScenarioFilter {
            scenario: Some(" burst ".into()),
        };
        assert_eq!(filter.scenario(), Some("burst"));
    }
}
