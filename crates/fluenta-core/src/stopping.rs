//! Stopping rules for adaptive skill modules.
//!
//! Conditions are checked in a fixed order; the first match wins.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::SkillConfig;

/// Why a skill module stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The administered count reached the configured ceiling.
    MaxItems,
    /// The skill's wall-clock budget ran out.
    Timeout,
    /// SE target reached with blueprint satisfied and minimum items done.
    PrecisionReached,
    /// The item pool ran dry; the module was completed on partial evidence.
    EvidenceLimited,
    /// External grading produced a score (productive skills).
    Graded,
    /// The candidate stopped interacting and the idle budget lapsed.
    Abandoned,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::MaxItems => "max_items",
            StopReason::Timeout => "timeout",
            StopReason::PrecisionReached => "precision_reached",
            StopReason::EvidenceLimited => "evidence_limited",
            StopReason::Graded => "graded",
            StopReason::Abandoned => "abandoned",
        };
        write!(f, "{s}")
    }
}

/// Continue administering, or stop with a reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopDecision {
    Continue,
    Stop(StopReason),
}

/// Evaluate the stopping rule for an objective skill module.
///
/// Order matters: the item ceiling and time budget fire regardless of
/// precision; a precision stop additionally requires the blueprint and
/// the minimum item count.
pub fn evaluate(
    config: &SkillConfig,
    administered: u32,
    elapsed: Duration,
    se: f64,
    blueprint_satisfied: bool,
) -> StopDecision {
    if administered >= config.max_items {
        return StopDecision::Stop(StopReason::MaxItems);
    }
    if elapsed >= Duration::from_secs(config.time_budget_secs) {
        return StopDecision::Stop(StopReason::Timeout);
    }
    if blueprint_satisfied && se <= config.se_target && administered >= config.min_items {
        return StopDecision::Stop(StopReason::PrecisionReached);
    }
    StopDecision::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SkillConfig {
        SkillConfig {
            se_target: 0.3,
            max_items: 30,
            min_items: 10,
            time_budget_secs: 1200,
            ..SkillConfig::default()
        }
    }

    #[test]
    fn continues_below_minimum() {
        let d = evaluate(&config(), 3, Duration::from_secs(60), 0.1, true);
        assert_eq!(d, StopDecision::Continue);
    }

    #[test]
    fn max_items_fires_even_without_precision() {
        let d = evaluate(&config(), 30, Duration::from_secs(60), 2.5, false);
        assert_eq!(d, StopDecision::Stop(StopReason::MaxItems));
    }

    #[test]
    fn max_items_takes_priority_over_timeout() {
        let d = evaluate(&config(), 30, Duration::from_secs(9999), 0.1, true);
        assert_eq!(d, StopDecision::Stop(StopReason::MaxItems));
    }

    #[test]
    fn timeout_fires_before_precision() {
        let d = evaluate(&config(), 12, Duration::from_secs(1200), 0.1, true);
        assert_eq!(d, StopDecision::Stop(StopReason::Timeout));
    }

    #[test]
    fn precision_requires_blueprint() {
        let d = evaluate(&config(), 12, Duration::from_secs(60), 0.2, false);
        assert_eq!(d, StopDecision::Continue);
    }

    #[test]
    fn precision_requires_min_items() {
        let d = evaluate(&config(), 9, Duration::from_secs(60), 0.2, true);
        assert_eq!(d, StopDecision::Continue);
    }

    #[test]
    fn precision_stop_when_all_conditions_hold() {
        let d = evaluate(&config(), 12, Duration::from_secs(60), 0.29, true);
        assert_eq!(d, StopDecision::Stop(StopReason::PrecisionReached));
    }

    #[test]
    fn stop_reason_display() {
        assert_eq!(StopReason::MaxItems.to_string(), "max_items");
        assert_eq!(StopReason::PrecisionReached.to_string(), "precision_reached");
    }
}
