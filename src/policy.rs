//! Recommendation policy: composite score to action plus rationale.

use serde::Serialize;

/// Block when the composite score reaches this value.
pub const BLOCK_THRESHOLD: u8 = 70;

/// Monitor when the composite score reaches this value (and is below the
/// block threshold).
pub const MONITOR_THRESHOLD: u8 = 40;

/// Recommended action for an analyzed IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Allow,
    Monitor,
    Block,
}

/// Action plus the tiered rationale shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub action: Action,
    pub rationale: &'static str,
}

/// Map a composite score to an action.
pub fn action_for(composite_score: u8) -> Action {
    if composite_score >= BLOCK_THRESHOLD {
        Action::Block
    } else if composite_score >= MONITOR_THRESHOLD {
        Action::Monitor
    } else {
        Action::Allow
    }
}

/// Map a composite score to an action with its canned rationale.
///
/// Rationale is selected by the same threshold comparison as the action,
/// so the two can never disagree.
pub fn recommend(composite_score: u8) -> Recommendation {
    match action_for(composite_score) {
        Action::Block => Recommendation {
            action: Action::Block,
            rationale:
                "High-risk IP with suspicious activity patterns - consider immediate blocking.",
        },
        Action::Monitor => Recommendation {
            action: Action::Monitor,
            rationale: "Moderate risk - monitor closely.",
        },
        Action::Allow => Recommendation {
            action: Action::Allow,
            rationale: "Low risk - no action required.",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundaries() {
        assert_eq!(action_for(0), Action::Allow);
        assert_eq!(action_for(39), Action::Allow);
        assert_eq!(action_for(40), Action::Monitor);
        assert_eq!(action_for(69), Action::Monitor);
        assert_eq!(action_for(70), Action::Block);
        assert_eq!(action_for(100), Action::Block);
    }

    #[test]
    fn test_rationale_matches_action() {
        for score in 0..=100u8 {
            let rec = recommend(score);
            assert_eq!(rec.action, action_for(score));
            match rec.action {
                Action::Block => assert!(rec.rationale.contains("blocking")),
                Action::Monitor => assert!(rec.rationale.contains("monitor")),
                Action::Allow => assert!(rec.rationale.contains("no action")),
            }
        }
    }
}
