//! Aggregated Verdict
//!
//! The single authoritative judgment of an artifact. Computed by the
//! consensus aggregator once quorum is reached; never written by a principal.

use serde::{Deserialize, Serialize};

use crate::model::artifact::Domain;
use crate::model::review::Difficulty;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Mean weighted score across reviewers, 0-100, rounded half-up
    pub quality_score: u32,
    /// Plurality of suggested difficulties
    pub difficulty: Difficulty,
    /// Plurality of suggested categories
    pub category: Domain,
    /// Median of suggested durations
    pub duration_minutes: u32,
    /// Number of reviews aggregated
    pub review_count: usize,
}

impl Verdict {
    pub fn is_approved(&self, approval_threshold: u32) -> bool {
        self.quality_score >= approval_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approval_threshold_is_inclusive() {
        let verdict = Verdict {
            quality_score: 85,
            difficulty: Difficulty::Medium,
            category: Domain::Security,
            duration_minutes: 90,
            review_count: 3,
        };
        assert!(verdict.is_approved(85));
        assert!(verdict.is_approved(70));
        assert!(!verdict.is_approved(86));
    }
}
