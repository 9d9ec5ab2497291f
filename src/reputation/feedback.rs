//! Reputation Feedback
//!
//! Turns a finalized verdict into one atomic ledger batch:
//!
//! - The author gains domain and global reputation linear in the quality
//!   score, between `author_min_delta` (score 0) and `author_max_delta`
//!   (score 100).
//! - Each reviewer earns the participation reward scaled down linearly as
//!   their deviation approaches `deviation_tolerance`. At or beyond the
//!   tolerance the reward is zero. It is never negative, so honest minority
//!   opinions cannot be driven into a loss.
//!
//! The batch is keyed by artifact, so the ledger refuses to apply it twice.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{round_half_up, Artifact, ArtifactId, Verdict};
use crate::reputation::{
    ChangeCause, LedgerBatch, LedgerChange, LedgerDelta, LedgerError, ReputationLedger,
    ReputationScope,
};
use crate::review::ReviewerDeviation;

/// Largest magnitude any single feedback delta may be configured with
pub const MAX_FEEDBACK_DELTA: u64 = 1_000_000;

/// Governance-configurable feedback constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackPolicy {
    pub author_min_delta: i64,
    pub author_max_delta: i64,
    /// Reward for a reviewer in perfect agreement with the verdict
    pub reviewer_participation_reward: i64,
    /// Deviation (0-100 scale) at which the reviewer reward reaches zero
    pub deviation_tolerance: u32,
}

impl Default for FeedbackPolicy {
    fn default() -> Self {
        Self {
            author_min_delta: 0,
            author_max_delta: 20,
            reviewer_participation_reward: 5,
            deviation_tolerance: 25,
        }
    }
}

impl FeedbackPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.author_min_delta > self.author_max_delta {
            return Err(format!(
                "author_min_delta {} exceeds author_max_delta {}",
                self.author_min_delta, self.author_max_delta
            ));
        }
        if self.reviewer_participation_reward < 0 {
            return Err("reviewer_participation_reward cannot be negative".to_string());
        }
        for (name, delta) in [
            ("author_min_delta", self.author_min_delta),
            ("author_max_delta", self.author_max_delta),
            ("reviewer_participation_reward", self.reviewer_participation_reward),
        ] {
            if delta.unsigned_abs() > MAX_FEEDBACK_DELTA {
                return Err(format!(
                    "{} {} is outside +/-{}",
                    name, delta, MAX_FEEDBACK_DELTA
                ));
            }
        }
        if self.deviation_tolerance == 0 || self.deviation_tolerance > 100 {
            return Err(format!(
                "deviation_tolerance {} must be within 1-100",
                self.deviation_tolerance
            ));
        }
        Ok(())
    }
}

pub struct ReputationFeedback {
    policy: FeedbackPolicy,
}

impl ReputationFeedback {
    pub fn new(policy: FeedbackPolicy) -> Self {
        Self { policy }
    }

    /// Author delta for a 0-100 quality score
    pub fn author_delta(&self, quality_score: u32) -> i64 {
        let span = self
            .policy
            .author_max_delta
            .saturating_sub(self.policy.author_min_delta)
            .max(0) as u64;
        let quality = u64::from(quality_score.min(100));
        self.policy.author_min_delta + round_half_up(span * quality, 100) as i64
    }

    /// Reviewer delta for a 0-100 deviation; always within `0..=reward`
    pub fn reviewer_delta(&self, deviation: u32) -> i64 {
        let tolerance = self.policy.deviation_tolerance;
        if tolerance == 0 || deviation >= tolerance {
            return 0;
        }
        let reward = self.policy.reviewer_participation_reward.max(0) as u64;
        round_half_up(reward * u64::from(tolerance - deviation), u64::from(tolerance)) as i64
    }

    /// Finalization key for an artifact's feedback batch
    pub fn batch_key(artifact: &ArtifactId) -> String {
        format!("finalize:{}", artifact)
    }

    /// Every delta for one finalization, author first, then reviewers in slot order
    pub fn plan(
        &self,
        artifact: &Artifact,
        verdict: &Verdict,
        deviations: &[ReviewerDeviation],
    ) -> LedgerBatch {
        let domain = ReputationScope::Domain(artifact.domain);
        let mut deltas = Vec::with_capacity(2 + deviations.len() * 2);

        let author_delta = self.author_delta(verdict.quality_score);
        for scope in [domain, ReputationScope::Global] {
            deltas.push(LedgerDelta {
                principal: artifact.author.clone(),
                scope,
                delta: author_delta,
                cause: ChangeCause::Authored {
                    artifact: artifact.id.clone(),
                    quality_score: verdict.quality_score,
                },
            });
        }

        for entry in deviations {
            let delta = self.reviewer_delta(entry.deviation);
            for scope in [domain, ReputationScope::Global] {
                deltas.push(LedgerDelta {
                    principal: entry.reviewer.clone(),
                    scope,
                    delta,
                    cause: ChangeCause::Reviewed {
                        artifact: artifact.id.clone(),
                        deviation: entry.deviation,
                    },
                });
            }
        }

        LedgerBatch {
            key: Self::batch_key(&artifact.id),
            deltas,
        }
    }

    /// Plan and apply the batch in one ledger call
    pub async fn apply(
        &self,
        ledger: &dyn ReputationLedger,
        artifact: &Artifact,
        verdict: &Verdict,
        deviations: &[ReviewerDeviation],
    ) -> Result<Vec<LedgerChange>, LedgerError> {
        let batch = self.plan(artifact, verdict, deviations);
        let changes = ledger.apply_batch(batch).await?;

        info!(
            artifact = %artifact.id.short(),
            quality = verdict.quality_score,
            reviewers = deviations.len(),
            "Applied reputation feedback"
        );

        Ok(changes)
    }
}

impl Default for ReputationFeedback {
    fn default() -> Self {
        Self::new(FeedbackPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactKind, Difficulty, Domain};
    use crate::reputation::InMemoryLedger;
    use chrono::Utc;

    fn verdict(quality_score: u32) -> Verdict {
        Verdict {
            quality_score,
            difficulty: Difficulty::Medium,
            category: Domain::Security,
            duration_minutes: 60,
            review_count: 2,
        }
    }

    fn deviation(reviewer: &str, deviation: u32) -> ReviewerDeviation {
        ReviewerDeviation {
            reviewer: reviewer.to_string(),
            deviation,
        }
    }

    #[test]
    fn test_author_delta_scales_with_quality() {
        let feedback = ReputationFeedback::default();
        assert_eq!(feedback.author_delta(0), 0);
        assert_eq!(feedback.author_delta(85), 17);
        assert_eq!(feedback.author_delta(100), 20);
        assert_eq!(feedback.author_delta(250), 20);

        let feedback = ReputationFeedback::new(FeedbackPolicy {
            author_min_delta: -10,
            author_max_delta: 10,
            ..FeedbackPolicy::default()
        });
        assert_eq!(feedback.author_delta(0), -10);
        assert_eq!(feedback.author_delta(50), 0);
        assert_eq!(feedback.author_delta(100), 10);
    }

    #[test]
    fn test_policy_bounds() {
        assert!(FeedbackPolicy::default().validate().is_ok());

        let oversized = FeedbackPolicy {
            author_max_delta: i64::MAX,
            ..FeedbackPolicy::default()
        };
        assert!(oversized.validate().unwrap_err().contains("author_max_delta"));

        let penalty = FeedbackPolicy {
            author_min_delta: i64::MIN,
            ..FeedbackPolicy::default()
        };
        assert!(penalty.validate().unwrap_err().contains("author_min_delta"));

        let reward = FeedbackPolicy {
            reviewer_participation_reward: 1_000_001,
            ..FeedbackPolicy::default()
        };
        assert!(reward.validate().is_err());

        let tolerance = FeedbackPolicy {
            deviation_tolerance: 101,
            ..FeedbackPolicy::default()
        };
        assert!(tolerance.validate().unwrap_err().contains("1-100"));
    }

    #[test]
    fn test_reviewer_delta_never_negative() {
        let feedback = ReputationFeedback::default();
        assert_eq!(feedback.reviewer_delta(0), 5);
        assert_eq!(feedback.reviewer_delta(5), 4);
        assert_eq!(feedback.reviewer_delta(24), 0);
        assert_eq!(feedback.reviewer_delta(25), 0);
        assert_eq!(feedback.reviewer_delta(100), 0);

        let mut previous = i64::MAX;
        for d in 0..=100 {
            let delta = feedback.reviewer_delta(d);
            assert!(delta >= 0);
            assert!(delta <= previous);
            previous = delta;
        }
    }

    #[test]
    fn test_plan_covers_author_and_reviewers() {
        let feedback = ReputationFeedback::default();
        let artifact = Artifact::new(
            ArtifactKind::Challenge,
            "author",
            Domain::Security,
            "ipfs://c",
            Utc::now(),
        );
        let batch = feedback.plan(
            &artifact,
            &verdict(80),
            &[deviation("r1", 0), deviation("r2", 30)],
        );

        assert_eq!(batch.key, format!("finalize:{}", artifact.id));
        assert_eq!(batch.deltas.len(), 6);
        assert_eq!(batch.deltas[0].principal, "author");
        assert_eq!(batch.deltas[0].delta, 16);
        assert_eq!(batch.deltas[2].principal, "r1");
        assert_eq!(batch.deltas[2].delta, 5);
        assert_eq!(batch.deltas[4].principal, "r2");
        assert_eq!(batch.deltas[4].delta, 0);
    }

    #[tokio::test]
    async fn test_apply_is_single_shot() {
        let feedback = ReputationFeedback::default();
        let ledger = InMemoryLedger::default();
        let artifact = Artifact::new(
            ArtifactKind::Solution,
            "talent",
            Domain::DataScience,
            "ipfs://s",
            Utc::now(),
        );
        let deviations = [deviation("r1", 0)];

        feedback
            .apply(&ledger, &artifact, &verdict(100), &deviations)
            .await
            .unwrap();
        assert!(feedback
            .apply(&ledger, &artifact, &verdict(100), &deviations)
            .await
            .is_err());

        let scope = ReputationScope::Domain(Domain::DataScience);
        assert_eq!(ledger.get("talent", scope).await.unwrap(), 20);
        assert_eq!(ledger.get("r1", ReputationScope::Global).await.unwrap(), 5);
    }
}
