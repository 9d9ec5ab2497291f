//! Reviewer Eligibility
//!
//! Decides whether a principal may take a slot in an artifact's pool. All
//! checks are reads; nothing here mutates the pool or the ledger. Checks run
//! in a fixed order so a given state always yields the same rejection:
//! finalized artifact, author conflict, existing membership, full pool, then
//! reputation.

use crate::error::{IneligibilityReason, ReviewError};
use crate::model::Artifact;
use crate::reputation::{ReputationLedger, ReputationScope, ReputationThresholds, ReviewerRole};
use crate::review::ReviewPool;

/// Reputation readings relevant to one artifact's domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewerStanding {
    pub global: i64,
    pub domain: i64,
}

impl ReviewerStanding {
    pub fn get(&self, scope: ReputationScope) -> i64 {
        match scope {
            ReputationScope::Global => self.global,
            ReputationScope::Domain(_) => self.domain,
        }
    }
}

pub struct ReviewerEligibility {
    thresholds: ReputationThresholds,
}

impl ReviewerEligibility {
    pub fn new(thresholds: ReputationThresholds) -> Self {
        Self { thresholds }
    }

    pub fn role_for(artifact: &Artifact) -> ReviewerRole {
        ReviewerRole::from(artifact.kind.review_kind())
    }

    /// Decide a join attempt against an already-read standing.
    ///
    /// `pool` is `None` when nobody has joined yet; `capacity` is then the
    /// capacity the pool would open with.
    pub fn check(
        &self,
        principal: &str,
        artifact: &Artifact,
        pool: Option<&ReviewPool>,
        capacity: usize,
        standing: &ReviewerStanding,
    ) -> Result<(), ReviewError> {
        self.check_admission(principal, artifact, pool, capacity)?;
        for (scope, required) in self.requirements(artifact) {
            Self::require(principal, scope, required, standing.get(scope))?;
        }
        Ok(())
    }

    /// Everything decidable from the artifact and its pool alone
    pub fn check_admission(
        &self,
        principal: &str,
        artifact: &Artifact,
        pool: Option<&ReviewPool>,
        capacity: usize,
    ) -> Result<(), ReviewError> {
        if artifact.status.is_terminal() {
            return Err(ReviewError::ArtifactFinalized(artifact.id.clone()));
        }

        if artifact.is_author(principal) {
            return Err(ReviewError::NotEligible {
                principal: principal.to_string(),
                reason: IneligibilityReason::AuthorConflict,
            });
        }

        if let Some(pool) = pool {
            if pool.contains(principal) {
                return Err(ReviewError::AlreadyJoined(principal.to_string()));
            }
        }

        let (size, capacity) = match pool {
            Some(pool) => (pool.size(), pool.capacity()),
            None => (0, capacity),
        };
        if size >= capacity {
            return Err(ReviewError::PoolFull {
                artifact: artifact.id.clone(),
                capacity,
            });
        }

        Ok(())
    }

    fn requirements(&self, artifact: &Artifact) -> Vec<(ReputationScope, i64)> {
        self.thresholds
            .requirements(Self::role_for(artifact), artifact.domain)
    }

    fn require(
        principal: &str,
        scope: ReputationScope,
        required: i64,
        actual: i64,
    ) -> Result<(), ReviewError> {
        if actual < required {
            return Err(ReviewError::NotEligible {
                principal: principal.to_string(),
                reason: IneligibilityReason::InsufficientReputation {
                    scope,
                    required,
                    actual,
                },
            });
        }
        Ok(())
    }

    /// Run the admission checks, then read from the ledger only the scopes
    /// the role requires. A ledger failure never masks a local rejection.
    pub async fn can_join(
        &self,
        ledger: &dyn ReputationLedger,
        principal: &str,
        artifact: &Artifact,
        pool: Option<&ReviewPool>,
        capacity: usize,
    ) -> Result<(), ReviewError> {
        self.check_admission(principal, artifact, pool, capacity)?;
        for (scope, required) in self.requirements(artifact) {
            let actual = ledger.get(principal, scope).await?;
            Self::require(principal, scope, required, actual)?;
        }
        Ok(())
    }
}

impl Default for ReviewerEligibility {
    fn default() -> Self {
        Self::new(ReputationThresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactKind, Domain};
    use crate::reputation::InMemoryLedger;
    use chrono::Utc;

    fn challenge() -> Artifact {
        Artifact::new(
            ArtifactKind::Challenge,
            "author",
            Domain::Security,
            "ipfs://c",
            Utc::now(),
        )
    }

    fn solution() -> Artifact {
        Artifact::new(
            ArtifactKind::Solution,
            "talent",
            Domain::Security,
            "ipfs://s",
            Utc::now(),
        )
    }

    const STRONG: ReviewerStanding = ReviewerStanding {
        global: 100,
        domain: 100,
    };

    #[test]
    fn test_author_cannot_review() {
        let eligibility = ReviewerEligibility::default();
        let err = eligibility
            .check("author", &challenge(), None, 3, &STRONG)
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewError::NotEligible {
                reason: IneligibilityReason::AuthorConflict,
                ..
            }
        ));
    }

    #[test]
    fn test_moderator_needs_domain_reputation() {
        let eligibility = ReviewerEligibility::default();
        let weak = ReviewerStanding {
            global: 1_000,
            domain: 9,
        };
        let err = eligibility
            .check("r1", &challenge(), None, 3, &weak)
            .unwrap_err();
        assert!(matches!(
            err,
            ReviewError::NotEligible {
                reason: IneligibilityReason::InsufficientReputation {
                    scope: ReputationScope::Domain(Domain::Security),
                    required: 10,
                    actual: 9,
                },
                ..
            }
        ));

        let enough = ReviewerStanding {
            global: 0,
            domain: 10,
        };
        assert!(eligibility.check("r1", &challenge(), None, 3, &enough).is_ok());
    }

    #[test]
    fn test_evaluator_needs_global_and_domain() {
        let eligibility = ReviewerEligibility::default();
        let no_global = ReviewerStanding {
            global: 49,
            domain: 500,
        };
        assert!(eligibility.check("r1", &solution(), None, 3, &no_global).is_err());

        let no_domain = ReviewerStanding {
            global: 500,
            domain: 19,
        };
        assert!(eligibility.check("r1", &solution(), None, 3, &no_domain).is_err());

        assert!(eligibility.check("r1", &solution(), None, 3, &STRONG).is_ok());
    }

    #[test]
    fn test_pool_checks_precede_reputation() {
        let eligibility = ReviewerEligibility::default();
        let artifact = challenge();
        let mut pool = ReviewPool::new(artifact.id.clone(), 1);
        pool.add("r1", Utc::now()).unwrap();

        let weak = ReviewerStanding {
            global: 0,
            domain: 0,
        };
        assert_eq!(
            eligibility
                .check("r1", &artifact, Some(&pool), 1, &weak)
                .unwrap_err(),
            ReviewError::AlreadyJoined("r1".to_string())
        );
        assert!(matches!(
            eligibility.check("r2", &artifact, Some(&pool), 1, &weak),
            Err(ReviewError::PoolFull { capacity: 1, .. })
        ));
    }

    #[test]
    fn test_finalized_artifact_rejects_everyone() {
        let eligibility = ReviewerEligibility::default();
        let mut artifact = challenge();
        artifact.finalize(true, Utc::now());
        assert!(matches!(
            eligibility.check("author", &artifact, None, 3, &STRONG),
            Err(ReviewError::ArtifactFinalized(_))
        ));
    }

    #[tokio::test]
    async fn test_can_join_reads_ledger() {
        let eligibility = ReviewerEligibility::default();
        let ledger = InMemoryLedger::default();
        let artifact = challenge();

        assert!(eligibility
            .can_join(&ledger, "r1", &artifact, None, 3)
            .await
            .is_err());

        ledger
            .grant("r1", ReputationScope::Domain(Domain::Security), 10)
            .await
            .unwrap();
        assert!(eligibility
            .can_join(&ledger, "r1", &artifact, None, 3)
            .await
            .is_ok());
    }
}
