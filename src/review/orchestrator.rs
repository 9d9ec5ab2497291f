//! Finalization Orchestrator - the review engine's public surface
//!
//! Owns every artifact's status and pool. Each operation locks exactly one
//! artifact for its whole duration, so the check-then-act sequences in join
//! and submit are safe under concurrent callers, and the quorum-completing
//! submission runs aggregation and reputation feedback exactly once.
//!
//! A quorum-completing submission is all-or-nothing: the verdict is computed
//! and the feedback batch applied before the review is recorded. If the
//! ledger refuses the batch, nothing about the artifact changes.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEvent, AuditLog, AuditSeverity};
use crate::clock::{Clock, SystemClock};
use crate::config::{short_principal, EngineConfig, SchemaConfig};
use crate::error::ReviewError;
use crate::model::{
    Artifact, ArtifactId, ArtifactKind, ArtifactStatus, Domain, Review, ReviewSchema, Verdict,
};
use crate::reputation::{ReputationFeedback, ReputationLedger};
use crate::review::{
    ConsensusAggregator, DeviationScorer, Membership, PoolStatus, ReviewPool,
    ReviewerDeviation, ReviewerEligibility,
};

/// Everything the engine keeps for one artifact, guarded as a unit
struct ArtifactRecord {
    artifact: Artifact,
    /// Opened lazily by the first successful join
    pool: Option<ReviewPool>,
    verdict: Option<Verdict>,
}

/// Result of a quorum-completing submission
struct Finalization {
    verdict: Verdict,
    approved: bool,
    deviations: Vec<ReviewerDeviation>,
    changes: usize,
    identical_groups: Vec<Vec<String>>,
}

pub struct ReviewEngine {
    capacity: usize,
    approval_threshold: u32,
    log_principals: bool,
    schemas: SchemaConfig,
    eligibility: ReviewerEligibility,
    feedback: ReputationFeedback,
    ledger: Arc<dyn ReputationLedger>,
    clock: Arc<dyn Clock>,
    audit: AuditLog,
    artifacts: DashMap<ArtifactId, Arc<Mutex<ArtifactRecord>>>,
}

impl ReviewEngine {
    /// Build an engine from `config`, refusing one that fails validation
    pub fn new(config: &EngineConfig, ledger: Arc<dyn ReputationLedger>) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            capacity: config.pool.capacity,
            approval_threshold: config.thresholds.approval_threshold,
            log_principals: config.logging.log_principals,
            schemas: config.schemas.clone(),
            eligibility: ReviewerEligibility::new(config.thresholds.to_thresholds()),
            feedback: ReputationFeedback::new(config.feedback.clone()),
            ledger,
            clock: Arc::new(SystemClock::new()),
            audit: AuditLog::new(config.audit.max_entries),
            artifacts: DashMap::new(),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Register a new artifact in `Pending` state
    pub async fn register_artifact(
        &self,
        author: &str,
        kind: ArtifactKind,
        domain: Domain,
        content_ref: &str,
    ) -> Result<ArtifactId, ReviewError> {
        let artifact = Artifact::new(kind, author, domain, content_ref, self.clock.now());
        let id = artifact.id.clone();

        let inserted = match self.artifacts.entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(ArtifactRecord {
                    artifact,
                    pool: None,
                    verdict: None,
                })));
                true
            }
        };

        if !inserted {
            let err = ReviewError::DuplicateArtifact(id.clone());
            self.record_rejection("register", &id, author, &err).await;
            return Err(err);
        }

        info!(
            artifact = %id.short(),
            kind = kind.as_str(),
            domain = %domain,
            "Registered artifact"
        );
        self.audit
            .log(
                AuditEvent::ArtifactRegistered {
                    artifact: id.clone(),
                    author: author.to_string(),
                },
                AuditSeverity::Info,
                self.clock.now(),
            )
            .await;

        Ok(id)
    }

    /// Take a reviewer slot. Returns the slot index.
    pub async fn join_pool(
        &self,
        principal: &str,
        artifact_id: &ArtifactId,
    ) -> Result<usize, ReviewError> {
        let result = self.try_join(principal, artifact_id).await;
        if let Err(ref e) = result {
            self.record_rejection("join", artifact_id, principal, e).await;
        }
        result
    }

    /// Submit the review for the caller's slot. The submission that fills the
    /// last slot finalizes the artifact before returning.
    pub async fn submit_review(
        &self,
        principal: &str,
        artifact_id: &ArtifactId,
        review: Review,
    ) -> Result<(), ReviewError> {
        let result = self.try_submit(principal, artifact_id, review).await;
        if let Err(ref e) = result {
            self.record_rejection("submit", artifact_id, principal, e).await;
        }
        result
    }

    pub async fn get_pool_status(&self, artifact_id: &ArtifactId) -> Result<PoolStatus, ReviewError> {
        let handle = self.handle(artifact_id)?;
        let record = handle.lock().await;
        Ok(match &record.pool {
            Some(pool) => pool.status(),
            None => PoolStatus {
                size: 0,
                capacity: self.capacity,
                submitted: 0,
                quorum_reached: false,
            },
        })
    }

    pub async fn get_verdict(&self, artifact_id: &ArtifactId) -> Option<Verdict> {
        let handle = self.handle(artifact_id).ok()?;
        let record = handle.lock().await;
        record.verdict.clone()
    }

    pub async fn get_artifact_status(
        &self,
        artifact_id: &ArtifactId,
    ) -> Result<ArtifactStatus, ReviewError> {
        let handle = self.handle(artifact_id)?;
        let record = handle.lock().await;
        Ok(record.artifact.status)
    }

    pub async fn get_artifact(&self, artifact_id: &ArtifactId) -> Option<Artifact> {
        let handle = self.handle(artifact_id).ok()?;
        let record = handle.lock().await;
        Some(record.artifact.clone())
    }

    /// Memberships in join order, including unsubmitted slots
    pub async fn get_pool_members(
        &self,
        artifact_id: &ArtifactId,
    ) -> Result<Vec<Membership>, ReviewError> {
        let handle = self.handle(artifact_id)?;
        let record = handle.lock().await;
        Ok(record
            .pool
            .as_ref()
            .map(|p| p.members().to_vec())
            .unwrap_or_default())
    }

    /// Every registered artifact, ordered by id
    pub async fn list_artifacts(&self) -> Vec<Artifact> {
        let handles: Vec<Arc<Mutex<ArtifactRecord>>> = self
            .artifacts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut artifacts = Vec::with_capacity(handles.len());
        for handle in handles {
            artifacts.push(handle.lock().await.artifact.clone());
        }
        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        artifacts
    }

    fn handle(&self, artifact_id: &ArtifactId) -> Result<Arc<Mutex<ArtifactRecord>>, ReviewError> {
        self.artifacts
            .get(artifact_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ReviewError::UnknownArtifact(artifact_id.clone()))
    }

    fn principal_label(&self, principal: &str) -> String {
        if self.log_principals {
            principal.to_string()
        } else {
            short_principal(principal)
        }
    }

    async fn try_join(&self, principal: &str, artifact_id: &ArtifactId) -> Result<usize, ReviewError> {
        let handle = self.handle(artifact_id)?;
        let mut guard = handle.lock().await;
        let record = &mut *guard;

        self.eligibility
            .can_join(
                self.ledger.as_ref(),
                principal,
                &record.artifact,
                record.pool.as_ref(),
                self.capacity,
            )
            .await?;

        let now = self.clock.now();
        let capacity = self.capacity;
        let pool = record
            .pool
            .get_or_insert_with(|| ReviewPool::new(artifact_id.clone(), capacity));
        let slot = pool.add(principal, now)?;
        record.artifact.begin_review();

        debug!(
            artifact = %artifact_id.short(),
            reviewer = %self.principal_label(principal),
            slot = slot,
            "Accepted join"
        );
        self.audit
            .log(
                AuditEvent::ReviewerJoined {
                    artifact: artifact_id.clone(),
                    reviewer: principal.to_string(),
                    slot,
                },
                AuditSeverity::Info,
                now,
            )
            .await;

        Ok(slot)
    }

    async fn try_submit(
        &self,
        principal: &str,
        artifact_id: &ArtifactId,
        review: Review,
    ) -> Result<(), ReviewError> {
        let handle = self.handle(artifact_id)?;
        let mut guard = handle.lock().await;
        let record = &mut *guard;

        if record.artifact.status.is_terminal() {
            return Err(ReviewError::ArtifactFinalized(artifact_id.clone()));
        }

        let pool = record
            .pool
            .as_mut()
            .ok_or_else(|| ReviewError::NoMembership(principal.to_string()))?;
        let slot = pool.pending_slot(principal)?;

        let schema = self.schemas.for_kind(record.artifact.kind.review_kind());
        schema.check(&review)?;

        let now = self.clock.now();
        let completes_quorum = pool.submitted_count() + 1 == pool.capacity();

        if !completes_quorum {
            let submitted = pool.record(slot, review, now)?;
            debug!(
                artifact = %artifact_id.short(),
                reviewer = %self.principal_label(principal),
                submitted = submitted,
                capacity = pool.capacity(),
                "Accepted review"
            );
            self.audit
                .log(
                    AuditEvent::ReviewSubmitted {
                        artifact: artifact_id.clone(),
                        reviewer: principal.to_string(),
                        submitted,
                        capacity: pool.capacity(),
                    },
                    AuditSeverity::Info,
                    now,
                )
                .await;
            return Ok(());
        }

        let finalization = {
            let mut reviews = pool.submitted_reviews();
            reviews.push((principal, &review));
            self.finalize(&record.artifact, schema, &reviews).await?
        };

        let submitted = pool.record(slot, review, now)?;
        let capacity = pool.capacity();
        record.artifact.finalize(finalization.approved, now);
        record.verdict = Some(finalization.verdict.clone());

        info!(
            artifact = %artifact_id.short(),
            status = ?record.artifact.status,
            quality = finalization.verdict.quality_score,
            threshold = self.approval_threshold,
            reviewers = finalization.deviations.len(),
            "Artifact finalized"
        );

        self.audit
            .log(
                AuditEvent::ReviewSubmitted {
                    artifact: artifact_id.clone(),
                    reviewer: principal.to_string(),
                    submitted,
                    capacity,
                },
                AuditSeverity::Info,
                now,
            )
            .await;
        self.audit
            .log(
                AuditEvent::ArtifactFinalized {
                    artifact: artifact_id.clone(),
                    status: record.artifact.status,
                    quality_score: finalization.verdict.quality_score,
                },
                AuditSeverity::Info,
                now,
            )
            .await;
        self.audit
            .log(
                AuditEvent::ReputationApplied {
                    artifact: artifact_id.clone(),
                    changes: finalization.changes,
                },
                AuditSeverity::Info,
                now,
            )
            .await;
        for reviewers in finalization.identical_groups {
            warn!(
                artifact = %artifact_id.short(),
                reviewers = reviewers.len(),
                "Identical reviews flagged for review"
            );
            self.audit
                .log(
                    AuditEvent::PossibleCollusion {
                        artifact: artifact_id.clone(),
                        reviewers,
                    },
                    AuditSeverity::Warning,
                    now,
                )
                .await;
        }

        Ok(())
    }

    /// Aggregate, score deviations and apply feedback. Writes nothing to the
    /// artifact; the caller commits only if this succeeds.
    async fn finalize(
        &self,
        artifact: &Artifact,
        schema: &ReviewSchema,
        reviews: &[(&str, &Review)],
    ) -> Result<Finalization, ReviewError> {
        let review_refs: Vec<&Review> = reviews.iter().map(|(_, r)| *r).collect();
        let verdict = ConsensusAggregator::aggregate(schema, &review_refs)?;
        let deviations = DeviationScorer::score_all(schema, reviews, &verdict);

        let changes = self
            .feedback
            .apply(self.ledger.as_ref(), artifact, &verdict, &deviations)
            .await?;

        Ok(Finalization {
            approved: verdict.is_approved(self.approval_threshold),
            verdict,
            deviations,
            changes: changes.len(),
            identical_groups: identical_groups(reviews),
        })
    }

    async fn record_rejection(
        &self,
        operation: &str,
        artifact_id: &ArtifactId,
        principal: &str,
        err: &ReviewError,
    ) {
        let severity = match err {
            ReviewError::Internal(_) | ReviewError::Ledger(_) => {
                error!(
                    artifact = %artifact_id.short(),
                    principal = %self.principal_label(principal),
                    operation = operation,
                    error = %err,
                    "Operation failed"
                );
                AuditSeverity::Error
            }
            _ => {
                warn!(
                    artifact = %artifact_id.short(),
                    principal = %self.principal_label(principal),
                    operation = operation,
                    code = err.code(),
                    "Operation rejected"
                );
                AuditSeverity::Warning
            }
        };

        self.audit
            .log(
                AuditEvent::OperationRejected {
                    artifact: artifact_id.clone(),
                    principal: principal.to_string(),
                    operation: operation.to_string(),
                    code: err.code().to_string(),
                },
                severity,
                self.clock.now(),
            )
            .await;
    }
}

/// Groups of two or more reviewers whose reviews are identical, in slot order
fn identical_groups(reviews: &[(&str, &Review)]) -> Vec<Vec<String>> {
    let mut groups: Vec<(&Review, Vec<String>)> = Vec::new();
    for (reviewer, review) in reviews {
        match groups.iter_mut().find(|(r, _)| *r == *review) {
            Some((_, members)) => members.push(reviewer.to_string()),
            None => groups.push((review, vec![reviewer.to_string()])),
        }
    }
    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(_, members)| members)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Factor, FactorScale, ReviewKind};
    use crate::reputation::{InMemoryLedger, ReputationScope};

    fn config(capacity: usize) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.pool.capacity = capacity;
        config
    }

    fn review(relevance: u8) -> Review {
        Review::new(ReviewKind::Moderation, Difficulty::Medium, Domain::Security, 60)
            .with_score(Factor::Relevance, relevance)
            .with_score(Factor::Correctness, 1)
            .with_score(Factor::Clarity, 5)
            .with_score(Factor::Originality, 5)
    }

    async fn engine_with_reviewers(capacity: usize, reviewers: &[&str]) -> ReviewEngine {
        let ledger = Arc::new(InMemoryLedger::default());
        for reviewer in reviewers {
            ledger
                .grant(reviewer, ReputationScope::Domain(Domain::Security), 100)
                .await
                .unwrap();
        }
        ReviewEngine::new(&config(capacity), ledger).unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let engine = engine_with_reviewers(2, &[]).await;
        let id = engine
            .register_artifact("author", ArtifactKind::Challenge, Domain::Security, "ipfs://c")
            .await
            .unwrap();
        assert_eq!(
            engine
                .register_artifact("author", ArtifactKind::Challenge, Domain::Security, "ipfs://c")
                .await
                .unwrap_err(),
            ReviewError::DuplicateArtifact(id)
        );
    }

    #[tokio::test]
    async fn test_unknown_artifact() {
        let engine = engine_with_reviewers(2, &["r1"]).await;
        let id = ArtifactId::new("missing");
        assert_eq!(
            engine.join_pool("r1", &id).await.unwrap_err(),
            ReviewError::UnknownArtifact(id.clone())
        );
        assert!(engine.get_verdict(&id).await.is_none());
        assert!(engine.get_artifact_status(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_submit_without_pool_is_no_membership() {
        let engine = engine_with_reviewers(2, &["r1"]).await;
        let id = engine
            .register_artifact("author", ArtifactKind::Challenge, Domain::Security, "ipfs://c")
            .await
            .unwrap();
        assert_eq!(
            engine.submit_review("r1", &id, review(5)).await.unwrap_err(),
            ReviewError::NoMembership("r1".to_string())
        );
        assert_eq!(
            engine.get_pool_status(&id).await.unwrap(),
            PoolStatus {
                size: 0,
                capacity: 2,
                submitted: 0,
                quorum_reached: false
            }
        );
    }

    #[tokio::test]
    async fn test_out_of_range_review_is_not_stored() {
        let engine = engine_with_reviewers(2, &["r1", "r2"]).await;
        let id = engine
            .register_artifact("author", ArtifactKind::Challenge, Domain::Security, "ipfs://c")
            .await
            .unwrap();
        engine.join_pool("r1", &id).await.unwrap();

        let err = engine.submit_review("r1", &id, review(11)).await.unwrap_err();
        assert!(matches!(err, ReviewError::OutOfRange { .. }));
        assert_eq!(engine.get_pool_status(&id).await.unwrap().submitted, 0);

        // The slot is still open for a well-formed review
        engine.submit_review("r1", &id, review(10)).await.unwrap();
        assert_eq!(engine.get_pool_status(&id).await.unwrap().submitted, 1);
    }

    #[tokio::test]
    async fn test_rejections_are_audited() {
        let engine = engine_with_reviewers(1, &[]).await;
        let id = engine
            .register_artifact("author", ArtifactKind::Challenge, Domain::Security, "ipfs://c")
            .await
            .unwrap();
        assert!(engine.join_pool("author", &id).await.is_err());

        let entries = engine.audit().get_by_severity(AuditSeverity::Warning).await;
        assert_eq!(entries.len(), 1);
        assert!(matches!(
            &entries[0].event,
            AuditEvent::OperationRejected { code, .. } if code == "not_eligible"
        ));
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut invalid = config(3);
        invalid.schemas.moderation.factors[0].scale = FactorScale::Bounded { max: 0 };
        let ledger = Arc::new(InMemoryLedger::default());
        let err = ReviewEngine::new(&invalid, ledger.clone()).err().unwrap();
        assert!(err.to_string().contains("empty scale"));

        assert!(ReviewEngine::new(&config(0), ledger).is_err());
    }

    #[test]
    fn test_identical_groups() {
        let a = review(5);
        let b = review(6);
        let groups = identical_groups(&[("r1", &a), ("r2", &b), ("r3", &a)]);
        assert_eq!(groups, vec![vec!["r1".to_string(), "r3".to_string()]]);
        assert!(identical_groups(&[("r1", &a), ("r2", &b)]).is_empty());
    }
}
