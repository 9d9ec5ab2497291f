//! Reputation Ledger
//!
//! The engine reads and writes reputation only through the `ReputationLedger`
//! trait, injected as a handle so tests can substitute a fake. `InMemoryLedger`
//! is the reference implementation: bounded accumulation, an append-only change
//! history, and replay protection keyed by finalization.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::model::ArtifactId;
use crate::reputation::{LedgerBounds, ReputationScope, ReputationScore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A batch with this finalization key was already applied
    #[error("batch `{0}` was already applied")]
    DuplicateBatch(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Why a reputation delta was applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeCause {
    /// Author feedback for a finalized artifact
    Authored {
        artifact: ArtifactId,
        quality_score: u32,
    },
    /// Reviewer feedback for a finalized artifact
    Reviewed { artifact: ArtifactId, deviation: u32 },
    /// Administrative grant or seed
    Adjustment { note: String },
}

/// One requested delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    pub principal: String,
    pub scope: ReputationScope,
    pub delta: i64,
    pub cause: ChangeCause,
}

/// Deltas that must land together, identified by a finalization key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBatch {
    pub key: String,
    pub deltas: Vec<LedgerDelta>,
}

/// Audit record of an applied delta
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerChange {
    pub principal: String,
    pub scope: ReputationScope,
    pub requested_delta: i64,
    /// Delta after clamping to the scope bounds
    pub applied_delta: i64,
    pub resulting_score: i64,
    pub cause: ChangeCause,
    /// Finalization key of the batch, if any
    pub batch: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReputationLedger: Send + Sync {
    /// Current score of `principal` in `scope`
    async fn get(&self, principal: &str, scope: ReputationScope) -> Result<i64, LedgerError>;

    /// Apply a single delta outside of any finalization
    async fn apply(
        &self,
        principal: &str,
        scope: ReputationScope,
        delta: i64,
        cause: ChangeCause,
    ) -> Result<LedgerChange, LedgerError>;

    /// Apply every delta of `batch` or none of them. A key can be applied once.
    async fn apply_batch(&self, batch: LedgerBatch) -> Result<Vec<LedgerChange>, LedgerError>;

    /// Change history of one principal, oldest first
    async fn history(&self, principal: &str) -> Result<Vec<LedgerChange>, LedgerError>;
}

#[derive(Default)]
struct LedgerState {
    scores: HashMap<String, ReputationScore>,
    history: Vec<LedgerChange>,
    applied_batches: HashSet<String>,
}

impl LedgerState {
    fn accumulate(
        &mut self,
        bounds: &LedgerBounds,
        delta: &LedgerDelta,
        batch: Option<&str>,
        at: DateTime<Utc>,
    ) -> LedgerChange {
        let score = self
            .scores
            .entry(delta.principal.clone())
            .or_insert_with(|| ReputationScore::new(delta.principal.clone(), bounds.initial_score, at));

        let current = score.get(delta.scope, bounds.initial_score);
        let resulting = bounds
            .for_scope(delta.scope)
            .clamp(current.saturating_add(delta.delta));
        score.set(delta.scope, resulting, at);

        let change = LedgerChange {
            principal: delta.principal.clone(),
            scope: delta.scope,
            requested_delta: delta.delta,
            applied_delta: resulting - current,
            resulting_score: resulting,
            cause: delta.cause.clone(),
            batch: batch.map(str::to_string),
            recorded_at: at,
        };
        self.history.push(change.clone());
        change
    }
}

/// Process-local ledger
pub struct InMemoryLedger {
    bounds: LedgerBounds,
    clock: Arc<dyn Clock>,
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new(bounds: LedgerBounds) -> Self {
        Self {
            bounds,
            clock: Arc::new(SystemClock::new()),
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn bounds(&self) -> &LedgerBounds {
        &self.bounds
    }

    /// Full score record, if the principal has ever been touched
    pub async fn snapshot(&self, principal: &str) -> Option<ReputationScore> {
        self.state.read().await.scores.get(principal).cloned()
    }

    /// Seed a principal's reputation (administrative adjustment)
    pub async fn grant(
        &self,
        principal: &str,
        scope: ReputationScope,
        amount: i64,
    ) -> Result<LedgerChange, LedgerError> {
        self.apply(
            principal,
            scope,
            amount,
            ChangeCause::Adjustment {
                note: "grant".to_string(),
            },
        )
        .await
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerBounds::default())
    }
}

#[async_trait]
impl ReputationLedger for InMemoryLedger {
    async fn get(&self, principal: &str, scope: ReputationScope) -> Result<i64, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .scores
            .get(principal)
            .map(|s| s.get(scope, self.bounds.initial_score))
            .unwrap_or(self.bounds.initial_score))
    }

    async fn apply(
        &self,
        principal: &str,
        scope: ReputationScope,
        delta: i64,
        cause: ChangeCause,
    ) -> Result<LedgerChange, LedgerError> {
        let at = self.clock.now();
        let mut state = self.state.write().await;
        let change = state.accumulate(
            &self.bounds,
            &LedgerDelta {
                principal: principal.to_string(),
                scope,
                delta,
                cause,
            },
            None,
            at,
        );

        debug!(
            principal = %principal,
            scope = %scope,
            applied = change.applied_delta,
            score = change.resulting_score,
            "Applied reputation adjustment"
        );

        Ok(change)
    }

    async fn apply_batch(&self, batch: LedgerBatch) -> Result<Vec<LedgerChange>, LedgerError> {
        let at = self.clock.now();
        let mut state = self.state.write().await;

        if !state.applied_batches.insert(batch.key.clone()) {
            warn!(batch = %batch.key, "Rejected replayed reputation batch");
            return Err(LedgerError::DuplicateBatch(batch.key));
        }

        let changes: Vec<LedgerChange> = batch
            .deltas
            .iter()
            .map(|delta| state.accumulate(&self.bounds, delta, Some(&batch.key), at))
            .collect();

        info!(
            batch = %batch.key,
            deltas = changes.len(),
            "Applied reputation batch"
        );

        Ok(changes)
    }

    async fn history(&self, principal: &str) -> Result<Vec<LedgerChange>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .history
            .iter()
            .filter(|c| c.principal == principal)
            .cloned()
            .collect())
    }
}
