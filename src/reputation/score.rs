//! Reputation Scores, Bounds and Role Thresholds
//!
//! Each principal has one global scalar plus one score per domain. Scores only
//! move through the ledger's bounded-accumulator rule: every delta is clamped
//! so the result stays inside the configured `[min, max]` for its scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::{Domain, ReviewKind};

/// Which reputation scalar a read or delta targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationScope {
    Global,
    Domain(Domain),
}

impl fmt::Display for ReputationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReputationScope::Global => f.write_str("global"),
            ReputationScope::Domain(domain) => f.write_str(domain.as_str()),
        }
    }
}

/// Inclusive accumulator bounds for one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationBounds {
    pub min: i64,
    pub max: i64,
}

impl ReputationBounds {
    pub fn clamp(&self, value: i64) -> i64 {
        value.clamp(self.min, self.max)
    }
}

/// Bounds for every scope plus the score a new principal starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerBounds {
    pub global: ReputationBounds,
    pub domain: ReputationBounds,
    pub initial_score: i64,
}

impl LedgerBounds {
    pub fn for_scope(&self, scope: ReputationScope) -> ReputationBounds {
        match scope {
            ReputationScope::Global => self.global,
            ReputationScope::Domain(_) => self.domain,
        }
    }
}

impl Default for LedgerBounds {
    fn default() -> Self {
        Self {
            global: ReputationBounds { min: 0, max: 10_000 },
            domain: ReputationBounds { min: 0, max: 1_000 },
            initial_score: 0,
        }
    }
}

/// Reputation held by one principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationScore {
    pub principal: String,
    pub global: i64,
    pub domains: BTreeMap<Domain, i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReputationScore {
    pub fn new(principal: String, initial_score: i64, at: DateTime<Utc>) -> Self {
        Self {
            principal,
            global: initial_score,
            domains: BTreeMap::new(),
            created_at: at,
            updated_at: at,
        }
    }

    /// Score in a scope; untouched domains read as `initial_score`
    pub fn get(&self, scope: ReputationScope, initial_score: i64) -> i64 {
        match scope {
            ReputationScope::Global => self.global,
            ReputationScope::Domain(domain) => {
                self.domains.get(&domain).copied().unwrap_or(initial_score)
            }
        }
    }

    pub(crate) fn set(&mut self, scope: ReputationScope, value: i64, at: DateTime<Utc>) {
        match scope {
            ReputationScope::Global => self.global = value,
            ReputationScope::Domain(domain) => {
                self.domains.insert(domain, value);
            }
        }
        self.updated_at = at;
    }
}

/// Reviewer role, derived from the review schema an artifact uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerRole {
    /// Grades challenges
    Moderator,
    /// Grades solutions
    Evaluator,
}

impl From<ReviewKind> for ReviewerRole {
    fn from(kind: ReviewKind) -> Self {
        match kind {
            ReviewKind::Moderation => ReviewerRole::Moderator,
            ReviewKind::Evaluation => ReviewerRole::Evaluator,
        }
    }
}

/// Published reputation thresholds for each reviewer role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationThresholds {
    /// Domain score a moderator needs
    pub moderator_min_domain: i64,
    /// Global score an evaluator needs
    pub evaluator_min_global: i64,
    /// Domain score an evaluator needs, on top of the global requirement
    pub evaluator_min_domain: i64,
}

impl Default for ReputationThresholds {
    fn default() -> Self {
        Self {
            moderator_min_domain: 10,
            evaluator_min_global: 50,
            evaluator_min_domain: 20,
        }
    }
}

impl ReputationThresholds {
    /// Every (scope, minimum) pair a role must satisfy in `domain`
    pub fn requirements(&self, role: ReviewerRole, domain: Domain) -> Vec<(ReputationScope, i64)> {
        match role {
            ReviewerRole::Moderator => {
                vec![(ReputationScope::Domain(domain), self.moderator_min_domain)]
            }
            ReviewerRole::Evaluator => vec![
                (ReputationScope::Global, self.evaluator_min_global),
                (ReputationScope::Domain(domain), self.evaluator_min_domain),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untouched_domain_reads_initial() {
        let score = ReputationScore::new("user_1".to_string(), 5, Utc::now());
        assert_eq!(score.get(ReputationScope::Global, 5), 5);
        assert_eq!(score.get(ReputationScope::Domain(Domain::Design), 5), 5);
    }

    #[test]
    fn test_bounds_clamp() {
        let bounds = LedgerBounds::default();
        assert_eq!(bounds.for_scope(ReputationScope::Global).clamp(20_000), 10_000);
        assert_eq!(
            bounds
                .for_scope(ReputationScope::Domain(Domain::Writing))
                .clamp(-3),
            0
        );
    }

    #[test]
    fn test_role_requirements() {
        let thresholds = ReputationThresholds::default();
        let moderator = thresholds.requirements(ReviewerRole::Moderator, Domain::Security);
        assert_eq!(moderator, vec![(ReputationScope::Domain(Domain::Security), 10)]);

        let evaluator = thresholds.requirements(ReviewerRole::Evaluator, Domain::Security);
        assert_eq!(evaluator.len(), 2);
        assert_eq!(evaluator[0], (ReputationScope::Global, 50));
    }
}
