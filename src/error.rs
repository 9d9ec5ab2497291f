//! Error taxonomy for review-engine operations
//!
//! Every rejection is returned to the caller as a typed `ReviewError`; the
//! engine never retries and never swallows one. Identical calls against
//! unchanged state fail identically.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ArtifactId;
use crate::reputation::{LedgerError, ReputationScope};

/// Why a principal may not join a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibilityReason {
    /// Principal authored the artifact under review
    AuthorConflict,
    /// Reputation in the given scope is below the role threshold
    InsufficientReputation {
        scope: ReputationScope,
        required: i64,
        actual: i64,
    },
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibilityReason::AuthorConflict => {
                write!(f, "authors cannot review their own artifact")
            }
            IneligibilityReason::InsufficientReputation {
                scope,
                required,
                actual,
            } => write!(
                f,
                "{} reputation {} is below the required {}",
                scope, actual, required
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("principal `{principal}` is not eligible: {reason}")]
    NotEligible {
        principal: String,
        reason: IneligibilityReason,
    },

    #[error("principal `{0}` has already joined this pool")]
    AlreadyJoined(String),

    #[error("review pool for artifact `{artifact}` is full ({capacity} reviewers)")]
    PoolFull { artifact: ArtifactId, capacity: usize },

    #[error("principal `{0}` holds no membership in this pool")]
    NoMembership(String),

    #[error("principal `{0}` has already submitted a review")]
    AlreadySubmitted(String),

    #[error("review field `{field}` is out of range: {detail}")]
    OutOfRange { field: String, detail: String },

    #[error("artifact `{0}` is finalized")]
    ArtifactFinalized(ArtifactId),

    #[error("unknown artifact `{0}`")]
    UnknownArtifact(ArtifactId),

    #[error("artifact `{0}` is already registered")]
    DuplicateArtifact(ArtifactId),

    #[error("reputation ledger failure: {0}")]
    Ledger(#[from] LedgerError),

    /// Broken upstream invariant. Never caused by well-formed caller input.
    #[error("internal consistency violation: {0}")]
    Internal(String),
}

impl ReviewError {
    pub(crate) fn out_of_range(field: impl Into<String>, detail: impl Into<String>) -> Self {
        ReviewError::OutOfRange {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Stable machine-readable code for audit records and tooling output
    pub fn code(&self) -> &'static str {
        match self {
            ReviewError::NotEligible { .. } => "not_eligible",
            ReviewError::AlreadyJoined(_) => "already_joined",
            ReviewError::PoolFull { .. } => "pool_full",
            ReviewError::NoMembership(_) => "no_membership",
            ReviewError::AlreadySubmitted(_) => "already_submitted",
            ReviewError::OutOfRange { .. } => "out_of_range",
            ReviewError::ArtifactFinalized(_) => "artifact_finalized",
            ReviewError::UnknownArtifact(_) => "unknown_artifact",
            ReviewError::DuplicateArtifact(_) => "duplicate_artifact",
            ReviewError::Ledger(_) => "ledger",
            ReviewError::Internal(_) => "internal",
        }
    }
}
