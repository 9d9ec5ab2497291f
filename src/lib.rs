//! Peer Quorum Review Engine
//!
//! Quorum-gated peer review: reputation-eligible reviewers join a bounded
//! pool per artifact, submit bounded-factor reviews, and the submission that
//! completes the quorum folds them into one verdict, finalizes the artifact
//! and feeds reputation back into the ledger.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── lib.rs         - Crate root with re-exports
//! ├── main.rs        - Scenario replay binary
//! ├── config.rs      - Configuration management
//! ├── error.rs       - Engine error kinds
//! ├── clock.rs       - Injectable time source
//! ├── audit.rs       - Bounded audit trail
//! ├── model/         - Artifacts, review schemas, verdicts
//! ├── review/        - Review pipeline
//! │   ├── pool.rs         - Bounded reviewer membership
//! │   ├── eligibility.rs  - Who may join
//! │   ├── aggregator.rs   - Reviews to verdict
//! │   ├── deviation.rs    - Reviewer distance from consensus
//! │   └── orchestrator.rs - ReviewEngine, per-artifact serialization
//! └── reputation/    - Reputation system
//!     ├── score.rs    - Scopes, bounds, thresholds
//!     ├── ledger.rs   - Ledger trait and in-memory ledger
//!     └── feedback.rs - Verdict to reputation deltas
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod reputation;
pub mod review;

// Re-export main types for convenience
pub use audit::{AuditEntry, AuditEvent, AuditLog, AuditSeverity};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{IneligibilityReason, ReviewError};
pub use model::{
    Artifact, ArtifactId, ArtifactKind, ArtifactStatus, Difficulty, Domain, Factor, FactorScale,
    FactorSpec, Review, ReviewKind, ReviewSchema, Verdict,
};
pub use reputation::{
    FeedbackPolicy, InMemoryLedger, LedgerBatch, LedgerChange, LedgerError, ReputationFeedback,
    ReputationLedger, ReputationScope, ReputationThresholds,
};
pub use review::{
    ConsensusAggregator, DeviationScorer, Membership, PoolStatus, ReviewEngine,
    ReviewerEligibility,
};
