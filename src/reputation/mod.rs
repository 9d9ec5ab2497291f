//! Reputation Ledger and Feedback
//!
//! Long-lived reputation that gates who may review, and that review outcomes
//! feed back into.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌────────────────────┐     ┌──────────────────┐
//! │ Verdict +       │────►│ ReputationFeedback │────►│ ReputationLedger │
//! │ deviations      │     │ (plans one batch)  │     │ (bounded, append │
//! └─────────────────┘     └────────────────────┘     │  only history)   │
//!                                                    └──────────────────┘
//!                                                             ▲
//!                                    ReviewerEligibility ─────┘ (reads)
//! ```
//!
//! ## Score Model
//!
//! - One global scalar plus one score per domain, starting at `initial_score`
//! - Every delta is clamped to the scope's `[min, max]`
//! - Feedback batches are keyed by artifact and applied at most once
//! - Reviewers are never pushed below zero gain for disagreeing

mod feedback;
mod ledger;
mod score;

pub use feedback::{FeedbackPolicy, ReputationFeedback};
pub use ledger::{
    ChangeCause, InMemoryLedger, LedgerBatch, LedgerChange, LedgerDelta, LedgerError,
    ReputationLedger,
};
pub use score::{
    LedgerBounds, ReputationBounds, ReputationScope, ReputationScore, ReputationThresholds,
    ReviewerRole,
};
