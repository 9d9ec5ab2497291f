//! Review Pools and Consensus
//!
//! ## Lifecycle
//!
//! ```text
//!  register ──► Pending ──join──► UnderReview ──last submit──► Approved
//!                                                          └──► Rejected
//! ```
//!
//! ## Flow of a quorum-completing submission
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────┐   ┌────────────────┐
//! │ ReviewPool   │──►│ ConsensusAggregator │──►│ DeviationScorer│
//! │ (all slots)  │   │ (verdict)           │   │ (per reviewer) │
//! └──────────────┘   └─────────────────────┘   └───────┬────────┘
//!                                                      ▼
//!                    ┌─────────────────────┐   ┌────────────────────┐
//!                    │ artifact status,    │◄──│ ReputationFeedback │
//!                    │ verdict, review     │   │ (one ledger batch) │
//!                    └─────────────────────┘   └────────────────────┘
//! ```
//!
//! The artifact is only touched once the ledger has accepted the batch.

mod aggregator;
mod deviation;
mod eligibility;
mod orchestrator;
mod pool;

pub use aggregator::{median, plurality, ConsensusAggregator};
pub use deviation::{DeviationScorer, ReviewerDeviation};
pub use eligibility::{ReviewerEligibility, ReviewerStanding};
pub use orchestrator::ReviewEngine;
pub use pool::{Membership, PoolStatus, ReviewPool};
