//! Data model shared by every stage of the review engine.

mod artifact;
mod review;
mod verdict;

pub use artifact::{Artifact, ArtifactId, ArtifactKind, ArtifactStatus, Domain};
pub use review::{
    Difficulty, Factor, FactorScale, FactorSpec, Review, ReviewKind, ReviewSchema, WeightedScore,
};
pub use verdict::Verdict;

pub(crate) use review::round_half_up;
