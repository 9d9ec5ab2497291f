//! Deviation Scorer
//!
//! Distance between one reviewer's weighted score and the verdict's quality
//! score, on the same 0-100 scale and with the same weights used for
//! aggregation. Feeds reputation only; it never blocks a review from counting.

use serde::{Deserialize, Serialize};

use crate::model::{round_half_up, Review, ReviewSchema, Verdict};

/// A reviewer's distance from consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerDeviation {
    pub reviewer: String,
    pub deviation: u32,
}

pub struct DeviationScorer;

impl DeviationScorer {
    pub fn deviation(schema: &ReviewSchema, review: &Review, verdict: &Verdict) -> u32 {
        let score = schema.weighted_score(review);
        let target = u64::from(verdict.quality_score) * score.denominator;
        round_half_up(score.numerator.abs_diff(target), score.denominator) as u32
    }

    /// Deviations for a set of (reviewer, review) pairs, in input order
    pub fn score_all(
        schema: &ReviewSchema,
        reviews: &[(&str, &Review)],
        verdict: &Verdict,
    ) -> Vec<ReviewerDeviation> {
        reviews
            .iter()
            .map(|(reviewer, review)| ReviewerDeviation {
                reviewer: reviewer.to_string(),
                deviation: Self::deviation(schema, review, verdict),
            })
            .collect()
    }
}
