//! Consensus Aggregator - folds a quorum of reviews into one verdict
//!
//! Deterministic rules, independent of submission order:
//!
//! | Field | Rule | Tie / rounding |
//! |-------|------|----------------|
//! | quality_score | mean of weighted scores | round half up |
//! | difficulty | plurality | lowest variant wins |
//! | category | plurality | lowest variant wins |
//! | duration_minutes | median | even count: mean of middle pair, half up |
//!
//! All arithmetic is integral. Inputs were bound-checked at submission, so a
//! failure here is an internal-consistency violation, never a user error.

use std::collections::BTreeMap;
use tracing::error;

use crate::error::ReviewError;
use crate::model::{round_half_up, Review, ReviewSchema, Verdict};

pub struct ConsensusAggregator;

impl ConsensusAggregator {
    pub fn aggregate(schema: &ReviewSchema, reviews: &[&Review]) -> Result<Verdict, ReviewError> {
        if reviews.is_empty() {
            error!(kind = %schema.kind, "Aggregation requested with no reviews");
            return Err(ReviewError::Internal(
                "cannot aggregate an empty review set".to_string(),
            ));
        }

        for review in reviews {
            if let Err(e) = schema.check(review) {
                error!(kind = %schema.kind, error = %e, "Unchecked review reached aggregation");
                return Err(ReviewError::Internal(format!(
                    "review failed schema check during aggregation: {}",
                    e
                )));
            }
        }

        let count = reviews.len() as u64;
        let numerator: u64 = reviews
            .iter()
            .map(|r| schema.weighted_score(r).numerator)
            .sum();
        let quality_score = round_half_up(numerator, schema.denominator() * count) as u32;

        let difficulty = plurality(reviews.iter().map(|r| r.suggested_difficulty));
        let category = plurality(reviews.iter().map(|r| r.suggested_category));
        let mut durations: Vec<u32> = reviews
            .iter()
            .map(|r| r.suggested_duration_minutes)
            .collect();
        let duration_minutes = median(&mut durations);

        match (difficulty, category, duration_minutes) {
            (Some(difficulty), Some(category), Some(duration_minutes)) => Ok(Verdict {
                quality_score,
                difficulty,
                category,
                duration_minutes,
                review_count: reviews.len(),
            }),
            _ => Err(ReviewError::Internal(
                "classification over a non-empty review set produced nothing".to_string(),
            )),
        }
    }
}

/// Most frequent value; ties go to the smallest
pub fn plurality<T: Ord + Copy>(values: impl IntoIterator<Item = T>) -> Option<T> {
    let mut counts: BTreeMap<T, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((value, count)),
        }
    }
    best.map(|(value, _)| value)
}

/// Median; for an even count, the mean of the middle pair rounded half up
pub fn median(values: &mut [u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        let sum = u64::from(values[mid - 1]) + u64::from(values[mid]);
        Some(round_half_up(sum, 2) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, Domain, Factor, ReviewKind};

    fn review(
        scores: [u8; 4],
        difficulty: Difficulty,
        category: Domain,
        duration: u32,
    ) -> Review {
        Review::new(ReviewKind::Moderation, difficulty, category, duration)
            .with_score(Factor::Relevance, scores[0])
            .with_score(Factor::Correctness, scores[1])
            .with_score(Factor::Clarity, scores[2])
            .with_score(Factor::Originality, scores[3])
    }

    #[test]
    fn test_quality_is_rounded_mean() {
        let schema = ReviewSchema::moderation_default();
        // weighted 80, 85, 90
        let a = review([10, 1, 5, 5], Difficulty::Easy, Domain::Security, 60);
        let b = review([9, 1, 7, 7], Difficulty::Easy, Domain::Security, 90);
        let c = review([10, 1, 10, 5], Difficulty::Easy, Domain::Security, 120);
        assert_eq!(schema.weighted_score(&b).rounded(), 85);

        let verdict = ConsensusAggregator::aggregate(&schema, &[&a, &b, &c]).unwrap();
        assert_eq!(verdict.quality_score, 85);
        assert_eq!(verdict.duration_minutes, 90);
        assert_eq!(verdict.review_count, 3);
    }

    #[test]
    fn test_quality_rounds_half_up() {
        let schema = ReviewSchema::moderation_default();
        // weighted 80 and 85 -> 82.5 -> 83
        let a = review([10, 1, 5, 5], Difficulty::Easy, Domain::Security, 60);
        let b = review([9, 1, 7, 7], Difficulty::Easy, Domain::Security, 60);
        let verdict = ConsensusAggregator::aggregate(&schema, &[&a, &b]).unwrap();
        assert_eq!(verdict.quality_score, 83);
    }

    #[test]
    fn test_plurality_ties_go_to_lowest() {
        assert_eq!(
            plurality([Difficulty::Hard, Difficulty::Easy, Difficulty::Hard]),
            Some(Difficulty::Hard)
        );
        assert_eq!(
            plurality([Difficulty::Expert, Difficulty::Medium]),
            Some(Difficulty::Medium)
        );
        assert_eq!(
            plurality([Domain::Writing, Domain::Design, Domain::Design, Domain::Writing]),
            Some(Domain::Design)
        );
        assert_eq!(plurality(Vec::<Domain>::new()), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [30, 10, 20]), Some(20));
        assert_eq!(median(&mut [10, 1_000, 20]), Some(20));
        assert_eq!(median(&mut [10, 21]), Some(16));
        assert_eq!(median(&mut [7]), Some(7));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_order_independence() {
        let schema = ReviewSchema::moderation_default();
        let a = review([3, 0, 4, 9], Difficulty::Hard, Domain::Blockchain, 45);
        let b = review([7, 1, 2, 6], Difficulty::Easy, Domain::Security, 300);
        let c = review([10, 1, 9, 1], Difficulty::Expert, Domain::Design, 15);

        let expected = ConsensusAggregator::aggregate(&schema, &[&a, &b, &c]).unwrap();
        let orders: [[&Review; 3]; 5] = [
            [&a, &c, &b],
            [&b, &a, &c],
            [&b, &c, &a],
            [&c, &a, &b],
            [&c, &b, &a],
        ];
        for order in orders {
            assert_eq!(
                ConsensusAggregator::aggregate(&schema, &order).unwrap(),
                expected
            );
        }
        // three-way ties resolve to the lowest variants
        assert_eq!(expected.difficulty, Difficulty::Easy);
        assert_eq!(expected.category, Domain::Security);
    }

    #[test]
    fn test_identical_reviews_reproduce_inputs() {
        let schema = ReviewSchema::moderation_default();
        let r = review([6, 1, 8, 4], Difficulty::Hard, Domain::DataScience, 240);
        let verdict = ConsensusAggregator::aggregate(&schema, &[&r, &r, &r, &r]).unwrap();

        assert_eq!(verdict.quality_score, schema.weighted_score(&r).rounded());
        assert_eq!(verdict.difficulty, r.suggested_difficulty);
        assert_eq!(verdict.category, r.suggested_category);
        assert_eq!(verdict.duration_minutes, r.suggested_duration_minutes);
    }

    #[test]
    fn test_broken_invariants_are_internal() {
        let schema = ReviewSchema::moderation_default();
        assert!(matches!(
            ConsensusAggregator::aggregate(&schema, &[]),
            Err(ReviewError::Internal(_))
        ));

        let bad = review([99, 1, 5, 5], Difficulty::Easy, Domain::Security, 60);
        assert!(matches!(
            ConsensusAggregator::aggregate(&schema, &[&bad]),
            Err(ReviewError::Internal(_))
        ));
    }
}
