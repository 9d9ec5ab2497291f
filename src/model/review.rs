//! Structured Reviews and Review Schemas
//!
//! A single `Review` type serves both instantiations of the engine. The
//! `ReviewKind` tag selects a `ReviewSchema` describing which factors are
//! scored, on what scale, and with what weight. Weights sum to 100, so a
//! review's weighted score lands on a 0-100 scale.
//!
//! Weighted scores are kept as exact fractions (`WeightedScore`) so that
//! aggregation and deviation never depend on floating-point rounding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ReviewError;
use crate::model::artifact::Domain;

/// Which review schema a review follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// Moderators grading challenge quality
    Moderation,
    /// Evaluators grading solution quality
    Evaluation,
}

impl ReviewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewKind::Moderation => "moderation",
            ReviewKind::Evaluation => "evaluation",
        }
    }
}

impl fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored quality sub-factor
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Relevance,
    Correctness,
    Clarity,
    Originality,
    Completeness,
    Efficiency,
}

impl Factor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::Relevance => "relevance",
            Factor::Correctness => "correctness",
            Factor::Clarity => "clarity",
            Factor::Originality => "originality",
            Factor::Completeness => "completeness",
            Factor::Efficiency => "efficiency",
        }
    }
}

/// Suggested difficulty. Declaration order is the tie-break order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

/// Bounded scale of a single factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FactorScale {
    /// 0 = no, 1 = yes
    YesNo,
    /// 0..=max
    Bounded { max: u8 },
}

impl FactorScale {
    pub fn max(&self) -> u8 {
        match self {
            FactorScale::YesNo => 1,
            FactorScale::Bounded { max } => *max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorSpec {
    pub factor: Factor,
    pub scale: FactorScale,
    /// Share of the 0-100 weighted score contributed by this factor
    pub weight: u32,
}

impl FactorSpec {
    pub fn bounded(factor: Factor, max: u8, weight: u32) -> Self {
        Self {
            factor,
            scale: FactorScale::Bounded { max },
            weight,
        }
    }

    pub fn yes_no(factor: Factor, weight: u32) -> Self {
        Self {
            factor,
            scale: FactorScale::YesNo,
            weight,
        }
    }
}

/// Largest common denominator a schema's scales may produce. Keeps every
/// weighted sum and its rounding well inside `u64`.
pub const MAX_SCORE_DENOMINATOR: u64 = 1_000_000;

/// Schema descriptor for one review kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSchema {
    pub kind: ReviewKind,
    pub factors: Vec<FactorSpec>,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
}

impl ReviewSchema {
    /// Challenge moderation: is the challenge relevant, well-posed, clear and new?
    pub fn moderation_default() -> Self {
        Self {
            kind: ReviewKind::Moderation,
            factors: vec![
                FactorSpec::bounded(Factor::Relevance, 10, 30),
                FactorSpec::yes_no(Factor::Correctness, 30),
                FactorSpec::bounded(Factor::Clarity, 10, 20),
                FactorSpec::bounded(Factor::Originality, 10, 20),
            ],
            min_duration_minutes: 5,
            max_duration_minutes: 60 * 24 * 14,
        }
    }

    /// Solution evaluation: does the solution work, and how well?
    pub fn evaluation_default() -> Self {
        Self {
            kind: ReviewKind::Evaluation,
            factors: vec![
                FactorSpec::bounded(Factor::Correctness, 10, 40),
                FactorSpec::bounded(Factor::Completeness, 10, 30),
                FactorSpec::bounded(Factor::Clarity, 10, 15),
                FactorSpec::bounded(Factor::Efficiency, 10, 15),
            ],
            min_duration_minutes: 5,
            max_duration_minutes: 60 * 24 * 14,
        }
    }

    /// Structural checks run once at configuration time
    pub fn validate(&self) -> Result<(), String> {
        if self.factors.is_empty() {
            return Err(format!("{} schema has no factors", self.kind));
        }

        let total: u64 = self.factors.iter().map(|f| u64::from(f.weight)).sum();
        if total != 100 {
            return Err(format!(
                "{} schema weights sum to {}, expected 100",
                self.kind, total
            ));
        }

        for (i, spec) in self.factors.iter().enumerate() {
            if spec.scale.max() == 0 {
                return Err(format!(
                    "{} schema factor {} has an empty scale",
                    self.kind,
                    spec.factor.as_str()
                ));
            }
            if self.factors[..i].iter().any(|s| s.factor == spec.factor) {
                return Err(format!(
                    "{} schema lists factor {} twice",
                    self.kind,
                    spec.factor.as_str()
                ));
            }
        }

        if self.denominator() > MAX_SCORE_DENOMINATOR {
            return Err(format!(
                "{} schema scales have a common denominator above {}",
                self.kind, MAX_SCORE_DENOMINATOR
            ));
        }

        if self.min_duration_minutes > self.max_duration_minutes {
            return Err(format!(
                "{} schema duration bounds are inverted ({} > {})",
                self.kind, self.min_duration_minutes, self.max_duration_minutes
            ));
        }

        Ok(())
    }

    pub fn spec(&self, factor: Factor) -> Option<&FactorSpec> {
        self.factors.iter().find(|s| s.factor == factor)
    }

    /// Bound-check every field of a review against this schema.
    pub fn check(&self, review: &Review) -> Result<(), ReviewError> {
        if review.kind != self.kind {
            return Err(ReviewError::out_of_range(
                "kind",
                format!("expected a {} review, got {}", self.kind, review.kind),
            ));
        }

        for spec in &self.factors {
            let value = review.scores.get(&spec.factor).copied().ok_or_else(|| {
                ReviewError::out_of_range(spec.factor.as_str(), "missing score")
            })?;
            let max = spec.scale.max();
            if value > max {
                return Err(ReviewError::out_of_range(
                    spec.factor.as_str(),
                    format!("{} exceeds maximum {}", value, max),
                ));
            }
        }

        if let Some(extra) = review.scores.keys().find(|f| self.spec(**f).is_none()) {
            return Err(ReviewError::out_of_range(
                extra.as_str(),
                format!("not part of the {} schema", self.kind),
            ));
        }

        let duration = review.suggested_duration_minutes;
        if duration < self.min_duration_minutes || duration > self.max_duration_minutes {
            return Err(ReviewError::out_of_range(
                "suggested_duration_minutes",
                format!(
                    "{} outside {}..={}",
                    duration, self.min_duration_minutes, self.max_duration_minutes
                ),
            ));
        }

        Ok(())
    }

    /// Common denominator of all factor scales
    pub fn denominator(&self) -> u64 {
        self.factors
            .iter()
            .fold(1u64, |acc, s| lcm(acc, u64::from(s.scale.max())))
    }

    /// Exact weighted score of a review that already passed `check`
    pub fn weighted_score(&self, review: &Review) -> WeightedScore {
        let denominator = self.denominator();
        let numerator = self
            .factors
            .iter()
            .map(|spec| {
                let value = u64::from(review.scores.get(&spec.factor).copied().unwrap_or(0));
                let max = u64::from(spec.scale.max());
                u64::from(spec.weight) * value * (denominator / max)
            })
            .sum();

        WeightedScore {
            numerator,
            denominator,
        }
    }
}

/// A 0-100 weighted score held as `numerator / denominator`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedScore {
    pub numerator: u64,
    pub denominator: u64,
}

impl WeightedScore {
    pub fn rounded(&self) -> u32 {
        round_half_up(self.numerator, self.denominator) as u32
    }
}

/// `num / den` rounded to the nearest integer, halves rounding up
pub(crate) fn round_half_up(num: u64, den: u64) -> u64 {
    (2 * num + den) / (2 * den)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

/// One reviewer's structured judgment. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub kind: ReviewKind,
    pub scores: BTreeMap<Factor, u8>,
    pub suggested_difficulty: Difficulty,
    pub suggested_category: Domain,
    pub suggested_duration_minutes: u32,
    /// Optional free-form feedback stored in the external content store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_ref: Option<String>,
}

impl Review {
    pub fn new(
        kind: ReviewKind,
        suggested_difficulty: Difficulty,
        suggested_category: Domain,
        suggested_duration_minutes: u32,
    ) -> Self {
        Self {
            kind,
            scores: BTreeMap::new(),
            suggested_difficulty,
            suggested_category,
            suggested_duration_minutes,
            comment_ref: None,
        }
    }

    pub fn with_score(mut self, factor: Factor, value: u8) -> Self {
        self.scores.insert(factor, value);
        self
    }

    pub fn with_comment(mut self, comment_ref: impl Into<String>) -> Self {
        self.comment_ref = Some(comment_ref.into());
        self
    }
}
