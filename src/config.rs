use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::model::{ReviewKind, ReviewSchema};
use crate::reputation::{FeedbackPolicy, LedgerBounds, ReputationThresholds};

const ENV_PREFIX: &str = "PEER_QUORUM_";

/// Largest pool a configuration may ask for
pub const MAX_POOL_CAPACITY: usize = 1_000;

/// Configuration for the review engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Review pool sizing
    pub pool: PoolConfig,
    /// Reviewer eligibility and approval thresholds
    pub thresholds: ThresholdConfig,
    /// Factor schemas per review kind
    pub schemas: SchemaConfig,
    /// Reputation feedback policy
    pub feedback: FeedbackPolicy,
    /// Reputation accumulator bounds
    pub ledger: LedgerBounds,
    /// Audit trail retention
    pub audit: AuditConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Reviewers per artifact; also the quorum size
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { capacity: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub moderator_min_domain: i64,
    pub evaluator_min_global: i64,
    pub evaluator_min_domain: i64,
    /// Minimum quality score (inclusive) for approval
    pub approval_threshold: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let reputation = ReputationThresholds::default();
        Self {
            moderator_min_domain: reputation.moderator_min_domain,
            evaluator_min_global: reputation.evaluator_min_global,
            evaluator_min_domain: reputation.evaluator_min_domain,
            approval_threshold: 70,
        }
    }
}

impl ThresholdConfig {
    pub fn to_thresholds(&self) -> ReputationThresholds {
        ReputationThresholds {
            moderator_min_domain: self.moderator_min_domain,
            evaluator_min_global: self.evaluator_min_global,
            evaluator_min_domain: self.evaluator_min_domain,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub moderation: ReviewSchema,
    pub evaluation: ReviewSchema,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            moderation: ReviewSchema::moderation_default(),
            evaluation: ReviewSchema::evaluation_default(),
        }
    }
}

impl SchemaConfig {
    pub fn for_kind(&self, kind: ReviewKind) -> &ReviewSchema {
        match kind {
            ReviewKind::Moderation => &self.moderation,
            ReviewKind::Evaluation => &self.evaluation,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Entries kept before the oldest are dropped
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log full principal identifiers instead of shortened ones
    pub log_principals: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_principals: false, // Shortened by default
        }
    }
}

impl EngineConfig {
    /// Load configuration: defaults, then the JSON file named by
    /// `PEER_QUORUM_CONFIG` if set, then individual environment overrides.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(var("CONFIG").as_str()) {
            Some(path) => Self::read_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(&lookup)?;
        config.validate()?;

        info!(
            capacity = config.pool.capacity,
            approval_threshold = config.thresholds.approval_threshold,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Read and validate a JSON configuration file. Missing sections keep
    /// their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Environment overrides still apply, so validation waits for them
    fn read_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Pool
        parse_override(lookup, "POOL_CAPACITY", &mut self.pool.capacity)?;

        // Thresholds
        parse_override(lookup, "APPROVAL_THRESHOLD", &mut self.thresholds.approval_threshold)?;
        parse_override(
            lookup,
            "MODERATOR_MIN_DOMAIN",
            &mut self.thresholds.moderator_min_domain,
        )?;
        parse_override(
            lookup,
            "EVALUATOR_MIN_GLOBAL",
            &mut self.thresholds.evaluator_min_global,
        )?;
        parse_override(
            lookup,
            "EVALUATOR_MIN_DOMAIN",
            &mut self.thresholds.evaluator_min_domain,
        )?;

        // Feedback
        parse_override(lookup, "AUTHOR_MIN_DELTA", &mut self.feedback.author_min_delta)?;
        parse_override(lookup, "AUTHOR_MAX_DELTA", &mut self.feedback.author_max_delta)?;
        parse_override(
            lookup,
            "REVIEWER_REWARD",
            &mut self.feedback.reviewer_participation_reward,
        )?;
        parse_override(
            lookup,
            "DEVIATION_TOLERANCE",
            &mut self.feedback.deviation_tolerance,
        )?;

        // Audit and logging
        parse_override(lookup, "AUDIT_MAX_ENTRIES", &mut self.audit.max_entries)?;
        if let Some(level) = lookup(var("LOG_LEVEL").as_str()) {
            self.logging.level = level;
        }
        parse_override(lookup, "LOG_PRINCIPALS", &mut self.logging.log_principals)?;

        Ok(())
    }

    /// Validate configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.pool.capacity == 0 || self.pool.capacity > MAX_POOL_CAPACITY {
            return Err(anyhow::anyhow!(
                "Pool capacity {} must be within 1-{}",
                self.pool.capacity,
                MAX_POOL_CAPACITY
            ));
        }

        if self.thresholds.approval_threshold > 100 {
            return Err(anyhow::anyhow!(
                "Approval threshold {} is above the 0-100 quality scale",
                self.thresholds.approval_threshold
            ));
        }

        let minimums = [
            ("moderator_min_domain", self.thresholds.moderator_min_domain),
            ("evaluator_min_global", self.thresholds.evaluator_min_global),
            ("evaluator_min_domain", self.thresholds.evaluator_min_domain),
        ];
        for (name, value) in minimums {
            if value < 0 {
                return Err(anyhow::anyhow!("Threshold {} cannot be negative", name));
            }
        }

        for (expected, schema) in [
            (ReviewKind::Moderation, &self.schemas.moderation),
            (ReviewKind::Evaluation, &self.schemas.evaluation),
        ] {
            if schema.kind != expected {
                return Err(anyhow::anyhow!(
                    "Schema configured for {} declares kind {}",
                    expected,
                    schema.kind
                ));
            }
            schema.validate().map_err(anyhow::Error::msg)?;
        }

        self.feedback.validate().map_err(anyhow::Error::msg)?;

        for (name, bounds) in [("global", self.ledger.global), ("domain", self.ledger.domain)] {
            if bounds.min > bounds.max {
                return Err(anyhow::anyhow!(
                    "Ledger {} bounds are inverted ({} > {})",
                    name,
                    bounds.min,
                    bounds.max
                ));
            }
            if bounds.clamp(self.ledger.initial_score) != self.ledger.initial_score {
                return Err(anyhow::anyhow!(
                    "Initial score {} is outside the {} bounds",
                    self.ledger.initial_score,
                    name
                ));
            }
        }

        if self.audit.max_entries == 0 {
            return Err(anyhow::anyhow!("Audit max_entries must be non-zero"));
        }

        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(anyhow::anyhow!(
                "Unknown log level: {}",
                self.logging.level
            ));
        }

        Ok(())
    }
}

fn var(suffix: &str) -> String {
    format!("{}{}", ENV_PREFIX, suffix)
}

fn parse_override<F, T>(lookup: &F, suffix: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let key = var(suffix);
    if let Some(raw) = lookup(key.as_str()) {
        *target = raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {} value", key))?;
    }
    Ok(())
}

/// Shorten a principal identifier for logging
pub fn short_principal(principal: &str) -> String {
    let len = principal.chars().count();
    if len <= 12 {
        return principal.to_string();
    }
    let head: String = principal.chars().take(6).collect();
    let tail: String = principal.chars().skip(len - 4).collect();
    format!("{}...{}", head, tail)
}
