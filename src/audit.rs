//! Audit Trail
//!
//! Bounded in-memory record of every engine decision: joins, submissions,
//! rejections, finalizations and reputation batches. Entries are also mirrored
//! to `tracing` at a level matching their severity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;

use crate::model::{ArtifactId, ArtifactStatus};

/// Auditable engine events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    ArtifactRegistered {
        artifact: ArtifactId,
        author: String,
    },
    ReviewerJoined {
        artifact: ArtifactId,
        reviewer: String,
        slot: usize,
    },
    ReviewSubmitted {
        artifact: ArtifactId,
        reviewer: String,
        submitted: usize,
        capacity: usize,
    },
    OperationRejected {
        artifact: ArtifactId,
        principal: String,
        operation: String,
        code: String,
    },
    ArtifactFinalized {
        artifact: ArtifactId,
        status: ArtifactStatus,
        quality_score: u32,
    },
    ReputationApplied {
        artifact: ArtifactId,
        changes: usize,
    },
    /// Reviewers whose reviews matched field for field. Informational only.
    PossibleCollusion {
        artifact: ArtifactId,
        reviewers: Vec<String>,
    },
}

impl AuditEvent {
    pub fn artifact(&self) -> &ArtifactId {
        match self {
            AuditEvent::ArtifactRegistered { artifact, .. }
            | AuditEvent::ReviewerJoined { artifact, .. }
            | AuditEvent::ReviewSubmitted { artifact, .. }
            | AuditEvent::OperationRejected { artifact, .. }
            | AuditEvent::ArtifactFinalized { artifact, .. }
            | AuditEvent::ReputationApplied { artifact, .. }
            | AuditEvent::PossibleCollusion { artifact, .. } => artifact,
        }
    }

    /// Whether `principal` is named by the event
    pub fn involves(&self, principal: &str) -> bool {
        match self {
            AuditEvent::ArtifactRegistered { author, .. } => author == principal,
            AuditEvent::ReviewerJoined { reviewer, .. }
            | AuditEvent::ReviewSubmitted { reviewer, .. } => reviewer == principal,
            AuditEvent::OperationRejected { principal: p, .. } => p == principal,
            AuditEvent::PossibleCollusion { reviewers, .. } => {
                reviewers.iter().any(|r| r == principal)
            }
            AuditEvent::ArtifactFinalized { .. } | AuditEvent::ReputationApplied { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuditSeverity {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number, never reused even after trimming
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub severity: AuditSeverity,
    pub event: AuditEvent,
}

struct AuditState {
    entries: VecDeque<AuditEntry>,
    next_sequence: u64,
}

pub struct AuditLog {
    state: RwLock<AuditState>,
    max_entries: usize,
    min_severity: AuditSeverity,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(AuditState {
                entries: VecDeque::new(),
                next_sequence: 0,
            }),
            max_entries,
            min_severity: AuditSeverity::Debug,
        }
    }

    pub fn with_min_severity(mut self, severity: AuditSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    pub async fn log(&self, event: AuditEvent, severity: AuditSeverity, at: DateTime<Utc>) {
        if severity < self.min_severity {
            return;
        }

        match severity {
            AuditSeverity::Debug => tracing::debug!("AUDIT: {:?}", event),
            AuditSeverity::Info => tracing::info!("AUDIT: {:?}", event),
            AuditSeverity::Warning => tracing::warn!("AUDIT: {:?}", event),
            AuditSeverity::Error => tracing::error!("AUDIT: {:?}", event),
        }

        let mut state = self.state.write().await;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.entries.push_back(AuditEntry {
            sequence,
            timestamp: at,
            severity,
            event,
        });

        while state.entries.len() > self.max_entries {
            state.entries.pop_front();
        }
    }

    /// Most recent entries, newest first
    pub async fn get_recent(&self, count: usize) -> Vec<AuditEntry> {
        let state = self.state.read().await;
        state.entries.iter().rev().take(count).cloned().collect()
    }

    pub async fn get_for_artifact(&self, artifact: &ArtifactId) -> Vec<AuditEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| e.event.artifact() == artifact)
            .cloned()
            .collect()
    }

    pub async fn get_for_principal(&self, principal: &str) -> Vec<AuditEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| e.event.involves(principal))
            .cloned()
            .collect()
    }

    pub async fn get_by_severity(&self, min_severity: AuditSeverity) -> Vec<AuditEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .filter(|e| e.severity >= min_severity)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }
}
