//! Reviewable Artifacts
//!
//! A challenge (judged by moderators) or a solution (judged by evaluators).
//! Identity is content-addressed: the SHA-256 of kind, author, domain and the
//! opaque content reference. Status is owned by the review engine once the
//! artifact is registered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::model::review::ReviewKind;

/// Content-addressed artifact identifier (lowercase hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for log lines
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What is being judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Contributor-submitted challenge, graded by moderators
    Challenge,
    /// Talent-submitted solution, graded by evaluators
    Solution,
}

impl ArtifactKind {
    /// The review schema that applies to this kind of artifact
    pub fn review_kind(&self) -> ReviewKind {
        match self {
            ArtifactKind::Challenge => ReviewKind::Moderation,
            ArtifactKind::Solution => ReviewKind::Evaluation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Challenge => "challenge",
            ArtifactKind::Solution => "solution",
        }
    }
}

/// Category / reputation domain.
///
/// Declaration order is significant: plurality ties resolve to the
/// lower-valued (earlier) variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    SoftwareEngineering,
    DataScience,
    Security,
    Blockchain,
    Design,
    Writing,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::SoftwareEngineering,
        Domain::DataScience,
        Domain::Security,
        Domain::Blockchain,
        Domain::Design,
        Domain::Writing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::SoftwareEngineering => "software_engineering",
            Domain::DataScience => "data_science",
            Domain::Security => "security",
            Domain::Blockchain => "blockchain",
            Domain::Design => "design",
            Domain::Writing => "writing",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact lifecycle. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl ArtifactStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ArtifactStatus::Approved | ArtifactStatus::Rejected)
    }
}

/// A challenge or solution subject to peer review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    /// Authenticated principal that created the artifact
    pub author: String,
    pub domain: Domain,
    /// Opaque pointer into the external content store
    pub content_ref: String,
    pub status: ArtifactStatus,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Artifact {
    pub fn new(
        kind: ArtifactKind,
        author: impl Into<String>,
        domain: Domain,
        content_ref: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let author = author.into();
        let content_ref = content_ref.into();
        let id = Self::calculate_id(kind, &author, domain, &content_ref);

        Self {
            id,
            kind,
            author,
            domain,
            content_ref,
            status: ArtifactStatus::Pending,
            created_at,
            finalized_at: None,
        }
    }

    /// Content address over the artifact's immutable identity fields.
    /// Creation time is excluded so the same content cannot be registered twice.
    pub fn calculate_id(
        kind: ArtifactKind,
        author: &str,
        domain: Domain,
        content_ref: &str,
    ) -> ArtifactId {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(author.as_bytes());
        hasher.update([0u8]);
        hasher.update(domain.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(content_ref.as_bytes());
        ArtifactId(format!("{:x}", hasher.finalize()))
    }

    pub fn is_author(&self, principal: &str) -> bool {
        self.author == principal
    }

    /// Pending -> UnderReview on the first successful join. No-op otherwise.
    pub(crate) fn begin_review(&mut self) {
        if self.status == ArtifactStatus::Pending {
            self.status = ArtifactStatus::UnderReview;
        }
    }

    /// Enter a terminal state. Callers guarantee this happens once.
    pub(crate) fn finalize(&mut self, approved: bool, at: DateTime<Utc>) {
        self.status = if approved {
            ArtifactStatus::Approved
        } else {
            ArtifactStatus::Rejected
        };
        self.finalized_at = Some(at);
    }
}
