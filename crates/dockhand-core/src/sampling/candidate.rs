//! Candidate envelopes shared by every artifact type.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Dockerfile, ManifestSet, Remediation};

/// Where a candidate's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// An AI completion provider.
    Ai,
    /// Deterministic template rendering.
    Template,
    /// Rule-based derivation from structured input.
    Rules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    /// Strategy that produced the candidate; used for tie-break preference.
    pub strategy: String,
    pub source: CandidateSource,
    /// Producer's confidence, clamped to 0.0–1.0.
    pub confidence: f64,
}

/// One generated artifact, not yet scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate<T> {
    pub id: String,
    pub content: T,
    pub metadata: CandidateMetadata,
    pub generated_at: DateTime<Utc>,
}

impl<T: Serialize> Candidate<T> {
    /// Build a candidate, deriving its id from strategy, content and time.
    pub fn new(
        strategy: impl Into<String>,
        source: CandidateSource,
        confidence: f64,
        content: T,
    ) -> Self {
        Self::new_at(strategy, source, confidence, content, Utc::now())
    }

    pub fn new_at(
        strategy: impl Into<String>,
        source: CandidateSource,
        confidence: f64,
        content: T,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let strategy = strategy.into();
        let id = candidate_id(&strategy, &content, generated_at);
        Self {
            id,
            content,
            metadata: CandidateMetadata {
                strategy,
                source,
                confidence: clamp_confidence(confidence),
            },
            generated_at,
        }
    }
}

impl<T> Candidate<T> {
    pub fn strategy(&self) -> &str {
        &self.metadata.strategy
    }

    pub fn confidence(&self) -> f64 {
        self.metadata.confidence
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// `{strategy}-{sha256(content)[..12]}-{unix_millis}`
fn candidate_id<T: Serialize>(strategy: &str, content: &T, at: DateTime<Utc>) -> String {
    let bytes = serde_json::to_vec(content).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let digest = hex::encode(hasher.finalize());
    format!("{}-{}-{}", strategy, &digest[..12], at.timestamp_millis())
}

/// Per-criterion raw sub-scores, keyed by criterion name.
pub type ScoreBreakdown = BTreeMap<String, f64>;

/// A candidate with its weighted score and rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate<T> {
    #[serde(flatten)]
    pub candidate: Candidate<T>,
    /// Weighted score, 0–100.
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    /// 1-based position after sorting by descending score.
    pub rank: usize,
}

impl<T> ScoredCandidate<T> {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }

    pub fn strategy(&self) -> &str {
        self.candidate.strategy()
    }

    pub fn confidence(&self) -> f64 {
        self.candidate.confidence()
    }

    pub fn content(&self) -> &T {
        &self.candidate.content
    }
}

pub type DockerfileCandidate = Candidate<Dockerfile>;
pub type ManifestSetCandidate = Candidate<ManifestSet>;
pub type RemediationCandidate = Candidate<Remediation>;

/// A selected artifact of any supported type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "candidate", rename_all = "snake_case")]
pub enum SelectedArtifact {
    Dockerfile(ScoredCandidate<Dockerfile>),
    ManifestSet(ScoredCandidate<ManifestSet>),
    Remediation(ScoredCandidate<Remediation>),
}

impl SelectedArtifact {
    pub fn id(&self) -> &str {
        match self {
            SelectedArtifact::Dockerfile(c) => c.id(),
            SelectedArtifact::ManifestSet(c) => c.id(),
            SelectedArtifact::Remediation(c) => c.id(),
        }
    }

    pub fn score(&self) -> f64 {
        match self {
            SelectedArtifact::Dockerfile(c) => c.score,
            SelectedArtifact::ManifestSet(c) => c.score,
            SelectedArtifact::Remediation(c) => c.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_candidate_id_layout() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).single().expect("ts");
        let c = Candidate::new_at("multi-stage", CandidateSource::Template, 0.8, "FROM x", at);
        let parts: Vec<&str> = c.id.rsplitn(3, '-').collect();
        assert_eq!(parts[0], "1700000000000");
        assert_eq!(parts[1].len(), 12);
        assert_eq!(parts[2], "multi-stage");
    }

    #[test]
    fn test_same_content_same_time_same_id() {
        let at = Utc::now();
        let a = Candidate::new_at("s", CandidateSource::Ai, 0.5, "x", at);
        let b = Candidate::new_at("s", CandidateSource::Ai, 0.5, "x", at);
        let c = Candidate::new_at("s", CandidateSource::Ai, 0.5, "y", at);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn test_confidence_clamped() {
        let c = Candidate::new("s", CandidateSource::Rules, 1.7, 1u8);
        assert_eq!(c.confidence(), 1.0);
        let c = Candidate::new("s", CandidateSource::Rules, f64::NAN, 1u8);
        assert_eq!(c.confidence(), 0.0);
    }

    #[test]
    fn test_selected_artifact_tagging() {
        let scored = ScoredCandidate {
            candidate: Candidate::new(
                "minimal",
                CandidateSource::Template,
                0.7,
                Dockerfile::from_content("FROM alpine\nCMD [\"sh\"]"),
            ),
            score: 71.0,
            score_breakdown: ScoreBreakdown::new(),
            rank: 1,
        };
        let artifact = SelectedArtifact::Dockerfile(scored);
        let json = serde_json::to_value(&artifact).expect("serialize");
        assert_eq!(json["kind"], "dockerfile");
        assert_eq!(json["candidate"]["score"], 71.0);
        assert_eq!(artifact.score(), 71.0);
    }
}
