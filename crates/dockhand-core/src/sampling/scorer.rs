//! Candidate scorer interface, weighted scoring and ranking.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{SamplingError, SamplingResult};
use crate::sampling::candidate::{Candidate, ScoreBreakdown, ScoredCandidate};

/// Criterion weights. Criteria missing here, or weighted zero, do not count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoringWeights(BTreeMap<String, f64>);

impl ScoringWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, criterion: impl Into<String>, weight: f64) -> Self {
        self.0.insert(criterion.into(), weight);
        self
    }

    pub fn get(&self, criterion: &str) -> Option<f64> {
        self.0.get(criterion).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlay `overrides` on top of these weights.
    pub fn merged(mut self, overrides: &ScoringWeights) -> Self {
        for (k, v) in overrides.iter() {
            self.0.insert(k.clone(), *v);
        }
        self
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ScoringWeights {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// `Σ(breakdown[c] * weight[c]) / Σ weight[c]` over criteria present in both
/// maps with a positive weight, clamped to 0–100. No overlap scores 0.
pub fn weighted_score(breakdown: &ScoreBreakdown, weights: &ScoringWeights) -> f64 {
    let mut total: f64 = 0.0;
    let mut weight_sum: f64 = 0.0;
    for (criterion, weight) in weights.iter() {
        if *weight <= 0.0 || !weight.is_finite() {
            continue;
        }
        if let Some(value) = breakdown.get(criterion) {
            total += value * weight;
            weight_sum += weight;
        }
    }
    if weight_sum == 0.0 {
        return 0.0;
    }
    let score = total / weight_sum;
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Sort by descending score and assign ranks 1..N.
///
/// The sort is stable, so equal scores keep their incoming (generation)
/// order.
pub fn rank_candidates<T>(mut scored: Vec<ScoredCandidate<T>>) -> Vec<ScoredCandidate<T>> {
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    for (i, candidate) in scored.iter_mut().enumerate() {
        candidate.rank = i + 1;
    }
    scored
}

/// Assigns a weighted score and breakdown to each candidate.
#[async_trait]
pub trait CandidateScorer<T: Send + Sync + 'static>: Send + Sync {
    fn name(&self) -> &str;

    /// Weights used when the caller supplies none.
    fn default_weights(&self) -> ScoringWeights {
        ScoringWeights::default()
    }

    /// Raw per-criterion sub-scores, typically 0–100 each.
    fn breakdown(&self, candidate: &Candidate<T>) -> SamplingResult<ScoreBreakdown>;

    /// Score and rank a batch.
    ///
    /// Candidates whose breakdown fails are dropped with a warning; the batch
    /// fails only when none could be scored.
    async fn score(
        &self,
        candidates: Vec<Candidate<T>>,
        weights: &ScoringWeights,
    ) -> SamplingResult<Vec<ScoredCandidate<T>>> {
        score_batch(self.name(), candidates, weights, |c| self.breakdown(c))
    }
}

/// Shared batch logic behind [`CandidateScorer::score`].
pub fn score_batch<T, F>(
    scorer: &str,
    candidates: Vec<Candidate<T>>,
    weights: &ScoringWeights,
    breakdown: F,
) -> SamplingResult<Vec<ScoredCandidate<T>>>
where
    F: Fn(&Candidate<T>) -> SamplingResult<ScoreBreakdown>,
{
    if candidates.is_empty() {
        return Err(SamplingError::ScoringFailure {
            scorer: scorer.to_string(),
            reason: "no candidates to score".to_string(),
        });
    }

    let attempted = candidates.len();
    let mut errors = Vec::new();
    let mut scored = Vec::with_capacity(attempted);

    for candidate in candidates {
        match breakdown(&candidate) {
            Ok(score_breakdown) => {
                let score = weighted_score(&score_breakdown, weights);
                scored.push(ScoredCandidate {
                    candidate,
                    score,
                    score_breakdown,
                    rank: 0,
                });
            }
            Err(e) => {
                warn!(scorer, candidate_id = %candidate.id, error = %e, "dropping unscorable candidate");
                errors.push(format!("{}: {e}", candidate.id));
            }
        }
    }

    if scored.is_empty() {
        return Err(SamplingError::ScoringFailure {
            scorer: scorer.to_string(),
            reason: format!("0 of {attempted} candidates scored: {}", errors.join("; ")),
        });
    }

    Ok(rank_candidates(scored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::candidate::CandidateSource;

    fn breakdown(pairs: &[(&str, f64)]) -> ScoreBreakdown {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_equal_weights_average() {
        let weights = ScoringWeights::new().with("a", 1.0).with("b", 1.0);
        let score = weighted_score(&breakdown(&[("a", 100.0), ("b", 0.0)]), &weights);
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_zero_and_missing_weights_excluded() {
        let weights = ScoringWeights::new()
            .with("a", 2.0)
            .with("b", 0.0)
            .with("missing", 5.0);
        let score = weighted_score(&breakdown(&[("a", 80.0), ("b", 0.0), ("c", 0.0)]), &weights);
        assert_eq!(score, 80.0);
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        let weights = ScoringWeights::new().with("x", 1.0);
        assert_eq!(weighted_score(&breakdown(&[("a", 90.0)]), &weights), 0.0);
    }

    #[test]
    fn test_score_clamped() {
        let weights = ScoringWeights::new().with("a", 1.0);
        assert_eq!(weighted_score(&breakdown(&[("a", 140.0)]), &weights), 100.0);
    }

    fn scored(strategy: &str, score: f64) -> ScoredCandidate<String> {
        ScoredCandidate {
            candidate: Candidate::new(strategy, CandidateSource::Template, 0.5, strategy.to_string()),
            score,
            score_breakdown: ScoreBreakdown::new(),
            rank: 0,
        }
    }

    #[test]
    fn test_rank_is_permutation_with_stable_ties() {
        let ranked = rank_candidates(vec![
            scored("first", 60.0),
            scored("second", 80.0),
            scored("third", 60.0),
        ]);
        let order: Vec<(&str, usize)> = ranked.iter().map(|c| (c.strategy(), c.rank)).collect();
        assert_eq!(order, vec![("second", 1), ("first", 2), ("third", 3)]);
    }

    #[test]
    fn test_batch_drops_failures() {
        let candidates = vec![
            Candidate::new("ok", CandidateSource::Rules, 0.5, "ok".to_string()),
            Candidate::new("bad", CandidateSource::Rules, 0.5, "bad".to_string()),
        ];
        let weights = ScoringWeights::new().with("q", 1.0);
        let scored = score_batch("test", candidates, &weights, |c| {
            if c.content == "bad" {
                Err(SamplingError::InvalidContext("unparseable".to_string()))
            } else {
                Ok(breakdown(&[("q", 70.0)]))
            }
        })
        .expect("one scored");
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].rank, 1);
        assert_eq!(scored[0].score, 70.0);
    }

    #[test]
    fn test_batch_all_failed_is_error() {
        let candidates = vec![Candidate::new("bad", CandidateSource::Rules, 0.5, 0u8)];
        let err = score_batch("test", candidates, &ScoringWeights::new(), |_| {
            Err(SamplingError::InvalidContext("nope".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, SamplingError::ScoringFailure { .. }));
    }
}
