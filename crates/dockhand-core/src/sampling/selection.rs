//! Deterministic winner selection over ranked candidates.
//!
//! Two decision points, in order:
//! 1. Early stop: a top score at or above the threshold wins outright.
//! 2. Tie-break: a gap wider than the margin is a clear win; otherwise the
//!    top two are resolved by strategy preference, then confidence, then the
//!    lexicographically smaller id.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::{SamplingError, SamplingResult};
use crate::sampling::candidate::ScoredCandidate;

/// Top score at or above which tie-break is skipped.
pub const EARLY_STOP_THRESHOLD: f64 = 90.0;

/// Score gap at or below which the top two candidates are considered tied.
pub const TIEBREAK_MARGIN: f64 = 5.0;

/// Preferred strategies, most preferred first.
pub fn default_strategy_preference() -> Vec<String> {
    ["security-focused", "production-ready", "upgrade-base-image"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPolicy {
    pub early_stop_threshold: f64,
    pub tiebreak_margin: f64,
    pub strategy_preference: Vec<String>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            early_stop_threshold: EARLY_STOP_THRESHOLD,
            tiebreak_margin: TIEBREAK_MARGIN,
            strategy_preference: default_strategy_preference(),
        }
    }
}

impl SelectionPolicy {
    fn preference_index(&self, strategy: &str) -> Option<usize> {
        self.strategy_preference.iter().position(|s| s == strategy)
    }
}

/// Which rule decided the winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    SingleCandidate,
    EarlyStop,
    ClearWinner,
    StrategyPreference,
    Confidence,
    Lexicographic,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionReason::SingleCandidate => "single_candidate",
            SelectionReason::EarlyStop => "early_stop",
            SelectionReason::ClearWinner => "clear_winner",
            SelectionReason::StrategyPreference => "strategy_preference",
            SelectionReason::Confidence => "confidence",
            SelectionReason::Lexicographic => "lexicographic",
        }
    }

    /// True when the top two were within the margin.
    pub fn is_tiebreak(&self) -> bool {
        matches!(
            self,
            SelectionReason::StrategyPreference
                | SelectionReason::Confidence
                | SelectionReason::Lexicographic
        )
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a, T> {
    pub winner: &'a ScoredCandidate<T>,
    pub reason: SelectionReason,
}

/// Pick a single winner from scored candidates.
///
/// Input order does not matter; candidates are ordered by `rank`. The winner
/// is always one of the inputs.
pub fn select_winner<'a, T>(
    candidates: &'a [ScoredCandidate<T>],
    policy: &SelectionPolicy,
) -> SamplingResult<Selection<'a, T>> {
    let ranked = by_rank(candidates);
    let top = *ranked.first().ok_or(SamplingError::NoCandidates)?;

    if top.score >= policy.early_stop_threshold {
        return Ok(Selection {
            winner: top,
            reason: SelectionReason::EarlyStop,
        });
    }

    let Some(&second) = ranked.get(1) else {
        return Ok(Selection {
            winner: top,
            reason: SelectionReason::SingleCandidate,
        });
    };

    if (top.score - second.score).abs() > policy.tiebreak_margin {
        return Ok(Selection {
            winner: top,
            reason: SelectionReason::ClearWinner,
        });
    }

    let (winner, reason) = break_tie(top, second, policy);
    Ok(Selection { winner, reason })
}

fn break_tie<'a, T>(
    a: &'a ScoredCandidate<T>,
    b: &'a ScoredCandidate<T>,
    policy: &SelectionPolicy,
) -> (&'a ScoredCandidate<T>, SelectionReason) {
    match (
        policy.preference_index(a.strategy()),
        policy.preference_index(b.strategy()),
    ) {
        (Some(ia), Some(ib)) if ia < ib => return (a, SelectionReason::StrategyPreference),
        (Some(ia), Some(ib)) if ib < ia => return (b, SelectionReason::StrategyPreference),
        (Some(_), None) => return (a, SelectionReason::StrategyPreference),
        (None, Some(_)) => return (b, SelectionReason::StrategyPreference),
        _ => {}
    }

    match a.confidence().partial_cmp(&b.confidence()) {
        Some(Ordering::Greater) => return (a, SelectionReason::Confidence),
        Some(Ordering::Less) => return (b, SelectionReason::Confidence),
        _ => {}
    }

    if b.id() < a.id() {
        (b, SelectionReason::Lexicographic)
    } else {
        (a, SelectionReason::Lexicographic)
    }
}

/// First `n` candidates by rank, without tie-break.
pub fn select_top_n<T: Clone>(candidates: &[ScoredCandidate<T>], n: usize) -> Vec<ScoredCandidate<T>> {
    by_rank(candidates)
        .into_iter()
        .take(n)
        .cloned()
        .collect()
}

fn by_rank<T>(candidates: &[ScoredCandidate<T>]) -> Vec<&ScoredCandidate<T>> {
    let mut ranked: Vec<&ScoredCandidate<T>> = candidates.iter().collect();
    ranked.sort_by_key(|c| c.rank);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::candidate::{Candidate, CandidateSource, ScoreBreakdown};
    use crate::sampling::scorer::rank_candidates;

    fn scored(strategy: &str, confidence: f64, score: f64) -> ScoredCandidate<String> {
        ScoredCandidate {
            candidate: Candidate::new(strategy, CandidateSource::Template, confidence, strategy.to_string()),
            score,
            score_breakdown: ScoreBreakdown::new(),
            rank: 0,
        }
    }

    fn ranked(items: Vec<ScoredCandidate<String>>) -> Vec<ScoredCandidate<String>> {
        rank_candidates(items)
    }

    #[test]
    fn test_empty_is_no_candidates() {
        let none: Vec<ScoredCandidate<String>> = Vec::new();
        let err = select_winner(&none, &SelectionPolicy::default()).unwrap_err();
        assert!(matches!(err, SamplingError::NoCandidates));
    }

    #[test]
    fn test_single_candidate() {
        let list = ranked(vec![scored("minimal", 0.5, 12.0)]);
        let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
        assert_eq!(sel.reason, SelectionReason::SingleCandidate);
        assert_eq!(sel.winner.strategy(), "minimal");
    }

    #[test]
    fn test_single_candidate_above_threshold_is_early_stop() {
        let list = ranked(vec![scored("minimal", 0.5, 95.0)]);
        let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
        assert_eq!(sel.reason, SelectionReason::EarlyStop);
        assert_eq!(sel.winner.strategy(), "minimal");
    }

    #[test]
    fn test_early_stop_short_circuits_tiebreak() {
        // Second is within the margin and has a preferred strategy.
        let list = ranked(vec![
            scored("size-optimized", 0.1, 91.0),
            scored("security-focused", 0.9, 90.0),
        ]);
        let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
        assert_eq!(sel.reason, SelectionReason::EarlyStop);
        assert_eq!(sel.winner.strategy(), "size-optimized");
    }

    #[test]
    fn test_clear_winner_ignores_strategy_and_confidence() {
        let list = ranked(vec![
            scored("size-optimized", 0.1, 80.0),
            scored("security-focused", 1.0, 74.0),
        ]);
        let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
        assert_eq!(sel.reason, SelectionReason::ClearWinner);
        assert_eq!(sel.winner.strategy(), "size-optimized");
    }

    #[test]
    fn test_gap_equal_to_margin_is_tie() {
        let list = ranked(vec![
            scored("size-optimized", 0.5, 80.0),
            scored("security-focused", 0.5, 75.0),
        ]);
        let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
        assert_eq!(sel.reason, SelectionReason::StrategyPreference);
        assert_eq!(sel.winner.strategy(), "security-focused");
    }

    #[test]
    fn test_preference_lower_index_wins() {
        let list = ranked(vec![
            scored("upgrade-base-image", 0.9, 70.0),
            scored("production-ready", 0.1, 68.0),
        ]);
        let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
        assert_eq!(sel.reason, SelectionReason::StrategyPreference);
        assert_eq!(sel.winner.strategy(), "production-ready");
    }

    #[test]
    fn test_confidence_when_no_preference() {
        let list = ranked(vec![
            scored("minimal", 0.6, 70.0),
            scored("multi-stage", 0.8, 69.0),
        ]);
        let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
        assert_eq!(sel.reason, SelectionReason::Confidence);
        assert_eq!(sel.winner.strategy(), "multi-stage");
    }

    #[test]
    fn test_lexicographic_fallback_is_deterministic() {
        let mut a = scored("alpha", 0.5, 70.0);
        let mut b = scored("beta", 0.5, 70.0);
        a.candidate.id = "zz-candidate".to_string();
        b.candidate.id = "aa-candidate".to_string();
        let list = ranked(vec![a, b]);

        for _ in 0..5 {
            let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
            assert_eq!(sel.reason, SelectionReason::Lexicographic);
            assert_eq!(sel.winner.id(), "aa-candidate");
        }
    }

    #[test]
    fn test_custom_preference_list() {
        let policy = SelectionPolicy {
            strategy_preference: vec!["minimal".to_string()],
            ..SelectionPolicy::default()
        };
        let list = ranked(vec![
            scored("security-focused", 0.9, 70.0),
            scored("minimal", 0.1, 67.0),
        ]);
        let sel = select_winner(&list, &policy).expect("select");
        assert_eq!(sel.winner.strategy(), "minimal");
    }

    #[test]
    fn test_winner_is_member_of_input() {
        let scores = [
            [55.0, 54.0, 10.0],
            [99.0, 98.0, 97.0],
            [10.0, 10.0, 10.0],
            [60.0, 20.0, 59.0],
        ];
        let strategies = ["minimal", "security-focused", "high-availability"];
        for row in scores {
            let list = ranked(
                row.iter()
                    .zip(strategies)
                    .map(|(s, name)| scored(name, 0.5, *s))
                    .collect(),
            );
            let sel = select_winner(&list, &SelectionPolicy::default()).expect("select");
            assert!(list.iter().any(|c| c.id() == sel.winner.id()));
        }
    }

    #[test]
    fn test_top_n_by_rank() {
        let list = ranked(vec![
            scored("a", 0.5, 10.0),
            scored("b", 0.5, 30.0),
            scored("c", 0.5, 20.0),
        ]);
        let top = select_top_n(&list, 2);
        let names: Vec<&str> = top.iter().map(|c| c.strategy()).collect();
        assert_eq!(names, vec!["b", "c"]);
        assert_eq!(select_top_n(&list, 10).len(), 3);
    }
}
