//! Sampling orchestrator: generate, validate, score, select.
//!
//! The orchestrator owns no generation or scoring logic. It composes a
//! [`CandidateGenerator`] and a [`CandidateScorer`] passed per call, runs the
//! selection engine over the ranked output and records every phase on a
//! [`TraceSink`].

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::{SamplingError, SamplingResult, Validate};
use crate::metrics::METRICS;
use crate::sampling::candidate::{Candidate, ScoredCandidate};
use crate::sampling::context::GenerationContext;
use crate::sampling::generator::CandidateGenerator;
use crate::sampling::scorer::{CandidateScorer, ScoringWeights};
use crate::sampling::selection::{select_top_n, select_winner, SelectionPolicy, SelectionReason};
use crate::sampling::trace::{self, SamplingEvent, TraceSink, TracingTraceSink};

/// Default number of candidates generated per sampling call.
pub const DEFAULT_MAX_CANDIDATES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    pub enabled: bool,
    /// Fail the call on the first invalid candidate instead of dropping it.
    pub fail_fast: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    pub max_candidates: usize,
    pub validation: ValidationConfig,
    pub selection: SelectionPolicy,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_candidates: DEFAULT_MAX_CANDIDATES,
            validation: ValidationConfig::default(),
            selection: SelectionPolicy::default(),
        }
    }
}

/// Winner plus everything that was scored alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingOutcome<T> {
    pub winner: ScoredCandidate<T>,
    pub reason: SelectionReason,
    /// All scored candidates, ordered by rank.
    pub candidates: Vec<ScoredCandidate<T>>,
}

pub struct SamplingOrchestrator {
    config: SamplingConfig,
    sink: Arc<dyn TraceSink>,
}

impl Default for SamplingOrchestrator {
    fn default() -> Self {
        Self::new(SamplingConfig::default())
    }
}

impl SamplingOrchestrator {
    pub fn new(config: SamplingConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingTraceSink),
        }
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &SamplingConfig {
        &self.config
    }

    /// Run a full sampling pass and return the winner.
    pub async fn sample<T>(
        &self,
        ctx: &GenerationContext,
        generator: &dyn CandidateGenerator<T>,
        scorer: &dyn CandidateScorer<T>,
        weights: &ScoringWeights,
    ) -> SamplingResult<ScoredCandidate<T>>
    where
        T: Validate + Clone + Send + Sync + 'static,
    {
        self.sample_detailed(ctx, generator, scorer, weights)
            .await
            .map(|outcome| outcome.winner)
    }

    /// Like [`sample`](Self::sample), also returning the selection reason
    /// and the full ranked field.
    pub async fn sample_detailed<T>(
        &self,
        ctx: &GenerationContext,
        generator: &dyn CandidateGenerator<T>,
        scorer: &dyn CandidateScorer<T>,
        weights: &ScoringWeights,
    ) -> SamplingResult<SamplingOutcome<T>>
    where
        T: Validate + Clone + Send + Sync + 'static,
    {
        let started = self.begin(ctx, "sample", generator.name(), scorer.name());
        let result: SamplingResult<SamplingOutcome<T>> = async {
            let candidates = self
                .generate_and_score(ctx, generator, scorer, weights, self.config.max_candidates)
                .await?;
            self.select(ctx, candidates)
        }
        .await;

        let summary = match &result {
            Ok(outcome) => json!({
                "winnerId": outcome.winner.id(),
                "score": outcome.winner.score,
                "reason": outcome.reason,
            }),
            Err(_) => json!({}),
        };
        self.finish(ctx, started, &result, summary);
        result
    }

    /// Generate `min(max_candidates, 2n)` candidates and return the first
    /// `n` by rank. No tie-break is applied.
    pub async fn sample_top_n<T>(
        &self,
        ctx: &GenerationContext,
        generator: &dyn CandidateGenerator<T>,
        scorer: &dyn CandidateScorer<T>,
        weights: &ScoringWeights,
        n: usize,
    ) -> SamplingResult<Vec<ScoredCandidate<T>>>
    where
        T: Validate + Clone + Send + Sync + 'static,
    {
        let started = self.begin(ctx, "top_n", generator.name(), scorer.name());
        let count = self.config.max_candidates.min(n.saturating_mul(2));
        let result: SamplingResult<Vec<ScoredCandidate<T>>> = async {
            let ranked = self
                .generate_and_score(ctx, generator, scorer, weights, count)
                .await?;
            Ok(select_top_n(&ranked, n))
        }
        .await;

        let summary = match &result {
            Ok(top) => json!({ "returned": top.len() }),
            Err(_) => json!({}),
        };
        self.finish(ctx, started, &result, summary);
        result
    }

    /// Single-candidate path: generate one, validate and score it.
    pub async fn generate_single<T>(
        &self,
        ctx: &GenerationContext,
        generator: &dyn CandidateGenerator<T>,
        scorer: &dyn CandidateScorer<T>,
        weights: &ScoringWeights,
    ) -> SamplingResult<ScoredCandidate<T>>
    where
        T: Validate + Clone + Send + Sync + 'static,
    {
        let started = self.begin(ctx, "single", generator.name(), scorer.name());
        let result: SamplingResult<ScoredCandidate<T>> = async {
            let ranked = self
                .generate_and_score(ctx, generator, scorer, weights, 1)
                .await?;
            ranked.into_iter().next().ok_or(SamplingError::NoCandidates)
        }
        .await;

        let summary = match &result {
            Ok(winner) => json!({ "winnerId": winner.id(), "score": winner.score }),
            Err(_) => json!({}),
        };
        self.finish(ctx, started, &result, summary);
        result
    }

    fn emit(&self, name: &str, ctx: &GenerationContext, data: serde_json::Value) {
        self.sink
            .record(SamplingEvent::new(name, &ctx.session_id, data));
    }

    fn begin(&self, ctx: &GenerationContext, mode: &str, generator: &str, scorer: &str) -> Instant {
        self.emit(
            trace::EVENT_START,
            ctx,
            json!({
                "mode": mode,
                "generator": generator,
                "scorer": scorer,
                "maxCandidates": self.config.max_candidates,
            }),
        );
        Instant::now()
    }

    fn finish<R>(
        &self,
        ctx: &GenerationContext,
        started: Instant,
        result: &SamplingResult<R>,
        mut summary: serde_json::Value,
    ) {
        METRICS.inc_samples_run();
        let duration_ms = started.elapsed().as_millis() as u64;
        if let Some(map) = summary.as_object_mut() {
            map.insert("success".to_string(), json!(result.is_ok()));
            map.insert("durationMs".to_string(), json!(duration_ms));
            if let Err(e) = result {
                map.insert("error".to_string(), json!(e.to_string()));
            }
        }
        self.emit(trace::EVENT_END, ctx, summary);
    }

    async fn generate_and_score<T>(
        &self,
        ctx: &GenerationContext,
        generator: &dyn CandidateGenerator<T>,
        scorer: &dyn CandidateScorer<T>,
        weights: &ScoringWeights,
        count: usize,
    ) -> SamplingResult<Vec<ScoredCandidate<T>>>
    where
        T: Validate + Clone + Send + Sync + 'static,
    {
        self.emit(
            trace::EVENT_GENERATION_START,
            ctx,
            json!({ "generator": generator.name(), "requested": count }),
        );
        let mut generated = generator.generate(ctx, count).await?;
        if generated.len() > count {
            warn!(
                generator = generator.name(),
                requested = count,
                produced = generated.len(),
                "generator exceeded requested count; truncating"
            );
            generated.truncate(count);
        }
        for candidate in &generated {
            self.emit(
                trace::EVENT_CANDIDATE_CREATED,
                ctx,
                json!({
                    "candidateId": candidate.id,
                    "strategy": candidate.strategy(),
                    "confidence": candidate.confidence(),
                }),
            );
        }
        self.emit(
            trace::EVENT_GENERATION_END,
            ctx,
            json!({ "generator": generator.name(), "count": generated.len() }),
        );

        if generated.is_empty() {
            return Err(SamplingError::GenerationFailure {
                generator: generator.name().to_string(),
                reason: "no candidates produced".to_string(),
            });
        }

        let candidates = self.validate(generated)?;

        let weights = if weights.is_empty() {
            scorer.default_weights()
        } else {
            weights.clone()
        };

        self.emit(
            trace::EVENT_SCORING_START,
            ctx,
            json!({ "scorer": scorer.name(), "count": candidates.len() }),
        );
        let scored = scorer.score(candidates, &weights).await?;
        for candidate in &scored {
            self.emit(
                trace::EVENT_CANDIDATE_SCORED,
                ctx,
                json!({
                    "candidateId": candidate.id(),
                    "score": candidate.score,
                    "rank": candidate.rank,
                    "breakdown": candidate.score_breakdown,
                }),
            );
        }
        self.emit(
            trace::EVENT_SCORING_END,
            ctx,
            json!({
                "scorer": scorer.name(),
                "count": scored.len(),
                "topScore": scored.first().map(|c| c.score),
            }),
        );

        Ok(scored)
    }

    fn validate<T: Validate>(&self, candidates: Vec<Candidate<T>>) -> SamplingResult<Vec<Candidate<T>>> {
        if !self.config.validation.enabled {
            return Ok(candidates);
        }

        let total = candidates.len();
        let mut valid = Vec::with_capacity(total);
        for candidate in candidates {
            let issues = candidate.content.validate();
            if issues.is_empty() {
                valid.push(candidate);
                continue;
            }
            let joined = issues.join("; ");
            if self.config.validation.fail_fast {
                return Err(SamplingError::ValidationFailure(format!(
                    "{}: {joined}",
                    candidate.id
                )));
            }
            warn!(candidate_id = %candidate.id, issues = %joined, "dropping invalid candidate");
        }

        if valid.is_empty() {
            return Err(SamplingError::ValidationFailure(format!(
                "all {total} candidates failed validation"
            )));
        }
        debug!(valid = valid.len(), total, "candidates validated");
        Ok(valid)
    }

    fn select<T: Clone>(
        &self,
        ctx: &GenerationContext,
        candidates: Vec<ScoredCandidate<T>>,
    ) -> SamplingResult<SamplingOutcome<T>> {
        let selection = select_winner(&candidates, &self.config.selection)?;
        let winner = selection.winner.clone();
        let reason = selection.reason;

        if reason == SelectionReason::EarlyStop {
            METRICS.inc_early_stops();
            self.emit(
                trace::EVENT_EARLY_STOP,
                ctx,
                json!({
                    "candidateId": winner.id(),
                    "score": winner.score,
                    "threshold": self.config.selection.early_stop_threshold,
                }),
            );
        } else {
            if reason.is_tiebreak() {
                METRICS.inc_tiebreaks();
            }
            self.emit(
                trace::EVENT_WINNER_SELECTED,
                ctx,
                json!({
                    "candidateId": winner.id(),
                    "score": winner.score,
                    "reason": reason,
                    "strategy": winner.strategy(),
                }),
            );
        }

        let mut ranked = candidates;
        ranked.sort_by_key(|c| c.rank);
        Ok(SamplingOutcome {
            winner,
            reason,
            candidates: ranked,
        })
    }
}
