//! Multi-candidate sampling.
//!
//! Generators produce candidates, scorers rank them and the selection engine
//! picks a deterministic winner. [`SamplingOrchestrator`] composes the three
//! and records a trace of each run.

pub mod candidate;
pub mod context;
pub mod generator;
pub mod orchestrator;
pub mod scorer;
pub mod selection;
pub mod trace;

pub use candidate::{
    Candidate, CandidateMetadata, CandidateSource, DockerfileCandidate, ManifestSetCandidate,
    RemediationCandidate, ScoreBreakdown, ScoredCandidate, SelectedArtifact,
};
pub use context::{ArtifactConstraints, GenerationContext};
pub use generator::{run_strategies, CandidateGenerator, GenerationProgress, ProgressFn};
pub use orchestrator::{
    SamplingConfig, SamplingOrchestrator, SamplingOutcome, ValidationConfig,
    DEFAULT_MAX_CANDIDATES,
};
pub use scorer::{rank_candidates, score_batch, weighted_score, CandidateScorer, ScoringWeights};
pub use selection::{
    default_strategy_preference, select_top_n, select_winner, Selection, SelectionPolicy,
    SelectionReason, EARLY_STOP_THRESHOLD, TIEBREAK_MARGIN,
};
pub use trace::{MemoryTraceSink, SamplingEvent, TraceSink, TracingTraceSink};
