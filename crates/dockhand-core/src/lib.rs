//! Dockhand Core Library
//!
//! Multi-candidate sampling for containerization artifacts: generate several
//! Dockerfiles, manifest sets or remediations, score them, and select one
//! winner deterministically.

pub mod collaborators;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod obs;
pub mod sampling;
pub mod strategies;
pub mod telemetry;

pub use collaborators::{
    BuildResult, ClusterDeployer, DeploymentResult, ImageBuilder, ImageScanner,
    RepositoryAnalyzer, ScanResult, VerificationResult,
};

pub use config::{ConfigError, DockhandConfig};

pub use domain::{
    AnalysisResult, ArtifactKind, CollaboratorError, CollaboratorResult, ContentSourceError,
    Dockerfile, Environment, Manifest, ManifestSet, Remediation, RemediationAction, RiskLevel,
    SamplingError, SamplingResult, ScanSummary, Severity, Validate, Vulnerability,
};

pub use sampling::{
    select_winner, ArtifactConstraints, Candidate, CandidateGenerator, CandidateScorer,
    CandidateSource, GenerationContext, SamplingConfig, SamplingOrchestrator, SamplingOutcome,
    ScoredCandidate, SelectedArtifact, SelectionPolicy, SelectionReason, ScoringWeights,
};

pub use strategies::{
    ContentSource, DockerfileGenerator, DockerfileScorer, ManifestGenerator, ManifestScorer,
    RemediationGenerator, RemediationScorer, TemplateContentSource,
};

pub use metrics::METRICS;

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
