//! Domain models for Dockhand.
//!
//! Canonical definitions for the data flowing through a containerization run:
//! - `AnalysisResult`: what the repository analyzer found
//! - `Dockerfile`, `ManifestSet`, `Remediation`: artifact payloads
//! - `Vulnerability`, `ScanSummary`: scan findings

pub mod analysis;
pub mod artifact;
pub mod error;
pub mod security;

pub use analysis::{AnalysisResult, Environment};
pub use artifact::{
    ArtifactKind, Dockerfile, Manifest, ManifestSet, Remediation, RemediationAction, RiskLevel,
    Validate,
};
pub use error::{
    CollaboratorError, CollaboratorResult, ContentSourceError, SamplingError, SamplingResult,
};
pub use security::{ScanSummary, Severity, Vulnerability};
