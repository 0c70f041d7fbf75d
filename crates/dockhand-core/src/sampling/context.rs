//! Immutable input handed to candidate generators.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisResult, Environment, SamplingError, SamplingResult, Vulnerability};

/// Artifact-specific requirements for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "artifact", rename_all = "snake_case")]
pub enum ArtifactConstraints {
    Dockerfile {
        environment: Environment,
        /// Force a base image instead of the language default.
        base_image: Option<String>,
    },
    Manifests {
        environment: Environment,
        app_name: String,
        namespace: String,
        image: String,
        replicas: u32,
        port: Option<u16>,
    },
    Remediation {
        vulnerabilities: Vec<Vulnerability>,
        dockerfile: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub session_id: String,
    pub repo_path: PathBuf,
    pub analysis: Option<AnalysisResult>,
    pub constraints: ArtifactConstraints,
}

impl GenerationContext {
    pub fn new(
        session_id: impl Into<String>,
        repo_path: impl Into<PathBuf>,
        constraints: ArtifactConstraints,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            repo_path: repo_path.into(),
            analysis: None,
            constraints,
        }
    }

    pub fn with_analysis(mut self, analysis: AnalysisResult) -> Self {
        self.analysis = Some(analysis);
        self
    }

    /// Analysis result or an `InvalidContext` error naming the caller.
    pub fn require_analysis(&self, needed_by: &str) -> SamplingResult<&AnalysisResult> {
        self.analysis.as_ref().ok_or_else(|| {
            SamplingError::InvalidContext(format!("{needed_by} requires an analysis result"))
        })
    }
}
