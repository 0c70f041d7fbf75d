//! Interfaces of the external systems a containerization run drives.
//!
//! Analysis heuristics, the Docker client and the Kubernetes client live
//! outside this crate. Workflow steps only see these traits, so any backend
//! (real clients, dry-run fakes, test stubs) can be injected.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    AnalysisResult, CollaboratorResult, ManifestSet, ScanSummary, Vulnerability,
};

/// Result of an image build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub image_id: String,
    pub tags: Vec<String>,
    pub size_bytes: Option<u64>,
    pub build_time_ms: u64,
}

/// Result of an image scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub image_id: String,
    pub summary: ScanSummary,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Result of applying manifests to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub namespace: String,
    pub deployment_name: String,
    /// `Kind/name` of every applied resource.
    pub applied: Vec<String>,
    pub endpoint: Option<String>,
}

/// Result of checking a deployment's rollout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub ready: bool,
    pub replicas_ready: u32,
    pub replicas_desired: u32,
    pub message: String,
}

#[async_trait]
pub trait RepositoryAnalyzer: Send + Sync {
    async fn analyze(&self, repo_path: &Path) -> CollaboratorResult<AnalysisResult>;
}

#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(
        &self,
        dockerfile: &str,
        context: &Path,
        tags: &[String],
    ) -> CollaboratorResult<BuildResult>;
}

#[async_trait]
pub trait ImageScanner: Send + Sync {
    async fn scan(&self, image_id: &str) -> CollaboratorResult<ScanResult>;
}

#[async_trait]
pub trait ClusterDeployer: Send + Sync {
    async fn deploy(
        &self,
        manifests: &ManifestSet,
        namespace: &str,
    ) -> CollaboratorResult<DeploymentResult>;

    async fn verify(&self, deployment: &DeploymentResult)
        -> CollaboratorResult<VerificationResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_result_uses_camel_case_image_id() {
        let result = BuildResult {
            image_id: "sha256:abc".to_string(),
            tags: vec!["app:latest".to_string()],
            size_bytes: None,
            build_time_ms: 10,
        };
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["imageId"], "sha256:abc");
    }
}
