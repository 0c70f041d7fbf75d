//! The standard containerization pipeline.
//!
//! analyze → generate Dockerfile → build → scan → remediate → generate
//! manifests → deploy → verify. Scan, remediation, deploy and verification
//! are included according to [`WorkflowParams`]. Artifact-generation steps go
//! through the [`SamplingOrchestrator`].

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use dockhand_core::sampling::SelectionReason;
use dockhand_core::{
    AnalysisResult, ArtifactConstraints, CandidateGenerator, CandidateScorer, ClusterDeployer,
    ContentSource, DeploymentResult, DockerfileGenerator, DockerfileScorer, GenerationContext,
    ImageBuilder, ImageScanner, ManifestGenerator, ManifestScorer, ManifestSet,
    RemediationGenerator, RemediationScorer, RepositoryAnalyzer, SamplingOrchestrator,
    SamplingResult, ScanResult, ScoredCandidate, ScoringWeights, TemplateContentSource, Validate,
};
use dockhand_session::SessionStatus;
use serde_json::{json, Value};

use crate::abort::AbortSignal;
use crate::dry_run::{DryRunAnalyzer, DryRunBuilder, DryRunDeployer, DryRunScanner};
use crate::orchestrator::{WorkflowOrchestrator, WorkflowResult};
use crate::params::WorkflowParams;
use crate::step::{StepContext, StepDefinition, StepHandler};

pub const WORKFLOW_NAME: &str = "containerize";

pub const ANALYZE_REPOSITORY: &str = "analyze-repository";
pub const GENERATE_DOCKERFILE: &str = "generate-dockerfile";
pub const BUILD_IMAGE: &str = "build-image";
pub const SCAN_IMAGE: &str = "scan-image";
pub const REMEDIATE_VULNERABILITIES: &str = "remediate-vulnerabilities";
pub const GENERATE_K8S_MANIFESTS: &str = "generate-k8s-manifests";
pub const DEPLOY: &str = "deploy";
pub const VERIFY_DEPLOYMENT: &str = "verify-deployment";

/// Session `workflow_state` keys written by the pipeline.
pub mod state_keys {
    pub const ANALYSIS_RESULT: &str = "analysis_result";
    pub const DOCKERFILE_RESULT: &str = "dockerfile_result";
    pub const BUILD_RESULT: &str = "build_result";
    pub const SCAN_RESULT: &str = "scan_result";
    pub const REMEDIATION_RESULT: &str = "remediation_result";
    pub const K8S_RESULT: &str = "k8s_result";
    pub const DEPLOYMENT_RESULT: &str = "deployment_result";
    pub const VERIFICATION_RESULT: &str = "verification_result";
}

use state_keys::*;

/// External systems the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn RepositoryAnalyzer>,
    pub builder: Arc<dyn ImageBuilder>,
    pub scanner: Arc<dyn ImageScanner>,
    pub deployer: Arc<dyn ClusterDeployer>,
    pub content: Arc<dyn ContentSource>,
}

impl Collaborators {
    /// Deterministic in-process collaborators with template content.
    pub fn dry_run() -> Self {
        Self {
            analyzer: Arc::new(DryRunAnalyzer::new()),
            builder: Arc::new(DryRunBuilder::new()),
            scanner: Arc::new(DryRunScanner::new()),
            deployer: Arc::new(DryRunDeployer::new()),
            content: Arc::new(TemplateContentSource::new()),
        }
    }
}

pub struct ContainerizationPipeline {
    collaborators: Collaborators,
    sampler: Arc<SamplingOrchestrator>,
}

impl ContainerizationPipeline {
    pub fn new(collaborators: Collaborators, sampler: SamplingOrchestrator) -> Self {
        Self {
            collaborators,
            sampler: Arc::new(sampler),
        }
    }

    /// Step definitions for `params`, in execution order.
    pub fn steps(&self, params: &WorkflowParams) -> Vec<StepDefinition> {
        let c = &self.collaborators;
        let mut steps = vec![
            StepDefinition::required(
                ANALYZE_REPOSITORY,
                "Repository analysis",
                Arc::new(AnalyzeStep {
                    analyzer: Arc::clone(&c.analyzer),
                }),
            )
            .with_state_key(ANALYSIS_RESULT)
            .with_session_status(SessionStatus::Analyzing),
            StepDefinition::required(
                GENERATE_DOCKERFILE,
                "Dockerfile generation",
                Arc::new(GenerateDockerfileStep {
                    content: Arc::clone(&c.content),
                    sampler: Arc::clone(&self.sampler),
                }),
            )
            .with_state_key(DOCKERFILE_RESULT)
            .with_session_status(SessionStatus::Active),
            StepDefinition::required(
                BUILD_IMAGE,
                "Build",
                Arc::new(BuildStep {
                    builder: Arc::clone(&c.builder),
                }),
            )
            .with_state_key(BUILD_RESULT),
        ];

        if params.scan {
            steps.push(
                StepDefinition::soft_fail(
                    SCAN_IMAGE,
                    "Security scan",
                    Arc::new(ScanStep {
                        scanner: Arc::clone(&c.scanner),
                    }),
                )
                .with_state_key(SCAN_RESULT),
            );
            if params.remediate {
                steps.push(
                    StepDefinition::soft_fail(
                        REMEDIATE_VULNERABILITIES,
                        "Remediation",
                        Arc::new(RemediateStep {
                            sampler: Arc::clone(&self.sampler),
                        }),
                    )
                    .with_state_key(REMEDIATION_RESULT),
                );
            }
        }

        steps.push(
            StepDefinition::required(
                GENERATE_K8S_MANIFESTS,
                "Manifest generation",
                Arc::new(GenerateManifestsStep {
                    content: Arc::clone(&c.content),
                    sampler: Arc::clone(&self.sampler),
                }),
            )
            .with_state_key(K8S_RESULT),
        );

        if params.deploy {
            steps.push(
                StepDefinition::required(
                    DEPLOY,
                    "Deployment",
                    Arc::new(DeployStep {
                        deployer: Arc::clone(&c.deployer),
                    }),
                )
                .with_state_key(DEPLOYMENT_RESULT),
            );
            if params.verify {
                steps.push(
                    StepDefinition::soft_fail(
                        VERIFY_DEPLOYMENT,
                        "Deployment verification",
                        Arc::new(VerifyStep {
                            deployer: Arc::clone(&c.deployer),
                        }),
                    )
                    .with_state_key(VERIFICATION_RESULT),
                );
            }
        }

        steps
    }

    pub async fn run(
        &self,
        orchestrator: &WorkflowOrchestrator,
        params: &WorkflowParams,
        abort: &AbortSignal,
    ) -> WorkflowResult {
        orchestrator.run(params, &self.steps(params), abort).await
    }
}

/// A sampled (or single-path) artifact plus how it was chosen.
struct Choice<T> {
    winner: ScoredCandidate<T>,
    reason: Option<SelectionReason>,
    considered: usize,
}

impl<T> Choice<T> {
    fn summary(&self) -> Value {
        json!({
            "candidateId": self.winner.id(),
            "strategy": self.winner.strategy(),
            "score": self.winner.score,
            "scoreBreakdown": self.winner.score_breakdown,
            "reason": self.reason,
            "candidatesConsidered": self.considered,
        })
    }
}

async fn choose<T>(
    sampler: &SamplingOrchestrator,
    params: &WorkflowParams,
    ctx: &GenerationContext,
    generator: &dyn CandidateGenerator<T>,
    scorer: &dyn CandidateScorer<T>,
) -> SamplingResult<Choice<T>>
where
    T: Validate + Clone + Send + Sync + 'static,
{
    let weights = ScoringWeights::new();
    if params.sampling {
        let outcome = sampler.sample_detailed(ctx, generator, scorer, &weights).await?;
        Ok(Choice {
            considered: outcome.candidates.len(),
            reason: Some(outcome.reason),
            winner: outcome.winner,
        })
    } else {
        let winner = sampler.generate_single(ctx, generator, scorer, &weights).await?;
        Ok(Choice {
            winner,
            reason: None,
            considered: 1,
        })
    }
}

fn read_analysis(ctx: &StepContext) -> anyhow::Result<AnalysisResult> {
    let value = ctx.require_state(ANALYSIS_RESULT)?;
    serde_json::from_value(value).context("malformed analysis_result")
}

fn read_dockerfile(ctx: &StepContext) -> anyhow::Result<String> {
    let result = ctx.require_state(DOCKERFILE_RESULT)?;
    result["dockerfile"]
        .as_str()
        .map(str::to_string)
        .context("dockerfile_result has no dockerfile")
}

struct AnalyzeStep {
    analyzer: Arc<dyn RepositoryAnalyzer>,
}

#[async_trait]
impl StepHandler for AnalyzeStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let analysis = self.analyzer.analyze(&ctx.params.repo_path).await?;
        Ok(serde_json::to_value(analysis)?)
    }
}

struct GenerateDockerfileStep {
    content: Arc<dyn ContentSource>,
    sampler: Arc<SamplingOrchestrator>,
}

#[async_trait]
impl StepHandler for GenerateDockerfileStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let analysis = read_analysis(ctx)?;
        let gen_ctx = GenerationContext::new(
            ctx.session_id.as_str(),
            ctx.params.repo_path.clone(),
            ArtifactConstraints::Dockerfile {
                environment: ctx.params.environment,
                base_image: ctx.params.base_image.clone(),
            },
        )
        .with_analysis(analysis);
        let generator = DockerfileGenerator::new(Arc::clone(&self.content));

        let choice = choose(&self.sampler, &ctx.params, &gen_ctx, &generator, &DockerfileScorer::new()).await?;
        let mut out = choice.summary();
        out["dockerfile"] = json!(choice.winner.content().content);
        out["baseImage"] = json!(choice.winner.content().base_image);
        Ok(out)
    }
}

struct BuildStep {
    builder: Arc<dyn ImageBuilder>,
}

#[async_trait]
impl StepHandler for BuildStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let dockerfile = read_dockerfile(ctx)?;
        let tags = vec![ctx.params.image_ref()];
        let build = self
            .builder
            .build(&dockerfile, &ctx.params.repo_path, &tags)
            .await?;
        Ok(serde_json::to_value(build)?)
    }
}

struct ScanStep {
    scanner: Arc<dyn ImageScanner>,
}

#[async_trait]
impl StepHandler for ScanStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let build = ctx.require_state(BUILD_RESULT)?;
        let image_id = build["imageId"]
            .as_str()
            .context("build_result has no imageId")?;
        let scan = self.scanner.scan(image_id).await?;
        Ok(serde_json::to_value(scan)?)
    }
}

struct RemediateStep {
    sampler: Arc<SamplingOrchestrator>,
}

#[async_trait]
impl StepHandler for RemediateStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let scan: ScanResult = match ctx.session_state(SCAN_RESULT)? {
            Some(value) => serde_json::from_value(value).context("malformed scan_result")?,
            None => return Ok(json!({ "skipped": true, "reason": "no scan result" })),
        };
        if scan.vulnerabilities.is_empty() {
            return Ok(json!({ "skipped": true, "reason": "no vulnerabilities" }));
        }

        let mut gen_ctx = GenerationContext::new(
            ctx.session_id.as_str(),
            ctx.params.repo_path.clone(),
            ArtifactConstraints::Remediation {
                vulnerabilities: scan.vulnerabilities,
                dockerfile: read_dockerfile(ctx)?,
            },
        );
        if let Ok(analysis) = read_analysis(ctx) {
            gen_ctx = gen_ctx.with_analysis(analysis);
        }

        let choice = choose(
            &self.sampler,
            &ctx.params,
            &gen_ctx,
            &RemediationGenerator::new(),
            &RemediationScorer::new(),
        )
        .await?;
        let mut out = choice.summary();
        out["remediation"] = serde_json::to_value(choice.winner.content())?;
        Ok(out)
    }
}

struct GenerateManifestsStep {
    content: Arc<dyn ContentSource>,
    sampler: Arc<SamplingOrchestrator>,
}

#[async_trait]
impl StepHandler for GenerateManifestsStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let analysis = read_analysis(ctx)?;
        let image = ctx
            .session_state(BUILD_RESULT)?
            .and_then(|build| build["tags"][0].as_str().map(str::to_string))
            .unwrap_or_else(|| ctx.params.image_ref());
        let port = analysis.primary_port();
        let gen_ctx = GenerationContext::new(
            ctx.session_id.as_str(),
            ctx.params.repo_path.clone(),
            ArtifactConstraints::Manifests {
                environment: ctx.params.environment,
                app_name: ctx.params.app_name(),
                namespace: ctx.params.namespace.clone(),
                image,
                replicas: ctx.params.replicas,
                port,
            },
        )
        .with_analysis(analysis);
        let generator = ManifestGenerator::new(Arc::clone(&self.content));

        let choice = choose(&self.sampler, &ctx.params, &gen_ctx, &generator, &ManifestScorer::new()).await?;
        let set = choice.winner.content();
        let mut out = choice.summary();
        out["kinds"] = json!(set.kinds());
        out["manifests"] = json!(set.to_yaml());
        out["manifestSet"] = serde_json::to_value(set)?;
        Ok(out)
    }
}

struct DeployStep {
    deployer: Arc<dyn ClusterDeployer>,
}

#[async_trait]
impl StepHandler for DeployStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let k8s = ctx.require_state(K8S_RESULT)?;
        let set: ManifestSet = serde_json::from_value(k8s["manifestSet"].clone())
            .context("k8s_result has no manifestSet")?;
        let deployment = self.deployer.deploy(&set, &ctx.params.namespace).await?;
        Ok(serde_json::to_value(deployment)?)
    }
}

struct VerifyStep {
    deployer: Arc<dyn ClusterDeployer>,
}

#[async_trait]
impl StepHandler for VerifyStep {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        let deployment: DeploymentResult =
            serde_json::from_value(ctx.require_state(DEPLOYMENT_RESULT)?)
                .context("malformed deployment_result")?;
        let verification = self.deployer.verify(&deployment).await?;
        if !verification.ready {
            anyhow::bail!(
                "{}/{} replicas ready: {}",
                verification.replicas_ready,
                verification.replicas_desired,
                verification.message
            );
        }
        Ok(serde_json::to_value(verification)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(steps: &[StepDefinition]) -> Vec<&str> {
        steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_full_step_list() {
        let pipeline = ContainerizationPipeline::new(Collaborators::dry_run(), SamplingOrchestrator::default());
        let steps = pipeline.steps(&WorkflowParams::new("/repo"));
        assert_eq!(
            names(&steps),
            vec![
                ANALYZE_REPOSITORY,
                GENERATE_DOCKERFILE,
                BUILD_IMAGE,
                SCAN_IMAGE,
                REMEDIATE_VULNERABILITIES,
                GENERATE_K8S_MANIFESTS,
                DEPLOY,
                VERIFY_DEPLOYMENT,
            ]
        );
        let soft: Vec<&str> = steps
            .iter()
            .filter(|s| s.is_soft_fail())
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(soft, vec![SCAN_IMAGE, REMEDIATE_VULNERABILITIES, VERIFY_DEPLOYMENT]);
    }

    #[test]
    fn test_params_trim_optional_steps() {
        let pipeline = ContainerizationPipeline::new(Collaborators::dry_run(), SamplingOrchestrator::default());
        let mut params = WorkflowParams::new("/repo");
        params.scan = false;
        params.deploy = false;
        assert_eq!(
            names(&pipeline.steps(&params)),
            vec![ANALYZE_REPOSITORY, GENERATE_DOCKERFILE, BUILD_IMAGE, GENERATE_K8S_MANIFESTS]
        );

        params.scan = true;
        params.remediate = false;
        params.deploy = true;
        params.verify = false;
        assert_eq!(
            names(&pipeline.steps(&params)),
            vec![
                ANALYZE_REPOSITORY,
                GENERATE_DOCKERFILE,
                BUILD_IMAGE,
                SCAN_IMAGE,
                GENERATE_K8S_MANIFESTS,
                DEPLOY,
            ]
        );
    }

    #[test]
    fn test_single_path_summary_has_no_reason() {
        use dockhand_core::{Candidate, CandidateSource, Dockerfile};

        let choice = Choice {
            winner: ScoredCandidate {
                candidate: Candidate::new(
                    "multi-stage",
                    CandidateSource::Template,
                    0.85,
                    Dockerfile::from_content("FROM alpine\nCMD [\"sh\"]"),
                ),
                score: 72.5,
                score_breakdown: Default::default(),
                rank: 1,
            },
            reason: None,
            considered: 1,
        };
        let summary = choice.summary();
        assert_eq!(summary["strategy"], "multi-stage");
        assert!(summary["reason"].is_null());
        assert_eq!(summary["candidatesConsidered"], 1);
    }
}
