//! Kubernetes manifest candidates.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    ArtifactKind, ContentSourceError, ManifestSet, SamplingError, SamplingResult,
};
use crate::sampling::{
    run_strategies, ArtifactConstraints, Candidate, CandidateGenerator, CandidateScorer,
    GenerationContext, ProgressFn, ScoreBreakdown, ScoringWeights,
};
use crate::strategies::content_source::{ContentRequest, ContentSource};

pub const PRODUCTION_READY: &str = "production-ready";
pub const MINIMAL: &str = "minimal";
pub const HIGH_AVAILABILITY: &str = "high-availability";

const STRATEGIES: &[&str] = &[PRODUCTION_READY, MINIMAL, HIGH_AVAILABILITY];

fn confidence(strategy: &str) -> f64 {
    match strategy {
        PRODUCTION_READY => 0.9,
        HIGH_AVAILABILITY => 0.8,
        _ => 0.7,
    }
}

pub struct ManifestGenerator {
    source: Arc<dyn ContentSource>,
    progress: Option<ProgressFn>,
}

impl ManifestGenerator {
    pub fn new(source: Arc<dyn ContentSource>) -> Self {
        Self {
            source,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

#[async_trait]
impl CandidateGenerator<ManifestSet> for ManifestGenerator {
    fn name(&self) -> &str {
        "k8s-manifests"
    }

    fn strategies(&self) -> Vec<String> {
        STRATEGIES.iter().map(|s| s.to_string()).collect()
    }

    async fn generate(
        &self,
        ctx: &GenerationContext,
        count: usize,
    ) -> SamplingResult<Vec<Candidate<ManifestSet>>> {
        let ArtifactConstraints::Manifests {
            environment,
            app_name,
            namespace,
            image,
            replicas,
            port,
        } = &ctx.constraints
        else {
            return Err(SamplingError::InvalidContext(
                "manifest generator needs manifest constraints".to_string(),
            ));
        };
        if image.trim().is_empty() {
            return Err(SamplingError::InvalidContext(
                "manifest generator needs an image reference".to_string(),
            ));
        }
        let port = port.or_else(|| ctx.analysis.as_ref().and_then(|a| a.primary_port()));

        run_strategies(self.name(), STRATEGIES, count, self.progress.as_ref(), |strategy| {
            let mut request =
                ContentRequest::new(ArtifactKind::ManifestSet, *strategy, &ctx.session_id)
                    .with_analysis(ctx.analysis.clone())
                    .param("environment", environment.as_str())
                    .param("appName", app_name.as_str())
                    .param("namespace", namespace.as_str())
                    .param("image", image.as_str())
                    .param("replicas", *replicas);
            if let Some(port) = port {
                request = request.param("port", port);
            }
            let source = Arc::clone(&self.source);
            let strategy = *strategy;
            let namespace = namespace.clone();
            async move {
                let text = source.complete(&request).await?;
                let set = ManifestSet::from_yaml_stream(namespace, &text);
                if set.manifests.is_empty() {
                    return Err(SamplingError::from(ContentSourceError::Empty {
                        strategy: strategy.to_string(),
                    }));
                }
                Ok::<_, SamplingError>(Some(Candidate::new(
                    strategy,
                    source.origin(),
                    confidence(strategy),
                    set,
                )))
            }
        })
        .await
    }
}

/// Text heuristics over a manifest set.
///
/// Breakdown keys: `completeness`, `security`, `reliability`,
/// `resource_management`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestScorer;

impl ManifestScorer {
    pub fn new() -> Self {
        Self
    }
}

fn workload_yaml(set: &ManifestSet) -> Option<&str> {
    set.find("Deployment")
        .or_else(|| set.find("StatefulSet"))
        .map(|m| m.yaml.as_str())
}

fn replicas(yaml: &str) -> u64 {
    yaml.lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("replicas:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1)
}

fn completeness(set: &ManifestSet) -> f64 {
    let mut s: f64 = 0.0;
    if workload_yaml(set).is_some() {
        s += 40.0;
    }
    if set.find("Service").is_some() {
        s += 30.0;
    }
    let extras = ["ConfigMap", "PodDisruptionBudget", "HorizontalPodAutoscaler", "NetworkPolicy"]
        .iter()
        .filter(|k| set.find(k).is_some())
        .count();
    s += (extras as f64 * 10.0).min(30.0);
    s
}

fn security(workload: &str) -> f64 {
    let mut s: f64 = 40.0;
    if workload.contains("runAsNonRoot: true") {
        s += 20.0;
    }
    if workload.contains("readOnlyRootFilesystem: true") {
        s += 15.0;
    }
    if workload.contains("allowPrivilegeEscalation: false") {
        s += 15.0;
    }
    let latest = workload
        .lines()
        .map(|l| l.trim().trim_start_matches("- "))
        .filter_map(|l| l.strip_prefix("image:"))
        .any(|img| {
            let img = img.trim();
            img.ends_with(":latest") || !img.rsplit('/').next().unwrap_or(img).contains(':')
        });
    if !latest {
        s += 10.0;
    }
    if workload.contains("privileged: true") {
        s -= 40.0;
    }
    s.clamp(0.0, 100.0)
}

fn reliability(set: &ManifestSet, workload: &str) -> f64 {
    let mut s: f64 = 30.0;
    if workload.contains("readinessProbe:") {
        s += 20.0;
    }
    if workload.contains("livenessProbe:") {
        s += 20.0;
    }
    if replicas(workload) >= 2 {
        s += 15.0;
    }
    if set.find("PodDisruptionBudget").is_some() {
        s += 15.0;
    }
    s
}

fn resource_management(set: &ManifestSet, workload: &str) -> f64 {
    let mut s: f64 = 0.0;
    if workload.contains("requests:") {
        s += 40.0;
    }
    if workload.contains("limits:") {
        s += 40.0;
    }
    if set.find("HorizontalPodAutoscaler").is_some() {
        s += 20.0;
    }
    s
}

#[async_trait]
impl CandidateScorer<ManifestSet> for ManifestScorer {
    fn name(&self) -> &str {
        "k8s-manifests"
    }

    fn default_weights(&self) -> ScoringWeights {
        ScoringWeights::new()
            .with("completeness", 0.25)
            .with("security", 0.3)
            .with("reliability", 0.25)
            .with("resource_management", 0.2)
    }

    fn breakdown(&self, candidate: &Candidate<ManifestSet>) -> SamplingResult<ScoreBreakdown> {
        let set = &candidate.content;
        let workload = workload_yaml(set).ok_or_else(|| SamplingError::ScoringFailure {
            scorer: self.name().to_string(),
            reason: format!("{} has no workload manifest", candidate.id),
        })?;
        let mut b = ScoreBreakdown::new();
        b.insert("completeness".to_string(), completeness(set));
        b.insert("security".to_string(), security(workload));
        b.insert("reliability".to_string(), reliability(set, workload));
        b.insert("resource_management".to_string(), resource_management(set, workload));
        Ok(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Environment;
    use crate::sampling::{rank_candidates, score_batch};
    use crate::strategies::content_source::TemplateContentSource;

    fn ctx(image: &str) -> GenerationContext {
        GenerationContext::new(
            "s1",
            "/repo",
            ArtifactConstraints::Manifests {
                environment: Environment::Production,
                app_name: "web".to_string(),
                namespace: "apps".to_string(),
                image: image.to_string(),
                replicas: 1,
                port: Some(5000),
            },
        )
    }

    #[tokio::test]
    async fn test_generates_all_strategies() {
        let gen = ManifestGenerator::new(Arc::new(TemplateContentSource));
        let out = gen.generate(&ctx("web:1.0.0"), 5).await.expect("generate");
        let names: Vec<&str> = out.iter().map(|c| c.strategy()).collect();
        assert_eq!(names, vec![PRODUCTION_READY, MINIMAL, HIGH_AVAILABILITY]);
        assert!(out.iter().all(|c| c.content.namespace == "apps"));
    }

    #[tokio::test]
    async fn test_empty_image_is_invalid_context() {
        let gen = ManifestGenerator::new(Arc::new(TemplateContentSource));
        let err = gen.generate(&ctx(" "), 1).await.unwrap_err();
        assert!(matches!(err, SamplingError::InvalidContext(_)));
    }

    #[tokio::test]
    async fn test_high_availability_ranks_above_minimal() {
        let gen = ManifestGenerator::new(Arc::new(TemplateContentSource));
        let out = gen.generate(&ctx("web:1.0.0"), 3).await.expect("generate");
        let scorer = ManifestScorer;
        let scored = rank_candidates(
            score_batch(scorer.name(), out, &scorer.default_weights(), |c| scorer.breakdown(c))
                .expect("score"),
        );
        assert_eq!(scored[0].strategy(), HIGH_AVAILABILITY);
        assert_eq!(scored.last().map(|c| c.strategy()), Some(MINIMAL));
    }

    #[test]
    fn test_untagged_image_loses_security_points() {
        let tagged = security("containers:\n  - image: web:1.2.3\n");
        let untagged = security("containers:\n  - image: web\n");
        let registry_port = security("containers:\n  - image: registry:5000/web\n");
        assert!(tagged > untagged);
        assert_eq!(untagged, registry_port);
    }

    #[test]
    fn test_security_score_stays_in_range() {
        let hardened = "runAsNonRoot: true\nreadOnlyRootFilesystem: true\n\
                        allowPrivilegeEscalation: false\ncontainers:\n  - image: web:1.2.3\n";
        assert_eq!(security(hardened), 100.0);
        let privileged = "privileged: true\ncontainers:\n  - image: web\n";
        assert_eq!(security(privileged), 0.0);
    }

    #[test]
    fn test_missing_workload_fails() {
        let set = ManifestSet::from_yaml_stream("ns", "kind: Service\nmetadata:\n  name: s\n");
        let c = Candidate::new("minimal", crate::sampling::CandidateSource::Template, 0.7, set);
        assert!(ManifestScorer.breakdown(&c).is_err());
    }
}
