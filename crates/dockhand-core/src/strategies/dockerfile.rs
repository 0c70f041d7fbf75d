//! Dockerfile candidates: generation strategies and heuristic scoring.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use crate::domain::{ArtifactKind, ContentSourceError, Dockerfile, SamplingError, SamplingResult};
use crate::sampling::{
    run_strategies, ArtifactConstraints, Candidate, CandidateGenerator, CandidateScorer,
    GenerationContext, ProgressFn, ScoreBreakdown, ScoringWeights,
};
use crate::strategies::content_source::{ContentRequest, ContentSource};

pub const SECURITY_FOCUSED: &str = "security-focused";
pub const PERFORMANCE_OPTIMIZED: &str = "performance-optimized";
pub const SIZE_OPTIMIZED: &str = "size-optimized";
pub const MULTI_STAGE: &str = "multi-stage";

/// Strategies in attempt order.
const STRATEGIES: &[&str] = &[SECURITY_FOCUSED, PERFORMANCE_OPTIMIZED, SIZE_OPTIMIZED, MULTI_STAGE];

fn confidence(strategy: &str) -> f64 {
    match strategy {
        SECURITY_FOCUSED => 0.9,
        MULTI_STAGE => 0.85,
        _ => 0.8,
    }
}

pub struct DockerfileGenerator {
    source: Arc<dyn ContentSource>,
    progress: Option<ProgressFn>,
}

impl DockerfileGenerator {
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
impl CandidateGenerator<Dockerfile> for DockerfileGenerator {
    fn name(&self) -> &str {
        "dockerfile"
    }

    fn strategies(&self) -> Vec<String> {
        STRATEGIES.iter().map(|s| s.to_string()).collect()
    }

    async fn generate(
        &self,
        ctx: &GenerationContext,
        count: usize,
    ) -> SamplingResult<Vec<Candidate<Dockerfile>>> {
        let (environment, base_image) = match &ctx.constraints {
            ArtifactConstraints::Dockerfile {
                environment,
                base_image,
            } => (*environment, base_image.clone()),
            _ => {
                return Err(SamplingError::InvalidContext(
                    "dockerfile generator needs dockerfile constraints".to_string(),
                ))
            }
        };
        let analysis = ctx.require_analysis(self.name())?;

        run_strategies(
            self.name(),
            STRATEGIES,
            count,
            self.progress.as_ref(),
            |strategy| {
                let mut request = ContentRequest::new(ArtifactKind::Dockerfile, *strategy, &ctx.session_id)
                    .with_analysis(Some(analysis.clone()))
                    .param("environment", environment.as_str());
                if let Some(image) = &base_image {
                    request = request.param("baseImage", image.as_str());
                }
                if let Some(port) = analysis.primary_port() {
                    request = request.param("port", port);
                }
                let source = Arc::clone(&self.source);
                let strategy = *strategy;
                async move {
                    let text = source.complete(&request).await?;
                    if text.trim().is_empty() {
                        return Err(SamplingError::from(ContentSourceError::Empty {
                            strategy: strategy.to_string(),
                        }));
                    }
                    Ok::<_, SamplingError>(Some(Candidate::new(
                        strategy,
                        source.origin(),
                        confidence(strategy),
                        Dockerfile::from_content(text),
                    )))
                }
            },
        )
        .await
    }
}

fn pinned_from() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^FROM\s+(?:--platform=\S+\s+)?([^\s:@]+(?::\d+/[^\s:@]+)?)(?::([\w.\-]+))?(@sha256:[0-9a-f]+)?(?:\s+AS\s+\S+)?$",
        )
        .ok()
    })
    .as_ref()
}

fn secret_env() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(ENV|ARG)\s+\S*(PASSWORD|SECRET|TOKEN|API_KEY)\S*[ =]\S+").ok()
    })
    .as_ref()
}

/// Text heuristics over a Dockerfile.
///
/// Breakdown keys: `security`, `efficiency`, `size`, `best_practices`,
/// `maintainability`, each 0–100.
#[derive(Debug, Default, Clone, Copy)]
pub struct DockerfileScorer;

impl DockerfileScorer {
    pub fn new() -> Self {
        Self
    }
}

struct Facts<'a> {
    instructions: Vec<&'a str>,
    upper: Vec<String>,
    df: &'a Dockerfile,
}

impl<'a> Facts<'a> {
    fn new(df: &'a Dockerfile) -> Self {
        let instructions: Vec<&str> = df.instructions().collect();
        let upper = instructions.iter().map(|l| l.to_ascii_uppercase()).collect();
        Self {
            instructions,
            upper,
            df,
        }
    }

    fn has(&self, keyword: &str) -> bool {
        self.upper.iter().any(|l| l.starts_with(keyword))
    }

    fn count(&self, keyword: &str) -> usize {
        self.upper.iter().filter(|l| l.starts_with(keyword)).count()
    }

    fn any_contains(&self, needle: &str) -> bool {
        self.instructions.iter().any(|l| l.contains(needle))
    }

    fn final_user_is_root(&self) -> bool {
        match self.upper.iter().rev().find(|l| l.starts_with("USER ")) {
            Some(line) => {
                let user = line.trim_start_matches("USER ").trim();
                user == "ROOT" || user == "0" || user.starts_with("0:") || user.starts_with("ROOT:")
            }
            None => true,
        }
    }

    /// FROM lines whose tag is missing or `latest`.
    fn unpinned_bases(&self) -> usize {
        let Some(re) = pinned_from() else {
            return 0;
        };
        self.instructions
            .iter()
            .filter_map(|l| re.captures(l))
            .filter(|caps| {
                let image = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let tag = caps.get(2).map(|m| m.as_str());
                let digest = caps.get(3).is_some();
                image != "scratch" && !digest && matches!(tag, None | Some("latest"))
            })
            .count()
    }

    fn base(&self) -> String {
        self.df.base_image.to_ascii_lowercase()
    }

    /// Dependency manifest copied on its own before the full source tree.
    fn layers_dependencies(&self) -> bool {
        let full_copy = self.upper.iter().position(|l| l.starts_with("COPY . "));
        let deps_copy = self
            .upper
            .iter()
            .position(|l| l.starts_with("COPY ") && !l.starts_with("COPY . ") && !l.contains("--FROM"));
        matches!((deps_copy, full_copy), (Some(d), Some(f)) if d < f)
    }
}

fn clamp(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

impl DockerfileScorer {
    fn security(f: &Facts) -> f64 {
        let mut s = 50.0;
        if !f.final_user_is_root() {
            s += 20.0;
        }
        if f.has("HEALTHCHECK") {
            s += 10.0;
        }
        s -= 15.0 * f.unpinned_bases() as f64;
        if f.unpinned_bases() == 0 {
            s += 10.0;
        }
        if secret_env().is_some_and(|re| f.instructions.iter().any(|l| re.is_match(l))) {
            s -= 30.0;
        }
        if f.any_contains("curl") && f.any_contains("| sh") {
            s -= 15.0;
        }
        if f.upper.iter().any(|l| l.starts_with("ADD HTTP")) {
            s -= 10.0;
        }
        if f.base().contains("distroless") || f.base().contains("slim") {
            s += 10.0;
        }
        clamp(s)
    }

    fn efficiency(f: &Facts) -> f64 {
        let mut s = 50.0;
        if f.layers_dependencies() {
            s += 20.0;
        }
        if f.any_contains("--no-cache") || f.any_contains("rm -rf /var/lib/apt/lists") || f.any_contains("cache clean") {
            s += 15.0;
        }
        if f.df.is_multi_stage() {
            s += 15.0;
        }
        let runs = f.count("RUN ");
        if runs > 5 {
            s -= 5.0 * (runs - 5) as f64;
        }
        clamp(s)
    }

    fn size(f: &Facts) -> f64 {
        let base = f.base();
        let mut s: f64 = if base.contains("distroless") || base.contains("alpine") || base == "scratch" {
            90.0
        } else if base.contains("slim") || base.contains("-jre") {
            75.0
        } else {
            45.0
        };
        if f.df.is_multi_stage() {
            s += 10.0;
        }
        if f.any_contains("apt-get install") && !f.any_contains("--no-install-recommends") {
            s -= 10.0;
        }
        if f.any_contains("--no-cache") {
            s += 5.0;
        }
        clamp(s)
    }

    fn best_practices(f: &Facts) -> f64 {
        let mut s = 40.0;
        if f.has("WORKDIR") {
            s += 15.0;
        }
        if f.has("EXPOSE") {
            s += 15.0;
        }
        let exec_form = f
            .upper
            .iter()
            .rev()
            .find(|l| l.starts_with("CMD") || l.starts_with("ENTRYPOINT"))
            .is_some_and(|l| l.contains('['));
        if exec_form {
            s += 15.0;
        }
        if f.has("HEALTHCHECK") {
            s += 15.0;
        }
        if f.upper.iter().any(|l| l.starts_with("ADD ")) {
            s -= 10.0;
        }
        if f.any_contains("apt-get upgrade") {
            s -= 10.0;
        }
        clamp(s)
    }

    fn maintainability(f: &Facts) -> f64 {
        let mut s = 60.0;
        if f.df.content.lines().any(|l| l.trim_start().starts_with('#')) {
            s += 15.0;
        }
        if f.has("LABEL") {
            s += 15.0;
        }
        if f.has("ARG") {
            s += 10.0;
        }
        if f.instructions.len() > 40 {
            s -= 20.0;
        }
        if f.instructions.iter().any(|l| l.len() > 200) {
            s -= 10.0;
        }
        clamp(s)
    }
}

#[async_trait]
impl CandidateScorer<Dockerfile> for DockerfileScorer {
    fn name(&self) -> &str {
        "dockerfile"
    }

    fn default_weights(&self) -> ScoringWeights {
        ScoringWeights::new()
            .with("security", 0.3)
            .with("efficiency", 0.2)
            .with("size", 0.2)
            .with("best_practices", 0.2)
            .with("maintainability", 0.1)
    }

    fn breakdown(&self, candidate: &Candidate<Dockerfile>) -> SamplingResult<ScoreBreakdown> {
        let df = &candidate.content;
        if df.stage_count() == 0 {
            return Err(SamplingError::ScoringFailure {
                scorer: self.name().to_string(),
                reason: format!("{} has no FROM instruction", candidate.id),
            });
        }
        let f = Facts::new(df);
        let mut b = ScoreBreakdown::new();
        b.insert("security".to_string(), Self::security(&f));
        b.insert("efficiency".to_string(), Self::efficiency(&f));
        b.insert("size".to_string(), Self::size(&f));
        b.insert("best_practices".to_string(), Self::best_practices(&f));
        b.insert("maintainability".to_string(), Self::maintainability(&f));
        Ok(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnalysisResult, Environment};
    use crate::sampling::CandidateSource;
    use crate::strategies::content_source::TemplateContentSource;

    fn ctx() -> GenerationContext {
        GenerationContext::new(
            "s1",
            "/repo",
            ArtifactConstraints::Dockerfile {
                environment: Environment::Production,
                base_image: None,
            },
        )
        .with_analysis(AnalysisResult {
            language: "python".to_string(),
            dependency_files: vec!["requirements.txt".to_string()],
            ports: vec![5000],
            entrypoint: Some("app.py".to_string()),
            ..Default::default()
        })
    }

    fn candidate(content: &str) -> Candidate<Dockerfile> {
        Candidate::new("t", CandidateSource::Template, 0.5, Dockerfile::from_content(content))
    }

    #[tokio::test]
    async fn test_generates_requested_strategies_in_order() {
        let gen = DockerfileGenerator::new(Arc::new(TemplateContentSource));
        let out = gen.generate(&ctx(), 3).await.expect("generate");
        let names: Vec<&str> = out.iter().map(|c| c.strategy()).collect();
        assert_eq!(names, vec![SECURITY_FOCUSED, PERFORMANCE_OPTIMIZED, SIZE_OPTIMIZED]);
        assert_eq!(out[0].confidence(), 0.9);
        assert_eq!(out[0].metadata.source, CandidateSource::Template);

        let all = gen.generate(&ctx(), 10).await.expect("generate");
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_requires_analysis() {
        let gen = DockerfileGenerator::new(Arc::new(TemplateContentSource));
        let mut bare = ctx();
        bare.analysis = None;
        let err = gen.generate(&bare, 2).await.unwrap_err();
        assert!(matches!(err, SamplingError::InvalidContext(_)));
    }

    #[tokio::test]
    async fn test_security_template_outscores_performance_on_security() {
        let gen = DockerfileGenerator::new(Arc::new(TemplateContentSource));
        let out = gen.generate(&ctx(), 2).await.expect("generate");
        let scorer = DockerfileScorer;
        let secure = scorer.breakdown(&out[0]).expect("score");
        let fast = scorer.breakdown(&out[1]).expect("score");
        assert!(secure["security"] > fast["security"]);
        assert!(secure["size"] > fast["size"]);
    }

    #[test]
    fn test_breakdown_keys_are_stable() {
        let b = DockerfileScorer
            .breakdown(&candidate("FROM alpine:3.19\nCMD [\"sh\"]\n"))
            .expect("score");
        let keys: Vec<&str> = b.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["best_practices", "efficiency", "maintainability", "security", "size"]
        );
        assert!(b.values().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn test_latest_tag_and_secrets_penalized() {
        let pinned = DockerfileScorer
            .breakdown(&candidate("FROM python:3.11-slim\nUSER app\nCMD [\"python\"]\n"))
            .expect("score");
        let risky = DockerfileScorer
            .breakdown(&candidate(
                "FROM python:latest\nENV DB_PASSWORD=hunter2\nCMD python app.py\n",
            ))
            .expect("score");
        assert!(pinned["security"] > risky["security"]);
        assert!(pinned["best_practices"] > risky["best_practices"]);
    }

    #[test]
    fn test_missing_from_fails_scoring() {
        let err = DockerfileScorer.breakdown(&candidate("RUN echo\n")).unwrap_err();
        assert!(matches!(err, SamplingError::ScoringFailure { .. }));
    }

    #[test]
    fn test_unpinned_detection() {
        let df = Dockerfile::from_content(
            "FROM golang:1.22 AS builder\nFROM scratch\nFROM ubuntu\nFROM node@sha256:abc123\n",
        );
        let f = Facts::new(&df);
        assert_eq!(f.unpinned_bases(), 1);
    }
}
