//! Vulnerability remediation candidates.
//!
//! Remediations are derived from scan findings by rules rather than rendered
//! from a content source, so generation is deterministic. A clean scan yields
//! no candidates.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::{
    Dockerfile, Remediation, RemediationAction, RiskLevel, SamplingError, SamplingResult,
    Vulnerability,
};
use crate::sampling::{
    run_strategies, ArtifactConstraints, Candidate, CandidateGenerator, CandidateScorer,
    CandidateSource, GenerationContext, ProgressFn, ScoreBreakdown, ScoringWeights,
};

pub const UPGRADE_BASE_IMAGE: &str = "upgrade-base-image";
pub const PATCH_PACKAGES: &str = "patch-packages";
pub const MINIMAL_BASE: &str = "minimal-base";

const STRATEGIES: &[&str] = &[UPGRADE_BASE_IMAGE, PATCH_PACKAGES, MINIMAL_BASE];

fn confidence(strategy: &str) -> f64 {
    match strategy {
        PATCH_PACKAGES => 0.85,
        UPGRADE_BASE_IMAGE => 0.75,
        _ => 0.6,
    }
}

#[derive(Default)]
pub struct RemediationGenerator {
    progress: Option<ProgressFn>,
}

impl RemediationGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }
}

#[async_trait]
impl CandidateGenerator<Remediation> for RemediationGenerator {
    fn name(&self) -> &str {
        "remediation"
    }

    fn strategies(&self) -> Vec<String> {
        STRATEGIES.iter().map(|s| s.to_string()).collect()
    }

    async fn generate(
        &self,
        ctx: &GenerationContext,
        count: usize,
    ) -> SamplingResult<Vec<Candidate<Remediation>>> {
        let ArtifactConstraints::Remediation {
            vulnerabilities,
            dockerfile,
        } = &ctx.constraints
        else {
            return Err(SamplingError::InvalidContext(
                "remediation generator needs remediation constraints".to_string(),
            ));
        };
        if vulnerabilities.is_empty() {
            return Ok(Vec::new());
        }
        let dockerfile = Dockerfile::from_content(dockerfile.as_str());

        run_strategies(self.name(), STRATEGIES, count, self.progress.as_ref(), |strategy| {
            let plan = match *strategy {
                UPGRADE_BASE_IMAGE => upgrade_base_image(&dockerfile, vulnerabilities),
                PATCH_PACKAGES => patch_packages(&dockerfile, vulnerabilities),
                _ => minimal_base(&dockerfile, vulnerabilities),
            };
            let strategy = *strategy;
            async move {
                Ok::<_, SamplingError>(plan.map(|remediation| {
                    Candidate::new(strategy, CandidateSource::Rules, confidence(strategy), remediation)
                }))
            }
        })
        .await
    }
}

fn version_tag() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(?:\.(\d+))?(.*)$").ok())
        .as_ref()
}

/// `python:3.11-slim` → `python:3.12-slim`, `node:20` → `node:21`.
fn next_image(image: &str) -> Option<String> {
    let (name, tag) = image.rsplit_once(':')?;
    if tag.contains('/') {
        return None;
    }
    let caps = version_tag()?.captures(tag)?;
    let major: u64 = caps.get(1)?.as_str().parse().ok()?;
    let rest = caps.get(3).map_or("", |m| m.as_str());
    let bumped = match caps.get(2) {
        Some(minor) => {
            let minor: u64 = minor.as_str().parse().ok()?;
            format!("{major}.{}{rest}", minor + 1)
        }
        None => format!("{}{rest}", major + 1),
    };
    Some(format!("{name}:{bumped}"))
}

/// Alpine or distroless counterpart of a Debian-based image.
fn minimal_image(image: &str) -> Option<String> {
    let lower = image.to_ascii_lowercase();
    if lower.contains("alpine") || lower.contains("distroless") || lower == "scratch" {
        return None;
    }
    match image.rsplit_once(':') {
        Some((name, tag)) => {
            let base_tag = tag
                .trim_end_matches("-slim")
                .trim_end_matches("-bookworm")
                .trim_end_matches("-bullseye");
            if name == "debian" || name == "ubuntu" {
                Some("alpine:3.19".to_string())
            } else {
                Some(format!("{name}:{base_tag}-alpine"))
            }
        }
        None => Some(format!("{image}:alpine")),
    }
}

fn rewrite_final_from(dockerfile: &Dockerfile, to: &str) -> String {
    let lines: Vec<&str> = dockerfile.content.lines().collect();
    let last_from = lines
        .iter()
        .rposition(|l| l.trim_start().to_ascii_uppercase().starts_with("FROM "));
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if Some(i) == last_from {
            // Keep `--platform=...` style flags and the stage alias.
            let mut replaced = false;
            let tokens: Vec<&str> = line
                .split_whitespace()
                .enumerate()
                .map(|(n, token)| {
                    if n > 0 && !replaced && !token.starts_with("--") {
                        replaced = true;
                        to
                    } else {
                        token
                    }
                })
                .collect();
            if replaced {
                out.push(tokens.join(" "));
            } else {
                out.push(format!("{} {to}", tokens.join(" ")));
            }
        } else {
            out.push((*line).to_string());
        }
    }
    out.join("\n") + "\n"
}

fn weighted_coverage(addressed: &[&Vulnerability], all: &[Vulnerability]) -> f64 {
    let total: f64 = all.iter().map(|v| v.severity.weight()).sum();
    if total == 0.0 {
        return 0.0;
    }
    let covered: f64 = addressed.iter().map(|v| v.severity.weight()).sum();
    (covered / total).clamp(0.0, 1.0)
}

fn assemble(
    actions: Vec<RemediationAction>,
    addressed: Vec<&Vulnerability>,
    all: &[Vulnerability],
    risk: RiskLevel,
    dockerfile: Option<String>,
) -> Option<Remediation> {
    if actions.is_empty() || addressed.is_empty() {
        return None;
    }
    let coverage = weighted_coverage(&addressed, all);
    let addressed_ids: Vec<String> = addressed.iter().map(|v| v.id.clone()).collect();
    let outstanding = all
        .iter()
        .filter(|v| !addressed_ids.contains(&v.id))
        .map(|v| v.id.clone())
        .collect();
    Some(Remediation {
        actions,
        addressed: addressed_ids,
        outstanding,
        weighted_coverage: coverage,
        risk,
        dockerfile,
    })
}

/// Move to the next base image release; expected to carry upstream fixes.
fn upgrade_base_image(dockerfile: &Dockerfile, vulns: &[Vulnerability]) -> Option<Remediation> {
    let to = next_image(&dockerfile.base_image)?;
    let addressed: Vec<&Vulnerability> = vulns.iter().filter(|v| v.is_fixable()).collect();
    assemble(
        vec![RemediationAction::UpgradeBaseImage {
            from: dockerfile.base_image.clone(),
            to: to.clone(),
        }],
        addressed,
        vulns,
        RiskLevel::Medium,
        Some(rewrite_final_from(dockerfile, &to)),
    )
}

/// Pin every fixable package to its fixed version.
fn patch_packages(dockerfile: &Dockerfile, vulns: &[Vulnerability]) -> Option<Remediation> {
    let mut addressed: Vec<&Vulnerability> = vulns.iter().filter(|v| v.is_fixable()).collect();
    addressed.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.id.cmp(&b.id)));

    let mut actions = Vec::new();
    let mut packages: Vec<(String, String)> = Vec::new();
    for v in &addressed {
        let Some(fixed) = v.fixed_version.as_ref() else {
            continue;
        };
        if packages.iter().any(|(p, _)| p == &v.package) {
            continue;
        }
        packages.push((v.package.clone(), fixed.clone()));
        actions.push(RemediationAction::UpgradePackage {
            package: v.package.clone(),
            from: v.installed_version.clone(),
            to: fixed.clone(),
        });
    }

    let alpine = dockerfile.base_image.contains("alpine");
    let install = if alpine {
        let pkgs: Vec<String> = packages.iter().map(|(p, v)| format!("{p}={v}")).collect();
        format!("RUN apk add --no-cache --upgrade {}", pkgs.join(" "))
    } else {
        let pkgs: Vec<String> = packages.iter().map(|(p, v)| format!("{p}={v}")).collect();
        format!(
            "RUN apt-get update && apt-get install -y --no-install-recommends --only-upgrade {} && rm -rf /var/lib/apt/lists/*",
            pkgs.join(" ")
        )
    };
    let patched = insert_after_final_from(dockerfile, &install);

    let risk = if actions.len() > 5 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };
    assemble(actions, addressed, vulns, risk, Some(patched))
}

fn insert_after_final_from(dockerfile: &Dockerfile, line: &str) -> String {
    let lines: Vec<&str> = dockerfile.content.lines().collect();
    let last_from = lines
        .iter()
        .rposition(|l| l.trim_start().to_ascii_uppercase().starts_with("FROM "));
    let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
    match last_from {
        Some(i) => out.insert(i + 1, line.to_string()),
        None => out.push(line.to_string()),
    }
    out.join("\n") + "\n"
}

/// Swap the runtime stage to a minimal image, dropping the OS package set.
fn minimal_base(dockerfile: &Dockerfile, vulns: &[Vulnerability]) -> Option<Remediation> {
    let to = minimal_image(&dockerfile.base_image)?;
    let addressed: Vec<&Vulnerability> = vulns.iter().collect();
    assemble(
        vec![RemediationAction::UpgradeBaseImage {
            from: dockerfile.base_image.clone(),
            to: to.clone(),
        }],
        addressed,
        vulns,
        RiskLevel::High,
        Some(rewrite_final_from(dockerfile, &to)),
    )
}

/// Breakdown keys: `coverage`, `risk`, `effort`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemediationScorer;

impl RemediationScorer {
    pub fn new() -> Self {
        Self
    }
}

fn risk_score(risk: RiskLevel) -> f64 {
    match risk {
        RiskLevel::Low => 90.0,
        RiskLevel::Medium => 65.0,
        RiskLevel::High => 35.0,
    }
}

fn effort_score(actions: usize) -> f64 {
    (100.0 - 10.0 * actions as f64).max(20.0)
}

#[async_trait]
impl CandidateScorer<Remediation> for RemediationScorer {
    fn name(&self) -> &str {
        "remediation"
    }

    fn default_weights(&self) -> ScoringWeights {
        ScoringWeights::new()
            .with("coverage", 0.5)
            .with("risk", 0.3)
            .with("effort", 0.2)
    }

    fn breakdown(&self, candidate: &Candidate<Remediation>) -> SamplingResult<ScoreBreakdown> {
        let r = &candidate.content;
        let mut b = ScoreBreakdown::new();
        b.insert("coverage".to_string(), r.weighted_coverage * 100.0);
        b.insert("risk".to_string(), risk_score(r.risk));
        b.insert("effort".to_string(), effort_score(r.actions.len()));
        Ok(b)
    }
}
