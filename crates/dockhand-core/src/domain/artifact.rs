//! Artifact payloads carried by candidates.
//!
//! Each artifact type is strongly typed and shares the generic
//! [`crate::sampling::Candidate`] envelope:
//! - `Dockerfile`: a rendered Dockerfile
//! - `ManifestSet`: Kubernetes manifests for one deployment
//! - `Remediation`: a set of actions addressing scan findings

use serde::{Deserialize, Serialize};

/// Artifact families produced by the sampling engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Dockerfile,
    ManifestSet,
    Remediation,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Dockerfile => "dockerfile",
            ArtifactKind::ManifestSet => "manifest_set",
            ArtifactKind::Remediation => "remediation",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural checks run on candidate content before scoring.
pub trait Validate {
    /// Human-readable issues; empty means valid.
    fn validate(&self) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// Dockerfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dockerfile {
    pub content: String,
    /// Image named by the final `FROM` instruction.
    pub base_image: String,
}

impl Dockerfile {
    pub fn from_content(content: impl Into<String>) -> Self {
        let content = content.into();
        let base_image = from_lines(&content)
            .last()
            .map(|image| image.to_string())
            .unwrap_or_default();
        Self {
            content,
            base_image,
        }
    }

    /// Instruction lines, comments and blanks removed.
    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
    }

    /// Number of build stages (`FROM` instructions).
    pub fn stage_count(&self) -> usize {
        from_lines(&self.content).len()
    }

    pub fn is_multi_stage(&self) -> bool {
        self.stage_count() > 1
    }
}

fn from_lines(content: &str) -> Vec<&str> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match parts.next() {
                Some(word) if word.eq_ignore_ascii_case("FROM") => {
                    parts.find(|token| !token.starts_with("--"))
                }
                _ => None,
            }
        })
        .collect()
}

impl Validate for Dockerfile {
    fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.content.trim().is_empty() {
            issues.push("dockerfile is empty".to_string());
            return issues;
        }
        if self.stage_count() == 0 {
            issues.push("dockerfile has no FROM instruction".to_string());
        }
        let has_start = self.instructions().any(|l| {
            let upper = l.to_ascii_uppercase();
            upper.starts_with("CMD") || upper.starts_with("ENTRYPOINT")
        });
        if !has_start {
            issues.push("dockerfile has no CMD or ENTRYPOINT".to_string());
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// ManifestSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub kind: String,
    pub name: String,
    pub yaml: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSet {
    pub namespace: String,
    pub manifests: Vec<Manifest>,
}

impl ManifestSet {
    /// Split a multi-document YAML stream into manifests.
    ///
    /// `kind` and `name` come from the first `kind:` and `name:` lines of each
    /// document. Documents without a kind are dropped.
    pub fn from_yaml_stream(namespace: impl Into<String>, stream: &str) -> Self {
        let mut manifests = Vec::new();
        let mut current = Vec::new();

        let mut flush = |doc: &mut Vec<&str>| {
            let yaml = doc.join("\n").trim().to_string();
            doc.clear();
            if yaml.is_empty() {
                return;
            }
            let field = |key: &str| {
                yaml.lines()
                    .map(str::trim)
                    .find_map(|l| l.strip_prefix(key))
                    .map(|v| v.trim().trim_matches('"').to_string())
            };
            if let Some(kind) = field("kind:") {
                manifests.push(Manifest {
                    kind,
                    name: field("name:").unwrap_or_default(),
                    yaml: yaml.clone(),
                });
            }
        };

        for line in stream.lines() {
            if line.trim() == "---" {
                flush(&mut current);
            } else {
                current.push(line);
            }
        }
        flush(&mut current);

        Self {
            namespace: namespace.into(),
            manifests,
        }
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.manifests.iter().map(|m| m.kind.as_str()).collect()
    }

    pub fn find(&self, kind: &str) -> Option<&Manifest> {
        self.manifests.iter().find(|m| m.kind == kind)
    }

    /// Re-join the manifests into one YAML stream.
    pub fn to_yaml(&self) -> String {
        self.manifests
            .iter()
            .map(|m| m.yaml.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}

impl Validate for ManifestSet {
    fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.manifests.is_empty() {
            issues.push("manifest set is empty".to_string());
        }
        for (i, m) in self.manifests.iter().enumerate() {
            if m.name.is_empty() {
                issues.push(format!("manifest {i} ({}) has no metadata.name", m.kind));
            }
        }
        if self.find("Deployment").is_none() && self.find("StatefulSet").is_none() {
            issues.push("manifest set has no workload (Deployment or StatefulSet)".to_string());
        }
        issues
    }
}

// ---------------------------------------------------------------------------
// Remediation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemediationAction {
    UpgradeBaseImage { from: String, to: String },
    UpgradePackage {
        package: String,
        from: String,
        to: String,
    },
    RemovePackage { package: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remediation {
    pub actions: Vec<RemediationAction>,
    /// Vulnerability ids these actions are expected to resolve.
    pub addressed: Vec<String>,
    /// Vulnerability ids left open.
    pub outstanding: Vec<String>,
    /// Severity-weighted share of findings addressed, 0.0–1.0.
    pub weighted_coverage: f64,
    pub risk: RiskLevel,
    /// Patched Dockerfile when the actions rewrite it.
    pub dockerfile: Option<String>,
}

impl Validate for Remediation {
    fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.actions.is_empty() {
            issues.push("remediation has no actions".to_string());
        }
        if self.addressed.is_empty() {
            issues.push("remediation addresses no vulnerabilities".to_string());
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dockerfile_base_image_is_final_stage() {
        let df = Dockerfile::from_content(
            "FROM golang:1.22-alpine AS builder\nRUN go build\nFROM gcr.io/distroless/static\nCMD [\"/app\"]\n",
        );
        assert_eq!(df.base_image, "gcr.io/distroless/static");
        assert_eq!(df.stage_count(), 2);
        assert!(df.is_multi_stage());
        assert!(df.validate().is_empty());
    }

    #[test]
    fn test_dockerfile_base_image_skips_from_flags() {
        let df = Dockerfile::from_content(
            "FROM --platform=linux/amd64 python:3.11-slim AS app\nCMD [\"python\", \"app.py\"]\n",
        );
        assert_eq!(df.base_image, "python:3.11-slim");
        assert_eq!(df.stage_count(), 1);
    }

    #[test]
    fn test_dockerfile_validation_issues() {
        let df = Dockerfile::from_content("RUN echo hi\n");
        let issues = df.validate();
        assert_eq!(issues.len(), 2);
        assert!(Dockerfile::from_content("  ").validate()[0].contains("empty"));
    }

    #[test]
    fn test_manifest_stream_split() {
        let stream = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: web-svc\n---\n";
        let set = ManifestSet::from_yaml_stream("default", stream);
        assert_eq!(set.kinds(), vec!["Deployment", "Service"]);
        assert_eq!(set.find("Service").map(|m| m.name.as_str()), Some("web-svc"));
        assert!(set.validate().is_empty());
        assert_eq!(ManifestSet::from_yaml_stream("default", &set.to_yaml()), set);
    }

    #[test]
    fn test_manifest_set_without_workload_is_invalid() {
        let set = ManifestSet::from_yaml_stream("ns", "kind: Service\nmetadata:\n  name: s\n");
        assert_eq!(set.validate().len(), 1);
    }

    #[test]
    fn test_remediation_action_serde_tag() {
        let action = RemediationAction::RemovePackage {
            package: "curl".to_string(),
        };
        let json = serde_json::to_value(&action).expect("serialize");
        assert_eq!(json["type"], "remove_package");
    }
}
