//! Deterministic collaborators for dry runs and tests.
//!
//! Nothing here talks to Docker or a cluster. The analyzer reads marker files
//! from the repository; the builder, scanner and deployer derive their
//! results from their inputs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use dockhand_core::{
    AnalysisResult, BuildResult, ClusterDeployer, CollaboratorError, CollaboratorResult,
    DeploymentResult, Dockerfile, ImageBuilder, ImageScanner, ManifestSet, RepositoryAnalyzer,
    ScanResult, ScanSummary, VerificationResult, Vulnerability,
};
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Reads marker files (`requirements.txt`, `package.json`, `Cargo.toml`,
/// `go.mod`, `pom.xml`, ...) to describe a repository.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunAnalyzer;

impl DryRunAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

async fn exists(root: &Path, name: &str) -> bool {
    tokio::fs::try_exists(root.join(name)).await.unwrap_or(false)
}

async fn read(root: &Path, name: &str) -> Option<String> {
    tokio::fs::read_to_string(root.join(name)).await.ok()
}

fn port_literal() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)port['"]?\s*[,=:]\s*(\d{2,5})\b"#).ok())
        .as_ref()
}

/// First port literal in `source`, e.g. `os.getenv('PORT', 5000)`.
fn find_port(source: &str) -> Option<u16> {
    port_literal()?
        .captures_iter(source)
        .filter_map(|c| c.get(1)?.as_str().parse().ok())
        .find(|p: &u16| *p >= 80)
}

async fn analyze_python(root: &Path, analysis: &mut AnalysisResult) {
    analysis.language = "python".to_string();
    analysis.language_version = Some("3.11".to_string());
    let requirements = read(root, "requirements.txt").await.unwrap_or_default();
    let pyproject = read(root, "pyproject.toml").await.unwrap_or_default();
    analysis.build_system = Some(if pyproject.contains("[tool.poetry]") {
        "poetry".to_string()
    } else {
        "pip".to_string()
    });

    let deps = format!("{requirements}\n{pyproject}").to_ascii_lowercase();
    let (framework, port) = if deps.contains("django") {
        (Some("django"), 8000)
    } else if deps.contains("fastapi") {
        (Some("fastapi"), 8000)
    } else if deps.contains("flask") {
        (Some("flask"), 5000)
    } else {
        (None, 8000)
    };
    analysis.framework = framework.map(str::to_string);

    for candidate in ["app.py", "main.py", "manage.py", "wsgi.py"] {
        if let Some(source) = read(root, candidate).await {
            analysis.entrypoint = Some(candidate.to_string());
            analysis.ports = vec![find_port(&source).unwrap_or(port)];
            return;
        }
    }
    analysis.ports = vec![port];
}

async fn analyze_node(root: &Path, analysis: &mut AnalysisResult) {
    analysis.language = "node".to_string();
    analysis.language_version = Some("20".to_string());
    analysis.build_system = Some(if exists(root, "yarn.lock").await {
        "yarn".to_string()
    } else {
        "npm".to_string()
    });
    let manifest: serde_json::Value = read(root, "package.json")
        .await
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default();
    let has_dep = |name: &str| {
        ["dependencies", "devDependencies"]
            .iter()
            .any(|section| manifest[section].get(name).is_some())
    };
    let (framework, port) = if has_dep("next") {
        (Some("next"), 3000)
    } else if has_dep("express") {
        (Some("express"), 3000)
    } else if has_dep("fastify") {
        (Some("fastify"), 3000)
    } else {
        (None, 3000)
    };
    analysis.framework = framework.map(str::to_string);
    let entry = manifest["main"].as_str().unwrap_or("index.js").to_string();
    let port = match read(root, &entry).await {
        Some(source) => find_port(&source).unwrap_or(port),
        None => port,
    };
    analysis.entrypoint = Some(entry);
    analysis.ports = vec![port];
}

async fn analyze_rust(root: &Path, analysis: &mut AnalysisResult) {
    analysis.language = "rust".to_string();
    analysis.build_system = Some("cargo".to_string());
    let manifest: Option<toml::Value> = read(root, "Cargo.toml")
        .await
        .and_then(|text| toml::from_str(&text).ok());
    let package = manifest.as_ref().and_then(|m| m.get("package"));
    analysis.entrypoint = package
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string);
    analysis.language_version = package
        .and_then(|p| p.get("rust-version"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let deps = manifest.as_ref().and_then(|m| m.get("dependencies"));
    analysis.framework = ["axum", "actix-web", "rocket", "warp"]
        .iter()
        .find(|name| deps.and_then(|d| d.get(**name)).is_some())
        .map(|name| name.to_string());
    analysis.ports = vec![8080];
}

async fn analyze_go(root: &Path, analysis: &mut AnalysisResult) {
    analysis.language = "go".to_string();
    analysis.build_system = Some("go".to_string());
    let gomod = read(root, "go.mod").await.unwrap_or_default();
    for line in gomod.lines().map(str::trim) {
        if let Some(module) = line.strip_prefix("module ") {
            analysis.entrypoint = module.rsplit('/').next().map(|s| s.trim().to_string());
        } else if let Some(version) = line.strip_prefix("go ") {
            analysis.language_version = Some(version.trim().to_string());
        }
    }
    analysis.framework = ["gin-gonic/gin", "labstack/echo", "gofiber/fiber"]
        .iter()
        .find(|m| gomod.contains(**m))
        .and_then(|m| m.rsplit('/').next())
        .map(str::to_string);
    analysis.ports = vec![8080];
}

async fn analyze_java(root: &Path, analysis: &mut AnalysisResult, maven: bool) {
    analysis.language = "java".to_string();
    analysis.language_version = Some("17".to_string());
    analysis.build_system = Some(if maven { "maven" } else { "gradle" }.to_string());
    let build = if maven {
        read(root, "pom.xml").await
    } else {
        read(root, "build.gradle").await
    }
    .unwrap_or_default();
    if build.contains("spring-boot") {
        analysis.framework = Some("spring-boot".to_string());
    }
    analysis.ports = vec![8080];
}

#[async_trait]
impl RepositoryAnalyzer for DryRunAnalyzer {
    async fn analyze(&self, repo_path: &Path) -> CollaboratorResult<AnalysisResult> {
        let is_dir = tokio::fs::metadata(repo_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(CollaboratorError::InvalidInput {
                operation: "analyze".to_string(),
                message: format!("{} is not a directory", repo_path.display()),
            });
        }

        let mut analysis = AnalysisResult::default();
        let markers = [
            "requirements.txt",
            "pyproject.toml",
            "package.json",
            "Cargo.toml",
            "go.mod",
            "pom.xml",
            "build.gradle",
        ];
        for marker in markers {
            if exists(repo_path, marker).await {
                analysis.dependency_files.push(marker.to_string());
            }
        }

        let has = |name: &str| analysis.dependency_files.iter().any(|f| f == name);
        if has("requirements.txt") || has("pyproject.toml") {
            analyze_python(repo_path, &mut analysis).await;
        } else if has("package.json") {
            analyze_node(repo_path, &mut analysis).await;
        } else if has("Cargo.toml") {
            analyze_rust(repo_path, &mut analysis).await;
        } else if has("go.mod") {
            analyze_go(repo_path, &mut analysis).await;
        } else if has("pom.xml") {
            analyze_java(repo_path, &mut analysis, true).await;
        } else if has("build.gradle") {
            analyze_java(repo_path, &mut analysis, false).await;
        } else {
            analysis.language = "generic".to_string();
            analysis.ports = vec![8080];
        }
        analysis.has_dockerfile = exists(repo_path, "Dockerfile").await;

        debug!(
            repo = %repo_path.display(),
            language = %analysis.language,
            framework = ?analysis.framework,
            "repository analyzed"
        );
        Ok(analysis)
    }
}

/// Produces a content-addressed image id without building anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunBuilder;

impl DryRunBuilder {
    pub fn new() -> Self {
        Self
    }
}

/// Rough compressed size of common base images, in MiB.
fn base_size_mib(base: &str) -> u64 {
    if base.contains("distroless") || base.starts_with("scratch") {
        25
    } else if base.contains("alpine") {
        60
    } else if base.contains("slim") {
        130
    } else {
        350
    }
}

#[async_trait]
impl ImageBuilder for DryRunBuilder {
    async fn build(
        &self,
        dockerfile: &str,
        context: &Path,
        tags: &[String],
    ) -> CollaboratorResult<BuildResult> {
        let parsed = Dockerfile::from_content(dockerfile);
        if parsed.stage_count() == 0 {
            return Err(CollaboratorError::failed(
                "docker build",
                "dockerfile has no FROM instruction",
            ));
        }
        let mut hasher = Sha256::new();
        hasher.update(dockerfile.as_bytes());
        hasher.update(context.to_string_lossy().as_bytes());
        for tag in tags {
            hasher.update(tag.as_bytes());
        }
        let layers = parsed
            .instructions()
            .filter(|l| {
                let upper = l.to_ascii_uppercase();
                upper.starts_with("RUN") || upper.starts_with("COPY") || upper.starts_with("ADD")
            })
            .count() as u64;
        Ok(BuildResult {
            image_id: format!("sha256:{}", hex::encode(hasher.finalize())),
            tags: tags.to_vec(),
            size_bytes: Some((base_size_mib(&parsed.base_image) + layers * 5) * 1024 * 1024),
            build_time_ms: 0,
        })
    }
}

/// Reports a fixed list of findings for every image.
#[derive(Debug, Default, Clone)]
pub struct DryRunScanner {
    findings: Vec<Vulnerability>,
}

impl DryRunScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_findings(findings: Vec<Vulnerability>) -> Self {
        Self { findings }
    }
}

#[async_trait]
impl ImageScanner for DryRunScanner {
    async fn scan(&self, image_id: &str) -> CollaboratorResult<ScanResult> {
        if image_id.trim().is_empty() {
            return Err(CollaboratorError::InvalidInput {
                operation: "scan".to_string(),
                message: "empty image id".to_string(),
            });
        }
        Ok(ScanResult {
            image_id: image_id.to_string(),
            summary: ScanSummary::from_vulnerabilities(&self.findings),
            vulnerabilities: self.findings.clone(),
        })
    }
}

/// Records applied deployments in memory and reports them ready.
#[derive(Debug, Default)]
pub struct DryRunDeployer {
    desired: Mutex<BTreeMap<String, u32>>,
}

impl DryRunDeployer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replicas_of(yaml: &str) -> u32 {
    yaml.lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("replicas:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(1)
}

#[async_trait]
impl ClusterDeployer for DryRunDeployer {
    async fn deploy(
        &self,
        manifests: &ManifestSet,
        namespace: &str,
    ) -> CollaboratorResult<DeploymentResult> {
        let workload = manifests
            .find("Deployment")
            .or_else(|| manifests.find("StatefulSet"))
            .ok_or_else(|| CollaboratorError::InvalidInput {
                operation: "deploy".to_string(),
                message: "manifest set has no workload".to_string(),
            })?;
        let key = format!("{namespace}/{}", workload.name);
        self.desired
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, replicas_of(&workload.yaml));

        let endpoint = manifests
            .find("Service")
            .map(|svc| format!("http://{}.{namespace}.svc.cluster.local", svc.name));
        Ok(DeploymentResult {
            namespace: namespace.to_string(),
            deployment_name: workload.name.clone(),
            applied: manifests
                .manifests
                .iter()
                .map(|m| format!("{}/{}", m.kind, m.name))
                .collect(),
            endpoint,
        })
    }

    async fn verify(&self, deployment: &DeploymentResult) -> CollaboratorResult<VerificationResult> {
        let key = format!("{}/{}", deployment.namespace, deployment.deployment_name);
        let desired = self
            .desired
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .copied();
        Ok(match desired {
            Some(replicas) => VerificationResult {
                ready: true,
                replicas_ready: replicas,
                replicas_desired: replicas,
                message: format!("{key} rolled out"),
            },
            None => VerificationResult {
                ready: false,
                replicas_ready: 0,
                replicas_desired: 0,
                message: format!("{key} not found"),
            },
        })
    }
}
