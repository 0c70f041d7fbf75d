//! Content sources: where candidate text comes from.
//!
//! Generators describe what they need as a [`ContentRequest`] and hand it to
//! a [`ContentSource`]. An AI-backed source can be plugged in by the host;
//! [`TemplateContentSource`] renders deterministic templates from the
//! repository analysis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{AnalysisResult, ArtifactKind, ContentSourceError};
use crate::sampling::CandidateSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub artifact: ArtifactKind,
    pub strategy: String,
    pub session_id: String,
    pub analysis: Option<AnalysisResult>,
    /// Artifact-specific inputs (`environment`, `port`, `image`, ...).
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ContentRequest {
    pub fn new(artifact: ArtifactKind, strategy: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            artifact,
            strategy: strategy.into(),
            session_id: session_id.into(),
            analysis: None,
            parameters: Map::new(),
        }
    }

    pub fn with_analysis(mut self, analysis: Option<AnalysisResult>) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    fn str_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    fn u64_param(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(Value::as_u64)
    }
}

/// Produces raw artifact text for one strategy.
#[async_trait]
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Provenance recorded on candidates built from this source.
    fn origin(&self) -> CandidateSource;

    async fn complete(&self, request: &ContentRequest) -> Result<String, ContentSourceError>;
}

/// Deterministic templates keyed by artifact kind and strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateContentSource;

impl TemplateContentSource {
    pub fn new() -> Self {
        Self
    }

    pub fn render(&self, request: &ContentRequest) -> Result<String, ContentSourceError> {
        match request.artifact {
            ArtifactKind::Dockerfile => render_dockerfile(request),
            ArtifactKind::ManifestSet => render_manifests(request),
            ArtifactKind::Remediation => Err(ContentSourceError::Rejected {
                strategy: request.strategy.clone(),
                reason: "remediations are derived from scan results, not templates".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ContentSource for TemplateContentSource {
    fn name(&self) -> &str {
        "template"
    }

    fn origin(&self) -> CandidateSource {
        CandidateSource::Template
    }

    async fn complete(&self, request: &ContentRequest) -> Result<String, ContentSourceError> {
        self.render(request)
    }
}

// ---------------------------------------------------------------------------
// Dockerfile templates
// ---------------------------------------------------------------------------

struct LanguageProfile {
    /// Image with the full toolchain.
    build_image: String,
    slim_image: String,
    alpine_image: String,
    /// Files copied before the dependency install so the layer caches.
    dependency_files: Vec<String>,
    install: Option<String>,
    /// Cache-free variant of `install`.
    install_lean: Option<String>,
    build: Option<String>,
    /// Path produced by `build`, copied into the runtime stage.
    artifact: Option<String>,
    command: Vec<String>,
    env: Vec<(&'static str, &'static str)>,
    compiled: bool,
}

fn language_profile(analysis: &AnalysisResult) -> LanguageProfile {
    let version = analysis.language_version.clone();
    let entry = analysis.entrypoint.clone();
    let deps = |default: &str| {
        if analysis.dependency_files.is_empty() {
            vec![default.to_string()]
        } else {
            analysis.dependency_files.clone()
        }
    };

    match analysis.language.to_ascii_lowercase().as_str() {
        "python" => {
            let v = version.unwrap_or_else(|| "3.11".to_string());
            let entry = entry.unwrap_or_else(|| "app.py".to_string());
            LanguageProfile {
                build_image: format!("python:{v}"),
                slim_image: format!("python:{v}-slim"),
                alpine_image: format!("python:{v}-alpine"),
                dependency_files: deps("requirements.txt"),
                install: Some("pip install -r requirements.txt".to_string()),
                install_lean: Some("pip install --no-cache-dir -r requirements.txt".to_string()),
                build: None,
                artifact: None,
                command: vec!["python".to_string(), entry],
                env: vec![("PYTHONDONTWRITEBYTECODE", "1"), ("PYTHONUNBUFFERED", "1")],
                compiled: false,
            }
        }
        "node" | "javascript" | "typescript" => {
            let v = version.unwrap_or_else(|| "20".to_string());
            let entry = entry.unwrap_or_else(|| "index.js".to_string());
            LanguageProfile {
                build_image: format!("node:{v}"),
                slim_image: format!("node:{v}-slim"),
                alpine_image: format!("node:{v}-alpine"),
                dependency_files: vec!["package*.json".to_string()],
                install: Some("npm install".to_string()),
                install_lean: Some("npm ci --omit=dev && npm cache clean --force".to_string()),
                build: None,
                artifact: None,
                command: vec!["node".to_string(), entry],
                env: vec![("NODE_ENV", "production")],
                compiled: false,
            }
        }
        "go" | "golang" => {
            let v = version.unwrap_or_else(|| "1.22".to_string());
            let bin = entry.unwrap_or_else(|| "app".to_string());
            LanguageProfile {
                build_image: format!("golang:{v}"),
                slim_image: "gcr.io/distroless/static-debian12".to_string(),
                alpine_image: "alpine:3.19".to_string(),
                dependency_files: vec!["go.mod".to_string(), "go.sum".to_string()],
                install: Some("go mod download".to_string()),
                install_lean: Some("go mod download".to_string()),
                build: Some(format!("CGO_ENABLED=0 go build -ldflags=\"-s -w\" -o /out/{bin} .")),
                artifact: Some(format!("/out/{bin}")),
                command: vec![format!("/app/{bin}")],
                env: vec![],
                compiled: true,
            }
        }
        "rust" => {
            let v = version.unwrap_or_else(|| "1.77".to_string());
            let bin = entry.unwrap_or_else(|| "app".to_string());
            LanguageProfile {
                build_image: format!("rust:{v}"),
                slim_image: "debian:bookworm-slim".to_string(),
                alpine_image: "alpine:3.19".to_string(),
                dependency_files: vec!["Cargo.toml".to_string(), "Cargo.lock".to_string()],
                install: None,
                install_lean: None,
                build: Some("cargo build --release".to_string()),
                artifact: Some(format!("/app/target/release/{bin}")),
                command: vec![format!("/app/{bin}")],
                env: vec![],
                compiled: true,
            }
        }
        "java" => {
            let v = version.unwrap_or_else(|| "21".to_string());
            let gradle = analysis.build_system.as_deref() == Some("gradle");
            let (files, build, artifact) = if gradle {
                (
                    vec!["build.gradle".to_string(), "settings.gradle".to_string()],
                    "./gradlew --no-daemon bootJar && cp build/libs/*.jar /out/app.jar",
                    "/out/app.jar",
                )
            } else {
                (
                    vec!["pom.xml".to_string()],
                    "mvn -q -DskipTests package && cp target/*.jar /out/app.jar",
                    "/out/app.jar",
                )
            };
            LanguageProfile {
                build_image: format!("eclipse-temurin:{v}-jdk"),
                slim_image: format!("eclipse-temurin:{v}-jre"),
                alpine_image: format!("eclipse-temurin:{v}-jre-alpine"),
                dependency_files: files,
                install: None,
                install_lean: None,
                build: Some(format!("mkdir -p /out && {build}")),
                artifact: Some(artifact.to_string()),
                command: vec![
                    "java".to_string(),
                    "-jar".to_string(),
                    "/app/app.jar".to_string(),
                ],
                env: vec![("JAVA_OPTS", "-XX:MaxRAMPercentage=75")],
                compiled: true,
            }
        }
        _ => LanguageProfile {
            build_image: "debian:bookworm".to_string(),
            slim_image: "debian:bookworm-slim".to_string(),
            alpine_image: "alpine:3.19".to_string(),
            dependency_files: Vec::new(),
            install: None,
            install_lean: None,
            build: None,
            artifact: None,
            command: vec![format!("./{}", entry.unwrap_or_else(|| "start.sh".to_string()))],
            env: vec![],
            compiled: false,
        },
    }
}

/// Per-strategy template switches.
#[derive(Debug, Clone, Copy)]
struct Recipe {
    multi_stage: bool,
    alpine: bool,
    slim: bool,
    non_root: bool,
    healthcheck: bool,
    lean_install: bool,
}

fn recipe(strategy: &str, compiled: bool) -> Option<Recipe> {
    let recipe = match strategy {
        "security-focused" => Recipe {
            multi_stage: compiled,
            alpine: false,
            slim: true,
            non_root: true,
            healthcheck: true,
            lean_install: true,
        },
        "performance-optimized" => Recipe {
            multi_stage: false,
            alpine: false,
            slim: false,
            non_root: false,
            healthcheck: false,
            lean_install: false,
        },
        "size-optimized" => Recipe {
            multi_stage: compiled,
            alpine: true,
            slim: false,
            non_root: false,
            healthcheck: false,
            lean_install: true,
        },
        "multi-stage" => Recipe {
            multi_stage: true,
            alpine: false,
            slim: true,
            non_root: true,
            healthcheck: false,
            lean_install: true,
        },
        _ => return None,
    };
    Some(recipe)
}

fn exec_form(args: &[String]) -> String {
    let quoted: Vec<String> = args.iter().map(|a| format!("\"{a}\"")).collect();
    format!("[{}]", quoted.join(", "))
}

fn render_dockerfile(request: &ContentRequest) -> Result<String, ContentSourceError> {
    let analysis = request.analysis.as_ref().ok_or_else(|| ContentSourceError::Rejected {
        strategy: request.strategy.clone(),
        reason: "dockerfile templates need an analysis result".to_string(),
    })?;
    let profile = language_profile(analysis);
    let recipe = recipe(&request.strategy, profile.compiled).ok_or_else(|| {
        ContentSourceError::Rejected {
            strategy: request.strategy.clone(),
            reason: "no dockerfile template for this strategy".to_string(),
        }
    })?;

    let port = request
        .u64_param("port")
        .or_else(|| analysis.primary_port().map(u64::from));
    let runtime_image = match request.str_param("baseImage") {
        Some(image) => image.to_string(),
        None if recipe.alpine => profile.alpine_image.clone(),
        None if recipe.slim => profile.slim_image.clone(),
        None => profile.build_image.clone(),
    };
    let distroless = runtime_image.contains("distroless");
    let alpine = runtime_image.contains("alpine");
    // Where the build output lands in the runtime image.
    let artifact_target = profile.artifact.as_ref().map(|_| match profile.command.as_slice() {
        [binary] => binary.clone(),
        _ => "/app/app.jar".to_string(),
    });
    let install = if recipe.lean_install {
        profile.install_lean.as_deref()
    } else {
        profile.install.as_deref()
    };

    let mut out = Vec::new();
    out.push(format!("# {} image for a {} service", request.strategy, analysis.language));
    if let Some(env) = request.str_param("environment") {
        out.push(format!("# environment: {env}"));
    }

    if recipe.multi_stage {
        let builder_image = if profile.compiled || !recipe.alpine {
            profile.build_image.clone()
        } else {
            profile.alpine_image.clone()
        };
        out.push(format!("FROM {builder_image} AS builder"));
        out.push("WORKDIR /app".to_string());
        if !profile.dependency_files.is_empty() {
            out.push(format!("COPY {} ./", profile.dependency_files.join(" ")));
        }
        if profile.compiled {
            if let Some(install) = install {
                out.push(format!("RUN {install}"));
            }
        } else if let Some(install) = install {
            // Interpreted runtimes: install dependencies into the app tree.
            let target = match analysis.language.as_str() {
                "python" => install.replace("pip install", "pip install --target=/app/deps"),
                _ => install.to_string(),
            };
            out.push(format!("RUN {target}"));
        }
        out.push("COPY . .".to_string());
        if let Some(build) = &profile.build {
            out.push(format!("RUN {build}"));
        }
        out.push(String::new());
        out.push(format!("FROM {runtime_image}"));
        out.push("WORKDIR /app".to_string());
        for (k, v) in &profile.env {
            out.push(format!("ENV {k}={v}"));
        }
        if analysis.language == "python" {
            out.push("ENV PYTHONPATH=/app/deps".to_string());
        }
        if recipe.non_root && !distroless {
            out.extend(non_root_user(alpine));
        }
        let owner = if recipe.non_root && !distroless {
            "--chown=app:app "
        } else {
            ""
        };
        match (&profile.artifact, &artifact_target) {
            (Some(artifact), Some(target)) => {
                out.push(format!("COPY {owner}--from=builder {artifact} {target}"));
            }
            _ => out.push(format!("COPY {owner}--from=builder /app /app")),
        }
    } else {
        out.push(format!("FROM {runtime_image}"));
        out.push("WORKDIR /app".to_string());
        for (k, v) in &profile.env {
            out.push(format!("ENV {k}={v}"));
        }
        if recipe.non_root && !distroless {
            out.extend(non_root_user(alpine));
        }
        if !profile.dependency_files.is_empty() {
            out.push(format!("COPY {} ./", profile.dependency_files.join(" ")));
        }
        if let Some(install) = install {
            out.push(format!("RUN {install}"));
        }
        out.push("COPY . .".to_string());
        if let Some(build) = &profile.build {
            out.push(format!("RUN {build}"));
            if let (Some(artifact), Some(target)) = (&profile.artifact, &artifact_target) {
                out.push(format!("RUN cp {artifact} {target}"));
            }
        }
    }

    if let Some(port) = port {
        out.push(format!("EXPOSE {port}"));
        if recipe.healthcheck && !distroless {
            let health_cmd = if alpine {
                format!("wget -q -O /dev/null http://127.0.0.1:{port}/ || exit 1")
            } else {
                format!("curl -fsS http://127.0.0.1:{port}/ || exit 1")
            };
            out.push(format!(
                "HEALTHCHECK --interval=30s --timeout=3s --retries=3 CMD {health_cmd}"
            ));
        }
    }
    if recipe.non_root {
        if distroless {
            out.push("USER nonroot:nonroot".to_string());
        } else {
            out.push("USER app".to_string());
        }
    }
    out.push(format!("CMD {}", exec_form(&profile.command)));

    Ok(out.join("\n") + "\n")
}

fn non_root_user(alpine: bool) -> Vec<String> {
    if alpine {
        vec!["RUN addgroup -S app && adduser -S -G app app".to_string()]
    } else {
        vec!["RUN groupadd --system app && useradd --system --gid app --no-create-home app"
            .to_string()]
    }
}

// ---------------------------------------------------------------------------
// Kubernetes manifest templates
// ---------------------------------------------------------------------------

struct ManifestParams {
    app: String,
    namespace: String,
    image: String,
    replicas: u64,
    port: u64,
    environment: String,
}

impl ManifestParams {
    fn from_request(request: &ContentRequest) -> Result<Self, ContentSourceError> {
        let missing = |key: &str| ContentSourceError::Rejected {
            strategy: request.strategy.clone(),
            reason: format!("manifest templates need `{key}`"),
        };
        Ok(Self {
            app: request.str_param("appName").ok_or_else(|| missing("appName"))?.to_string(),
            namespace: request
                .str_param("namespace")
                .unwrap_or("default")
                .to_string(),
            image: request.str_param("image").ok_or_else(|| missing("image"))?.to_string(),
            replicas: request.u64_param("replicas").unwrap_or(1),
            port: request
                .u64_param("port")
                .or_else(|| {
                    request
                        .analysis
                        .as_ref()
                        .and_then(AnalysisResult::primary_port)
                        .map(u64::from)
                })
                .unwrap_or(8080),
            environment: request
                .str_param("environment")
                .unwrap_or("production")
                .to_string(),
        })
    }
}

fn render_manifests(request: &ContentRequest) -> Result<String, ContentSourceError> {
    let p = ManifestParams::from_request(request)?;
    let docs = match request.strategy.as_str() {
        "minimal" => vec![deployment(&p, p.replicas, Hardening::None), service(&p)],
        "production-ready" => vec![
            deployment(&p, p.replicas.max(2), Hardening::Standard),
            service(&p),
            config_map(&p),
        ],
        "high-availability" => vec![
            deployment(&p, p.replicas.max(3), Hardening::HighAvailability),
            service(&p),
            pod_disruption_budget(&p),
            autoscaler(&p, p.replicas.max(3)),
        ],
        _ => {
            return Err(ContentSourceError::Rejected {
                strategy: request.strategy.clone(),
                reason: "no manifest template for this strategy".to_string(),
            })
        }
    };
    Ok(docs.join("---\n"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hardening {
    None,
    Standard,
    HighAvailability,
}

fn deployment(p: &ManifestParams, replicas: u64, hardening: Hardening) -> String {
    let mut y = format!(
        "apiVersion: apps/v1
kind: Deployment
metadata:
  name: {app}
  namespace: {ns}
  labels:
    app: {app}
    environment: {env}
spec:
  replicas: {replicas}
  selector:
    matchLabels:
      app: {app}
  template:
    metadata:
      labels:
        app: {app}
    spec:
",
        app = p.app,
        ns = p.namespace,
        env = p.environment,
    );

    if hardening == Hardening::HighAvailability {
        y.push_str(&format!(
            "      affinity:
        podAntiAffinity:
          preferredDuringSchedulingIgnoredDuringExecution:
            - weight: 100
              podAffinityTerm:
                topologyKey: kubernetes.io/hostname
                labelSelector:
                  matchLabels:
                    app: {app}
",
            app = p.app
        ));
    }
    if hardening != Hardening::None {
        y.push_str(
            "      securityContext:
        runAsNonRoot: true
        runAsUser: 10001
",
        );
    }

    y.push_str(&format!(
        "      containers:
        - name: {app}
          image: {image}
          ports:
            - containerPort: {port}
",
        app = p.app,
        image = p.image,
        port = p.port,
    ));

    if hardening != Hardening::None {
        y.push_str(&format!(
            "          envFrom:
            - configMapRef:
                name: {app}-config
                optional: true
          securityContext:
            allowPrivilegeEscalation: false
            readOnlyRootFilesystem: true
          resources:
            requests:
              cpu: 100m
              memory: 128Mi
            limits:
              cpu: 500m
              memory: 512Mi
          readinessProbe:
            tcpSocket:
              port: {port}
            initialDelaySeconds: 5
            periodSeconds: 10
          livenessProbe:
            tcpSocket:
              port: {port}
            initialDelaySeconds: 15
            periodSeconds: 20
",
            app = p.app,
            port = p.port,
        ));
    }
    y
}

fn service(p: &ManifestParams) -> String {
    format!(
        "apiVersion: v1
kind: Service
metadata:
  name: {app}
  namespace: {ns}
  labels:
    app: {app}
spec:
  selector:
    app: {app}
  ports:
    - port: 80
      targetPort: {port}
      protocol: TCP
",
        app = p.app,
        ns = p.namespace,
        port = p.port,
    )
}

fn config_map(p: &ManifestParams) -> String {
    format!(
        "apiVersion: v1
kind: ConfigMap
metadata:
  name: {app}-config
  namespace: {ns}
data:
  ENVIRONMENT: {env}
  PORT: \"{port}\"
",
        app = p.app,
        ns = p.namespace,
        env = p.environment,
        port = p.port,
    )
}

fn pod_disruption_budget(p: &ManifestParams) -> String {
    format!(
        "apiVersion: policy/v1
kind: PodDisruptionBudget
metadata:
  name: {app}-pdb
  namespace: {ns}
spec:
  minAvailable: 2
  selector:
    matchLabels:
      app: {app}
",
        app = p.app,
        ns = p.namespace,
    )
}

fn autoscaler(p: &ManifestParams, min_replicas: u64) -> String {
    format!(
        "apiVersion: autoscaling/v2
kind: HorizontalPodAutoscaler
metadata:
  name: {app}-hpa
  namespace: {ns}
spec:
  scaleTargetRef:
    apiVersion: apps/v1
    kind: Deployment
    name: {app}
  minReplicas: {min}
  maxReplicas: {max}
  metrics:
    - type: Resource
      resource:
        name: cpu
        target:
          type: Utilization
          averageUtilization: 70
",
        app = p.app,
        ns = p.namespace,
        min = min_replicas,
        max = min_replicas * 3,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Dockerfile, ManifestSet, Validate};

    fn flask() -> AnalysisResult {
        AnalysisResult {
            language: "python".to_string(),
            framework: Some("flask".to_string()),
            dependency_files: vec!["requirements.txt".to_string()],
            ports: vec![5000],
            entrypoint: Some("app.py".to_string()),
            ..Default::default()
        }
    }

    fn go() -> AnalysisResult {
        AnalysisResult {
            language: "go".to_string(),
            ports: vec![8080],
            entrypoint: Some("server".to_string()),
            ..Default::default()
        }
    }

    fn dockerfile(strategy: &str, analysis: AnalysisResult) -> Dockerfile {
        let req = ContentRequest::new(ArtifactKind::Dockerfile, strategy, "s")
            .with_analysis(Some(analysis));
        Dockerfile::from_content(TemplateContentSource.render(&req).expect("render"))
    }

    #[test]
    fn test_every_dockerfile_strategy_renders_valid_output() {
        for strategy in ["security-focused", "performance-optimized", "size-optimized", "multi-stage"] {
            for analysis in [flask(), go()] {
                let df = dockerfile(strategy, analysis);
                assert!(df.validate().is_empty(), "{strategy}: {:?}", df.validate());
            }
        }
    }

    #[test]
    fn test_security_focused_python() {
        let df = dockerfile("security-focused", flask());
        assert_eq!(df.base_image, "python:3.11-slim");
        assert!(df.content.contains("USER app"));
        assert!(df.content.contains("HEALTHCHECK"));
        assert!(df.content.contains("EXPOSE 5000"));
        assert!(df.content.contains("CMD [\"python\", \"app.py\"]"));
    }

    #[test]
    fn test_multi_stage_go_uses_distroless() {
        let df = dockerfile("multi-stage", go());
        assert!(df.is_multi_stage());
        assert_eq!(df.base_image, "gcr.io/distroless/static-debian12");
        assert!(df.content.contains("COPY --from=builder /out/server /app/server"));
        assert!(df.content.contains("USER nonroot:nonroot"));
    }

    #[test]
    fn test_size_optimized_is_alpine() {
        let df = dockerfile("size-optimized", flask());
        assert_eq!(df.base_image, "python:3.11-alpine");
    }

    #[test]
    fn test_base_image_override() {
        let req = ContentRequest::new(ArtifactKind::Dockerfile, "security-focused", "s")
            .with_analysis(Some(flask()))
            .param("baseImage", "registry.local/python:3.11");
        let df = Dockerfile::from_content(TemplateContentSource.render(&req).expect("render"));
        assert_eq!(df.base_image, "registry.local/python:3.11");
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let req = ContentRequest::new(ArtifactKind::Dockerfile, "fastest", "s")
            .with_analysis(Some(flask()));
        assert!(matches!(
            TemplateContentSource.render(&req),
            Err(ContentSourceError::Rejected { .. })
        ));
    }

    fn manifests(strategy: &str) -> ManifestSet {
        let req = ContentRequest::new(ArtifactKind::ManifestSet, strategy, "s")
            .param("appName", "web")
            .param("namespace", "apps")
            .param("image", "web:1.0.0")
            .param("replicas", 1u64)
            .param("port", 5000u64);
        ManifestSet::from_yaml_stream("apps", &TemplateContentSource.render(&req).expect("render"))
    }

    #[test]
    fn test_manifest_strategies() {
        assert_eq!(manifests("minimal").kinds(), vec!["Deployment", "Service"]);
        assert_eq!(
            manifests("production-ready").kinds(),
            vec!["Deployment", "Service", "ConfigMap"]
        );
        let ha = manifests("high-availability");
        assert_eq!(
            ha.kinds(),
            vec!["Deployment", "Service", "PodDisruptionBudget", "HorizontalPodAutoscaler"]
        );
        assert_eq!(ha.find("HorizontalPodAutoscaler").map(|m| m.name.as_str()), Some("web-hpa"));
        for set in [manifests("minimal"), manifests("production-ready"), ha] {
            assert!(set.validate().is_empty());
        }
    }

    #[test]
    fn test_manifests_need_image() {
        let req = ContentRequest::new(ArtifactKind::ManifestSet, "minimal", "s").param("appName", "web");
        assert!(TemplateContentSource.render(&req).is_err());
    }
}
