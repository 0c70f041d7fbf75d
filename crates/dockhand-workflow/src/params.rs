//! Parameters of one containerization run.

use std::path::PathBuf;

use dockhand_core::Environment;
use serde::{Deserialize, Serialize};

/// Host-supplied parameters for a workflow run.
///
/// Deserializes from the camelCase JSON described by
/// [`crate::contract::params_schema`]; everything except `repoPath` has a
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowParams {
    pub repo_path: PathBuf,
    /// Reuse (or create) a session with this id instead of a fresh one.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Image repository name; derived from the repository directory when unset.
    #[serde(default)]
    pub image_name: Option<String>,
    #[serde(default = "default_tag")]
    pub image_tag: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// Force a base image instead of the language default.
    #[serde(default)]
    pub base_image: Option<String>,
    /// Sample several candidates per artifact; `false` takes the single-candidate path.
    #[serde(default = "enabled")]
    pub sampling: bool,
    #[serde(default = "enabled")]
    pub scan: bool,
    #[serde(default = "enabled")]
    pub remediate: bool,
    #[serde(default = "enabled")]
    pub deploy: bool,
    #[serde(default = "enabled")]
    pub verify: bool,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_tag() -> String {
    "0.1.0".to_string()
}

fn default_replicas() -> u32 {
    1
}

fn enabled() -> bool {
    true
}

impl WorkflowParams {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            session_id: None,
            environment: Environment::default(),
            namespace: default_namespace(),
            image_name: None,
            image_tag: default_tag(),
            replicas: default_replicas(),
            base_image: None,
            sampling: true,
            scan: true,
            remediate: true,
            deploy: true,
            verify: true,
        }
    }

    /// Application name: `image_name`, else the sanitized repository directory name.
    pub fn app_name(&self) -> String {
        let raw = self.image_name.clone().unwrap_or_else(|| {
            self.repo_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        sanitize_name(&raw)
    }

    /// `{app_name}:{image_tag}`
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.app_name(), self.image_tag)
    }
}

/// Lowercase DNS-1123 label: `[a-z0-9-]`, no leading or trailing dash.
fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    // DNS labels stop at 63 characters and may not end in a hyphen.
    let truncated: String = out.trim_matches('-').chars().take(63).collect();
    let trimmed = truncated.trim_end_matches('-');
    if trimmed.is_empty() {
        "app".to_string()
    } else {
        trimmed.to_string()
    }
}
