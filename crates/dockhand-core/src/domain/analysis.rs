//! Repository analysis results and deployment environments.

use serde::{Deserialize, Serialize};

/// Target environment for generated artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// What a repository analyzer reports about a code base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Primary language (`python`, `node`, `go`, `rust`, `java`, ...).
    pub language: String,
    pub language_version: Option<String>,
    pub framework: Option<String>,
    pub build_system: Option<String>,
    /// Dependency manifests found at the repository root.
    #[serde(default)]
    pub dependency_files: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Main file or binary name.
    pub entrypoint: Option<String>,
    #[serde(default)]
    pub has_dockerfile: bool,
}

impl AnalysisResult {
    /// First declared port, if any.
    pub fn primary_port(&self) -> Option<u16> {
        self.ports.first().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!("prod".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!("Staging".parse::<Environment>(), Ok(Environment::Staging));
        assert!("qa".parse::<Environment>().is_err());
    }

    #[test]
    fn test_analysis_result_camel_case() {
        let analysis = AnalysisResult {
            language: "python".to_string(),
            language_version: Some("3.11".to_string()),
            ports: vec![5000],
            ..Default::default()
        };
        let json = serde_json::to_value(&analysis).expect("serialize");
        assert_eq!(json["languageVersion"], "3.11");
        assert_eq!(analysis.primary_port(), Some(5000));
    }
}
