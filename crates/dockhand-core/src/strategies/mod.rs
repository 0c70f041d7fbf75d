//! Built-in generators and scorers for each artifact type.

pub mod content_source;
pub mod dockerfile;
pub mod manifests;
pub mod remediation;

pub use content_source::{ContentRequest, ContentSource, TemplateContentSource};
pub use dockerfile::{DockerfileGenerator, DockerfileScorer};
pub use manifests::{ManifestGenerator, ManifestScorer};
pub use remediation::{RemediationGenerator, RemediationScorer};
