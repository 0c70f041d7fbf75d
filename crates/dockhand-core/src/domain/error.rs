//! Domain-level error taxonomy for Dockhand.

/// Errors produced by an external content source (AI provider or template).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ContentSourceError {
    #[error("content source unavailable: {0}")]
    Unavailable(String),

    #[error("content source rejected strategy {strategy}: {reason}")]
    Rejected { strategy: String, reason: String },

    #[error("content source returned empty content for strategy {strategy}")]
    Empty { strategy: String },
}

/// Errors produced by candidate generation, scoring and selection.
#[derive(Debug, thiserror::Error)]
pub enum SamplingError {
    #[error("generation failed in {generator}: {reason}")]
    GenerationFailure { generator: String, reason: String },

    #[error("scoring failed in {scorer}: {reason}")]
    ScoringFailure { scorer: String, reason: String },

    #[error("no candidates to select from")]
    NoCandidates,

    #[error("candidate validation failed: {0}")]
    ValidationFailure(String),

    #[error("invalid generation context: {0}")]
    InvalidContext(String),

    #[error(transparent)]
    ContentSource(#[from] ContentSourceError),
}

/// Result type for sampling operations.
pub type SamplingResult<T> = std::result::Result<T, SamplingError>;

/// Errors reported by build/scan/deploy/analysis collaborators.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("{operation} failed: {message}")]
    Failed { operation: String, message: String },

    #[error("{0} is unavailable")]
    Unavailable(String),

    #[error("invalid input for {operation}: {message}")]
    InvalidInput { operation: String, message: String },
}

impl CollaboratorError {
    pub fn failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CollaboratorError::Failed {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_error_display() {
        let err = SamplingError::GenerationFailure {
            generator: "dockerfile".to_string(),
            reason: "all strategies failed".to_string(),
        };
        assert!(err.to_string().contains("generation failed in dockerfile"));

        let err = SamplingError::NoCandidates;
        assert_eq!(err.to_string(), "no candidates to select from");
    }

    #[test]
    fn test_content_source_error_converts() {
        let err: SamplingError = ContentSourceError::Unavailable("offline".to_string()).into();
        assert!(matches!(err, SamplingError::ContentSource(_)));
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::failed("docker build", "exit code 1");
        assert_eq!(err.to_string(), "docker build failed: exit code 1");
    }
}
