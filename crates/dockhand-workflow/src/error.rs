//! Error types for workflow execution.

use dockhand_session::SessionError;

use crate::step::StepStatus;

/// Errors that end a workflow run.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// A required step failed. `message` is already prefixed with the step label.
    #[error("{message}")]
    StepFailure { step: String, message: String },

    #[error("workflow aborted")]
    Aborted,

    #[error("step {step} cannot move from {from} to {to}")]
    InvalidTransition {
        step: String,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

impl WorkflowError {
    /// Name of the step the error is attributed to, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            WorkflowError::StepFailure { step, .. } | WorkflowError::InvalidTransition { step, .. } => {
                Some(step)
            }
            _ => None,
        }
    }
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_displays_message_only() {
        let err = WorkflowError::StepFailure {
            step: "build-image".to_string(),
            message: "Build failed: exit code 1".to_string(),
        };
        assert_eq!(err.to_string(), "Build failed: exit code 1");
        assert_eq!(err.step(), Some("build-image"));
    }

    #[test]
    fn test_session_error_converts() {
        let err: WorkflowError = SessionError::NotFound("s1".to_string()).into();
        assert!(err.to_string().contains("s1"));
        assert!(err.step().is_none());
    }
}
