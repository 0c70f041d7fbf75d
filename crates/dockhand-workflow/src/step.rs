//! Workflow steps: definitions, handlers, and the per-run step record.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dockhand_session::{SessionError, SessionStatus, SessionStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WorkflowError};
use crate::params::WorkflowParams;

/// Lifecycle of one step within a run.
///
/// Allowed transitions: `pending → running → completed | failed` and
/// `pending → skipped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one step's execution, as reported in [`crate::WorkflowResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    pub name: String,
    pub status: StepStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Failure message, or the warning of a soft-failed step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            error: None,
            output: None,
        }
    }

    fn transition(&mut self, from: StepStatus, to: StepStatus) -> Result<()> {
        if self.status != from {
            return Err(WorkflowError::InvalidTransition {
                step: self.name.clone(),
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.transition(StepStatus::Pending, StepStatus::Running)?;
        self.start_time = Some(Utc::now());
        Ok(())
    }

    /// Finish a running step. `warning` is set for soft-failed steps.
    pub fn complete(&mut self, output: Option<Value>, warning: Option<String>) -> Result<()> {
        self.transition(StepStatus::Running, StepStatus::Completed)?;
        self.end_time = Some(Utc::now());
        self.output = output;
        self.error = warning;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(StepStatus::Running, StepStatus::Failed)?;
        self.end_time = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    pub fn skip(&mut self) -> Result<()> {
        self.transition(StepStatus::Pending, StepStatus::Skipped)
    }

    /// Wall time between start and end, when both are known.
    pub fn duration_ms(&self) -> Option<u64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }
}

/// How a step failure affects the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPolicy {
    /// Failure fails the workflow and skips the remaining steps.
    #[default]
    Required,
    /// Failure is recorded as a warning and the run continues.
    SoftFail,
}

/// What a step handler can see while it runs.
#[derive(Clone)]
pub struct StepContext {
    pub session_id: String,
    pub store: Arc<SessionStore>,
    pub params: Arc<WorkflowParams>,
    /// Outputs of the steps completed so far, keyed by step name.
    pub artifacts: BTreeMap<String, Value>,
}

impl StepContext {
    /// Read one entry of the session's workflow state.
    ///
    /// A missing or expired session is an error; a missing key is `Ok(None)`.
    pub fn session_state(&self, key: &str) -> std::result::Result<Option<Value>, SessionError> {
        let session = self
            .store
            .get(&self.session_id)
            .ok_or_else(|| SessionError::NotFound(self.session_id.clone()))?;
        Ok(session.state(key).cloned())
    }

    /// Like [`session_state`](Self::session_state), failing when the key is absent.
    pub fn require_state(&self, key: &str) -> anyhow::Result<Value> {
        self.session_state(key)?
            .ok_or_else(|| anyhow::anyhow!("{key} not found in session state"))
    }

    pub fn artifact(&self, step: &str) -> Option<&Value> {
        self.artifacts.get(step)
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("session_id", &self.session_id)
            .field("params", &self.params)
            .field("artifacts", &self.artifacts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The work a step performs. The returned value becomes the step output.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value>;
}

/// Adapts an async closure into a [`StepHandler`].
///
/// ```ignore
/// let step = FnStep::new(|_ctx| async { Ok::<_, anyhow::Error>(json!({"ok": true})) });
/// ```
pub struct FnStep<F>(F);

impl<F> FnStep<F> {
    pub fn new<Fut>(f: F) -> Self
    where
        F: Fn(StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> StepHandler for FnStep<F>
where
    F: Fn(StepContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn execute(&self, ctx: &StepContext) -> anyhow::Result<Value> {
        (self.0)(ctx.clone()).await
    }
}

/// A step as declared in a workflow.
#[derive(Clone)]
pub struct StepDefinition {
    pub name: String,
    /// Human label used in failure messages (`"{label} failed: ..."`).
    pub label: String,
    pub policy: StepPolicy,
    /// Session `workflow_state` key the output is merged into.
    pub state_key: Option<String>,
    /// Session status written when the step starts.
    pub session_status: Option<SessionStatus>,
    pub handler: Arc<dyn StepHandler>,
}

impl StepDefinition {
    pub fn required(
        name: impl Into<String>,
        label: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            policy: StepPolicy::Required,
            state_key: None,
            session_status: None,
            handler,
        }
    }

    pub fn soft_fail(
        name: impl Into<String>,
        label: impl Into<String>,
        handler: Arc<dyn StepHandler>,
    ) -> Self {
        Self {
            policy: StepPolicy::SoftFail,
            ..Self::required(name, label, handler)
        }
    }

    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = Some(key.into());
        self
    }

    pub fn with_session_status(mut self, status: SessionStatus) -> Self {
        self.session_status = Some(status);
        self
    }

    pub fn is_soft_fail(&self) -> bool {
        self.policy == StepPolicy::SoftFail
    }
}

impl fmt::Debug for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("policy", &self.policy)
            .field("state_key", &self.state_key)
            .field("session_status", &self.session_status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_session::{SessionStoreConfig, SessionUpdate};
    use serde_json::json;

    #[test]
    fn test_happy_path_transitions() {
        let mut step = WorkflowStep::new("build-image");
        step.start().expect("start");
        assert_eq!(step.status, StepStatus::Running);
        step.complete(Some(json!({"imageId": "sha256:1"})), None)
            .expect("complete");
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.end_time.is_some());
        assert!(step.duration_ms().is_some());
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut step = WorkflowStep::new("deploy");
        assert!(matches!(
            step.complete(None, None),
            Err(WorkflowError::InvalidTransition { .. })
        ));
        step.skip().expect("skip");
        assert!(step.start().is_err());
        assert!(step.skip().is_err());
        assert_eq!(step.status, StepStatus::Skipped);

        let mut step = WorkflowStep::new("scan-image");
        step.start().expect("start");
        step.fail("boom").expect("fail");
        assert!(step.fail("again").is_err());
        assert_eq!(step.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_step_json_shape() {
        let step = WorkflowStep::new("analyze-repository");
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(json["status"], "pending");
        assert!(json.get("startTime").is_some());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_soft_fail_builder() {
        let handler: Arc<dyn StepHandler> = Arc::new(FnStep::new(|_ctx| async { Ok::<_, anyhow::Error>(Value::Null) }));
        let def = StepDefinition::soft_fail("scan-image", "Security scan", handler)
            .with_state_key("scan_result");
        assert!(def.is_soft_fail());
        assert_eq!(def.state_key.as_deref(), Some("scan_result"));
    }

    #[tokio::test]
    async fn test_context_reads_session_state() {
        let store = Arc::new(SessionStore::new(SessionStoreConfig::default()));
        let session = store.create(None).expect("create");
        store
            .update(&session.id, SessionUpdate::new().state("build_result", json!({"imageId": "x"})))
            .expect("update");
        let ctx = StepContext {
            session_id: session.id.clone(),
            store: Arc::clone(&store),
            params: Arc::new(WorkflowParams::new("/repo")),
            artifacts: BTreeMap::new(),
        };
        assert_eq!(
            ctx.session_state("build_result").expect("state"),
            Some(json!({"imageId": "x"}))
        );
        assert!(ctx.require_state("scan_result").is_err());

        store.delete(&session.id);
        assert!(matches!(
            ctx.session_state("build_result"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fn_step_runs_closure() {
        let step = FnStep::new(|ctx: StepContext| async move {
            Ok::<_, anyhow::Error>(json!({ "session": ctx.session_id }))
        });
        let store = Arc::new(SessionStore::new(SessionStoreConfig::default()));
        let ctx = StepContext {
            session_id: "abc".to_string(),
            store,
            params: Arc::new(WorkflowParams::new("/repo")),
            artifacts: BTreeMap::new(),
        };
        assert_eq!(step.execute(&ctx).await.expect("run"), json!({"session": "abc"}));
    }
}
