//! Sequential step execution over a session.
//!
//! Steps run strictly in declared order. Before each step the session
//! `stage` is set to the step name. A required step failure marks the step
//! `failed`, skips everything still pending, and writes `status: failed` to
//! the session. A soft-fail step failure is recorded as a warning and the run
//! continues.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dockhand_core::metrics::METRICS;
use dockhand_core::obs::{
    emit_session_write_error, emit_step_completed, emit_step_failed, emit_step_skipped,
    emit_step_started, emit_workflow_aborted, emit_workflow_finished, emit_workflow_started,
    workflow_span,
};
use dockhand_session::{SessionStatus, SessionStore, SessionUpdate};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::Instrument;

use crate::abort::AbortSignal;
use crate::error::{Result, WorkflowError};
use crate::params::WorkflowParams;
use crate::step::{StepContext, StepDefinition, StepStatus, WorkflowStep};

/// In-flight state of one run.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub session_id: String,
    pub steps: Vec<WorkflowStep>,
    pub artifacts: BTreeMap<String, Value>,
    pub start_time: DateTime<Utc>,
    pub current_step: Option<String>,
    pub warnings: Vec<String>,
}

impl WorkflowContext {
    fn new(session_id: &str, definitions: &[StepDefinition]) -> Self {
        Self {
            session_id: session_id.to_string(),
            steps: definitions
                .iter()
                .map(|d| WorkflowStep::new(d.name.clone()))
                .collect(),
            artifacts: BTreeMap::new(),
            start_time: Utc::now(),
            current_step: None,
            warnings: Vec::new(),
        }
    }

    fn skip_pending(&mut self) {
        for step in self.steps.iter_mut() {
            if step.status == StepStatus::Pending && step.skip().is_ok() {
                emit_step_skipped(&self.session_id, &step.name);
            }
        }
    }

    fn failed_step(&self) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::Failed)
            .map(|s| s.name.as_str())
    }

    /// Mark the current step failed if it is still running.
    fn fail_running(&mut self, index: usize, message: &str) {
        if let Some(step) = self.steps.get_mut(index) {
            if step.status == StepStatus::Running {
                let _ = step.fail(message);
            }
        }
    }
}

/// Outcome of [`WorkflowOrchestrator::run`]. Always returned, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub success: bool,
    pub session_id: String,
    pub steps: Vec<WorkflowStep>,
    pub artifacts: BTreeMap<String, Value>,
    /// Soft-fail step failures.
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    pub duration_ms: u64,
}

impl WorkflowResult {
    pub fn step(&self, name: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn step_status(&self, name: &str) -> Option<StepStatus> {
        self.step(name).map(|s| s.status)
    }
}

/// Runs step definitions against a shared [`SessionStore`].
pub struct WorkflowOrchestrator {
    store: Arc<SessionStore>,
    name: String,
}

impl WorkflowOrchestrator {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self {
            store,
            name: "workflow".to_string(),
        }
    }

    /// Name reported in the workflow span and lifecycle events.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Execute `steps` in order.
    ///
    /// Every outcome, including session errors and aborts, is reported in the
    /// returned [`WorkflowResult`].
    pub async fn run(
        &self,
        params: &WorkflowParams,
        steps: &[StepDefinition],
        abort: &AbortSignal,
    ) -> WorkflowResult {
        let started = Instant::now();

        let session_id = match self.open_session(params) {
            Ok(id) => id,
            Err(err) => {
                METRICS.inc_workflow_failures();
                let session_id = params.session_id.clone().unwrap_or_default();
                let mut ctx = WorkflowContext::new(&session_id, steps);
                ctx.skip_pending();
                return Self::finish(ctx, Some(err), started);
            }
        };

        let span = workflow_span(&session_id, &self.name);
        async move {
            emit_workflow_started(&session_id, &self.name, steps.len());

            let mut ctx = WorkflowContext::new(&session_id, steps);
            let params = Arc::new(params.clone());

            let outcome = match self.drive(&mut ctx, &params, steps, abort).await {
                Ok(()) => self.complete_session(&ctx),
                Err(err) => Err(err),
            };

            let error = match outcome {
                Ok(()) => None,
                Err(err) => {
                    ctx.skip_pending();
                    METRICS.inc_workflow_failures();
                    self.fail_session(&ctx, &err);
                    Some(err)
                }
            };
            Self::finish(ctx, error, started)
        }
        .instrument(span)
        .await
    }

    fn open_session(&self, params: &WorkflowParams) -> Result<String> {
        let session = match &params.session_id {
            Some(id) => {
                let existed = self.store.get(id).is_some();
                let session = self.store.get_or_create(id)?;
                if !existed {
                    METRICS.inc_sessions_created();
                }
                session
            }
            None => {
                let session = self.store.create(None)?;
                METRICS.inc_sessions_created();
                session
            }
        };
        Ok(session.id.clone())
    }

    async fn drive(
        &self,
        ctx: &mut WorkflowContext,
        params: &Arc<WorkflowParams>,
        steps: &[StepDefinition],
        abort: &AbortSignal,
    ) -> Result<()> {
        if abort.is_aborted() {
            emit_workflow_aborted(&ctx.session_id, None);
            return Err(WorkflowError::Aborted);
        }

        for (index, def) in steps.iter().enumerate() {
            if abort.is_aborted() {
                emit_workflow_aborted(&ctx.session_id, Some(&def.name));
                return Err(WorkflowError::Aborted);
            }

            ctx.current_step = Some(def.name.clone());
            let mut stage = SessionUpdate::new().stage(def.name.clone());
            if let Some(status) = def.session_status {
                stage = stage.status(status);
            }
            self.store.update(&ctx.session_id, stage)?;

            ctx.steps[index].start()?;
            emit_step_started(&ctx.session_id, &def.name);
            let step_started = Instant::now();

            let step_ctx = StepContext {
                session_id: ctx.session_id.clone(),
                store: Arc::clone(&self.store),
                params: Arc::clone(params),
                artifacts: ctx.artifacts.clone(),
            };

            match def.handler.execute(&step_ctx).await {
                Ok(output) => {
                    if let Some(key) = &def.state_key {
                        if let Err(err) = self
                            .store
                            .update(&ctx.session_id, SessionUpdate::new().state(key.clone(), output.clone()))
                        {
                            ctx.fail_running(index, &err.to_string());
                            return Err(err.into());
                        }
                    }
                    ctx.steps[index].complete(Some(output.clone()), None)?;
                    ctx.artifacts.insert(def.name.clone(), output);
                    emit_step_completed(
                        &ctx.session_id,
                        &def.name,
                        step_started.elapsed().as_millis() as u64,
                    );
                }
                Err(err) => {
                    let message = format!("{} failed: {err:#}", def.label);
                    emit_step_failed(&ctx.session_id, &def.name, &message, def.is_soft_fail());
                    if def.is_soft_fail() {
                        ctx.steps[index].complete(None, Some(message.clone()))?;
                        ctx.warnings.push(message);
                    } else {
                        ctx.steps[index].fail(message.clone())?;
                        return Err(WorkflowError::StepFailure {
                            step: def.name.clone(),
                            message,
                        });
                    }
                }
            }
        }

        ctx.current_step = None;
        Ok(())
    }

    fn complete_session(&self, ctx: &WorkflowContext) -> Result<()> {
        let completed: Vec<&str> = ctx
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .map(|s| s.name.as_str())
            .collect();
        let update = SessionUpdate::new()
            .status(SessionStatus::Completed)
            .metadata("completedAt", json!(Utc::now().to_rfc3339()))
            .metadata(
                "results",
                json!({
                    "completedSteps": completed,
                    "warnings": ctx.warnings,
                    "artifacts": ctx.artifacts.keys().collect::<Vec<_>>(),
                }),
            );
        self.store.update(&ctx.session_id, update)?;
        Ok(())
    }

    fn fail_session(&self, ctx: &WorkflowContext, err: &WorkflowError) {
        let mut update = SessionUpdate::new()
            .status(SessionStatus::Failed)
            .metadata("error", json!(err.to_string()))
            .metadata("failedAt", json!(Utc::now().to_rfc3339()));
        if let Some(step) = err.step().or(ctx.failed_step()) {
            update = update.metadata("failedStep", json!(step));
        }
        if let Err(write_err) = self.store.update(&ctx.session_id, update) {
            emit_session_write_error(&ctx.session_id, &write_err);
        }
    }

    fn finish(ctx: WorkflowContext, error: Option<WorkflowError>, started: Instant) -> WorkflowResult {
        let duration_ms = started.elapsed().as_millis() as u64;
        let failed_step = error
            .as_ref()
            .and_then(|e| e.step().or(ctx.failed_step()))
            .map(str::to_string);
        let success = error.is_none();
        emit_workflow_finished(&ctx.session_id, duration_ms, success, ctx.warnings.len());
        WorkflowResult {
            success,
            session_id: ctx.session_id,
            steps: ctx.steps,
            artifacts: ctx.artifacts,
            warnings: ctx.warnings,
            error: error.map(|e| e.to_string()),
            failed_step,
            duration_ms,
        }
    }
}
