//! Structured lifecycle events for workflow runs.
//!
//! - `workflow_span`: span tagging everything inside a run with its session id
//! - `emit_*`: one `info!`/`warn!` event per lifecycle transition
//!
//! Filter with `RUST_LOG`; `--json` on the CLI switches to JSON lines.

use tracing::{info, warn, Span};

/// A `dockhand.workflow` span for one run.
///
/// Attach it to the run future rather than entering it, since a run awaits
/// across threads.
///
/// # Example
///
/// ```ignore
/// use tracing::Instrument;
/// run_steps().instrument(workflow_span("sess-123", "containerize")).await;
/// // events emitted inside carry session_id = "sess-123"
/// ```
pub fn workflow_span(session_id: &str, workflow: &str) -> Span {
    tracing::info_span!("dockhand.workflow", session_id = %session_id, workflow = %workflow)
}

/// Run accepted, before the first step.
pub fn emit_workflow_started(session_id: &str, workflow: &str, total_steps: usize) {
    info!(
        event = "workflow.started",
        session_id = %session_id,
        workflow = %workflow,
        total_steps = total_steps,
    );
}

/// Run over, successful or not. `duration_ms` is wall time for the whole run.
pub fn emit_workflow_finished(session_id: &str, duration_ms: u64, success: bool, warnings: usize) {
    info!(
        event = "workflow.finished",
        session_id = %session_id,
        duration_ms = duration_ms,
        success = success,
        warnings = warnings,
    );
}

/// Abort observed before `before_step` started (`<start>` when no step ran).
pub fn emit_workflow_aborted(session_id: &str, before_step: Option<&str>) {
    warn!(
        event = "workflow.aborted",
        session_id = %session_id,
        before_step = before_step.unwrap_or("<start>"),
    );
}

/// Step handler about to run.
pub fn emit_step_started(session_id: &str, step: &str) {
    info!(event = "step.started", session_id = %session_id, step = %step);
}

/// Step handler returned successfully after `duration_ms`.
pub fn emit_step_completed(session_id: &str, step: &str, duration_ms: u64) {
    info!(
        event = "step.completed",
        session_id = %session_id,
        step = %step,
        duration_ms = duration_ms,
    );
}

/// Step failure. `soft` marks failures downgraded to warnings.
pub fn emit_step_failed(session_id: &str, step: &str, error: &dyn std::fmt::Display, soft: bool) {
    warn!(
        event = "step.failed",
        session_id = %session_id,
        step = %step,
        error = %error,
        soft = soft,
    );
}

/// Step not run because an earlier required step failed or the run was aborted.
pub fn emit_step_skipped(session_id: &str, step: &str) {
    info!(event = "step.skipped", session_id = %session_id, step = %step);
}

/// Session state could not be written; the run continues on in-memory state
/// only where the caller allows it.
pub fn emit_session_write_error(session_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "session.write_error", session_id = %session_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_and_events_do_not_panic() {
        let _entered = workflow_span("sess", "containerize").entered();
        emit_workflow_started("sess", "containerize", 3);
        emit_step_started("sess", "build-image");
        emit_step_failed("sess", "build-image", &"boom", false);
        emit_step_skipped("sess", "deploy");
        emit_workflow_aborted("sess", None);
        emit_workflow_finished("sess", 12, false, 0);
    }
}
