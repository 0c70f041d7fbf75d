//! Dockhand workflow orchestration
//!
//! Runs ordered steps against a session: each step is started, executed and
//! recorded, required failures stop the run and skip what is left, soft
//! failures become warnings.
//!
//! ## Key Components
//!
//! - `WorkflowOrchestrator`: step state machine bound to a `SessionStore`
//! - `ContainerizationPipeline`: the analyze → build → scan → deploy pipeline
//! - `dry_run`: deterministic in-process collaborators
//! - `contract`: JSON schemas of the host-facing params and result

pub mod abort;
pub mod contract;
pub mod dry_run;
pub mod error;
pub mod orchestrator;
pub mod params;
pub mod pipeline;
pub mod step;

pub use abort::{AbortController, AbortSignal};
pub use error::{Result, WorkflowError};
pub use orchestrator::{WorkflowContext, WorkflowOrchestrator, WorkflowResult};
pub use params::WorkflowParams;
pub use pipeline::{Collaborators, ContainerizationPipeline, WORKFLOW_NAME};
pub use step::{
    FnStep, StepContext, StepDefinition, StepHandler, StepPolicy, StepStatus, WorkflowStep,
};
