//! Orchestrator-specific error types.

use miette::Diagnostic;
use thiserror::Error;

use crate::error::{AtomspaceError, PlnError, ReasoningError, ToolError};

/// Errors from plan lifecycle operations and the host-facing surface.
///
/// Task failures are not in here: they are recorded on the task and drive
/// replanning instead.
#[derive(Debug, Error, Diagnostic)]
pub enum OrchestratorError {
    #[error("plan not found: {id}")]
    #[diagnostic(
        code(noesis::orchestrator::plan_not_found),
        help("Use `list_plans` to see known plan ids.")
    )]
    PlanNotFound { id: String },

    #[error("task {task_id} not found in plan {plan_id}")]
    #[diagnostic(
        code(noesis::orchestrator::task_not_found),
        help("Task ids change when a plan is replanned; fetch the plan again.")
    )]
    TaskNotFound { plan_id: String, task_id: String },

    #[error("plan {id} is already executing")]
    #[diagnostic(
        code(noesis::orchestrator::already_executing),
        help("Wait for the running execution to finish, or cancel it first.")
    )]
    AlreadyExecuting { id: String },

    #[error("{feature} is disabled")]
    #[diagnostic(
        code(noesis::orchestrator::feature_disabled),
        help("Enable the feature in the engine configuration.")
    )]
    FeatureDisabled { feature: &'static str },

    #[error("no task executor configured")]
    #[diagnostic(
        code(noesis::orchestrator::no_executor),
        help("Build the orchestrator with `with_executor` before executing plans.")
    )]
    NoExecutor,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Atomspace(#[from] AtomspaceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pln(#[from] PlnError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reasoning(#[from] ReasoningError),
}

pub type OrchestratorResult<T> = std::result::Result<T, OrchestratorError>;
