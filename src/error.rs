//! Rich diagnostic error types for the noesis engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text so callers know exactly what went wrong
//! and how to fix it. Per-task execution failures are *not* errors: they are
//! recorded on the task and drive replanning.

use miette::Diagnostic;
use thiserror::Error;

use crate::orchestrator::OrchestratorError;

/// Top-level error type for the noesis engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum NoesisError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Atomspace(#[from] AtomspaceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pln(#[from] PlnError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Reasoning(#[from] ReasoningError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

pub type NoesisResult<T> = std::result::Result<T, NoesisError>;

// ---------------------------------------------------------------------------
// Atomspace errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AtomspaceError {
    #[error("unknown atom: {id}")]
    #[diagnostic(
        code(noesis::atomspace::unknown_atom),
        help(
            "Every atom referenced by a link must already exist in the atomspace. \
             Add the target nodes first, then create the link."
        )
    )]
    UnknownAtom { id: u64 },

    #[error("atom type {atom_type} cannot be used as a {expected}")]
    #[diagnostic(
        code(noesis::atomspace::type_mismatch),
        help("Use a node type (e.g. ConceptNode) for nodes and a link type (e.g. InheritanceLink) for links.")
    )]
    TypeMismatch {
        atom_type: String,
        expected: &'static str,
    },

    #[error("unknown atom type: \"{name}\"")]
    #[diagnostic(
        code(noesis::atomspace::unknown_type),
        help("Atom type names use the full form, e.g. \"ConceptNode\" or \"InheritanceLink\".")
    )]
    UnknownType { name: String },

    #[error("invalid name pattern: {message}")]
    #[diagnostic(
        code(noesis::atomspace::invalid_pattern),
        help("Name patterns use the `regex` crate syntax and must match the whole name.")
    )]
    InvalidPattern { message: String },

    #[error("invalid snapshot: {message}")]
    #[diagnostic(
        code(noesis::atomspace::invalid_snapshot),
        help(
            "Snapshots must list atoms with dense ids starting at 0, and every link must \
             reference atoms that appear earlier in the snapshot."
        )
    )]
    InvalidSnapshot { message: String },

    #[error("snapshot I/O failed: {path}")]
    #[diagnostic(
        code(noesis::atomspace::io),
        help("Check that the snapshot path exists and is readable/writable.")
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot serialization failed: {message}")]
    #[diagnostic(
        code(noesis::atomspace::serialization),
        help("The snapshot file is not valid JSON or does not match the snapshot layout.")
    )]
    Serialization { message: String },
}

pub type AtomspaceResult<T> = std::result::Result<T, AtomspaceError>;

// ---------------------------------------------------------------------------
// PLN errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PlnError {
    #[error("invalid inference mode: \"{mode}\"")]
    #[diagnostic(
        code(noesis::pln::invalid_mode),
        help("Supported modes are \"forward\", \"backward\" and \"task_success\".")
    )]
    InvalidInferenceMode { mode: String },

    #[error("inference request is missing \"{field}\" for mode {mode}")]
    #[diagnostic(
        code(noesis::pln::missing_parameter),
        help("Backward chaining needs a target atom id; task_success needs a task description.")
    )]
    MissingParameter { mode: &'static str, field: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Atomspace(#[from] AtomspaceError),
}

pub type PlnResult<T> = std::result::Result<T, PlnError>;

// ---------------------------------------------------------------------------
// Reasoning errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReasoningError {
    #[error("task \"{task}\" depends on unknown task \"{dependency}\"")]
    #[diagnostic(
        code(noesis::reasoning::unknown_dependency),
        help("Every dependency must name another task of the same decomposition.")
    )]
    UnknownDependency { task: String, dependency: String },

    #[error("dependency cycle detected at task \"{task}\"")]
    #[diagnostic(
        code(noesis::reasoning::cycle),
        help("Task dependencies must form a DAG. Remove one of the dependencies on the cycle.")
    )]
    CycleDetected { task: String },
}

pub type ReasoningResult<T> = std::result::Result<T, ReasoningError>;

// ---------------------------------------------------------------------------
// Persistence errors
// ---------------------------------------------------------------------------

/// Failures reported by a plan store. The orchestrator logs these and carries on.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("plan store unavailable: {message}")]
    #[diagnostic(
        code(noesis::persistence::unavailable),
        help("The in-memory plan state is still authoritative; the write can be retried later.")
    )]
    Unavailable { message: String },

    #[error("failed to encode plan record: {message}")]
    #[diagnostic(code(noesis::persistence::encode))]
    Encode { message: String },
}

pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;

// ---------------------------------------------------------------------------
// Tool errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("tool not found: \"{name}\"")]
    #[diagnostic(
        code(noesis::tool::not_found),
        help("Register the tool with `ToolRegistry::register` before invoking it.")
    )]
    NotFound { name: String },

    #[error("tool chain not found: \"{name}\"")]
    #[diagnostic(
        code(noesis::tool::chain_not_found),
        help("Define the chain with `ToolRegistry::define_chain` before invoking it.")
    )]
    ChainNotFound { name: String },

    #[error("tool \"{name}\" timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(noesis::tool::timeout),
        help("Raise the invocation timeout or make the tool faster.")
    )]
    Timeout { name: String, timeout_ms: u64 },

    #[error("tool \"{name}\" failed: {message}")]
    #[diagnostic(code(noesis::tool::execution), help("Check the tool's input arguments."))]
    Execution { name: String, message: String },
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(noesis::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(noesis::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    #[diagnostic(
        code(noesis::config::parse),
        help("Check the TOML syntax. Unknown keys are ignored; missing keys take their defaults.")
    )]
    Parse { message: String },

    #[error("failed to serialize config: {message}")]
    #[diagnostic(code(noesis::config::serialize))]
    Serialize { message: String },

    #[error("invalid config: {message}")]
    #[diagnostic(
        code(noesis::config::invalid),
        help("Task and parallelism limits must be at least 1; confidences must lie in [0, 1].")
    )]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
