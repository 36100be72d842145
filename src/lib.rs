// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # noesis
//!
//! A cognitive orchestration engine: a typed knowledge graph, probabilistic
//! inference over it, and adaptive plan/task orchestration that learns from
//! its own executions.
//!
//! ## Architecture
//!
//! - **Atomspace** (`atomspace`): typed hypergraph of nodes and links carrying
//!   truth and attention values, with pattern queries and traversal
//! - **PLN** (`pln`): forward and backward chaining with deduction, induction,
//!   abduction, revision and modus ponens
//! - **Cognitive reasoning** (`reasoning`): goal analysis, task decomposition,
//!   per-task reasoning and replanning decisions
//! - **Orchestrator** (`orchestrator`): plan lifecycle, sequential and parallel
//!   execution, cancellation, tools and statistics
//!
//! ## Library usage
//!
//! ```no_run
//! use noesis::config::EngineConfig;
//! use noesis::orchestrator::Orchestrator;
//! use noesis::plan::OrchestrationContext;
//!
//! # async fn demo() -> noesis::error::NoesisResult<()> {
//! let orchestrator = Orchestrator::builder(EngineConfig::default()).build();
//! let plan = orchestrator
//!     .create_plan("Research solar panels and write a report", OrchestrationContext::default())
//!     .await?;
//! println!("{} tasks", plan.tasks.len());
//! # Ok(())
//! # }
//! ```

pub mod atomspace;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod persistence;
pub mod plan;
pub mod pln;
pub mod reasoning;
pub mod text;

pub use atomspace::{Atom, AtomId, AtomType, Atomspace, AttentionValue, TruthValue};
pub use config::EngineConfig;
pub use error::{NoesisError, NoesisResult};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use plan::{OrchestrationContext, Plan, PlanId, PlanStatus, Task, TaskId, TaskStatus};
