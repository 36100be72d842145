//! The single-task executor contract.
//!
//! The orchestrator never runs task work itself. It hands each task to a
//! [`TaskExecutor`] together with [`ExecutorOptions`]; retries and timeouts are
//! the executor's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::plan::{OrchestrationContext, Plan, Task, TaskId};

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// Policy handed to the executor on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorOptions {
    /// Attempts after the first failure (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause between attempts (default: 1000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Per-attempt time limit (default: 30000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub confidence: f64,
    pub retry_count: u32,
}

/// Outcome of running one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecutionResult {
    pub success: bool,
    pub output: serde_json::Value,
    pub error: Option<String>,
    pub execution_time_ms: u64,
    pub metrics: ExecutionMetrics,
}

impl TaskExecutionResult {
    pub fn succeeded(output: serde_json::Value, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            output,
            error: None,
            execution_time_ms,
            metrics: ExecutionMetrics {
                confidence: 0.9,
                retry_count: 0,
            },
        }
    }

    pub fn failed(error: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            execution_time_ms,
            metrics: ExecutionMetrics {
                confidence: 0.0,
                retry_count: 0,
            },
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.metrics.confidence = confidence;
        self
    }
}

/// Runs a single task to completion.
///
/// Implementations must be safe to call repeatedly for the same task and must
/// honor cancellation requests made after dispatch.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute_task(
        &self,
        task: &Task,
        plan: &Plan,
        context: &OrchestrationContext,
        options: &ExecutorOptions,
    ) -> TaskExecutionResult;

    async fn cancel_task(&self, task_id: TaskId);

    async fn cancel_all_tasks(&self);
}
