//! Bounded-parallel plan execution.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{FuturesUnordered, StreamExt};

use super::executor::{ExecutorOptions, TaskExecutionResult, TaskExecutor};
use crate::plan::{OrchestrationContext, Plan, Task, TaskId, TaskStatus};

/// Invoked once per finished task, in completion order.
pub type TaskCompletionCallback = Arc<dyn Fn(&Task, &TaskExecutionResult) + Send + Sync>;

/// Polled before each task starts; `true` stops the run from starting more.
pub type CancellationCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Runs a plan's tasks concurrently and reports each completion.
#[async_trait]
pub trait MultiAgentCoordinator: Send + Sync {
    async fn coordinate_plan_execution(
        &self,
        plan: &Plan,
        context: &OrchestrationContext,
        on_task_complete: TaskCompletionCallback,
        is_cancelled: CancellationCheck,
    ) -> HashMap<TaskId, TaskExecutionResult>;
}

/// Runs every pending task through one executor, at most `max_parallel` at a time.
#[derive(Clone)]
pub struct ParallelCoordinator {
    executor: Arc<dyn TaskExecutor>,
    max_parallel: usize,
    options: ExecutorOptions,
}

impl ParallelCoordinator {
    pub fn new(executor: Arc<dyn TaskExecutor>, max_parallel: usize) -> Self {
        Self {
            executor,
            max_parallel: max_parallel.max(1),
            options: ExecutorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    async fn run_task<'a>(
        &'a self,
        task: &'a Task,
        plan: &'a Plan,
        context: &'a OrchestrationContext,
    ) -> (&'a Task, TaskExecutionResult) {
        let result = self
            .executor
            .execute_task(task, plan, context, &self.options)
            .await;
        (task, result)
    }
}

impl std::fmt::Debug for ParallelCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelCoordinator")
            .field("max_parallel", &self.max_parallel)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MultiAgentCoordinator for ParallelCoordinator {
    async fn coordinate_plan_execution(
        &self,
        plan: &Plan,
        context: &OrchestrationContext,
        on_task_complete: TaskCompletionCallback,
        is_cancelled: CancellationCheck,
    ) -> HashMap<TaskId, TaskExecutionResult> {
        let mut queue = Vec::new();
        for task in &plan.tasks {
            if task.status == TaskStatus::Pending {
                queue.push(task);
            }
        }
        let mut queue = queue.into_iter();
        let mut running = FuturesUnordered::new();
        let mut results = HashMap::new();

        loop {
            while running.len() < self.max_parallel {
                if is_cancelled() {
                    tracing::debug!(plan_id = %plan.id, "coordinator stopped starting tasks");
                    break;
                }
                match queue.next() {
                    Some(task) => running.push(self.run_task(task, plan, context)),
                    None => break,
                }
            }
            match running.next().await {
                Some((task, result)) => {
                    on_task_complete(task, &result);
                    results.insert(task.id, result);
                }
                None => break,
            }
        }
        results
    }
}
