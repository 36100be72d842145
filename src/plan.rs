//! Plan and task value types with their lifecycle states.
//!
//! Plans own their tasks. Both are plain values: the orchestrator produces a
//! new version on every change and persists it explicitly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::atomspace::now_millis;

/// Unique identifier for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(Uuid);

impl PlanId {
    pub fn generate() -> Self {
        PlanId(Uuid::new_v4())
    }

    /// Parse either the bare uuid or the displayed `plan-<uuid>` form.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.strip_prefix("plan-").unwrap_or(s);
        Uuid::parse_str(raw).ok().map(PlanId)
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "plan-{}", self.0)
    }
}

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn generate() -> Self {
        TaskId(Uuid::new_v4())
    }

    /// Parse either the bare uuid or the displayed `task-<uuid>` form.
    pub fn parse(s: &str) -> Option<Self> {
        let raw = s.strip_prefix("task-").unwrap_or(s);
        Uuid::parse_str(raw).ok().map(TaskId)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a plan: `planning -> executing -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Planning,
    Executing,
    Completed,
    Failed,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Planning => "planning",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(PlanStatus::Planning),
            "executing" => Ok(PlanStatus::Executing),
            "completed" => Ok(PlanStatus::Completed),
            "failed" => Ok(PlanStatus::Failed),
            other => Err(format!("unknown plan status: {other}")),
        }
    }
}

/// Lifecycle of a task: `pending -> running -> {completed | failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ambient information handed to reasoning and to the executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationContext {
    /// Tool names the executor may use.
    #[serde(default)]
    pub available_tools: Vec<String>,
    /// Descriptions of tasks that ran before this one.
    #[serde(default)]
    pub previous_tasks: Vec<String>,
    /// Free-form host data (thread id, model, ...).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl OrchestrationContext {
    pub fn with_tools<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available_tools: tools.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

/// One unit of work within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Task {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: TaskId::generate(),
            name: name.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    /// Mark completed with an output.
    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.touch();
    }

    /// Mark failed with an error message.
    pub fn fail(&mut self, result: Option<serde_json::Value>, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.result = result;
        self.error = Some(error.into());
        self.touch();
    }
}

/// A goal plus an ordered list of tasks and a lifecycle status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub goal: String,
    pub tasks: Vec<Task>,
    pub status: PlanStatus,
    #[serde(default)]
    pub context: OrchestrationContext,
    pub created_at: u64,
    #[serde(default)]
    pub completed_at: Option<u64>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            id: PlanId::generate(),
            goal: goal.into(),
            tasks,
            status: PlanStatus::Planning,
            context: OrchestrationContext::default(),
            created_at: now_millis(),
            completed_at: None,
        }
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// The first task still waiting to run.
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks.iter().find(|t| t.status == TaskStatus::Pending)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    /// Settle into `completed` iff every task completed, otherwise `failed`.
    pub fn finish(&mut self) {
        self.status = if self.all_completed() {
            PlanStatus::Completed
        } else {
            PlanStatus::Failed
        };
        self.completed_at = Some(now_millis());
    }

    /// Force `failed`, failing every non-terminal task with `reason`.
    ///
    /// Returns the ids of the tasks that were interrupted.
    pub fn cancel(&mut self, reason: &str) -> Vec<TaskId> {
        self.status = PlanStatus::Failed;
        let mut interrupted = Vec::new();
        for task in &mut self.tasks {
            if !task.status.is_terminal() {
                task.status = TaskStatus::Failed;
                task.error = Some(reason.to_string());
                task.touch();
                interrupted.push(task.id);
            }
        }
        interrupted
    }
}
