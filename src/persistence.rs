//! Plan storage and execution learning.
//!
//! The orchestrator saves every plan version and hands each finished
//! execution to a [`PlanPersistence`] store. Reasoning reads back success
//! rates and insights from the same store. Writes are best-effort: a failing
//! store never aborts a plan.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceResult;
use crate::plan::{Plan, PlanId, TaskId, TaskStatus};
use crate::text::word_overlap;

/// Success rate assumed for tasks with no recorded history.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.8;

/// Minimum word overlap for a recorded goal or task to count as similar.
const SIMILARITY_THRESHOLD: f64 = 0.5;

/// Per-task outcome of one plan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub task_id: TaskId,
    pub name: String,
    pub description: String,
    pub status: TaskStatus,
    pub execution_time_ms: u64,
    pub retry_count: u32,
    pub confidence: f64,
    pub error: Option<String>,
}

/// What past executions of similar goals looked like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalInsights {
    pub occurrences: usize,
    pub average_success_rate: f64,
    /// Task names of the most successful similar execution.
    pub best_decomposition: Vec<String>,
}

/// Durable plan store plus learning queries.
#[async_trait]
pub trait PlanPersistence: Send + Sync {
    async fn save(&self, plan: &Plan) -> PersistenceResult<()>;

    async fn load_all(&self) -> PersistenceResult<Vec<Plan>>;

    async fn record_execution(
        &self,
        plan: &Plan,
        history: &HashMap<TaskId, TaskHistoryEntry>,
    ) -> PersistenceResult<()>;

    fn recommendations(&self, goal: &str) -> Vec<String>;

    fn insights_for_goal(&self, goal: &str) -> Option<GoalInsights>;

    /// Fraction of similar past tasks that completed.
    fn task_success_rate(&self, description: &str) -> f64;

    /// Mean duration of similar past tasks in milliseconds, 0 when unknown.
    fn average_execution_time(&self, description: &str) -> f64;
}

// ---------------------------------------------------------------------------
// No-op store
// ---------------------------------------------------------------------------

/// Stores nothing and knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersistence;

#[async_trait]
impl PlanPersistence for NoopPersistence {
    async fn save(&self, _plan: &Plan) -> PersistenceResult<()> {
        Ok(())
    }

    async fn load_all(&self) -> PersistenceResult<Vec<Plan>> {
        Ok(Vec::new())
    }

    async fn record_execution(
        &self,
        _plan: &Plan,
        _history: &HashMap<TaskId, TaskHistoryEntry>,
    ) -> PersistenceResult<()> {
        Ok(())
    }

    fn recommendations(&self, _goal: &str) -> Vec<String> {
        Vec::new()
    }

    fn insights_for_goal(&self, _goal: &str) -> Option<GoalInsights> {
        None
    }

    fn task_success_rate(&self, _description: &str) -> f64 {
        DEFAULT_SUCCESS_RATE
    }

    fn average_execution_time(&self, _description: &str) -> f64 {
        0.0
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ExecutionRecord {
    goal: String,
    task_names: Vec<String>,
    success_rate: f64,
    entries: Vec<TaskHistoryEntry>,
}

/// Keeps plans and execution records in memory and derives insights from them.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    plans: DashMap<PlanId, Plan>,
    records: RwLock<Vec<ExecutionRecord>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of executions recorded so far.
    pub fn execution_count(&self) -> usize {
        self.read_records(|records| records.len())
    }

    fn read_records<T>(&self, f: impl FnOnce(&[ExecutionRecord]) -> T) -> T {
        let guard = self.records.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    fn similar_entries(&self, description: &str) -> Vec<TaskHistoryEntry> {
        self.read_records(|records| {
            records
                .iter()
                .flat_map(|r| r.entries.iter())
                .filter(|e| {
                    word_overlap(&e.description, description) >= SIMILARITY_THRESHOLD
                        || word_overlap(&e.name, description) >= SIMILARITY_THRESHOLD
                })
                .cloned()
                .collect()
        })
    }
}

#[async_trait]
impl PlanPersistence for MemoryPersistence {
    async fn save(&self, plan: &Plan) -> PersistenceResult<()> {
        self.plans.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn load_all(&self) -> PersistenceResult<Vec<Plan>> {
        let mut plans: Vec<Plan> = self.plans.iter().map(|e| e.value().clone()).collect();
        plans.sort_by_key(|p| p.created_at);
        Ok(plans)
    }

    async fn record_execution(
        &self,
        plan: &Plan,
        history: &HashMap<TaskId, TaskHistoryEntry>,
    ) -> PersistenceResult<()> {
        // Keep plan order rather than map order.
        let entries: Vec<TaskHistoryEntry> = plan
            .tasks
            .iter()
            .filter_map(|t| history.get(&t.id).cloned())
            .collect();
        let success_rate = if plan.tasks.is_empty() {
            0.0
        } else {
            plan.count(TaskStatus::Completed) as f64 / plan.tasks.len() as f64
        };
        let record = ExecutionRecord {
            goal: plan.goal.clone(),
            task_names: plan.tasks.iter().map(|t| t.name.clone()).collect(),
            success_rate,
            entries,
        };
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        tracing::debug!(plan_id = %plan.id, success_rate, "recorded execution");
        Ok(())
    }

    fn recommendations(&self, goal: &str) -> Vec<String> {
        let Some(insights) = self.insights_for_goal(goal) else {
            return Vec::new();
        };
        let mut recs = vec![format!(
            "Similar goals were attempted {} times with {:.0}% average success",
            insights.occurrences,
            insights.average_success_rate * 100.0
        )];
        if insights.average_success_rate >= 0.7 && !insights.best_decomposition.is_empty() {
            recs.push(format!(
                "Reuse the task structure that worked before: {}",
                insights.best_decomposition.join(" -> ")
            ));
        } else if insights.average_success_rate < 0.5 {
            recs.push("Past attempts often failed; add validation checkpoints".to_string());
        }
        recs
    }

    fn insights_for_goal(&self, goal: &str) -> Option<GoalInsights> {
        self.read_records(|records| {
            let similar: Vec<&ExecutionRecord> = records
                .iter()
                .filter(|r| r.goal == goal || word_overlap(&r.goal, goal) >= SIMILARITY_THRESHOLD)
                .collect();
            let best = similar
                .iter()
                .max_by(|a, b| a.success_rate.total_cmp(&b.success_rate))?;
            Some(GoalInsights {
                occurrences: similar.len(),
                average_success_rate: similar.iter().map(|r| r.success_rate).sum::<f64>()
                    / similar.len() as f64,
                best_decomposition: best.task_names.clone(),
            })
        })
    }

    fn task_success_rate(&self, description: &str) -> f64 {
        let entries = self.similar_entries(description);
        if entries.is_empty() {
            return DEFAULT_SUCCESS_RATE;
        }
        let completed = entries
            .iter()
            .filter(|e| e.status == TaskStatus::Completed)
            .count();
        completed as f64 / entries.len() as f64
    }

    fn average_execution_time(&self, description: &str) -> f64 {
        let entries = self.similar_entries(description);
        if entries.is_empty() {
            return 0.0;
        }
        entries.iter().map(|e| e.execution_time_ms as f64).sum::<f64>() / entries.len() as f64
    }
}
