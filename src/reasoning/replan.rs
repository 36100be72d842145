//! Replanning heuristics: decide whether a running plan should change, and
//! apply the suggested changes to a copy of it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::orchestrator::TaskExecutionResult;
use crate::plan::{Plan, Task, TaskId, TaskStatus};
use crate::text::contains_any;

/// Average confidence assumed when no task has reported a result yet.
const DEFAULT_RESULT_CONFIDENCE: f64 = 0.8;

const DEPENDENCY_MARKERS: &[&str] = &["after", "based on", "using results"];

/// One suggested edit to a plan's task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanChange {
    AddTask {
        name: String,
        description: String,
        priority: u32,
    },
    RemoveTask {
        task_id: TaskId,
        priority: u32,
    },
    ModifyTask {
        task_id: TaskId,
        name: Option<String>,
        description: Option<String>,
        priority: u32,
    },
    ReorderTasks {
        priority: u32,
    },
}

impl PlanChange {
    pub fn priority(&self) -> u32 {
        match self {
            PlanChange::AddTask { priority, .. }
            | PlanChange::RemoveTask { priority, .. }
            | PlanChange::ModifyTask { priority, .. }
            | PlanChange::ReorderTasks { priority } => *priority,
        }
    }
}

/// Whether to replan, why, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplanDecision {
    pub should_replan: bool,
    pub reason: Option<String>,
    /// Sorted by descending priority.
    pub changes: Vec<PlanChange>,
    pub confidence: f64,
}

/// Inspect task outcomes so far and suggest changes.
pub fn evaluate_replan(plan: &Plan, results: &HashMap<TaskId, TaskExecutionResult>) -> ReplanDecision {
    let completed = plan.count(TaskStatus::Completed);
    let failed: Vec<&Task> = plan
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .collect();
    let executed = completed + failed.len();
    let failure_rate = if executed == 0 {
        0.0
    } else {
        failed.len() as f64 / executed as f64
    };

    let mut reason: Option<String> = None;
    let mut changes = Vec::new();

    if failure_rate > 0.3 && failed.len() >= 2 {
        reason = Some(format!(
            "High failure rate ({:.0}%) detected",
            failure_rate * 100.0
        ));
        for task in &failed {
            changes.push(PlanChange::AddTask {
                name: format!("Recover from {}", task.name),
                description: format!(
                    "Address failure in \"{}\": {}",
                    task.name,
                    task.error.as_deref().unwrap_or("Unknown error")
                ),
                priority: 10,
            });
        }
    }

    for (i, task) in plan.tasks.iter().enumerate() {
        if task.status != TaskStatus::Pending {
            continue;
        }
        let text = format!("{} {}", task.name, task.description).to_lowercase();
        let earlier_failed = plan.tasks[..i]
            .iter()
            .any(|t| t.status == TaskStatus::Failed);
        if contains_any(&text, DEPENDENCY_MARKERS) && earlier_failed {
            changes.push(PlanChange::ModifyTask {
                task_id: task.id,
                name: None,
                description: Some(format!(
                    "{} (adjusted for dependency failure)",
                    task.description
                )),
                priority: 5,
            });
            if reason.is_none() {
                reason = Some("Dependency failures detected".to_string());
            }
        }
    }

    let average_confidence = if results.is_empty() {
        DEFAULT_RESULT_CONFIDENCE
    } else {
        results.values().map(|r| r.metrics.confidence).sum::<f64>() / results.len() as f64
    };
    if average_confidence < 0.6 && plan.next_pending().is_some() {
        changes.push(PlanChange::AddTask {
            name: "Additional Validation".to_string(),
            description: "Validate previous task outputs before continuing".to_string(),
            priority: 8,
        });
        if reason.is_none() {
            reason = Some(format!(
                "Low execution confidence ({:.0}%)",
                average_confidence * 100.0
            ));
        }
    }

    changes.sort_by(|a, b| b.priority().cmp(&a.priority()));
    let should_replan = !changes.is_empty();
    ReplanDecision {
        should_replan,
        reason,
        changes,
        confidence: if should_replan { 0.75 } else { 0.9 },
    }
}

/// Apply `changes` in order to a copy of `plan`.
///
/// Added tasks go before the first task that was pending when the call
/// started, keeping the order they were suggested in, or at the end when
/// nothing is pending.
pub fn apply_replan_changes(plan: &Plan, changes: &[PlanChange]) -> Plan {
    let mut next = plan.clone();
    let mut cursor = next.tasks.iter().position(|t| t.status == TaskStatus::Pending);

    for change in changes {
        match change {
            PlanChange::AddTask {
                name, description, ..
            } => {
                let task = Task::new(name.clone(), description.clone());
                match cursor.as_mut() {
                    Some(at) => {
                        next.tasks.insert(*at, task);
                        *at += 1;
                    }
                    None => next.tasks.push(task),
                }
            }
            PlanChange::RemoveTask { task_id, .. } => {
                if let Some(at) = next.tasks.iter().position(|t| t.id == *task_id) {
                    next.tasks.remove(at);
                    if let Some(c) = cursor.as_mut() {
                        if at < *c {
                            *c -= 1;
                        }
                    }
                }
            }
            PlanChange::ModifyTask {
                task_id,
                name,
                description,
                ..
            } => {
                if let Some(task) = next.task_mut(*task_id) {
                    if let Some(name) = name {
                        task.name = name.clone();
                    }
                    if let Some(description) = description {
                        task.description = description.clone();
                    }
                    task.touch();
                }
            }
            PlanChange::ReorderTasks { .. } => {
                // Stable: executed tasks first, then everything still pending.
                next.tasks.sort_by_key(|t| t.status == TaskStatus::Pending);
                cursor = next.tasks.iter().position(|t| t.status == TaskStatus::Pending);
            }
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_with(statuses: &[TaskStatus]) -> Plan {
        let mut plan = Plan::new(
            "goal",
            (0..statuses.len())
                .map(|i| Task::new(format!("t{i}"), format!("task {i}")))
                .collect(),
        );
        for (task, status) in plan.tasks.iter_mut().zip(statuses) {
            match status {
                TaskStatus::Completed => task.complete(serde_json::json!("ok")),
                TaskStatus::Failed => task.fail(None, "boom"),
                _ => task.status = *status,
            }
        }
        plan
    }

    #[test]
    fn high_failure_rate_adds_recovery_tasks() {
        use TaskStatus::*;
        let plan = plan_with(&[Completed, Failed, Failed, Completed, Failed]);
        let decision = evaluate_replan(&plan, &HashMap::new());
        assert!(decision.should_replan);
        assert_eq!(decision.confidence, 0.75);
        assert_eq!(decision.reason.as_deref(), Some("High failure rate (60%) detected"));
        let adds: Vec<_> = decision
            .changes
            .iter()
            .filter(|c| matches!(c, PlanChange::AddTask { .. }))
            .collect();
        assert_eq!(adds.len(), 3);
        assert!(matches!(
            adds[0],
            PlanChange::AddTask { name, description, priority: 10 }
                if name == "Recover from t1" && description == "Address failure in \"t1\": boom"
        ));
    }

    #[test]
    fn healthy_plan_is_left_alone() {
        use TaskStatus::*;
        let plan = plan_with(&[Completed, Completed, Pending]);
        let decision = evaluate_replan(&plan, &HashMap::new());
        assert!(!decision.should_replan);
        assert!(decision.reason.is_none());
        assert_eq!(decision.confidence, 0.9);
    }

    #[test]
    fn dependent_pending_tasks_are_adjusted() {
        use TaskStatus::*;
        let mut plan = plan_with(&[Completed, Failed, Pending]);
        plan.tasks[2].description = "Summarize based on the survey".into();
        let decision = evaluate_replan(&plan, &HashMap::new());
        assert_eq!(decision.reason.as_deref(), Some("Dependency failures detected"));
        assert_eq!(decision.changes.len(), 1);

        let next = apply_replan_changes(&plan, &decision.changes);
        assert_eq!(
            next.tasks[2].description,
            "Summarize based on the survey (adjusted for dependency failure)"
        );
        // The input plan is untouched.
        assert_eq!(plan.tasks[2].description, "Summarize based on the survey");
    }

    #[test]
    fn low_confidence_requests_validation() {
        use TaskStatus::*;
        let plan = plan_with(&[Completed, Pending]);
        let mut results = HashMap::new();
        let mut result = TaskExecutionResult::succeeded(serde_json::json!("meh"), 10);
        result.metrics.confidence = 0.4;
        results.insert(plan.tasks[0].id, result);

        let decision = evaluate_replan(&plan, &results);
        assert_eq!(decision.reason.as_deref(), Some("Low execution confidence (40%)"));
        assert!(matches!(
            &decision.changes[0],
            PlanChange::AddTask { name, priority: 8, .. } if name == "Additional Validation"
        ));
    }

    #[test]
    fn changes_sort_by_priority() {
        use TaskStatus::*;
        let mut plan = plan_with(&[Failed, Failed, Pending]);
        plan.tasks[2].description = "continue after the failures".into();
        let mut results = HashMap::new();
        let mut low = TaskExecutionResult::failed("boom", 5);
        low.metrics.confidence = 0.1;
        results.insert(plan.tasks[0].id, low);

        let decision = evaluate_replan(&plan, &results);
        let priorities: Vec<u32> = decision.changes.iter().map(PlanChange::priority).collect();
        assert_eq!(priorities, vec![10, 10, 8, 5]);
    }

    #[test]
    fn added_tasks_go_before_pending_in_order() {
        use TaskStatus::*;
        let plan = plan_with(&[Completed, Pending]);
        let changes = vec![
            PlanChange::AddTask {
                name: "a".into(),
                description: "a".into(),
                priority: 10,
            },
            PlanChange::AddTask {
                name: "b".into(),
                description: "b".into(),
                priority: 8,
            },
        ];
        let next = apply_replan_changes(&plan, &changes);
        let names: Vec<&str> = next.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t0", "a", "b", "t1"]);

        let done = plan_with(&[Completed]);
        let next = apply_replan_changes(&done, &changes[..1]);
        assert_eq!(next.tasks.last().unwrap().name, "a");
    }

    #[test]
    fn remove_and_reorder() {
        use TaskStatus::*;
        let plan = plan_with(&[Pending, Completed, Failed, Pending]);
        let changes = vec![
            PlanChange::RemoveTask {
                task_id: plan.tasks[3].id,
                priority: 1,
            },
            PlanChange::ReorderTasks { priority: 1 },
        ];
        let next = apply_replan_changes(&plan, &changes);
        let names: Vec<&str> = next.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t1", "t2", "t0"]);
    }
}
