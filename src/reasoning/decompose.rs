//! Goal decomposition into dependency-ordered task templates.
//!
//! A decomposition always opens with requirements analysis and closes with
//! validation and finalization. Optional steps come from the goal's keyword
//! families. Dependencies are checked as a DAG with petgraph before a plan is
//! built from the templates.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use super::classify::{TaskType, TextClassifier};
use crate::error::{ReasoningError, ReasoningResult};

const ANALYZE: &str = "Analyze Requirements";
const RESEARCH: &str = "Research and Gather Information";
const PLAN: &str = "Create Implementation Plan";
const DRAFT: &str = "Draft Initial Content";
const REFINE: &str = "Refine and Enhance";
const VALIDATE: &str = "Validate and Verify";
const FINALIZE: &str = "Finalize and Complete";

/// One step of a decomposed goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub name: String,
    pub description: String,
    pub task_type: TaskType,
    pub priority: u32,
    pub estimated_duration_ms: u64,
    /// Names of templates that must finish first.
    pub dependencies: Vec<String>,
    pub parallelizable: bool,
}

impl TaskTemplate {
    fn new(
        name: &str,
        description: impl Into<String>,
        task_type: TaskType,
        priority: u32,
        estimated_duration_ms: u64,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.into(),
            task_type,
            priority,
            estimated_duration_ms,
            dependencies: Vec::new(),
            parallelizable: false,
        }
    }

    fn after(mut self, dependency: &str) -> Self {
        self.dependencies.push(dependency.to_string());
        self
    }
}

/// An ordered list of task templates forming a dependency DAG.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskDecomposition {
    pub tasks: Vec<TaskTemplate>,
}

impl TaskDecomposition {
    /// Decompose `goal` into at most `target` templates (never fewer than the
    /// three anchors), validated as a DAG.
    pub fn build(
        goal: &str,
        target: usize,
        classifier: &dyn TextClassifier,
    ) -> ReasoningResult<Self> {
        let mut tasks = vec![TaskTemplate::new(
            ANALYZE,
            format!("Analyze and understand the requirements for: {goal}"),
            TaskType::Analysis,
            1,
            200,
        )];

        if classifier.matches_family(goal, TaskType::Research) {
            tasks.push(
                TaskTemplate::new(
                    RESEARCH,
                    "Collect relevant information, data, and context",
                    TaskType::Research,
                    2,
                    300,
                )
                .after(ANALYZE),
            );
        }

        if target > 3 || classifier.matches_family(goal, TaskType::Planning) {
            let mut plan = TaskTemplate::new(
                PLAN,
                "Design the approach and structure for achieving the goal",
                TaskType::Planning,
                3,
                250,
            )
            .after(ANALYZE);
            plan.parallelizable = true;
            tasks.push(plan);
        }

        if classifier.matches_family(goal, TaskType::Creation) {
            let mut draft = TaskTemplate::new(
                DRAFT,
                "Create the initial draft or prototype",
                TaskType::Creation,
                4,
                400,
            );
            if tasks.len() > 1 {
                let previous = tasks[tasks.len() - 1].name.clone();
                draft = draft.after(&previous);
            }
            tasks.push(draft);
            tasks.push(
                TaskTemplate::new(
                    REFINE,
                    "Improve and enhance the created content",
                    TaskType::Review,
                    5,
                    300,
                )
                .after(DRAFT),
            );
        }

        let previous = tasks[tasks.len() - 1].name.clone();
        tasks.push(
            TaskTemplate::new(
                VALIDATE,
                "Validate that all requirements are met and quality standards achieved",
                TaskType::Validation,
                10,
                200,
            )
            .after(&previous),
        );
        tasks.push(
            TaskTemplate::new(
                FINALIZE,
                "Final review and completion of the goal",
                TaskType::Review,
                11,
                150,
            )
            .after(VALIDATE),
        );

        let decomposition = Self {
            tasks: trim(tasks, target),
        };
        decomposition.validate()?;
        Ok(decomposition)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    /// Check that every dependency names a template and that there are no cycles.
    pub fn validate(&self) -> ReasoningResult<()> {
        self.dag().map(|_| ())
    }

    /// Templates in dependency order; ties keep their listed order.
    pub fn execution_order(&self) -> ReasoningResult<Vec<&TaskTemplate>> {
        let dag = self.dag()?;
        let mut in_degree: Vec<usize> = dag
            .node_indices()
            .map(|n| dag.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut done = vec![false; in_degree.len()];
        let mut order = Vec::with_capacity(in_degree.len());

        while order.len() < in_degree.len() {
            let Some(next) = (0..in_degree.len()).find(|&i| !done[i] && in_degree[i] == 0) else {
                break;
            };
            done[next] = true;
            order.push(&self.tasks[next]);
            for succ in dag.neighbors_directed(NodeIndex::new(next), Direction::Outgoing) {
                in_degree[succ.index()] -= 1;
            }
        }
        Ok(order)
    }

    /// Node `i` of the graph is `tasks[i]`; edges run dependency -> dependent.
    fn dag(&self) -> ReasoningResult<DiGraph<usize, ()>> {
        let mut dag = DiGraph::new();
        let index: HashMap<&str, NodeIndex> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), dag.add_node(i)))
            .collect();

        for (i, task) in self.tasks.iter().enumerate() {
            for dep in &task.dependencies {
                let Some(&from) = index.get(dep.as_str()) else {
                    return Err(ReasoningError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                dag.add_edge(from, NodeIndex::new(i), ());
            }
        }

        petgraph::algo::toposort(&dag, None).map_err(|cycle| ReasoningError::CycleDetected {
            task: self.tasks[dag[cycle.node_id()]].name.clone(),
        })?;
        Ok(dag)
    }
}

/// Keep the first template, a prefix of the middle, and the last two. Any
/// dependency on a dropped template is moved to its nearest kept predecessor.
fn trim(tasks: Vec<TaskTemplate>, target: usize) -> Vec<TaskTemplate> {
    if tasks.len() <= target || tasks.len() <= 3 {
        return tasks;
    }

    let len = tasks.len();
    let middle = target.saturating_sub(3).min(len - 3);
    let kept: Vec<bool> = (0..len)
        .map(|i| i == 0 || i >= len - 2 || i <= middle)
        .collect();

    let position: HashMap<String, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.name.clone(), i))
        .collect();
    let relink = |dep: &String| -> Option<String> {
        let start = *position.get(dep)?;
        (0..=start)
            .rev()
            .find(|&i| kept[i])
            .map(|i| tasks[i].name.clone())
    };

    let mut trimmed = Vec::with_capacity(target.max(3));
    for (i, task) in tasks.iter().enumerate() {
        if !kept[i] {
            continue;
        }
        let mut task = task.clone();
        let mut deps: Vec<String> = Vec::new();
        for dep in &task.dependencies {
            let Some(dep) = relink(dep) else { continue };
            if dep != task.name && !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        task.dependencies = deps;
        trimmed.push(task);
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::classify::KeywordClassifier;

    fn build(goal: &str, target: usize) -> TaskDecomposition {
        TaskDecomposition::build(goal, target, &KeywordClassifier).unwrap()
    }

    #[test]
    fn research_report_decomposition() {
        let d = build("Write a comprehensive research report on solar energy", 8);
        let names: Vec<&str> = d.names().collect();
        assert_eq!(
            names,
            vec![ANALYZE, RESEARCH, PLAN, DRAFT, REFINE, VALIDATE, FINALIZE]
        );
        assert_eq!(d.tasks[3].dependencies, vec![PLAN.to_string()]);
        assert_eq!(d.tasks[5].dependencies, vec![REFINE.to_string()]);
        assert!(d.tasks[2].parallelizable);
    }

    #[test]
    fn minimal_goal_keeps_the_anchors() {
        let d = build("do the thing", 2);
        let names: Vec<&str> = d.names().collect();
        assert_eq!(names, vec![ANALYZE, VALIDATE, FINALIZE]);
        assert_eq!(d.tasks[1].dependencies, vec![ANALYZE.to_string()]);
    }

    #[test]
    fn trimming_relinks_dropped_dependencies() {
        // Analyze, Research, Plan, Draft, Refine, Validate, Finalize -> 4 kept.
        let d = build("Write a comprehensive research report on solar energy", 4);
        let names: Vec<&str> = d.names().collect();
        assert_eq!(names, vec![ANALYZE, RESEARCH, VALIDATE, FINALIZE]);
        assert_eq!(d.tasks[2].dependencies, vec![RESEARCH.to_string()]);
        d.validate().unwrap();
    }

    #[test]
    fn execution_order_respects_dependencies() {
        let d = build("Research and write a plan", 8);
        let order: Vec<&str> = d
            .execution_order()
            .unwrap()
            .into_iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(order.first(), Some(&ANALYZE));
        assert_eq!(order.last(), Some(&FINALIZE));
        for (i, name) in order.iter().enumerate() {
            let task = d.tasks.iter().find(|t| t.name == *name).unwrap();
            for dep in &task.dependencies {
                let at = order.iter().position(|n| n == dep).unwrap();
                assert!(at < i);
            }
        }
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut d = build("do the thing", 3);
        d.tasks[1].dependencies.push("Missing".into());
        assert!(matches!(
            d.validate(),
            Err(ReasoningError::UnknownDependency { dependency, .. }) if dependency == "Missing"
        ));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut d = build("do the thing", 3);
        d.tasks[0].dependencies.push(FINALIZE.into());
        assert!(matches!(d.validate(), Err(ReasoningError::CycleDetected { .. })));
    }
}
