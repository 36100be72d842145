//! Bridge from orchestration state into the graph, and the pattern-mining
//! helpers that read it back.
//!
//! A plan becomes a `PlanNode`; its goal a `GoalNode` joined by
//! `SolvedByLink [goal, plan]`; each task a `TaskNode` joined by
//! `MemberLink [task, plan]` and chained with `DependsOnLink [task, previous]`.
//! Goal keywords become `ConceptNode`s attached by `ContextLink [concept, goal]`.

use std::collections::HashSet;

use serde::Serialize;

use super::index::Atomspace;
use super::truth::TruthValue;
use super::{AtomId, AtomType};
use crate::error::AtomspaceResult;
use crate::plan::{Plan, PlanStatus, TaskStatus};
use crate::text::extract_concepts;

/// A stored goal that shares concepts with a query goal.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarGoal {
    pub goal: AtomId,
    pub text: String,
    pub similarity: f64,
    pub tv: TruthValue,
}

/// The task set of a past plan whose goal mentioned a keyword.
#[derive(Debug, Clone, Serialize)]
pub struct TaskPattern {
    pub plan: AtomId,
    pub tasks: Vec<AtomId>,
    pub task_names: Vec<String>,
    /// Fraction of the plan's tasks that completed.
    pub success_rate: f64,
}

impl Atomspace {
    /// Index a plan, its goal, its tasks and its goal concepts.
    ///
    /// Re-indexing the same plan merges into the existing atoms and refreshes
    /// task metadata.
    pub fn add_plan_knowledge(&mut self, plan: &Plan) -> AtomspaceResult<AtomId> {
        let plan_confidence = if plan.status == PlanStatus::Completed {
            0.95
        } else {
            0.5
        };
        let plan_node = self.add_node(
            AtomType::PlanNode,
            plan.id.to_string(),
            Some(TruthValue::new(1.0, plan_confidence)),
            None,
        )?;
        self.set_meta(plan_node, "status", plan.status.as_str().into())?;

        let goal_node = self.add_node(
            AtomType::GoalNode,
            plan.goal.clone(),
            Some(TruthValue::new(1.0, 0.8)),
            None,
        )?;
        self.add_link(AtomType::SolvedByLink, vec![goal_node, plan_node], None, None)?;

        let mut previous: Option<AtomId> = None;
        for task in &plan.tasks {
            let (strength, confidence) = match task.status {
                TaskStatus::Completed => (1.0, 0.9),
                TaskStatus::Failed => (0.0, 0.9),
                TaskStatus::Pending | TaskStatus::Running => (0.5, 0.3),
            };
            let task_node = self.add_node(
                AtomType::TaskNode,
                task.id.to_string(),
                Some(TruthValue::new(strength, confidence)),
                None,
            )?;
            self.set_meta(task_node, "name", task.name.clone().into())?;
            self.set_meta(task_node, "description", task.description.clone().into())?;
            self.set_meta(task_node, "status", task.status.as_str().into())?;
            self.set_meta(
                task_node,
                "result",
                task.result.clone().unwrap_or(serde_json::Value::Null),
            )?;
            self.set_meta(
                task_node,
                "error",
                task.error.clone().map_or(serde_json::Value::Null, Into::into),
            )?;

            self.add_link(AtomType::MemberLink, vec![task_node, plan_node], None, None)?;
            if let Some(prev) = previous {
                self.add_dependency(task_node, prev)?;
            }
            previous = Some(task_node);
        }

        for concept in extract_concepts(&plan.goal) {
            let concept_node = self.add_node(
                AtomType::ConceptNode,
                concept,
                Some(TruthValue::new(0.7, 0.5)),
                None,
            )?;
            self.add_link(
                AtomType::ContextLink,
                vec![concept_node, goal_node],
                Some(TruthValue::new(0.6, 0.4)),
                None,
            )?;
        }

        tracing::debug!(plan = %plan.id, tasks = plan.tasks.len(), "indexed plan knowledge");
        Ok(plan_node)
    }

    /// Stored goals sharing concepts with `goal`, most similar first.
    ///
    /// Similarity is the number of shared concepts divided by the larger of
    /// the query's concept count and the stored goal's context-link count.
    /// The goal itself is skipped.
    pub fn find_similar_goals(&self, goal: &str, limit: usize) -> Vec<SimilarGoal> {
        let concepts: HashSet<String> = extract_concepts(goal).into_iter().collect();
        let mut similar: Vec<SimilarGoal> = Vec::new();

        for goal_atom in self.atoms_of_type(AtomType::GoalNode) {
            let Some(text) = goal_atom.name() else { continue };
            if text == goal {
                continue;
            }
            let context_links: Vec<_> = self
                .incoming(goal_atom.id)
                .into_iter()
                .filter(|l| l.atom_type == AtomType::ContextLink)
                .collect();
            let shared = context_links
                .iter()
                .filter_map(|l| l.outgoing().first())
                .filter_map(|id| self.get(*id).and_then(|c| c.name()))
                .filter(|name| concepts.contains(*name))
                .count();
            if shared == 0 {
                continue;
            }
            let denominator = concepts.len().max(context_links.len());
            similar.push(SimilarGoal {
                goal: goal_atom.id,
                text: text.to_string(),
                similarity: shared as f64 / denominator as f64,
                tv: goal_atom.tv,
            });
        }

        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        similar.truncate(limit);
        similar
    }

    /// Task sets of past plans whose goals mention any of `keywords`, best
    /// success rate first, at most five.
    pub fn successful_task_patterns(&self, keywords: &[&str]) -> Vec<TaskPattern> {
        let mut seen_plans: HashSet<AtomId> = HashSet::new();
        let mut patterns: Vec<TaskPattern> = Vec::new();

        for keyword in keywords {
            let Some(concept) = self.get_node(AtomType::ConceptNode, &keyword.to_lowercase())
            else {
                continue;
            };
            for context in self.incoming(concept.id) {
                if context.atom_type != AtomType::ContextLink {
                    continue;
                }
                let Some(&goal_id) = context.outgoing().get(1) else {
                    continue;
                };
                if self.get(goal_id).map(|g| g.atom_type) != Some(AtomType::GoalNode) {
                    continue;
                }
                for solved_by in self.incoming(goal_id) {
                    if solved_by.atom_type != AtomType::SolvedByLink {
                        continue;
                    }
                    let Some(&plan_id) = solved_by.outgoing().get(1) else {
                        continue;
                    };
                    if !seen_plans.insert(plan_id) {
                        continue;
                    }
                    if let Some(pattern) = self.task_pattern(plan_id) {
                        patterns.push(pattern);
                    }
                }
            }
        }

        patterns.sort_by(|a, b| b.success_rate.total_cmp(&a.success_rate));
        patterns.truncate(5);
        patterns
    }

    fn task_pattern(&self, plan_id: AtomId) -> Option<TaskPattern> {
        let mut tasks = Vec::new();
        let mut task_names = Vec::new();
        let mut completed = 0usize;
        for member in self.incoming(plan_id) {
            if member.atom_type != AtomType::MemberLink {
                continue;
            }
            let Some(task) = member.outgoing().first().and_then(|id| self.get(*id)) else {
                continue;
            };
            if task.atom_type != AtomType::TaskNode {
                continue;
            }
            if task.meta_str("status") == Some(TaskStatus::Completed.as_str()) {
                completed += 1;
            }
            tasks.push(task.id);
            task_names.push(task.meta_str("name").unwrap_or_default().to_string());
        }
        if tasks.is_empty() {
            return None;
        }
        Some(TaskPattern {
            plan: plan_id,
            success_rate: completed as f64 / tasks.len() as f64,
            tasks,
            task_names,
        })
    }
}
