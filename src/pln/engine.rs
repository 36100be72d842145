//! The PLN engine: forward chaining, task-success estimation and learning.
//!
//! The engine owns its rule set and an inference history but no graph; every
//! operation takes the [`Atomspace`] it works on.

use std::collections::HashSet;

use serde::Serialize;

use super::backward::{self, BackwardChainConfig, BackwardChainResult};
use super::rules::{Derivation, DerivedTarget, InferenceRule, RuleInfo, default_rules};
use super::{InferenceResult, RuleName};
use crate::atomspace::{AtomId, AtomType, Atomspace, TaskPattern, TruthValue};
use crate::error::PlnResult;
use crate::plan::PlanStatus;
use crate::text::{extract_concepts, word_overlap};

/// Link types that forward chaining draws its premises from.
const PREMISE_TYPES: [AtomType; 4] = [
    AtomType::InheritanceLink,
    AtomType::ImplicationLink,
    AtomType::SimilarityLink,
    AtomType::ContextLink,
];

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for forward chaining.
#[derive(Debug, Clone)]
pub struct ForwardChainConfig {
    /// Maximum chaining rounds (default: 10).
    pub max_iterations: usize,
    /// Minimum confidence for an inference to be accepted (default: 0.3).
    pub min_confidence: f64,
    /// Hard cap on accepted inferences per call (default: 20).
    pub max_new_atoms: usize,
    /// When non-empty, only links touching one of these atoms are premises.
    pub focus: Vec<AtomId>,
    /// When set, only these rules run.
    pub rules: Option<Vec<RuleName>>,
}

impl Default for ForwardChainConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            min_confidence: 0.3,
            max_new_atoms: 20,
            focus: Vec::new(),
            rules: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Estimated likelihood that a described task will succeed.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSuccessEstimate {
    pub likelihood: f64,
    pub confidence: f64,
    pub reasoning: Vec<String>,
}

/// Suggested way to tackle a goal, based on what worked before.
#[derive(Debug, Clone, Serialize)]
pub struct ApproachRecommendation {
    pub approach: String,
    pub confidence: f64,
    pub suggested_tools: Vec<String>,
    pub supporting_evidence: Vec<String>,
    pub task_patterns: Vec<TaskPattern>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Rule set plus the record of every inference it has accepted.
pub struct PlnEngine {
    rules: Vec<Box<dyn InferenceRule>>,
    history: Vec<InferenceResult>,
}

impl PlnEngine {
    /// Engine with the five built-in rules.
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
            history: Vec::new(),
        }
    }

    /// Add a rule; the set stays ordered by descending priority.
    pub fn with_rule(mut self, rule: Box<dyn InferenceRule>) -> Self {
        self.rules.push(rule);
        self.rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
        self
    }

    pub fn rules(&self) -> Vec<RuleInfo> {
        self.rules.iter().map(|r| r.info()).collect()
    }

    pub fn history(&self) -> &[InferenceResult] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Derive new links from existing ones until a fixpoint or a limit.
    ///
    /// Each round collects the premise links, tries every rule on both
    /// orderings of every pair, and commits each accepted derivation
    /// immediately so later pairs in the round can build on it. An atom is
    /// produced at most once per call, which guarantees termination.
    pub fn forward_chain(
        &mut self,
        space: &mut Atomspace,
        config: &ForwardChainConfig,
    ) -> PlnResult<Vec<InferenceResult>> {
        let mut results: Vec<InferenceResult> = Vec::new();
        let mut produced: HashSet<AtomId> = HashSet::new();

        let active: Vec<&dyn InferenceRule> = self
            .rules
            .iter()
            .map(|r| &**r)
            .filter(|r| config.rules.as_ref().is_none_or(|names| names.contains(&r.name())))
            .collect();

        let mut iterations = 0;
        'chain: for _ in 0..config.max_iterations {
            iterations += 1;
            let candidates = premise_candidates(space, &config.focus);
            let mut found_new = false;

            for rule in &active {
                for i in 0..candidates.len() {
                    for j in (i + 1)..candidates.len() {
                        for (x, y) in [(candidates[i], candidates[j]), (candidates[j], candidates[i])] {
                            let derivations = {
                                let (Some(first), Some(second)) = (space.get(x), space.get(y))
                                else {
                                    continue;
                                };
                                let premises = [first, second];
                                if !rule.can_apply(space, &premises) {
                                    continue;
                                }
                                rule.apply(space, &premises)
                            };

                            for derivation in derivations {
                                if results.len() >= config.max_new_atoms {
                                    break 'chain;
                                }
                                if derivation.tv.confidence() < config.min_confidence {
                                    continue;
                                }
                                if derivation
                                    .existing_atom(space)
                                    .is_some_and(|id| produced.contains(&id))
                                {
                                    continue;
                                }
                                let result = commit(space, derivation)?;
                                tracing::debug!(
                                    rule = %result.rule,
                                    conclusion = %result.conclusion,
                                    confidence = result.confidence(),
                                    "rule fired"
                                );
                                produced.insert(result.conclusion);
                                results.push(result);
                                found_new = true;
                            }
                        }
                    }
                }
            }

            if !found_new {
                break;
            }
        }

        tracing::debug!(iterations, inferences = results.len(), "forward chain finished");
        self.history.extend(results.iter().cloned());
        Ok(results)
    }

    /// Search for evidence supporting `target`. See [`backward::backward_chain`].
    pub fn backward_chain(
        &self,
        space: &Atomspace,
        target: AtomId,
        config: &BackwardChainConfig,
    ) -> PlnResult<BackwardChainResult> {
        backward::backward_chain(space, target, config)
    }

    /// Estimate how likely a described task is to succeed.
    ///
    /// Starts from an uninformed 0.5 likelihood and blends in the recorded
    /// outcome of every stored task whose name shares enough words with the
    /// description, then runs a short forward-chaining pass to enrich the
    /// graph for future estimates.
    pub fn infer_task_success(
        &mut self,
        space: &mut Atomspace,
        description: &str,
    ) -> PlnResult<TaskSuccessEstimate> {
        let mut reasoning = Vec::new();
        let mut likelihood: f64 = 0.5;
        let mut confidence: f64 = 0.3;

        for task in space.atoms_of_type(AtomType::TaskNode) {
            let Some(name) = task.meta_str("name") else {
                continue;
            };
            let similarity = word_overlap(name, description);
            if similarity <= 0.3 {
                continue;
            }
            likelihood = likelihood * (1.0 - similarity) + similarity * task.tv.strength();
            confidence = confidence.max(task.tv.confidence() * similarity);
            reasoning.push(format!(
                "Similar task \"{name}\" had {}% success",
                (task.tv.strength() * 100.0).round()
            ));
        }

        let inferences = self.forward_chain(
            space,
            &ForwardChainConfig {
                max_iterations: 3,
                min_confidence: 0.3,
                max_new_atoms: 10,
                ..Default::default()
            },
        )?;
        if !inferences.is_empty() {
            reasoning.push(format!(
                "Derived {} new inferences from knowledge graph",
                inferences.len()
            ));
        }

        Ok(TaskSuccessEstimate {
            likelihood: likelihood.clamp(0.0, 1.0),
            confidence,
            reasoning,
        })
    }

    /// Revise a task's belief with an observed outcome.
    ///
    /// `task_node` is the TaskNode name (the task id). Returns `false` when no
    /// such node exists.
    pub fn learn_from_execution(
        &self,
        space: &mut Atomspace,
        task_node: &str,
        success: bool,
        execution_time_ms: u64,
    ) -> PlnResult<bool> {
        let Some(id) = space.get_node(AtomType::TaskNode, task_node).map(|a| a.id) else {
            return Ok(false);
        };
        let observed = TruthValue::new(if success { 1.0 } else { 0.0 }, 0.9);
        let revised = space.revise_truth(id, observed)?;
        space.set_meta(id, "lastExecutionTime", execution_time_ms.into())?;
        space.set_meta(id, "lastSuccess", success.into())?;
        if success {
            space.focus_attention(id, 20.0)?;
        }
        tracing::debug!(task = task_node, success, tv = %revised, "learned from execution");
        Ok(true)
    }

    /// Recommend an approach for `goal` from past completed plans and known tools.
    ///
    /// Read-only: nothing is derived or stored.
    pub fn recommend_approach(
        &self,
        space: &Atomspace,
        goal: &str,
        available_tools: &[String],
    ) -> ApproachRecommendation {
        let mut evidence = Vec::new();
        let mut approach = "sequential";
        let mut best = 0.5;

        let mut goals: Vec<(AtomId, String, f64)> = space
            .get_node(AtomType::GoalNode, goal)
            .map(|g| (g.id, goal.to_string(), 1.0))
            .into_iter()
            .collect();
        goals.extend(
            space
                .find_similar_goals(goal, 5)
                .into_iter()
                .map(|s| (s.goal, s.text, s.similarity)),
        );

        for (goal_id, text, similarity) in &goals {
            for solved_by in space.incoming(*goal_id) {
                if solved_by.atom_type != AtomType::SolvedByLink {
                    continue;
                }
                let Some(plan) = solved_by.outgoing().get(1).and_then(|id| space.get(*id)) else {
                    continue;
                };
                if plan.meta_str("status") != Some(PlanStatus::Completed.as_str()) {
                    continue;
                }
                let confidence = plan.tv.confidence() * similarity;
                if confidence > best {
                    best = confidence;
                    approach = "reuse_successful_structure";
                    evidence.push(format!(
                        "Plan \"{}\" completed goal \"{text}\" (similarity {:.0}%)",
                        plan.name().unwrap_or_default(),
                        similarity * 100.0
                    ));
                }
            }
        }

        let mut suggested_tools = Vec::new();
        for tool in available_tools {
            let Some(node) = space.get_node(AtomType::ToolNode, tool) else {
                continue;
            };
            if node.tv.strength() > 0.7 {
                evidence.push(format!(
                    "Tool \"{tool}\" has high reliability ({}%)",
                    (node.tv.strength() * 100.0).round()
                ));
                suggested_tools.push(tool.clone());
            }
        }

        let concepts = extract_concepts(goal);
        let keywords: Vec<&str> = concepts.iter().map(String::as_str).collect();
        let task_patterns = space.successful_task_patterns(&keywords);
        if !task_patterns.is_empty() {
            evidence.push(format!(
                "{} past plans share concepts with this goal",
                task_patterns.len()
            ));
        }

        ApproachRecommendation {
            approach: approach.to_string(),
            confidence: best,
            suggested_tools,
            supporting_evidence: evidence,
            task_patterns,
        }
    }
}

impl Default for PlnEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlnEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlnEngine")
            .field("rules", &self.rules.len())
            .field("history", &self.history.len())
            .finish()
    }
}

/// Premise links, in id order, optionally restricted to the focus set.
fn premise_candidates(space: &Atomspace, focus: &[AtomId]) -> Vec<AtomId> {
    let mut candidates: Vec<AtomId> = PREMISE_TYPES
        .iter()
        .flat_map(|t| space.atoms_of_type(*t))
        .filter(|a| focus.is_empty() || a.outgoing().iter().any(|id| focus.contains(id)))
        .map(|a| a.id)
        .collect();
    candidates.sort();
    candidates
}

/// Write a derivation into the graph. New links are created; existing atoms
/// have the derived truth value revised in.
fn commit(space: &mut Atomspace, derivation: Derivation) -> PlnResult<InferenceResult> {
    let conclusion = match derivation.target {
        DerivedTarget::Link {
            atom_type,
            outgoing,
        } => space.add_link(atom_type, outgoing, Some(derivation.tv), None)?,
        DerivedTarget::Revise(id) => {
            space.revise_truth(id, derivation.tv)?;
            id
        }
    };
    Ok(InferenceResult {
        rule: derivation.rule,
        premises: derivation.premises,
        conclusion,
        tv: derivation.tv,
        trace: vec![derivation.trace],
    })
}
