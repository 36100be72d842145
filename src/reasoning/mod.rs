//! Cognitive reasoning: goal analysis, decomposition, per-task reasoning and
//! replanning decisions.
//!
//! Everything here is heuristic and deterministic. Text is classified through
//! a swappable [`TextClassifier`]; historical success rates come from an
//! optional [`PlanPersistence`] store.

pub mod classify;
pub mod decompose;
pub mod replan;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ReasoningResult;
use crate::orchestrator::TaskExecutionResult;
use crate::persistence::{PlanPersistence, DEFAULT_SUCCESS_RATE};
use crate::plan::{OrchestrationContext, Plan, TaskId};
use crate::text::contains_any;

pub use classify::{ComplexityIndicator, KeywordClassifier, TaskType, TextClassifier};
pub use decompose::{TaskDecomposition, TaskTemplate};
pub use replan::{apply_replan_changes, evaluate_replan, PlanChange, ReplanDecision};

// ---------------------------------------------------------------------------
// Assessment types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ComplexityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            ComplexityLevel::VeryHigh
        } else if score >= 0.6 {
            ComplexityLevel::High
        } else if score >= 0.4 {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::Low
        }
    }

    /// Suggested plan size for a goal of this complexity.
    pub fn estimated_tasks(self) -> usize {
        match self {
            ComplexityLevel::Low => 2,
            ComplexityLevel::Medium => 4,
            ComplexityLevel::High => 6,
            ComplexityLevel::VeryHigh => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeasibilityLevel {
    Low,
    Medium,
    High,
}

impl FeasibilityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            FeasibilityLevel::High
        } else if score >= 0.4 {
            FeasibilityLevel::Medium
        } else {
            FeasibilityLevel::Low
        }
    }
}

/// Task-level complexity: goal levels with `very_high` folded into `high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskComplexity {
    Low,
    Medium,
    High,
}

impl From<ComplexityLevel> for TaskComplexity {
    fn from(level: ComplexityLevel) -> Self {
        match level {
            ComplexityLevel::Low => TaskComplexity::Low,
            ComplexityLevel::Medium => TaskComplexity::Medium,
            ComplexityLevel::High | ComplexityLevel::VeryHigh => TaskComplexity::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAssessment {
    pub score: f64,
    pub level: ComplexityLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityAssessment {
    pub score: f64,
    pub level: FeasibilityLevel,
}

/// Full analysis of a goal, including its decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalAnalysis {
    pub goal: String,
    pub complexity: ComplexityAssessment,
    pub estimated_tasks: usize,
    pub feasibility: FeasibilityAssessment,
    pub required_capabilities: Vec<String>,
    pub potential_risks: Vec<String>,
    pub recommendations: Vec<String>,
    pub decomposition: TaskDecomposition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeApproach {
    pub approach: String,
    pub confidence: f64,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRisk {
    pub description: String,
    pub probability: f64,
    pub impact: String,
    pub mitigation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPerformance {
    pub success_rate: f64,
    pub average_execution_time_ms: f64,
}

/// Reasoning about one task before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskReasoning {
    pub task_type: TaskType,
    pub complexity: TaskComplexity,
    pub confidence: f64,
    pub reasoning: String,
    pub approach: String,
    pub strategy: String,
    pub estimated_duration: String,
    pub dependencies: Vec<String>,
    pub alternatives: Vec<AlternativeApproach>,
    pub risks: Vec<TaskRisk>,
    pub historical_performance: Option<HistoricalPerformance>,
}

// ---------------------------------------------------------------------------
// Reasoner
// ---------------------------------------------------------------------------

/// Heuristic goal and task reasoner.
#[derive(Clone)]
pub struct CognitiveReasoning {
    classifier: Arc<dyn TextClassifier>,
    persistence: Option<Arc<dyn PlanPersistence>>,
}

impl std::fmt::Debug for CognitiveReasoning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitiveReasoning")
            .field("persistence", &self.persistence.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for CognitiveReasoning {
    fn default() -> Self {
        Self::new()
    }
}

impl CognitiveReasoning {
    pub fn new() -> Self {
        Self {
            classifier: Arc::new(KeywordClassifier),
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn PlanPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn classifier(&self) -> &dyn TextClassifier {
        &*self.classifier
    }

    /// Score, bucket and decompose a goal.
    pub fn analyze_goal(
        &self,
        goal: &str,
        context: &OrchestrationContext,
    ) -> ReasoningResult<GoalAnalysis> {
        let complexity = self.assess_complexity(goal);
        let feasibility = self.assess_feasibility(goal, context);
        let estimated_tasks = complexity.level.estimated_tasks();
        let decomposition = self.decompose_goal(goal, estimated_tasks)?;

        tracing::debug!(
            goal,
            complexity = complexity.score,
            level = ?complexity.level,
            tasks = decomposition.len(),
            "analyzed goal"
        );

        Ok(GoalAnalysis {
            goal: goal.to_string(),
            complexity,
            estimated_tasks,
            feasibility,
            required_capabilities: self.required_capabilities(goal),
            potential_risks: self.potential_risks(goal, complexity.level),
            recommendations: self.recommendations(goal, complexity.level),
            decomposition,
        })
    }

    pub fn decompose_goal(&self, goal: &str, target: usize) -> ReasoningResult<TaskDecomposition> {
        TaskDecomposition::build(goal, target, &*self.classifier)
    }

    /// Complexity from a 0.5 base: length, indicator vocabulary and the
    /// number of task families the text touches.
    pub fn assess_complexity(&self, text: &str) -> ComplexityAssessment {
        let mut score: f64 = 0.5;

        let words = text.split_whitespace().count();
        if words > 30 {
            score += 0.2;
        } else if words > 15 {
            score += 0.1;
        } else if words < 8 {
            score -= 0.1;
        }

        if self.classifier.matches_indicator(text, ComplexityIndicator::High) {
            score += 0.25;
        }
        if self.classifier.matches_indicator(text, ComplexityIndicator::Medium) {
            score += 0.1;
        }
        if self.classifier.matches_indicator(text, ComplexityIndicator::Low) {
            score -= 0.15;
        }

        score += 0.1 * self.classifier.families(text).len() as f64;
        let score = score.clamp(0.0, 1.0);
        ComplexityAssessment {
            score,
            level: ComplexityLevel::from_score(score),
        }
    }

    pub fn assess_feasibility(
        &self,
        goal: &str,
        context: &OrchestrationContext,
    ) -> FeasibilityAssessment {
        let lower = goal.to_lowercase();
        let mut score: f64 = 0.8;
        if contains_any(&lower, &["external", "api", "third-party"]) {
            score -= 0.1;
        }
        if contains_any(&lower, &["urgent", "immediately", "asap"]) {
            score -= 0.1;
        }
        if !context.available_tools.is_empty() {
            score += 0.1;
        }
        let score = score.clamp(0.0, 1.0);
        FeasibilityAssessment {
            score,
            level: FeasibilityLevel::from_score(score),
        }
    }

    fn required_capabilities(&self, goal: &str) -> Vec<String> {
        let mut caps: Vec<&str> = Vec::new();
        let families = self.classifier.families(goal);
        for (family, provides) in [
            (TaskType::Research, ["information_retrieval", "web_search"]),
            (TaskType::Creation, ["content_generation", "text_processing"]),
            (TaskType::Analysis, ["data_analysis", "pattern_recognition"]),
            (TaskType::Execution, ["task_execution", "automation"]),
        ] {
            if families.contains(&family) {
                caps.extend(provides);
            }
        }
        if contains_any(&goal.to_lowercase(), &["code", "program", "develop"]) {
            caps.extend(["code_generation", "software_development"]);
        }
        caps.extend(["reasoning", "planning"]);

        let mut unique: Vec<String> = Vec::with_capacity(caps.len());
        for cap in caps {
            if !unique.iter().any(|c| c == cap) {
                unique.push(cap.to_string());
            }
        }
        unique
    }

    fn potential_risks(&self, goal: &str, level: ComplexityLevel) -> Vec<String> {
        let lower = goal.to_lowercase();
        let mut risks = Vec::new();
        if level >= ComplexityLevel::High {
            risks.push("Complex goal may require multiple iterations".to_string());
        }
        if contains_any(&lower, &["all", "every", "complete"]) {
            risks.push("Comprehensive scope may be difficult to verify".to_string());
        }
        if contains_any(&lower, &["new", "novel", "innovative"]) {
            risks.push("Novel approaches may have unexpected challenges".to_string());
        }
        if contains_any(&lower, &["external", "api", "third-party", "integration"]) {
            risks.push("External dependencies may cause delays".to_string());
        }
        risks
    }

    fn recommendations(&self, goal: &str, level: ComplexityLevel) -> Vec<String> {
        let mut recs = Vec::new();
        match level {
            ComplexityLevel::VeryHigh => {
                recs.push("Consider breaking this goal into smaller sub-goals".to_string());
                recs.push("Plan for iterative refinement and validation".to_string());
            }
            ComplexityLevel::High => {
                recs.push("Ensure clear milestones for progress tracking".to_string());
            }
            ComplexityLevel::Medium | ComplexityLevel::Low => {}
        }
        if let Some(store) = &self.persistence {
            recs.extend(store.recommendations(goal));
        }
        recs.push("Review intermediate results before proceeding".to_string());
        recs
    }

    /// Classify a task and describe how it should be approached.
    pub fn reason_about_task(
        &self,
        description: &str,
        context: &OrchestrationContext,
    ) -> TaskReasoning {
        let task_type = self.classifier.classify_task(description);
        let complexity = TaskComplexity::from(self.assess_complexity(description).level);
        let historical = self.persistence.as_ref().map(|store| HistoricalPerformance {
            success_rate: store.task_success_rate(description),
            average_execution_time_ms: store.average_execution_time(description),
        });
        let confidence = historical.map_or(DEFAULT_SUCCESS_RATE, |h| h.success_rate);

        TaskReasoning {
            task_type,
            complexity,
            confidence,
            reasoning: format!("{} Specifically: {description}", reasoning_template(task_type)),
            approach: approach(task_type, complexity),
            strategy: strategy(task_type, complexity).to_string(),
            estimated_duration: match complexity {
                TaskComplexity::Low => "short",
                TaskComplexity::Medium => "medium",
                TaskComplexity::High => "long",
            }
            .to_string(),
            dependencies: dependencies(description, context),
            alternatives: alternatives(task_type),
            risks: task_risks(task_type),
            historical_performance: historical,
        }
    }

    pub fn evaluate_replan(
        &self,
        plan: &Plan,
        results: &HashMap<TaskId, TaskExecutionResult>,
    ) -> ReplanDecision {
        evaluate_replan(plan, results)
    }

    pub fn apply_replan_changes(&self, plan: &Plan, changes: &[PlanChange]) -> Plan {
        apply_replan_changes(plan, changes)
    }
}

// ---------------------------------------------------------------------------
// Per-type templates
// ---------------------------------------------------------------------------

fn reasoning_template(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Research => {
            "This task requires gathering and synthesizing information from available sources."
        }
        TaskType::Analysis => {
            "This task involves examining and understanding the subject matter in detail."
        }
        TaskType::Planning => {
            "This task requires designing a structured approach to achieve the objective."
        }
        TaskType::Creation => {
            "This task involves generating new content or artifacts based on requirements."
        }
        TaskType::Validation => "This task requires verifying outputs against defined criteria.",
        TaskType::Execution => {
            "This task involves performing specific actions to complete objectives."
        }
        TaskType::Review => "This task requires evaluating and improving existing work.",
        TaskType::Integration => {
            "This task involves combining multiple components into a cohesive whole."
        }
    }
}

fn approach(task_type: TaskType, complexity: TaskComplexity) -> String {
    match complexity {
        TaskComplexity::High => format!("Iterative {task_type} with checkpoints and validation"),
        TaskComplexity::Medium => format!("Structured {task_type} with clear deliverables"),
        TaskComplexity::Low => format!("Direct {task_type} with minimal overhead"),
    }
}

fn strategy(task_type: TaskType, complexity: TaskComplexity) -> &'static str {
    let high = complexity == TaskComplexity::High;
    match task_type {
        TaskType::Research | TaskType::Analysis if high => "depth_first_exploration",
        TaskType::Research | TaskType::Analysis => "breadth_first_scan",
        TaskType::Creation if high => "iterative_refinement",
        TaskType::Creation => "direct_generation",
        TaskType::Validation => "systematic_verification",
        _ => "sequential_execution",
    }
}

fn dependencies(description: &str, context: &OrchestrationContext) -> Vec<String> {
    let lower = description.to_lowercase();
    let mut deps = Vec::new();
    if contains_any(&lower, &["based on", "using"]) {
        deps.push("previous_task_output".to_string());
    }
    if contains_any(&lower, &["after", "following"]) {
        deps.push("sequential_predecessor".to_string());
    }
    if !context.previous_tasks.is_empty() {
        deps.push("context_tasks".to_string());
    }
    deps
}

fn alternatives(task_type: TaskType) -> Vec<AlternativeApproach> {
    let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
    match task_type {
        TaskType::Creation => vec![AlternativeApproach {
            approach: "Template-based generation".to_string(),
            confidence: 0.7,
            pros: strings(&["Faster execution", "Consistent format"]),
            cons: strings(&["Less flexibility", "May miss nuances"]),
        }],
        TaskType::Research => vec![AlternativeApproach {
            approach: "Focused search on specific topics".to_string(),
            confidence: 0.75,
            pros: strings(&["More relevant results", "Faster completion"]),
            cons: strings(&["May miss broader context"]),
        }],
        _ => Vec::new(),
    }
}

fn task_risks(task_type: TaskType) -> Vec<TaskRisk> {
    match task_type {
        TaskType::Creation => vec![TaskRisk {
            description: "Output may not meet quality expectations".to_string(),
            probability: 0.2,
            impact: "medium".to_string(),
            mitigation: "Include review and refinement step".to_string(),
        }],
        TaskType::Research => vec![TaskRisk {
            description: "Incomplete information coverage".to_string(),
            probability: 0.3,
            impact: "low".to_string(),
            mitigation: "Use multiple information sources".to_string(),
        }],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryPersistence, TaskHistoryEntry};
    use crate::plan::{Task, TaskStatus};

    const SOLAR: &str = "Write a comprehensive research report on solar energy";

    #[test]
    fn solar_report_analysis() {
        let reasoner = CognitiveReasoning::new();
        let analysis = reasoner
            .analyze_goal(SOLAR, &OrchestrationContext::default())
            .unwrap();

        assert!((analysis.complexity.score - 0.95).abs() < 1e-9);
        assert_eq!(analysis.complexity.level, ComplexityLevel::VeryHigh);
        assert_eq!(analysis.estimated_tasks, 8);

        let names: Vec<&str> = analysis.decomposition.names().collect();
        assert_eq!(names.len(), 7);
        assert_eq!(names[0], "Analyze Requirements");
        assert_eq!(names[6], "Finalize and Complete");
        assert!(names.contains(&"Research and Gather Information"));

        assert_eq!(
            analysis.required_capabilities,
            vec![
                "information_retrieval",
                "web_search",
                "content_generation",
                "text_processing",
                "reasoning",
                "planning"
            ]
        );
        assert_eq!(
            analysis.potential_risks,
            vec!["Complex goal may require multiple iterations"]
        );
        assert_eq!(analysis.recommendations.len(), 3);
        assert_eq!(
            analysis.recommendations.last().map(String::as_str),
            Some("Review intermediate results before proceeding")
        );
    }

    #[test]
    fn feasibility_penalties_and_tools() {
        let reasoner = CognitiveReasoning::new();
        let plain = reasoner.assess_feasibility("sort files", &OrchestrationContext::default());
        assert!((plain.score - 0.8).abs() < 1e-9);
        assert_eq!(plain.level, FeasibilityLevel::High);

        let risky = reasoner.assess_feasibility(
            "Call the external API asap",
            &OrchestrationContext::default(),
        );
        assert!((risky.score - 0.6).abs() < 1e-9);
        assert_eq!(risky.level, FeasibilityLevel::Medium);

        let tooled = reasoner.assess_feasibility(
            "Call the external API asap",
            &OrchestrationContext::with_tools(["http"]),
        );
        assert!((tooled.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn simple_goal_is_low_complexity() {
        let reasoner = CognitiveReasoning::new();
        let assessment = reasoner.assess_complexity("a simple fix");
        // 0.5 - 0.1 (short) - 0.15 (simple)
        assert!((assessment.score - 0.25).abs() < 1e-9);
        assert_eq!(assessment.level, ComplexityLevel::Low);
    }

    #[test]
    fn task_reasoning_templates() {
        let reasoner = CognitiveReasoning::new();
        let context = OrchestrationContext {
            previous_tasks: vec!["earlier".into()],
            ..Default::default()
        };
        let r = reasoner.reason_about_task("Draft the summary based on the notes", &context);
        assert_eq!(r.task_type, TaskType::Creation);
        assert_eq!(r.complexity, TaskComplexity::Medium);
        assert_eq!(r.approach, "Structured creation with clear deliverables");
        assert_eq!(r.strategy, "direct_generation");
        assert_eq!(r.estimated_duration, "medium");
        assert_eq!(r.dependencies, vec!["previous_task_output", "context_tasks"]);
        assert_eq!(r.alternatives[0].approach, "Template-based generation");
        assert_eq!(r.risks[0].probability, 0.2);
        assert_eq!(r.confidence, DEFAULT_SUCCESS_RATE);
        assert!(r.historical_performance.is_none());
        assert!(r.reasoning.ends_with("Specifically: Draft the summary based on the notes"));
    }

    #[tokio::test]
    async fn history_feeds_task_confidence_and_recommendations() {
        let store = Arc::new(MemoryPersistence::new());
        let mut plan = Plan::new(SOLAR, vec![Task::new("gather sources", "gather sources")]);
        plan.tasks[0].fail(None, "offline");
        let entry = TaskHistoryEntry {
            task_id: plan.tasks[0].id,
            name: "gather sources".into(),
            description: "gather sources".into(),
            status: TaskStatus::Failed,
            execution_time_ms: 40,
            retry_count: 1,
            confidence: 0.2,
            error: Some("offline".into()),
        };
        let history = HashMap::from([(entry.task_id, entry)]);
        store.record_execution(&plan, &history).await.unwrap();

        let reasoner = CognitiveReasoning::new().with_persistence(store);
        let r = reasoner.reason_about_task("gather sources", &OrchestrationContext::default());
        assert_eq!(r.confidence, 0.0);
        assert_eq!(
            r.historical_performance,
            Some(HistoricalPerformance {
                success_rate: 0.0,
                average_execution_time_ms: 40.0
            })
        );

        let analysis = reasoner
            .analyze_goal(SOLAR, &OrchestrationContext::default())
            .unwrap();
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.starts_with("Similar goals were attempted 1 times")));
    }
}
