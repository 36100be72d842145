//! Keyword-family text classification.
//!
//! Goal and task texts are bucketed into task families (research, analysis,
//! ...) and complexity indicators by plain substring matching on the
//! lowercased text. The [`TextClassifier`] trait lets a stronger classifier
//! replace the keyword lists without touching the reasoners.

use serde::{Deserialize, Serialize};

use crate::text::contains_any;

/// Task families, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Research,
    Analysis,
    Planning,
    Creation,
    Validation,
    Execution,
    Review,
    Integration,
}

impl TaskType {
    pub const ALL: [TaskType; 8] = [
        TaskType::Research,
        TaskType::Analysis,
        TaskType::Planning,
        TaskType::Creation,
        TaskType::Validation,
        TaskType::Execution,
        TaskType::Review,
        TaskType::Integration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Research => "research",
            TaskType::Analysis => "analysis",
            TaskType::Planning => "planning",
            TaskType::Creation => "creation",
            TaskType::Validation => "validation",
            TaskType::Execution => "execution",
            TaskType::Review => "review",
            TaskType::Integration => "integration",
        }
    }

    /// Keywords that place a text in this family.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            TaskType::Research => &[
                "research",
                "investigate",
                "explore",
                "study",
                "learn",
                "discover",
                "find out",
            ],
            TaskType::Analysis => &[
                "analyze",
                "understand",
                "examine",
                "assess",
                "evaluate",
                "review",
                "inspect",
            ],
            TaskType::Planning => &[
                "plan",
                "design",
                "architect",
                "strategize",
                "outline",
                "organize",
                "structure",
            ],
            TaskType::Creation => &[
                "create",
                "write",
                "build",
                "develop",
                "implement",
                "generate",
                "compose",
                "draft",
            ],
            TaskType::Validation => &[
                "validate", "test", "verify", "check", "confirm", "ensure", "quality",
            ],
            TaskType::Execution => &[
                "execute", "run", "perform", "deploy", "launch", "start", "apply",
            ],
            TaskType::Review => &[
                "review", "refine", "improve", "optimize", "edit", "polish", "finalize",
            ],
            TaskType::Integration => &[
                "integrate",
                "combine",
                "merge",
                "connect",
                "link",
                "consolidate",
            ],
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vocabulary hinting at how demanding a goal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComplexityIndicator {
    High,
    Medium,
    Low,
}

impl ComplexityIndicator {
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            ComplexityIndicator::High => &[
                "complex",
                "comprehensive",
                "detailed",
                "thorough",
                "extensive",
                "multi-step",
                "advanced",
            ],
            ComplexityIndicator::Medium => &["moderate", "standard", "typical", "regular", "normal"],
            ComplexityIndicator::Low => &[
                "simple",
                "basic",
                "quick",
                "easy",
                "straightforward",
                "brief",
            ],
        }
    }
}

/// Classifies free text into task families and complexity indicators.
pub trait TextClassifier: Send + Sync {
    /// Whether `text` belongs to `family`.
    fn matches_family(&self, text: &str, family: TaskType) -> bool;

    /// Whether `text` carries the given complexity indicator.
    fn matches_indicator(&self, text: &str, indicator: ComplexityIndicator) -> bool;

    /// Every family `text` belongs to, in check order.
    fn families(&self, text: &str) -> Vec<TaskType> {
        TaskType::ALL
            .into_iter()
            .filter(|family| self.matches_family(text, *family))
            .collect()
    }

    /// The first matching family, or [`TaskType::Execution`].
    fn classify_task(&self, text: &str) -> TaskType {
        TaskType::ALL
            .into_iter()
            .find(|family| self.matches_family(text, *family))
            .unwrap_or(TaskType::Execution)
    }
}

/// Case-insensitive substring matching against fixed keyword lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl TextClassifier for KeywordClassifier {
    fn matches_family(&self, text: &str, family: TaskType) -> bool {
        contains_any(&text.to_lowercase(), family.keywords())
    }

    fn matches_indicator(&self, text: &str, indicator: ComplexityIndicator) -> bool {
        contains_any(&text.to_lowercase(), indicator.keywords())
    }
}
