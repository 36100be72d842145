//! Request and response records for the host-facing surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool::{ChainResult, ToolDescriptor, ToolStats};
use crate::atomspace::{Atom, AtomId, AtomPattern, AtomType, AtomspaceStats, NameMatch, SimilarGoal};
use crate::error::{AtomspaceResult, PlnError, PlnResult};
use crate::pln::{
    BackwardChainConfig, BackwardChainResult, ForwardChainConfig, InferenceMode, InferenceResult,
    RuleInfo, TaskSuccessEstimate,
};

/// Tool timeout when the invocation does not name one.
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

// ---------------------------------------------------------------------------
// Knowledge queries
// ---------------------------------------------------------------------------

/// Filters for a knowledge-graph query. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeQuery {
    pub atom_type: Option<AtomType>,
    /// Exact atom name.
    pub name: Option<String>,
    /// Full-match regex over atom names; ignored when `name` is set.
    pub name_pattern: Option<String>,
    pub min_confidence: Option<f64>,
    pub min_strength: Option<f64>,
    pub min_sti: Option<f64>,
    pub limit: Option<usize>,
    /// Also look up stored goals similar to this text.
    pub find_similar: Option<String>,
}

impl KnowledgeQuery {
    /// Translate into an atomspace pattern.
    pub fn pattern(&self) -> AtomspaceResult<AtomPattern> {
        let mut pattern = AtomPattern::new();
        if let Some(t) = self.atom_type {
            pattern = pattern.of_type(t);
        }
        pattern.name = match (&self.name, &self.name_pattern) {
            (Some(name), _) => Some(NameMatch::Exact(name.clone())),
            (None, Some(re)) => Some(NameMatch::regex(re)?),
            (None, None) => None,
        };
        pattern.confidence_min = self.min_confidence;
        pattern.strength_min = self.min_strength;
        pattern.sti_min = self.min_sti;
        pattern.limit = self.limit;
        Ok(pattern)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeQueryResult {
    pub atoms: Vec<Atom>,
    pub similar_goals: Vec<SimilarGoal>,
    pub elapsed_ms: f64,
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Loosely typed inference parameters, as a host would send them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceParams {
    pub max_iterations: Option<usize>,
    pub max_new_atoms: Option<usize>,
    pub min_confidence: Option<f64>,
    pub focus: Vec<AtomId>,
    pub target: Option<AtomId>,
    pub max_depth: Option<usize>,
    pub max_paths: Option<usize>,
    pub task_description: Option<String>,
}

/// A validated inference request.
#[derive(Debug, Clone)]
pub enum InferenceRequest {
    Forward(ForwardChainConfig),
    Backward {
        target: AtomId,
        config: BackwardChainConfig,
    },
    TaskSuccess {
        description: String,
    },
}

impl InferenceRequest {
    /// Build a request from a mode name and loose parameters, filling defaults.
    pub fn from_mode(mode: &str, params: InferenceParams) -> PlnResult<Self> {
        match mode.parse::<InferenceMode>()? {
            InferenceMode::Forward => {
                let defaults = ForwardChainConfig::default();
                Ok(InferenceRequest::Forward(ForwardChainConfig {
                    max_iterations: params.max_iterations.unwrap_or(defaults.max_iterations),
                    min_confidence: params.min_confidence.unwrap_or(defaults.min_confidence),
                    max_new_atoms: params.max_new_atoms.unwrap_or(defaults.max_new_atoms),
                    focus: params.focus,
                    rules: None,
                }))
            }
            InferenceMode::Backward => {
                let target = params.target.ok_or(PlnError::MissingParameter {
                    mode: "backward",
                    field: "target",
                })?;
                let defaults = BackwardChainConfig::default();
                Ok(InferenceRequest::Backward {
                    target,
                    config: BackwardChainConfig {
                        max_depth: params.max_depth.unwrap_or(defaults.max_depth),
                        min_confidence: params.min_confidence.unwrap_or(defaults.min_confidence),
                        max_paths: params.max_paths.unwrap_or(defaults.max_paths),
                    },
                })
            }
            InferenceMode::TaskSuccess => {
                let description =
                    params
                        .task_description
                        .ok_or(PlnError::MissingParameter {
                            mode: "task_success",
                            field: "task_description",
                        })?;
                Ok(InferenceRequest::TaskSuccess { description })
            }
        }
    }

    pub fn mode(&self) -> InferenceMode {
        match self {
            InferenceRequest::Forward(_) => InferenceMode::Forward,
            InferenceRequest::Backward { .. } => InferenceMode::Backward,
            InferenceRequest::TaskSuccess { .. } => InferenceMode::TaskSuccess,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InferenceOutcome {
    Forward { inferences: Vec<InferenceResult> },
    Backward(BackwardChainResult),
    TaskSuccess(TaskSuccessEstimate),
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// Run one tool, or a named chain when `chain` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(default)]
    pub chain: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl ToolInvocation {
    pub fn tool(name: impl Into<String>, args: Value) -> Self {
        Self {
            name: name.into(),
            args,
            chain: false,
            timeout_ms: None,
        }
    }

    pub fn chain(name: impl Into<String>, args: Value) -> Self {
        Self {
            chain: true,
            ..Self::tool(name, args)
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(DEFAULT_TOOL_TIMEOUT_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutcome {
    Single(Value),
    Chain(ChainResult),
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PlnStats {
    pub rules: Vec<RuleInfo>,
    pub rule_count: usize,
    pub inferences_made: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub available: Vec<ToolDescriptor>,
    pub count: usize,
    pub execution_stats: std::collections::HashMap<String, ToolStats>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub total: usize,
    pub executing: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Aggregate engine statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub atomspace: AtomspaceStats,
    pub pln: PlnStats,
    pub tools: ToolSummary,
    pub plans: PlanCounts,
}
