//! Probabilistic Logic Network inference over the atomspace.
//!
//! The engine derives new links from existing ones with a fixed rule set
//! (forward chaining), searches for supporting evidence of a target atom
//! (backward chaining), estimates task success from recorded outcomes, and
//! revises task beliefs as executions finish.

pub mod backward;
pub mod engine;
pub mod formulas;
pub mod rules;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::atomspace::{AtomId, TruthValue};
use crate::error::PlnError;

pub use backward::{BackwardChainConfig, BackwardChainResult, ProofStep};
pub use engine::{ApproachRecommendation, ForwardChainConfig, PlnEngine, TaskSuccessEstimate};
pub use rules::{Derivation, InferenceRule, RuleInfo};

/// Names of the built-in inference rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleName {
    Deduction,
    ModusPonens,
    Similarity,
    ContextualReasoning,
    AnalogyReasoning,
}

impl std::fmt::Display for RuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuleName::Deduction => "Deduction",
            RuleName::ModusPonens => "ModusPonens",
            RuleName::Similarity => "Similarity",
            RuleName::ContextualReasoning => "ContextualReasoning",
            RuleName::AnalogyReasoning => "AnalogyReasoning",
        };
        f.write_str(name)
    }
}

/// One accepted inference: which rule fired on which premises, and what it produced.
#[derive(Debug, Clone, Serialize)]
pub struct InferenceResult {
    pub rule: RuleName,
    pub premises: Vec<AtomId>,
    /// The created, merged or revised atom.
    pub conclusion: AtomId,
    /// Truth value the rule derived for the conclusion.
    pub tv: TruthValue,
    pub trace: Vec<String>,
}

impl InferenceResult {
    pub fn confidence(&self) -> f64 {
        self.tv.confidence()
    }
}

/// Inference mode selected by a host request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceMode {
    Forward,
    Backward,
    TaskSuccess,
}

impl FromStr for InferenceMode {
    type Err = PlnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(InferenceMode::Forward),
            "backward" => Ok(InferenceMode::Backward),
            "task_success" => Ok(InferenceMode::TaskSuccess),
            other => Err(PlnError::InvalidInferenceMode { mode: other.into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse() {
        assert_eq!("forward".parse::<InferenceMode>().unwrap(), InferenceMode::Forward);
        assert_eq!(
            "task_success".parse::<InferenceMode>().unwrap(),
            InferenceMode::TaskSuccess
        );
        assert!(matches!(
            "sideways".parse::<InferenceMode>(),
            Err(PlnError::InvalidInferenceMode { mode }) if mode == "sideways"
        ));
    }
}
