//! Backward chaining: search from a target atom back to supporting evidence.
//!
//! An atom is proven outright when its own truth value is confident and
//! mostly true. Otherwise every confident incoming Inheritance/Implication
//! link that points *at* the atom is a candidate step, and the search
//! recurses into that link's source. The visited set is local to the current
//! path and unwound on backtrack, so an atom may support several independent
//! proofs.

use std::collections::HashSet;

use serde::Serialize;

use crate::atomspace::{AtomId, AtomType, Atomspace};
use crate::error::{AtomspaceError, PlnResult};

/// Configuration for backward chaining.
#[derive(Debug, Clone)]
pub struct BackwardChainConfig {
    /// Maximum recursion depth (default: 5).
    pub max_depth: usize,
    /// Minimum confidence for an atom to count as evidence and for a link to
    /// be followed (default: 0.3).
    pub min_confidence: f64,
    /// Stop after this many proof paths (default: 10).
    pub max_paths: usize,
}

impl Default for BackwardChainConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            min_confidence: 0.3,
            max_paths: 10,
        }
    }
}

/// One supporting link in a proof path.
#[derive(Debug, Clone, Serialize)]
pub struct ProofStep {
    pub link: AtomId,
    pub source: AtomId,
    pub target: AtomId,
    pub confidence: f64,
    pub trace: String,
}

/// Outcome of a backward-chaining search.
#[derive(Debug, Clone, Serialize)]
pub struct BackwardChainResult {
    pub proven: bool,
    /// Best path confidence: the maximum over paths of the weakest step.
    pub confidence: f64,
    /// Each path runs from the target outwards; an empty path means the target
    /// held on its own.
    pub proof_paths: Vec<Vec<ProofStep>>,
}

/// Search for evidence supporting `target`.
pub fn backward_chain(
    space: &Atomspace,
    target: AtomId,
    config: &BackwardChainConfig,
) -> PlnResult<BackwardChainResult> {
    if !space.contains(target) {
        return Err(AtomspaceError::UnknownAtom { id: target.get() }.into());
    }

    let mut search = Search {
        space,
        config,
        visited: HashSet::new(),
        paths: Vec::new(),
    };
    search.prove(target, 0, &mut Vec::new());

    let confidence = search
        .paths
        .iter()
        .map(|path| path.iter().map(|s| s.confidence).fold(1.0, f64::min))
        .fold(0.0, f64::max);

    tracing::debug!(
        %target,
        paths = search.paths.len(),
        confidence,
        "backward chain finished"
    );
    Ok(BackwardChainResult {
        proven: !search.paths.is_empty(),
        confidence,
        proof_paths: search.paths,
    })
}

struct Search<'a> {
    space: &'a Atomspace,
    config: &'a BackwardChainConfig,
    visited: HashSet<AtomId>,
    paths: Vec<Vec<ProofStep>>,
}

impl Search<'_> {
    fn prove(&mut self, id: AtomId, depth: usize, path: &mut Vec<ProofStep>) -> bool {
        if depth > self.config.max_depth
            || self.visited.contains(&id)
            || self.paths.len() >= self.config.max_paths
        {
            return false;
        }
        let Some(atom) = self.space.get(id) else {
            return false;
        };

        if atom.tv.confidence() >= self.config.min_confidence && atom.tv.strength() >= 0.5 {
            self.paths.push(path.clone());
            return true;
        }

        self.visited.insert(id);
        let mut found = false;
        for link in self.space.incoming(id) {
            if !matches!(
                link.atom_type,
                AtomType::InheritanceLink | AtomType::ImplicationLink
            ) {
                continue;
            }
            let [source, link_target] = link.outgoing() else {
                continue;
            };
            if *link_target != id || link.tv.confidence() < self.config.min_confidence {
                continue;
            }

            path.push(ProofStep {
                link: link.id,
                source: *source,
                target: id,
                confidence: link.tv.confidence(),
                trace: format!("{source} supports {id} via {}", link.atom_type),
            });
            if self.prove(*source, depth + 1, path) {
                found = true;
            }
            path.pop();
        }
        self.visited.remove(&id);
        found
    }
}
