//! Pattern queries over the atomspace.

use std::time::Duration;

use regex::Regex;

use super::{Atom, AtomId, AtomType};
use crate::error::{AtomspaceError, AtomspaceResult};

/// How a pattern constrains atom names.
#[derive(Debug, Clone)]
pub enum NameMatch {
    /// Exact name, answered from the name index.
    Exact(String),
    /// Regular expression that may match anywhere in the name, answered by
    /// scanning. Anchor with `^`/`$` for a whole-name match.
    Regex(Regex),
}

impl NameMatch {
    /// Compile an unanchored name regex.
    pub fn regex(pattern: &str) -> AtomspaceResult<Self> {
        Regex::new(pattern)
            .map(NameMatch::Regex)
            .map_err(|e| AtomspaceError::InvalidPattern {
                message: e.to_string(),
            })
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        match self {
            NameMatch::Exact(n) => n == name,
            NameMatch::Regex(re) => re.is_match(name),
        }
    }
}

/// A conjunction of filters; unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct AtomPattern {
    /// Accept any of these types (empty = all types).
    pub types: Vec<AtomType>,
    pub name: Option<NameMatch>,
    pub strength_min: Option<f64>,
    pub strength_max: Option<f64>,
    pub confidence_min: Option<f64>,
    pub sti_min: Option<f64>,
    /// The outgoing set must contain every one of these ids.
    pub has_outgoing: Vec<AtomId>,
    pub limit: Option<usize>,
}

impl AtomPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_type(mut self, atom_type: AtomType) -> Self {
        self.types.push(atom_type);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(NameMatch::Exact(name.into()));
        self
    }

    pub fn name_regex(mut self, pattern: &str) -> AtomspaceResult<Self> {
        self.name = Some(NameMatch::regex(pattern)?);
        Ok(self)
    }

    pub fn min_strength(mut self, value: f64) -> Self {
        self.strength_min = Some(value);
        self
    }

    pub fn max_strength(mut self, value: f64) -> Self {
        self.strength_max = Some(value);
        self
    }

    pub fn min_confidence(mut self, value: f64) -> Self {
        self.confidence_min = Some(value);
        self
    }

    pub fn min_sti(mut self, value: f64) -> Self {
        self.sti_min = Some(value);
        self
    }

    pub fn with_outgoing(mut self, id: AtomId) -> Self {
        self.has_outgoing.push(id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether an atom passes every non-index filter.
    pub(crate) fn accepts(&self, atom: &Atom) -> bool {
        if !self.types.is_empty() && !self.types.contains(&atom.atom_type) {
            return false;
        }
        if let Some(name) = &self.name {
            match atom.name() {
                Some(n) if name.matches(n) => {}
                _ => return false,
            }
        }
        if self.strength_min.is_some_and(|min| atom.tv.strength() < min) {
            return false;
        }
        if self.strength_max.is_some_and(|max| atom.tv.strength() > max) {
            return false;
        }
        if self.confidence_min.is_some_and(|min| atom.tv.confidence() < min) {
            return false;
        }
        if self.sti_min.is_some_and(|min| atom.av.sti < min) {
            return false;
        }
        if !self.has_outgoing.is_empty() {
            let out = atom.outgoing();
            if !self.has_outgoing.iter().all(|id| out.contains(id)) {
                return false;
            }
        }
        true
    }
}

/// Matches of a query, in id order, plus how long the query took.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub atoms: Vec<Atom>,
    pub elapsed: Duration,
}

impl QueryResult {
    pub fn ids(&self) -> Vec<AtomId> {
        self.atoms.iter().map(|a| a.id).collect()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}
