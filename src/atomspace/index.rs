//! Arena storage with type, name, key and incoming indices.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::query::{AtomPattern, NameMatch, QueryResult};
use super::truth::{AttentionValue, TruthValue};
use super::{Atom, AtomId, AtomKind, AtomType, now_millis};
use crate::error::{AtomspaceError, AtomspaceResult};

/// Counters and sizes reported by [`Atomspace::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AtomspaceStats {
    pub atoms: usize,
    pub nodes: usize,
    pub links: usize,
    pub nodes_created: u64,
    pub links_created: u64,
    pub queries: u64,
    /// Duration of the most recent query, in milliseconds.
    pub last_query_ms: f64,
}

/// The knowledge store.
///
/// Atoms live in a dense arena indexed by [`AtomId`]; atoms are never removed
/// except by [`Atomspace::clear`]. All index maintenance happens inline on
/// mutation. Not synchronized: wrap it in a lock to share across threads.
pub struct Atomspace {
    pub(super) atoms: Vec<Atom>,
    node_keys: HashMap<(AtomType, String), AtomId>,
    link_keys: HashMap<(AtomType, Vec<AtomId>), AtomId>,
    type_index: HashMap<AtomType, BTreeSet<AtomId>>,
    name_index: HashMap<String, BTreeSet<AtomId>>,
    incoming_index: HashMap<AtomId, BTreeSet<AtomId>>,
    pub(super) nodes_created: u64,
    pub(super) links_created: u64,
    pub(super) queries: Cell<u64>,
    last_query: Cell<Duration>,
}

impl Atomspace {
    /// Create an atomspace seeded with the base type hierarchy.
    pub fn new() -> Self {
        let mut space = Self::empty();
        space.seed_type_hierarchy();
        space
    }

    /// Create an atomspace with no atoms at all.
    pub fn empty() -> Self {
        Self {
            atoms: Vec::new(),
            node_keys: HashMap::new(),
            link_keys: HashMap::new(),
            type_index: HashMap::new(),
            name_index: HashMap::new(),
            incoming_index: HashMap::new(),
            nodes_created: 0,
            links_created: 0,
            queries: Cell::new(0),
            last_query: Cell::new(Duration::ZERO),
        }
    }

    // -----------------------------------------------------------------------
    // Insertion
    // -----------------------------------------------------------------------

    /// Add a node, or merge into the existing node with the same type and name.
    ///
    /// On collision a supplied truth value is revised into the stored one and a
    /// supplied attention value is merged element-wise by maximum.
    pub fn add_node(
        &mut self,
        atom_type: AtomType,
        name: impl Into<String>,
        tv: Option<TruthValue>,
        av: Option<AttentionValue>,
    ) -> AtomspaceResult<AtomId> {
        if !atom_type.is_node() {
            return Err(AtomspaceError::TypeMismatch {
                atom_type: atom_type.to_string(),
                expected: "node",
            });
        }
        let name = name.into();
        if let Some(&id) = self.node_keys.get(&(atom_type, name.clone())) {
            self.merge(id, tv, av);
            return Ok(id);
        }

        let id = self.push(atom_type, AtomKind::Node { name: name.clone() }, tv, av);
        self.node_keys.insert((atom_type, name.clone()), id);
        self.name_index.entry(name).or_default().insert(id);
        self.nodes_created += 1;
        tracing::trace!(%id, %atom_type, "added node");
        Ok(id)
    }

    /// Add a link, or merge into the existing link with the same type and outgoing set.
    ///
    /// Fails with [`AtomspaceError::UnknownAtom`] without side effects if any
    /// outgoing id is absent.
    pub fn add_link(
        &mut self,
        atom_type: AtomType,
        outgoing: Vec<AtomId>,
        tv: Option<TruthValue>,
        av: Option<AttentionValue>,
    ) -> AtomspaceResult<AtomId> {
        if !atom_type.is_link() {
            return Err(AtomspaceError::TypeMismatch {
                atom_type: atom_type.to_string(),
                expected: "link",
            });
        }
        if let Some(missing) = outgoing.iter().find(|id| !self.contains(**id)) {
            return Err(AtomspaceError::UnknownAtom { id: missing.get() });
        }
        if let Some(&id) = self.link_keys.get(&(atom_type, outgoing.clone())) {
            self.merge(id, tv, av);
            return Ok(id);
        }

        let id = self.push(
            atom_type,
            AtomKind::Link {
                outgoing: outgoing.clone(),
            },
            tv,
            av,
        );
        for target in &outgoing {
            self.incoming_index.entry(*target).or_default().insert(id);
        }
        self.link_keys.insert((atom_type, outgoing), id);
        self.links_created += 1;
        tracing::trace!(%id, %atom_type, "added link");
        Ok(id)
    }

    fn push(
        &mut self,
        atom_type: AtomType,
        kind: AtomKind,
        tv: Option<TruthValue>,
        av: Option<AttentionValue>,
    ) -> AtomId {
        let id = AtomId::new(self.atoms.len() as u64);
        let now = now_millis();
        self.atoms.push(Atom {
            id,
            atom_type,
            kind,
            tv: tv.unwrap_or_default(),
            av: av.unwrap_or_default(),
            created_at: now,
            updated_at: now,
            meta: BTreeMap::new(),
        });
        self.type_index.entry(atom_type).or_default().insert(id);
        id
    }

    fn merge(&mut self, id: AtomId, tv: Option<TruthValue>, av: Option<AttentionValue>) {
        if let Some(atom) = self.atoms.get_mut(id.index()) {
            if let Some(tv) = tv {
                atom.tv = atom.tv.revision(&tv);
            }
            if let Some(av) = av {
                atom.av = atom.av.merge(&av);
            }
            atom.updated_at = now_millis();
        }
    }

    /// Re-insert a previously exported atom at its own id.
    ///
    /// The caller guarantees ids are dense and links only reference earlier atoms.
    pub(super) fn restore(&mut self, atom: Atom) {
        let id = atom.id;
        self.type_index.entry(atom.atom_type).or_default().insert(id);
        match &atom.kind {
            AtomKind::Node { name } => {
                self.node_keys.insert((atom.atom_type, name.clone()), id);
                self.name_index.entry(name.clone()).or_default().insert(id);
            }
            AtomKind::Link { outgoing } => {
                for target in outgoing {
                    self.incoming_index.entry(*target).or_default().insert(id);
                }
                self.link_keys.insert((atom.atom_type, outgoing.clone()), id);
            }
        }
        self.atoms.push(atom);
    }

    // -----------------------------------------------------------------------
    // Convenience links
    // -----------------------------------------------------------------------

    /// `child` is a kind of `parent`.
    pub fn add_inheritance(&mut self, child: AtomId, parent: AtomId) -> AtomspaceResult<AtomId> {
        self.add_link(AtomType::InheritanceLink, vec![child, parent], None, None)
    }

    pub fn add_similarity(&mut self, a: AtomId, b: AtomId) -> AtomspaceResult<AtomId> {
        self.add_link(AtomType::SimilarityLink, vec![a, b], None, None)
    }

    /// `predicate(args...)`, stored as `EvaluationLink [predicate, ListLink args]`.
    pub fn add_evaluation(
        &mut self,
        predicate: AtomId,
        args: Vec<AtomId>,
        tv: Option<TruthValue>,
    ) -> AtomspaceResult<AtomId> {
        if !self.contains(predicate) {
            return Err(AtomspaceError::UnknownAtom {
                id: predicate.get(),
            });
        }
        let list = self.add_link(AtomType::ListLink, args, None, None)?;
        self.add_link(AtomType::EvaluationLink, vec![predicate, list], tv, None)
    }

    pub fn add_implication(
        &mut self,
        antecedent: AtomId,
        consequent: AtomId,
        tv: Option<TruthValue>,
    ) -> AtomspaceResult<AtomId> {
        self.add_link(
            AtomType::ImplicationLink,
            vec![antecedent, consequent],
            tv,
            None,
        )
    }

    /// `dependent` cannot start before `dependency` finishes.
    pub fn add_dependency(
        &mut self,
        dependent: AtomId,
        dependency: AtomId,
    ) -> AtomspaceResult<AtomId> {
        self.add_link(
            AtomType::DependsOnLink,
            vec![dependent, dependency],
            None,
            None,
        )
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    pub fn set_truth(&mut self, id: AtomId, tv: TruthValue) -> AtomspaceResult<()> {
        let atom = self.get_mut(id)?;
        atom.tv = tv;
        atom.updated_at = now_millis();
        Ok(())
    }

    /// Revise an atom's truth value with new evidence, returning the result.
    pub fn revise_truth(&mut self, id: AtomId, evidence: TruthValue) -> AtomspaceResult<TruthValue> {
        let atom = self.get_mut(id)?;
        atom.tv = atom.tv.revision(&evidence);
        atom.updated_at = now_millis();
        Ok(atom.tv)
    }

    pub fn set_meta(
        &mut self,
        id: AtomId,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> AtomspaceResult<()> {
        let atom = self.get_mut(id)?;
        atom.meta.insert(key.into(), value);
        atom.updated_at = now_millis();
        Ok(())
    }

    pub(super) fn get_mut(&mut self, id: AtomId) -> AtomspaceResult<&mut Atom> {
        self.atoms
            .get_mut(id.index())
            .ok_or(AtomspaceError::UnknownAtom { id: id.get() })
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn get(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id.index())
    }

    pub fn contains(&self, id: AtomId) -> bool {
        id.index() < self.atoms.len()
    }

    /// Look up a node by its unique `(type, name)` key.
    pub fn get_node(&self, atom_type: AtomType, name: &str) -> Option<&Atom> {
        self.node_keys
            .get(&(atom_type, name.to_string()))
            .and_then(|id| self.get(*id))
    }

    /// Look up a link by its unique `(type, outgoing)` key.
    pub fn get_link(&self, atom_type: AtomType, outgoing: &[AtomId]) -> Option<&Atom> {
        self.link_keys
            .get(&(atom_type, outgoing.to_vec()))
            .and_then(|id| self.get(*id))
    }

    /// All links whose outgoing set contains `id`, in id order.
    pub fn incoming(&self, id: AtomId) -> Vec<&Atom> {
        self.incoming_index
            .get(&id)
            .map(|set| set.iter().filter_map(|l| self.get(*l)).collect())
            .unwrap_or_default()
    }

    /// All atoms of one type, in id order.
    pub fn atoms_of_type(&self, atom_type: AtomType) -> impl Iterator<Item = &Atom> {
        self.type_index
            .get(&atom_type)
            .into_iter()
            .flat_map(|set| set.iter())
            .filter_map(|id| self.get(*id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.iter()
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    // -----------------------------------------------------------------------
    // Query
    // -----------------------------------------------------------------------

    /// Return every atom matching `pattern`, in id order, capped at its limit.
    ///
    /// Exact names are answered from the name index and types from the type
    /// index; regex names fall back to scanning the candidate set.
    pub fn query(&self, pattern: &AtomPattern) -> QueryResult {
        let start = Instant::now();
        let candidates: Vec<AtomId> = match (&pattern.name, pattern.types.as_slice()) {
            (Some(NameMatch::Exact(name)), _) => self
                .name_index
                .get(name)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
            (_, []) => (0..self.atoms.len() as u64).map(AtomId::new).collect(),
            (_, types) => {
                let mut ids = BTreeSet::new();
                for t in types {
                    if let Some(set) = self.type_index.get(t) {
                        ids.extend(set.iter().copied());
                    }
                }
                ids.into_iter().collect()
            }
        };

        let limit = pattern.limit.unwrap_or(usize::MAX);
        let atoms: Vec<Atom> = candidates
            .into_iter()
            .filter_map(|id| self.get(id))
            .filter(|atom| pattern.accepts(atom))
            .take(limit)
            .cloned()
            .collect();

        let elapsed = start.elapsed();
        self.queries.set(self.queries.get() + 1);
        self.last_query.set(elapsed);
        tracing::debug!(matches = atoms.len(), ?elapsed, "atomspace query");
        QueryResult { atoms, elapsed }
    }

    pub fn stats(&self) -> AtomspaceStats {
        let nodes = self.atoms.iter().filter(|a| a.is_node()).count();
        AtomspaceStats {
            atoms: self.atoms.len(),
            nodes,
            links: self.atoms.len() - nodes,
            nodes_created: self.nodes_created,
            links_created: self.links_created,
            queries: self.queries.get(),
            last_query_ms: self.last_query.get().as_secs_f64() * 1000.0,
        }
    }

    // -----------------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------------

    /// Drop every atom and counter, then re-seed the base type hierarchy.
    pub fn clear(&mut self) {
        self.reset();
        self.seed_type_hierarchy();
    }

    pub(super) fn reset(&mut self) {
        *self = Self::empty();
    }

    /// `Node` and `Link` inherit from `Atom`; the core node types inherit from `Node`.
    fn seed_type_hierarchy(&mut self) {
        if let Err(e) = self.try_seed_type_hierarchy() {
            tracing::error!(error = %e, "failed to seed type hierarchy");
        }
    }

    fn try_seed_type_hierarchy(&mut self) -> AtomspaceResult<()> {
        const NODE_TYPES: [&str; 5] = [
            "ConceptNode",
            "PredicateNode",
            "GoalNode",
            "TaskNode",
            "PlanNode",
        ];
        let atom = self.add_node(AtomType::TypeNode, "Atom", None, None)?;
        let node = self.add_node(AtomType::TypeNode, "Node", None, None)?;
        let link = self.add_node(AtomType::TypeNode, "Link", None, None)?;
        self.add_inheritance(node, atom)?;
        self.add_inheritance(link, atom)?;
        for name in NODE_TYPES {
            let t = self.add_node(AtomType::TypeNode, name, None, None)?;
            self.add_inheritance(t, node)?;
        }
        Ok(())
    }
}

impl Default for Atomspace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Atomspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Atomspace")
            .field("nodes", &stats.nodes)
            .field("links", &stats.links)
            .finish()
    }
}
