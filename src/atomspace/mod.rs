//! Atomspace: a typed knowledge graph with uncertain truth and attention values.
//!
//! Knowledge is stored as [`Atom`]s in a dense arena. An atom is either a named
//! node or a link over an ordered list of other atoms; both carry a
//! [`TruthValue`] and an [`AttentionValue`]. Nodes are unique per
//! `(type, name)` and links per `(type, outgoing)`: adding a duplicate merges
//! into the existing atom instead of creating a second one.

pub mod attention;
pub mod index;
pub mod knowledge;
pub mod query;
pub mod snapshot;
pub mod traverse;
pub mod truth;

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AtomspaceError;

pub use index::{Atomspace, AtomspaceStats};
pub use knowledge::{SimilarGoal, TaskPattern};
pub use query::{AtomPattern, NameMatch, QueryResult};
pub use snapshot::AtomspaceSnapshot;
pub use truth::{AttentionValue, TruthValue};

/// Dense identifier of an atom: its slot in the atomspace arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomId(u64);

impl AtomId {
    pub fn new(raw: u64) -> Self {
        AtomId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atom:{}", self.0)
    }
}

macro_rules! atom_types {
    (nodes: [$($node:ident),* $(,)?], links: [$($link:ident),* $(,)?]) => {
        /// Closed set of atom type tags.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum AtomType {
            $($node,)*
            $($link,)*
        }

        impl AtomType {
            /// Every atom type, nodes first.
            pub const ALL: &'static [AtomType] = &[$(AtomType::$node,)* $(AtomType::$link,)*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(AtomType::$node => stringify!($node),)*
                    $(AtomType::$link => stringify!($link),)*
                }
            }

            pub fn is_node(self) -> bool {
                matches!(self, $(AtomType::$node)|*)
            }
        }
    };
}

atom_types! {
    nodes: [
        ConceptNode, PredicateNode, VariableNode, GoalNode, TaskNode, PlanNode,
        ToolNode, ResultNode, ErrorNode, TypeNode, SchemaNode,
    ],
    links: [
        InheritanceLink, SimilarityLink, EvaluationLink, ImplicationLink,
        EquivalenceLink, MemberLink, ContextLink, DependsOnLink, SolvedByLink,
        ListLink, SetLink, AndLink, OrLink, NotLink, ExecutionLink, StateLink,
    ]
}

impl AtomType {
    pub fn is_link(self) -> bool {
        !self.is_node()
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtomType {
    type Err = AtomspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AtomType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AtomspaceError::UnknownType { name: s.into() })
    }
}

impl TryFrom<String> for AtomType {
    type Error = AtomspaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AtomType> for String {
    fn from(value: AtomType) -> Self {
        value.as_str().to_string()
    }
}

/// Node-or-link payload of an atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtomKind {
    Node { name: String },
    Link { outgoing: Vec<AtomId> },
}

/// A knowledge-graph element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub id: AtomId,
    pub atom_type: AtomType,
    pub kind: AtomKind,
    pub tv: TruthValue,
    pub av: AttentionValue,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
    pub updated_at: u64,
    /// Open metadata bag.
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

impl Atom {
    /// The node name, or `None` for links.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            AtomKind::Node { name } => Some(name),
            AtomKind::Link { .. } => None,
        }
    }

    /// The outgoing set; empty for nodes.
    pub fn outgoing(&self) -> &[AtomId] {
        match &self.kind {
            AtomKind::Node { .. } => &[],
            AtomKind::Link { outgoing } => outgoing,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, AtomKind::Node { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, AtomKind::Link { .. })
    }

    /// A metadata entry rendered as a string, if it is one.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| v.as_str())
    }
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
