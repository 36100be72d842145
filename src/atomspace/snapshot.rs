//! Export, import and on-disk snapshots of the full atom set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::index::Atomspace;
use super::{Atom, AtomKind};
use crate::error::{AtomspaceError, AtomspaceResult};

/// Every atom plus the creation and query counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomspaceSnapshot {
    pub atoms: Vec<Atom>,
    #[serde(default)]
    pub nodes_created: u64,
    #[serde(default)]
    pub links_created: u64,
    #[serde(default)]
    pub queries: u64,
}

impl Atomspace {
    pub fn export(&self) -> AtomspaceSnapshot {
        AtomspaceSnapshot {
            atoms: self.atoms.clone(),
            nodes_created: self.nodes_created,
            links_created: self.links_created,
            queries: self.queries.get(),
        }
    }

    /// Replace the whole contents with a snapshot.
    ///
    /// The snapshot is validated first; an invalid one leaves the atomspace
    /// untouched.
    pub fn import(&mut self, snapshot: AtomspaceSnapshot) -> AtomspaceResult<()> {
        validate(&snapshot)?;
        self.reset();
        let count = snapshot.atoms.len();
        for atom in snapshot.atoms {
            self.restore(atom);
        }
        self.nodes_created = snapshot.nodes_created;
        self.links_created = snapshot.links_created;
        self.queries.set(snapshot.queries);
        tracing::info!(atoms = count, "imported atomspace snapshot");
        Ok(())
    }

    /// Write [`Atomspace::export`] as pretty JSON.
    pub fn save_snapshot(&self, path: &Path) -> AtomspaceResult<()> {
        let json = serde_json::to_string_pretty(&self.export()).map_err(|e| {
            AtomspaceError::Serialization {
                message: e.to_string(),
            }
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AtomspaceError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, json).map_err(|e| AtomspaceError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Read a snapshot written by [`Atomspace::save_snapshot`].
    pub fn load_snapshot(path: &Path) -> AtomspaceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AtomspaceError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let snapshot: AtomspaceSnapshot =
            serde_json::from_str(&content).map_err(|e| AtomspaceError::Serialization {
                message: e.to_string(),
            })?;
        let mut space = Atomspace::empty();
        space.import(snapshot)?;
        Ok(space)
    }
}

fn validate(snapshot: &AtomspaceSnapshot) -> AtomspaceResult<()> {
    for (index, atom) in snapshot.atoms.iter().enumerate() {
        if atom.id.index() != index {
            return Err(AtomspaceError::InvalidSnapshot {
                message: format!("atom at position {index} has id {}", atom.id),
            });
        }
        match &atom.kind {
            AtomKind::Node { .. } if atom.atom_type.is_link() => {
                return Err(AtomspaceError::InvalidSnapshot {
                    message: format!("{} is a node but has link type {}", atom.id, atom.atom_type),
                });
            }
            AtomKind::Link { .. } if atom.atom_type.is_node() => {
                return Err(AtomspaceError::InvalidSnapshot {
                    message: format!("{} is a link but has node type {}", atom.id, atom.atom_type),
                });
            }
            AtomKind::Link { outgoing } => {
                if let Some(bad) = outgoing.iter().find(|id| id.index() >= index) {
                    return Err(AtomspaceError::InvalidSnapshot {
                        message: format!("{} references {bad}, which is not earlier", atom.id),
                    });
                }
            }
            AtomKind::Node { .. } => {}
        }
    }
    Ok(())
}
