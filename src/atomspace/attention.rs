//! Attention dynamics: spreading, focusing and decay of importance.

use std::collections::HashMap;

use super::index::Atomspace;
use super::truth::MAX_IMPORTANCE;
use super::{AtomId, now_millis};
use crate::error::AtomspaceResult;

impl Atomspace {
    /// Spread short-term importance along the graph for `iterations` rounds.
    ///
    /// Within a round every atom with positive STI sends `sti * decay / fan_out`
    /// to each of its outgoing atoms (links only) and to each incoming link.
    /// Contributions are accumulated and applied after the full pass, so the
    /// result does not depend on iteration order. STI is capped at 100.
    pub fn spread_activation(&mut self, iterations: usize, decay: f64) {
        for round in 0..iterations {
            let mut updates: HashMap<AtomId, f64> = HashMap::new();

            for atom in &self.atoms {
                let sti = atom.av.sti;
                if sti <= 0.0 {
                    continue;
                }
                let outgoing = atom.outgoing();
                if !outgoing.is_empty() {
                    let share = sti * decay / outgoing.len() as f64;
                    for target in outgoing {
                        *updates.entry(*target).or_default() += share;
                    }
                }
                let incoming = self.incoming(atom.id);
                if !incoming.is_empty() {
                    let share = sti * decay / incoming.len() as f64;
                    for link in incoming {
                        *updates.entry(link.id).or_default() += share;
                    }
                }
            }

            let touched = updates.len();
            for (id, delta) in updates {
                if let Some(atom) = self.atoms.get_mut(id.index()) {
                    atom.av.sti = (atom.av.sti + delta).min(MAX_IMPORTANCE);
                }
            }
            tracing::debug!(round, touched, "spread activation");
        }
    }

    /// Raise an atom's STI by `amount` and its LTI by a tenth of that, both capped at 100.
    pub fn focus_attention(&mut self, id: AtomId, amount: f64) -> AtomspaceResult<()> {
        let atom = self.get_mut(id)?;
        atom.av.sti = (atom.av.sti + amount).min(MAX_IMPORTANCE);
        atom.av.lti = (atom.av.lti + amount * 0.1).min(MAX_IMPORTANCE);
        atom.updated_at = now_millis();
        Ok(())
    }

    /// Multiply every atom's STI by `1 - rate`, never going below zero.
    pub fn decay_attention(&mut self, rate: f64) {
        for atom in &mut self.atoms {
            atom.av.sti = (atom.av.sti * (1.0 - rate)).max(0.0);
        }
    }
}
