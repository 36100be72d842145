//! Hop-bounded breadth-first traversal.

use std::collections::{HashSet, VecDeque};

use super::index::Atomspace;
use super::{Atom, AtomId};

impl Atomspace {
    /// Every atom within `max_hops` of `start`, following outgoing edges of
    /// links and incoming links of any atom, in breadth-first order.
    ///
    /// The start atom is included at hop 0. Each atom is visited once; an
    /// unknown start yields an empty result.
    pub fn neighborhood(&self, start: AtomId, max_hops: usize) -> Vec<&Atom> {
        let mut visited: HashSet<AtomId> = HashSet::new();
        let mut order: Vec<&Atom> = Vec::new();
        let mut queue: VecDeque<(AtomId, usize)> = VecDeque::new();

        if self.get(start).is_none() {
            return order;
        }
        visited.insert(start);
        queue.push_back((start, 0));

        while let Some((id, hops)) = queue.pop_front() {
            let Some(atom) = self.get(id) else { continue };
            order.push(atom);
            if hops >= max_hops {
                continue;
            }

            let outgoing = atom.outgoing().iter().copied();
            let incoming = self.incoming(id).into_iter().map(|l| l.id);
            for next in outgoing.chain(incoming) {
                if visited.insert(next) {
                    queue.push_back((next, hops + 1));
                }
            }
        }

        order
    }
}
