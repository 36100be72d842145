//! The built-in inference rules.
//!
//! A rule inspects an ordered pair of premise atoms and proposes
//! [`Derivation`]s. Rules never mutate the atomspace themselves: the engine
//! decides which derivations to accept and commits them.

use serde::Serialize;

use super::RuleName;
use super::formulas;
use crate::atomspace::{Atom, AtomId, AtomType, Atomspace, TruthValue};

/// Name, description and priority of a rule, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct RuleInfo {
    pub name: RuleName,
    pub description: &'static str,
    pub priority: u8,
}

/// What a derivation produces.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedTarget {
    /// Create the link, or revise it if it already exists.
    Link {
        atom_type: AtomType,
        outgoing: Vec<AtomId>,
    },
    /// Revise the truth value of an existing atom.
    Revise(AtomId),
}

/// A conclusion proposed by a rule.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub rule: RuleName,
    pub target: DerivedTarget,
    pub tv: TruthValue,
    pub premises: Vec<AtomId>,
    pub trace: String,
}

impl Derivation {
    /// The atom this derivation would touch, if it already exists.
    pub fn existing_atom(&self, space: &Atomspace) -> Option<AtomId> {
        match &self.target {
            DerivedTarget::Link {
                atom_type,
                outgoing,
            } => space.get_link(*atom_type, outgoing).map(|a| a.id),
            DerivedTarget::Revise(id) => Some(*id),
        }
    }
}

/// An inference rule over premise pairs.
pub trait InferenceRule: Send + Sync {
    fn name(&self) -> RuleName;

    fn description(&self) -> &'static str;

    /// Higher priorities are tried first.
    fn priority(&self) -> u8;

    fn can_apply(&self, space: &Atomspace, premises: &[&Atom]) -> bool;

    fn apply(&self, space: &Atomspace, premises: &[&Atom]) -> Vec<Derivation>;

    fn info(&self) -> RuleInfo {
        RuleInfo {
            name: self.name(),
            description: self.description(),
            priority: self.priority(),
        }
    }
}

/// The five built-in rules, highest priority first.
pub fn default_rules() -> Vec<Box<dyn InferenceRule>> {
    vec![
        Box::new(DeductionRule),
        Box::new(ModusPonensRule),
        Box::new(SimilarityRule),
        Box::new(ContextualReasoningRule),
        Box::new(AnalogyReasoningRule),
    ]
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pair<'a>(premises: &[&'a Atom]) -> Option<(&'a Atom, &'a Atom)> {
    match premises {
        [first, second, ..] => Some((*first, *second)),
        _ => None,
    }
}

/// Source and target of a binary link.
fn ends(link: &Atom) -> Option<(AtomId, AtomId)> {
    match link.outgoing() {
        [a, b] => Some((*a, *b)),
        _ => None,
    }
}

fn binary_of(link: &Atom, atom_type: AtomType) -> Option<(AtomId, AtomId)> {
    if link.atom_type == atom_type {
        ends(link)
    } else {
        None
    }
}

fn label(space: &Atomspace, id: AtomId) -> String {
    space
        .get(id)
        .and_then(|a| a.name().map(str::to_string))
        .unwrap_or_else(|| id.to_string())
}

/// Symmetric relations are stored with the smaller id first.
fn ordered(a: AtomId, b: AtomId) -> Vec<AtomId> {
    if a <= b { vec![a, b] } else { vec![b, a] }
}

// ---------------------------------------------------------------------------
// Deduction: A→B, B→C ⊢ A→C
// ---------------------------------------------------------------------------

pub struct DeductionRule;

impl DeductionRule {
    fn chain(premises: &[&Atom]) -> Option<(AtomId, AtomId, AtomId)> {
        let (first, second) = pair(premises)?;
        let (a, b) = binary_of(first, AtomType::InheritanceLink)?;
        let (b2, c) = binary_of(second, AtomType::InheritanceLink)?;
        (b == b2 && a != c).then_some((a, b, c))
    }
}

impl InferenceRule for DeductionRule {
    fn name(&self) -> RuleName {
        RuleName::Deduction
    }

    fn description(&self) -> &'static str {
        "If A inherits from B and B inherits from C, then A inherits from C"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn can_apply(&self, _space: &Atomspace, premises: &[&Atom]) -> bool {
        Self::chain(premises).is_some()
    }

    fn apply(&self, space: &Atomspace, premises: &[&Atom]) -> Vec<Derivation> {
        let (Some((a, b, c)), Some((first, second))) = (Self::chain(premises), pair(premises))
        else {
            return Vec::new();
        };
        let Some(tv_c) = space.get(c).map(|atom| atom.tv) else {
            return Vec::new();
        };
        let tv = formulas::deduction(&first.tv, &second.tv, &tv_c);
        vec![Derivation {
            rule: self.name(),
            target: DerivedTarget::Link {
                atom_type: AtomType::InheritanceLink,
                outgoing: vec![a, c],
            },
            tv,
            premises: vec![first.id, second.id],
            trace: format!(
                "Deduction: {} -> {} -> {}",
                label(space, a),
                label(space, b),
                label(space, c)
            ),
        }]
    }
}

// ---------------------------------------------------------------------------
// Modus ponens: A, A→B ⊢ B
// ---------------------------------------------------------------------------

pub struct ModusPonensRule;

impl ModusPonensRule {
    fn consequent(premises: &[&Atom]) -> Option<AtomId> {
        let (antecedent, implication) = pair(premises)?;
        let (a, b) = binary_of(implication, AtomType::ImplicationLink)?;
        (a == antecedent.id).then_some(b)
    }
}

impl InferenceRule for ModusPonensRule {
    fn name(&self) -> RuleName {
        RuleName::ModusPonens
    }

    fn description(&self) -> &'static str {
        "If A is true and A implies B, then B is true"
    }

    fn priority(&self) -> u8 {
        9
    }

    fn can_apply(&self, _space: &Atomspace, premises: &[&Atom]) -> bool {
        Self::consequent(premises).is_some()
    }

    fn apply(&self, space: &Atomspace, premises: &[&Atom]) -> Vec<Derivation> {
        let (Some(b), Some((antecedent, implication))) =
            (Self::consequent(premises), pair(premises))
        else {
            return Vec::new();
        };
        if !space.contains(b) {
            return Vec::new();
        }
        vec![Derivation {
            rule: self.name(),
            target: DerivedTarget::Revise(b),
            tv: formulas::modus_ponens(&antecedent.tv, &implication.tv),
            premises: vec![antecedent.id, implication.id],
            trace: format!(
                "ModusPonens: {} and ({} -> {}) gives {}",
                label(space, antecedent.id),
                label(space, antecedent.id),
                label(space, b),
                label(space, b)
            ),
        }]
    }
}

// ---------------------------------------------------------------------------
// Similarity: A→B, B→A ⊢ A~B
// ---------------------------------------------------------------------------

pub struct SimilarityRule;

impl SimilarityRule {
    fn mutual(premises: &[&Atom]) -> Option<(AtomId, AtomId)> {
        let (first, second) = pair(premises)?;
        let (a, b) = binary_of(first, AtomType::InheritanceLink)?;
        let (b2, a2) = binary_of(second, AtomType::InheritanceLink)?;
        (a == a2 && b == b2 && a != b).then_some((a, b))
    }
}

impl InferenceRule for SimilarityRule {
    fn name(&self) -> RuleName {
        RuleName::Similarity
    }

    fn description(&self) -> &'static str {
        "If A inherits from B and B inherits from A, they are similar"
    }

    fn priority(&self) -> u8 {
        7
    }

    fn can_apply(&self, _space: &Atomspace, premises: &[&Atom]) -> bool {
        Self::mutual(premises).is_some()
    }

    fn apply(&self, space: &Atomspace, premises: &[&Atom]) -> Vec<Derivation> {
        let (Some((a, b)), Some((first, second))) = (Self::mutual(premises), pair(premises))
        else {
            return Vec::new();
        };
        vec![Derivation {
            rule: self.name(),
            target: DerivedTarget::Link {
                atom_type: AtomType::SimilarityLink,
                outgoing: ordered(a, b),
            },
            tv: formulas::similarity_from_inheritance(&first.tv, &second.tv),
            premises: vec![first.id, second.id],
            trace: format!(
                "Similarity: {} and {} inherit from each other",
                label(space, a),
                label(space, b)
            ),
        }]
    }
}

// ---------------------------------------------------------------------------
// Contextual reasoning: shared context ⊢ similarity
// ---------------------------------------------------------------------------

pub struct ContextualReasoningRule;

impl ContextualReasoningRule {
    fn subjects(premises: &[&Atom]) -> Option<(AtomId, AtomId)> {
        let (first, second) = pair(premises)?;
        let (a, ctx) = binary_of(first, AtomType::ContextLink)?;
        let (b, ctx2) = binary_of(second, AtomType::ContextLink)?;
        (ctx == ctx2 && a != b).then_some((a, b))
    }
}

impl InferenceRule for ContextualReasoningRule {
    fn name(&self) -> RuleName {
        RuleName::ContextualReasoning
    }

    fn description(&self) -> &'static str {
        "If entities share a context, they are likely related"
    }

    fn priority(&self) -> u8 {
        6
    }

    fn can_apply(&self, _space: &Atomspace, premises: &[&Atom]) -> bool {
        Self::subjects(premises).is_some()
    }

    fn apply(&self, space: &Atomspace, premises: &[&Atom]) -> Vec<Derivation> {
        let (Some((a, b)), Some((first, second))) = (Self::subjects(premises), pair(premises))
        else {
            return Vec::new();
        };
        let strength = (first.tv.strength() * second.tv.strength()).sqrt();
        let confidence = first.tv.confidence().min(second.tv.confidence()) * 0.6;
        vec![Derivation {
            rule: self.name(),
            target: DerivedTarget::Link {
                atom_type: AtomType::SimilarityLink,
                outgoing: ordered(a, b),
            },
            tv: TruthValue::new(strength, confidence),
            premises: vec![first.id, second.id],
            trace: format!(
                "ContextualReasoning: shared context implies similarity between {} and {}",
                label(space, a),
                label(space, b)
            ),
        }]
    }
}

// ---------------------------------------------------------------------------
// Analogy: A~B, A→P ⊢ B→P
// ---------------------------------------------------------------------------

pub struct AnalogyReasoningRule;

impl AnalogyReasoningRule {
    /// `(source, target, property)` when the second premise is a property of
    /// one side of the similarity.
    fn transfer(premises: &[&Atom]) -> Option<(AtomId, AtomId, AtomId)> {
        let (similarity, property_link) = pair(premises)?;
        let (x, y) = binary_of(similarity, AtomType::SimilarityLink)?;
        if !matches!(
            property_link.atom_type,
            AtomType::InheritanceLink | AtomType::ImplicationLink | AtomType::ContextLink
        ) {
            return None;
        }
        let (source, property) = ends(property_link)?;
        let target = if source == x {
            y
        } else if source == y {
            x
        } else {
            return None;
        };
        (target != source && target != property).then_some((source, target, property))
    }
}

impl InferenceRule for AnalogyReasoningRule {
    fn name(&self) -> RuleName {
        RuleName::AnalogyReasoning
    }

    fn description(&self) -> &'static str {
        "Similar entities likely have similar properties"
    }

    fn priority(&self) -> u8 {
        5
    }

    fn can_apply(&self, _space: &Atomspace, premises: &[&Atom]) -> bool {
        Self::transfer(premises).is_some()
    }

    fn apply(&self, space: &Atomspace, premises: &[&Atom]) -> Vec<Derivation> {
        let (Some((source, target, property)), Some((similarity, property_link))) =
            (Self::transfer(premises), pair(premises))
        else {
            return Vec::new();
        };
        let strength = similarity.tv.strength() * property_link.tv.strength();
        let confidence = similarity.tv.confidence().min(property_link.tv.confidence()) * 0.5;
        vec![Derivation {
            rule: self.name(),
            target: DerivedTarget::Link {
                atom_type: property_link.atom_type,
                outgoing: vec![target, property],
            },
            tv: TruthValue::new(strength, confidence),
            premises: vec![similarity.id, property_link.id],
            trace: format!(
                "AnalogyReasoning: {} similar to {}, property {} transferred",
                label(space, source),
                label(space, target),
                label(space, property)
            ),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(space: &mut Atomspace, name: &str, tv: Option<TruthValue>) -> AtomId {
        space
            .add_node(AtomType::ConceptNode, name, tv, None)
            .unwrap()
    }

    fn link(space: &mut Atomspace, t: AtomType, a: AtomId, b: AtomId, tv: TruthValue) -> AtomId {
        space.add_link(t, vec![a, b], Some(tv), None).unwrap()
    }

    fn atoms<'a>(space: &'a Atomspace, ids: &[AtomId]) -> Vec<&'a Atom> {
        ids.iter().map(|id| space.get(*id).unwrap()).collect()
    }

    #[test]
    fn deduction_uses_the_conclusion_atom_truth() {
        let mut space = Atomspace::empty();
        let a = concept(&mut space, "a", None);
        let b = concept(&mut space, "b", None);
        let c = concept(&mut space, "c", Some(TruthValue::new(0.7, 0.9)));
        let ab = link(&mut space, AtomType::InheritanceLink, a, b, TruthValue::new(0.9, 0.9));
        let bc = link(&mut space, AtomType::InheritanceLink, b, c, TruthValue::new(0.8, 0.8));

        let premises = atoms(&space, &[ab, bc]);
        assert!(DeductionRule.can_apply(&space, &premises));
        let out = DeductionRule.apply(&space, &premises);
        assert_eq!(out.len(), 1);
        assert!((out[0].tv.strength() - 0.518).abs() < 1e-9);
        assert!((out[0].tv.confidence() - 0.72).abs() < 1e-9);
        assert_eq!(
            out[0].target,
            DerivedTarget::Link {
                atom_type: AtomType::InheritanceLink,
                outgoing: vec![a, c]
            }
        );

        let reversed = atoms(&space, &[bc, ab]);
        assert!(!DeductionRule.can_apply(&space, &reversed));
    }

    #[test]
    fn deduction_skips_cycles_back_to_start() {
        let mut space = Atomspace::empty();
        let a = concept(&mut space, "a", None);
        let b = concept(&mut space, "b", None);
        let ab = space.add_inheritance(a, b).unwrap();
        let ba = space.add_inheritance(b, a).unwrap();
        assert!(!DeductionRule.can_apply(&space, &atoms(&space, &[ab, ba])));
        assert!(SimilarityRule.can_apply(&space, &atoms(&space, &[ab, ba])));
    }

    #[test]
    fn modus_ponens_revises_consequent() {
        let mut space = Atomspace::empty();
        let a = concept(&mut space, "a", None);
        let b = concept(&mut space, "b", None);
        let premise = space.add_inheritance(a, b).unwrap();
        let imp = space
            .add_implication(premise, b, Some(TruthValue::new(0.8, 0.9)))
            .unwrap();

        let premises = atoms(&space, &[premise, imp]);
        assert!(ModusPonensRule.can_apply(&space, &premises));
        let out = ModusPonensRule.apply(&space, &premises);
        assert_eq!(out[0].target, DerivedTarget::Revise(b));
        assert!((out[0].tv.strength() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn contextual_uses_geometric_mean() {
        let mut space = Atomspace::empty();
        let x = concept(&mut space, "x", None);
        let y = concept(&mut space, "y", None);
        let goal = space.add_node(AtomType::GoalNode, "g", None, None).unwrap();
        let cx = link(&mut space, AtomType::ContextLink, x, goal, TruthValue::new(0.4, 0.5));
        let cy = link(&mut space, AtomType::ContextLink, y, goal, TruthValue::new(0.9, 0.8));

        let out = ContextualReasoningRule.apply(&space, &atoms(&space, &[cy, cx]));
        assert!((out[0].tv.strength() - 0.6).abs() < 1e-9);
        assert!((out[0].tv.confidence() - 0.3).abs() < 1e-9);
        // Symmetric: stored smaller id first whichever order the premises came in.
        assert_eq!(
            out[0].target,
            DerivedTarget::Link {
                atom_type: AtomType::SimilarityLink,
                outgoing: vec![x, y]
            }
        );
    }

    #[test]
    fn analogy_transfers_property_to_similar_side() {
        let mut space = Atomspace::empty();
        let cat = concept(&mut space, "cat", None);
        let lynx = concept(&mut space, "lynx", None);
        let mammal = concept(&mut space, "mammal", None);
        let sim = link(&mut space, AtomType::SimilarityLink, cat, lynx, TruthValue::new(0.8, 0.8));
        let prop = link(&mut space, AtomType::InheritanceLink, cat, mammal, TruthValue::new(1.0, 0.9));

        let out = AnalogyReasoningRule.apply(&space, &atoms(&space, &[sim, prop]));
        assert_eq!(
            out[0].target,
            DerivedTarget::Link {
                atom_type: AtomType::InheritanceLink,
                outgoing: vec![lynx, mammal]
            }
        );
        assert!((out[0].tv.strength() - 0.8).abs() < 1e-9);
        assert!((out[0].tv.confidence() - 0.4).abs() < 1e-9);

        // A similarity is not a transferable property.
        assert!(!AnalogyReasoningRule.can_apply(&space, &atoms(&space, &[sim, sim])));
    }

    #[test]
    fn default_rules_are_in_priority_order() {
        let priorities: Vec<u8> = default_rules().iter().map(|r| r.priority()).collect();
        assert_eq!(priorities, vec![10, 9, 7, 6, 5]);
    }
}
