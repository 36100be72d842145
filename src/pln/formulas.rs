//! Truth-value algebra.
//!
//! Pure functions over [`TruthValue`]s. Every result goes through
//! [`TruthValue::new`], so strength and confidence always land in `[0, 1]`.
//! The arithmetic here is deliberately simple and must stay stable: stored
//! truth values and derived rankings depend on it exactly.

use crate::atomspace::TruthValue;

fn min3(a: &TruthValue, b: &TruthValue, c: &TruthValue) -> f64 {
    a.confidence().min(b.confidence()).min(c.confidence())
}

/// `A→B, B→C ⊢ A→C`.
///
/// `sAC = sAB·sBC·sC + (1-sAB)·sC·(1-sBC)`, confidence `min(cAB, cBC, cC)·0.9`.
pub fn deduction(ab: &TruthValue, bc: &TruthValue, c: &TruthValue) -> TruthValue {
    let (s_ab, s_bc, s_c) = (ab.strength(), bc.strength(), c.strength());
    let strength = s_ab * s_bc * s_c + (1.0 - s_ab) * s_c * (1.0 - s_bc);
    TruthValue::new(strength, min3(ab, bc, c) * 0.9)
}

/// `A→B, A→C ⊢ B→C`: `sAB·sAC / max(sA, 0.01)`, confidence `min·0.7`.
pub fn induction(ab: &TruthValue, ac: &TruthValue, a: &TruthValue) -> TruthValue {
    let strength = ab.strength() * ac.strength() / a.strength().max(0.01);
    TruthValue::new(strength, min3(ab, ac, a) * 0.7)
}

/// `A→B, C→B ⊢ A→C`: `sAB·sCB / max(sB, 0.01)`, confidence `min·0.6`.
pub fn abduction(ab: &TruthValue, cb: &TruthValue, b: &TruthValue) -> TruthValue {
    let strength = ab.strength() * cb.strength() / b.strength().max(0.01);
    TruthValue::new(strength, min3(ab, cb, b) * 0.6)
}

/// `A, A→B ⊢ B`: `sA·sAB`, confidence `min·0.95`.
pub fn modus_ponens(a: &TruthValue, ab: &TruthValue) -> TruthValue {
    TruthValue::new(
        a.strength() * ab.strength(),
        a.confidence().min(ab.confidence()) * 0.95,
    )
}

/// `¬B, A→B ⊢ ¬A`: `1 - sAB·(1 - s¬B)`, confidence `min·0.85`.
pub fn modus_tollens(not_b: &TruthValue, ab: &TruthValue) -> TruthValue {
    TruthValue::new(
        1.0 - ab.strength() * (1.0 - not_b.strength()),
        not_b.confidence().min(ab.confidence()) * 0.85,
    )
}

/// `A→B, B→A ⊢ A~B`: mean strength, weaker confidence.
pub fn similarity_from_inheritance(ab: &TruthValue, ba: &TruthValue) -> TruthValue {
    TruthValue::new(
        (ab.strength() + ba.strength()) / 2.0,
        ab.confidence().min(ba.confidence()),
    )
}

pub fn conjunction(a: &TruthValue, b: &TruthValue) -> TruthValue {
    TruthValue::new(
        a.strength() * b.strength(),
        a.confidence().min(b.confidence()),
    )
}

pub fn disjunction(a: &TruthValue, b: &TruthValue) -> TruthValue {
    let (sa, sb) = (a.strength(), b.strength());
    TruthValue::new(sa + sb - sa * sb, a.confidence().min(b.confidence()))
}

pub fn negation(a: &TruthValue) -> TruthValue {
    TruthValue::with_count(1.0 - a.strength(), a.confidence(), a.count())
}

/// Combine two estimates of the same statement. See [`TruthValue::revision`].
pub fn revision(a: &TruthValue, b: &TruthValue) -> TruthValue {
    a.revision(b)
}
