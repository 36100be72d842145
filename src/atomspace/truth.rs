//! Truth and attention values carried by every atom.

use serde::{Deserialize, Serialize};

/// Upper bound for short- and long-term importance raised by attention operations.
pub const MAX_IMPORTANCE: f64 = 100.0;

/// Probabilistic belief in an atom: how true (`strength`) and how sure (`confidence`).
///
/// Strength and confidence are clamped to `[0.0, 1.0]` on every construction path,
/// including deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTruthValue")]
pub struct TruthValue {
    strength: f64,
    confidence: f64,
    count: u32,
}

#[derive(Deserialize)]
struct RawTruthValue {
    strength: f64,
    confidence: f64,
    #[serde(default)]
    count: u32,
}

impl From<RawTruthValue> for TruthValue {
    fn from(raw: RawTruthValue) -> Self {
        Self::with_count(raw.strength, raw.confidence, raw.count)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl TruthValue {
    /// Create a truth value with an evidence count of 1.
    pub fn new(strength: f64, confidence: f64) -> Self {
        Self::with_count(strength, confidence, 1)
    }

    /// Create a truth value with an explicit evidence count.
    pub fn with_count(strength: f64, confidence: f64, count: u32) -> Self {
        Self {
            strength: clamp_unit(strength),
            confidence: clamp_unit(confidence),
            count,
        }
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Combine two estimates of the same atom.
    ///
    /// Strength is the confidence-weighted average of both sides, confidence
    /// grows as `1 - (1-c1)(1-c2)`, and evidence counts add up.
    pub fn revision(&self, other: &TruthValue) -> TruthValue {
        let total = self.confidence + other.confidence;
        let w1 = if total > 0.0 {
            self.confidence / total
        } else {
            0.5
        };
        let strength = self.strength * w1 + other.strength * (1.0 - w1);
        let confidence = 1.0 - (1.0 - self.confidence) * (1.0 - other.confidence);
        TruthValue::with_count(
            strength,
            confidence,
            self.count.saturating_add(other.count),
        )
    }
}

impl Default for TruthValue {
    /// Default belief for freshly created atoms: `{1.0, 0.9, count 1}`.
    fn default() -> Self {
        Self::new(1.0, 0.9)
    }
}

impl std::fmt::Display for TruthValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<s={:.3}, c={:.3}, n={}>",
            self.strength, self.confidence, self.count
        )
    }
}

/// Relevance of an atom: short-, long- and very-long-term importance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AttentionValue {
    pub sti: f64,
    pub lti: f64,
    pub vlti: f64,
}

impl AttentionValue {
    pub fn new(sti: f64, lti: f64, vlti: f64) -> Self {
        Self { sti, lti, vlti }
    }

    /// Element-wise maximum, used when two additions of the same atom collide.
    pub fn merge(&self, other: &AttentionValue) -> AttentionValue {
        AttentionValue {
            sti: self.sti.max(other.sti),
            lti: self.lti.max(other.lti),
            vlti: self.vlti.max(other.vlti),
        }
    }
}
