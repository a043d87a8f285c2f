//! Confidence scores attached to detection results

use serde::{Deserialize, Serialize};

/// Confidence of a detection result
///
/// `Computed` values come out of the signal itself (autocorrelation strength,
/// profile correlation). `Heuristic` values are fixed placeholders that a
/// better estimator can replace without changing the interface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Confidence {
    Computed(f32),
    Heuristic(f32),
}

impl Confidence {
    /// Computed confidence, clamped to `[0, 1]` (NaN becomes 0)
    pub fn computed(value: f32) -> Self {
        Confidence::Computed(clamp_unit(value))
    }

    /// Fixed placeholder confidence, clamped to `[0, 1]`
    pub fn heuristic(value: f32) -> Self {
        Confidence::Heuristic(clamp_unit(value))
    }

    /// The score in `[0, 1]`
    pub fn value(&self) -> f32 {
        match *self {
            Confidence::Computed(v) | Confidence::Heuristic(v) => clamp_unit(v),
        }
    }

    pub fn is_heuristic(&self) -> bool {
        matches!(self, Confidence::Heuristic(_))
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Computed(0.0)
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
