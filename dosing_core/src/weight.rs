//! Weight resolution.
//!
//! Turns a raw weight input into the effective weight every downstream
//! computation uses, and applies rule-scoped weight overrides.

use crate::{EffectiveWeight, WeightBounds, WeightOverrides};

/// Resolve a raw weight into an effective weight
///
/// Without bounds, a missing, non-finite or non-positive weight yields
/// `None`. With bounds, a valid weight is clamped into `[min_kg, max_kg]`
/// and an invalid one is replaced by the protocol default, so screens that
/// must always show a plausible number still get one.
pub fn resolve_weight(raw_kg: Option<f64>, bounds: Option<&WeightBounds>) -> Option<EffectiveWeight> {
    let valid = raw_kg.filter(|kg| kg.is_finite() && *kg > 0.0);

    let Some(bounds) = bounds else {
        return valid.and_then(EffectiveWeight::new);
    };

    let kg = match valid {
        Some(kg) => {
            let clamped = bounds.clamp(kg);
            if clamped != kg {
                tracing::debug!(raw_kg = kg, clamped_kg = clamped, "weight clamped to protocol bounds");
            }
            clamped
        }
        None => {
            tracing::debug!(
                default_kg = bounds.default_kg,
                "missing or invalid weight, using protocol default"
            );
            bounds.default_kg
        }
    };

    EffectiveWeight::new(kg)
}

/// Substitute the override weight for `weight` when the rule has one
///
/// Returns `None` only if the table holds an unusable substitute, which
/// rule validation reports as a configuration defect.
pub fn with_override(weight: EffectiveWeight, overrides: &WeightOverrides) -> Option<EffectiveWeight> {
    match overrides.lookup(weight.kg()) {
        Some(substitute) => {
            tracing::debug!(
                weight_kg = weight.kg(),
                substitute_kg = substitute,
                "weight override applied"
            );
            EffectiveWeight::new(substitute)
        }
        None => Some(weight),
    }
}
