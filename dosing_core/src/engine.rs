//! Dose engine.
//!
//! Turns an effective weight (and, for age-dependent entries, an age in
//! months) into a dose. The pipeline for a weight-scaled rule is fixed:
//!
//! 1. undefined weight → undefined result
//! 2. weight override substitution (by rounded kilograms)
//! 3. weight × per-kg factor (each bound of a ranged rule independently)
//! 4. floor, then ceiling
//! 5. snap to the rule's round step
//!
//! Nothing here panics or returns an error; "cannot compute" is `None`.

use crate::weight::with_override;
use crate::{AgeBands, Dose, DoseResult, Dosing, DosingRule, DrugEntry, EffectiveWeight, PerKg};
use serde::Serialize;

/// Decimal places kept when cleaning floating point noise off a snapped value
const SNAP_PRECISION: f64 = 1e9;

/// How far below an exact midpoint (in ulps of the step count) still rounds up
const MIDPOINT_ULPS: f64 = 16.0;

/// A dose computed for one table entry, with its volume when the entry has
/// a stock concentration
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct PrescribedDose {
    pub entry: DrugEntry,
    /// Weight the rule was applied to, after weight overrides
    ///
    /// `None` for age-only doses and when no weight could be resolved.
    pub effective_weight: Option<EffectiveWeight>,
    pub dose: DoseResult,
    pub volume: Option<DoseResult>,
}

/// Compute a weight-scaled dose
pub fn compute_dose(weight: Option<EffectiveWeight>, rule: &DosingRule) -> DoseResult {
    let Some(weight) = weight.and_then(|w| with_override(w, &rule.overrides)) else {
        return DoseResult::undefined(&rule.unit);
    };

    let kg = weight.kg();
    let value = match rule.per_kg {
        PerKg::Fixed { per_kg } => scale(kg, per_kg, rule).map(Dose::Single),
        PerKg::Range { min, max } => match (scale(kg, min, rule), scale(kg, max, rule)) {
            (Some(low), Some(high)) => Some(Dose::Range { low, high }),
            _ => None,
        },
    };

    DoseResult {
        value,
        unit: rule.unit.clone(),
    }
}

/// Scale one per-kg factor, then floor, cap and snap it
fn scale(kg: f64, per_kg: f64, rule: &DosingRule) -> Option<f64> {
    let mut dose = kg * per_kg;
    if !dose.is_finite() || dose < 0.0 {
        return None;
    }

    if let Some(floor) = rule.min_dose {
        if dose < floor {
            tracing::debug!(raw = dose, floor, "dose raised to minimum");
            dose = floor;
        }
    }

    if let Some(cap) = rule.max_dose {
        if dose > cap {
            tracing::debug!(raw = dose, cap, "dose capped at maximum");
            dose = cap;
        }
    }

    let dose = match rule.round_step {
        Some(step) => snap_to_step(dose, step),
        None => Some(dose),
    };
    dose.filter(|v| v.is_finite())
}

/// Round `value` half-up to the nearest multiple of `step`
///
/// A step count within a few ulps below a midpoint (0.025 / 0.05) rounds up;
/// anything further below rounds down. A non-positive or non-finite step, or
/// a result that overflows, yields `None`.
pub fn snap_to_step(value: f64, step: f64) -> Option<f64> {
    if !value.is_finite() || !step.is_finite() || step <= 0.0 {
        return None;
    }

    let steps = value / step;
    let whole = steps.floor();
    let slack = steps.abs().max(1.0) * MIDPOINT_ULPS * f64::EPSILON;
    let steps = if steps - whole >= 0.5 - slack {
        whole + 1.0
    } else {
        whole
    };

    let snapped = steps * step;
    let cleaned = (snapped * SNAP_PRECISION).round() / SNAP_PRECISION;
    let snapped = if cleaned.is_finite() { cleaned } else { snapped };
    snapped.is_finite().then_some(snapped)
}

/// Fixed dose selected by age band
pub fn age_banded_dose(age_months: Option<u32>, unit: &str, bands: &AgeBands<f64>) -> DoseResult {
    match age_months.and_then(|m| bands.select(m)) {
        Some(dose) if dose.is_finite() => DoseResult::single(*dose, unit),
        _ => DoseResult::undefined(unit),
    }
}

/// Dose for a table entry, whatever its dosing basis
pub fn dose_for_entry(
    entry: &DrugEntry,
    weight: Option<EffectiveWeight>,
    age_months: Option<u32>,
) -> DoseResult {
    match &entry.dosing {
        Dosing::Weight { rule } => compute_dose(weight, rule),
        Dosing::AgeFixed { unit, bands } => age_banded_dose(age_months, unit, bands),
        Dosing::AgeWeight { bands } => match age_months.and_then(|m| bands.select(m)) {
            Some(rule) => compute_dose(weight, rule),
            None => DoseResult::undefined(entry.dosing.unit()),
        },
    }
}

/// Convert a dose into a volume: dose ÷ concentration (per mL) = mL
///
/// An undefined dose or an unusable concentration yields an undefined volume.
pub fn volume_ml(dose: &DoseResult, concentration_per_ml: f64) -> DoseResult {
    if !concentration_per_ml.is_finite() || concentration_per_ml <= 0.0 {
        return DoseResult::undefined("mL");
    }

    DoseResult {
        value: dose.value.map(|d| d.map(|v| v / concentration_per_ml)),
        unit: "mL".to_string(),
    }
}

/// Weight a weight-scaled entry is computed with, after its override table
pub fn effective_weight_for(
    entry: &DrugEntry,
    weight: Option<EffectiveWeight>,
    age_months: Option<u32>,
) -> Option<EffectiveWeight> {
    let rule = match &entry.dosing {
        Dosing::Weight { rule } => rule,
        Dosing::AgeWeight { bands } => age_months.and_then(|m| bands.select(m))?,
        Dosing::AgeFixed { .. } => return None,
    };
    weight.and_then(|w| with_override(w, &rule.overrides))
}

/// Compute the dose for an entry and, when it has a concentration, the volume
pub fn prescribe(
    entry: &DrugEntry,
    weight: Option<EffectiveWeight>,
    age_months: Option<u32>,
) -> PrescribedDose {
    let dose = dose_for_entry(entry, weight, age_months);
    let volume = entry
        .concentration_per_ml
        .map(|concentration| volume_ml(&dose, concentration));

    let effective_weight = effective_weight_for(entry, weight, age_months);
    if effective_weight != weight && effective_weight.is_some() {
        tracing::debug!(
            drug = %entry.drug,
            from = ?weight.map(EffectiveWeight::kg),
            to = ?effective_weight.map(EffectiveWeight::kg),
            "weight override applied"
        );
    }
    tracing::debug!(drug = %entry.drug, defined = dose.is_defined(), "prescribed dose");

    PrescribedDose {
        entry: entry.clone(),
        effective_weight,
        dose,
        volume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Drug, WeightOverrides};

    fn kg(w: f64) -> Option<EffectiveWeight> {
        EffectiveWeight::new(w)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_undefined_weight_keeps_unit() {
        crate::logging::init_test();
        let rule = DosingRule::per_kg(15.0, "mg");
        let result = compute_dose(None, &rule);
        assert_eq!(result, DoseResult::undefined("mg"));
    }

    #[test]
    fn test_linear_scaling() {
        let rule = DosingRule::per_kg(15.0, "mg");
        assert!(approx(compute_dose(kg(12.0), &rule).amount().unwrap(), 180.0));
    }

    #[test]
    fn test_cap_applies_before_rounding() {
        let rule = DosingRule::per_kg(15.0, "mg").with_max(1000.0).with_step(5.0);
        assert_eq!(compute_dose(kg(80.0), &rule).amount(), Some(1000.0));
        // 13.3 kg → 199.5 mg → 200 mg
        assert_eq!(compute_dose(kg(13.3), &rule).amount(), Some(200.0));
    }

    #[test]
    fn test_floor_applies_before_cap() {
        let rule = DosingRule::per_kg(0.02, "mg")
            .with_min(0.1)
            .with_max(0.5)
            .with_step(0.01);
        assert_eq!(compute_dose(kg(3.0), &rule).amount(), Some(0.1));
        assert_eq!(compute_dose(kg(12.0), &rule).amount(), Some(0.24));
        assert_eq!(compute_dose(kg(40.0), &rule).amount(), Some(0.5));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(snap_to_step(2.25, 0.5), Some(2.5));
        assert_eq!(snap_to_step(2.24, 0.5), Some(2.0));
        assert_eq!(snap_to_step(0.025, 0.05), Some(0.05));
        assert_eq!(snap_to_step(12.5, 5.0), Some(15.0));
        assert_eq!(snap_to_step(0.7, 0.1), Some(0.7));
        assert_eq!(snap_to_step(0.15, 0.1), Some(0.2));
    }

    #[test]
    fn test_just_below_midpoint_rounds_down() {
        assert_eq!(snap_to_step(2.2499999999, 0.5), Some(2.0));
        assert_eq!(snap_to_step(0.0249999, 0.05), Some(0.0));
    }

    #[test]
    fn test_huge_weight_never_yields_non_finite_dose() {
        let rule = DosingRule::per_kg(0.2, "mg").with_step(0.05);

        let result = compute_dose(kg(1e300), &rule);
        assert!(result.value.map_or(true, |d| d.is_finite()));

        // step count overflows
        assert!(!compute_dose(kg(1e308), &rule).is_defined());
        // dose itself overflows
        let steep = DosingRule::per_kg(1e10, "mg").with_step(1.0);
        assert!(!compute_dose(kg(1e300), &steep).is_defined());
        assert_eq!(snap_to_step(f64::MAX, 0.01), None);
    }

    #[test]
    fn test_invalid_step_is_undefined() {
        assert_eq!(snap_to_step(1.0, 0.0), None);
        assert_eq!(snap_to_step(1.0, -0.5), None);
        assert_eq!(snap_to_step(1.0, f64::NAN), None);

        let rule = DosingRule::per_kg(1.0, "mg").with_step(0.0);
        assert!(!compute_dose(kg(10.0), &rule).is_defined());
    }

    #[test]
    fn test_override_replaces_weight_not_dose() {
        let overrides = WeightOverrides::new().with(3, 4.0);
        let rule = DosingRule::per_kg(0.01, "mg").with_overrides(overrides);

        // 3.2 kg rounds to 3 → substitute 4 kg → 0.04 mg
        assert!(approx(compute_dose(kg(3.2), &rule).amount().unwrap(), 0.04));
        // 3.6 kg rounds to 4 → no entry → linear
        assert!(approx(compute_dose(kg(3.6), &rule).amount().unwrap(), 0.036));
    }

    #[test]
    fn test_prescribe_reports_overridden_weight() {
        let entry = DrugEntry {
            drug: Drug::Adrenaline,
            indication: "test".into(),
            dosing: Dosing::Weight {
                rule: DosingRule::per_kg(0.01, "mg")
                    .with_overrides(WeightOverrides::new().with(3, 4.0)),
            },
            concentration_per_ml: Some(0.1),
        };

        let prescribed = prescribe(&entry, kg(3.2), None);
        assert_eq!(prescribed.effective_weight, kg(4.0));
        assert!(approx(prescribed.dose.amount().unwrap(), 0.04));

        assert_eq!(prescribe(&entry, kg(6.0), None).effective_weight, kg(6.0));
        assert_eq!(prescribe(&entry, None, None).effective_weight, None);
    }

    #[test]
    fn test_age_only_entry_has_no_effective_weight() {
        let entry = DrugEntry {
            drug: Drug::MidazolamBuccal,
            indication: "test".into(),
            dosing: Dosing::AgeFixed {
                unit: "mg".into(),
                bands: AgeBands::from_pairs([(3, 2.5)]),
            },
            concentration_per_ml: Some(5.0),
        };
        assert_eq!(effective_weight_for(&entry, kg(12.0), Some(24)), None);
    }

    #[test]
    fn test_ranged_rule_computes_both_bounds() {
        let rule = DosingRule::range_per_kg(1.0, 2.0, "mg").with_max(150.0).with_step(0.5);
        let result = compute_dose(kg(20.3), &rule);
        assert_eq!(
            result.value,
            Some(Dose::Range {
                low: 20.5,
                high: 40.5
            })
        );

        let capped = compute_dose(kg(100.0), &rule);
        assert_eq!(
            capped.value,
            Some(Dose::Range {
                low: 100.0,
                high: 150.0
            })
        );
    }

    #[test]
    fn test_age_banded_dose() {
        let bands = AgeBands::from_pairs([(3, 2.5), (12, 5.0), (60, 7.5), (120, 10.0)]);
        assert!(!age_banded_dose(Some(2), "mg", &bands).is_defined());
        assert_eq!(age_banded_dose(Some(3), "mg", &bands).amount(), Some(2.5));
        assert_eq!(age_banded_dose(Some(11), "mg", &bands).amount(), Some(2.5));
        assert_eq!(age_banded_dose(Some(12), "mg", &bands).amount(), Some(5.0));
        assert_eq!(age_banded_dose(Some(200), "mg", &bands).amount(), Some(10.0));
        assert!(!age_banded_dose(None, "mg", &bands).is_defined());
    }

    #[test]
    fn test_age_switched_weight_rule() {
        let entry = DrugEntry {
            drug: Drug::Ondansetron,
            indication: "test".into(),
            dosing: Dosing::AgeWeight {
                bands: AgeBands::from_pairs([
                    (6, DosingRule::per_kg(0.15, "mg").with_max(4.0)),
                    (72, DosingRule::per_kg(0.15, "mg").with_max(8.0)),
                ]),
            },
            concentration_per_ml: None,
        };

        assert_eq!(dose_for_entry(&entry, kg(40.0), Some(60)).amount(), Some(4.0));
        assert_eq!(dose_for_entry(&entry, kg(40.0), Some(72)).amount(), Some(6.0));
        assert!(!dose_for_entry(&entry, kg(40.0), Some(3)).is_defined());
        assert!(!dose_for_entry(&entry, kg(40.0), None).is_defined());
        assert!(!dose_for_entry(&entry, None, Some(80)).is_defined());
        assert_eq!(dose_for_entry(&entry, None, None).unit, "mg");
    }

    #[test]
    fn test_volume_conversion() {
        let dose = DoseResult::single(150.0, "mg");
        assert_eq!(volume_ml(&dose, 10.0).amount(), Some(15.0));

        let undefined = DoseResult::undefined("mg");
        assert!(!volume_ml(&undefined, 10.0).is_defined());

        assert!(!volume_ml(&dose, 0.0).is_defined());
        assert!(!volume_ml(&dose, f64::NAN).is_defined());
        assert_eq!(volume_ml(&dose, 0.0).unit, "mL");
    }

    #[test]
    fn test_prescribe_includes_volume_when_concentration_known() {
        let entry = DrugEntry {
            drug: Drug::Paracetamol,
            indication: "test".into(),
            dosing: Dosing::Weight {
                rule: DosingRule::per_kg(15.0, "mg"),
            },
            concentration_per_ml: Some(10.0),
        };

        let prescribed = prescribe(&entry, kg(10.0), None);
        assert_eq!(prescribed.dose.amount(), Some(150.0));
        assert_eq!(prescribed.effective_weight, kg(10.0));
        assert_eq!(prescribed.volume.unwrap().amount(), Some(15.0));

        let no_concentration = DrugEntry {
            concentration_per_ml: None,
            ..entry
        };
        assert!(prescribe(&no_concentration, kg(10.0), None).volume.is_none());
    }
}
