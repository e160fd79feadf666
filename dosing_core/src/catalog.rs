//! Built-in dosing rule tables.
//!
//! One immutable table per species, built once and shared by every caller.
//! Per-drug differences in rounding or capping are data in these tables,
//! never special cases in the engine.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

static HUMAN_TABLE: Lazy<DosingRuleTable> = Lazy::new(|| build_rule_table(Species::Human));
static DOG_TABLE: Lazy<DosingRuleTable> = Lazy::new(|| build_rule_table(Species::Dog));
static CAT_TABLE: Lazy<DosingRuleTable> = Lazy::new(|| build_rule_table(Species::Cat));

/// Relative tolerance when checking that a cap is a multiple of its step
const STEP_TOLERANCE: f64 = 1e-9;

/// Get a reference to the cached table for a species
pub fn rule_table(species: Species) -> &'static DosingRuleTable {
    match species {
        Species::Human => &HUMAN_TABLE,
        Species::Dog => &DOG_TABLE,
        Species::Cat => &CAT_TABLE,
    }
}

/// Builds the table for a species
///
/// **Note**: prefer `rule_table()`, which returns the cached copy. This
/// function is retained for tests and custom tables.
pub fn build_rule_table(species: Species) -> DosingRuleTable {
    let mut entries = BTreeMap::new();

    match species {
        Species::Human => build_human(&mut entries),
        Species::Dog => build_dog(&mut entries),
        Species::Cat => build_cat(&mut entries),
    }

    DosingRuleTable { species, entries }
}

fn add(
    entries: &mut BTreeMap<Drug, DrugEntry>,
    drug: Drug,
    indication: &str,
    dosing: Dosing,
    concentration_per_ml: Option<f64>,
) {
    entries.insert(
        drug,
        DrugEntry {
            drug,
            indication: indication.into(),
            dosing,
            concentration_per_ml,
        },
    );
}

fn weight(rule: DosingRule) -> Dosing {
    Dosing::Weight { rule }
}

fn build_human(entries: &mut BTreeMap<Drug, DrugEntry>) {
    // ========================================================================
    // Resuscitation
    // ========================================================================

    // Below 8 kg the weight snaps to the reference weight of its
    // length-based zone (3-5 kg → 4 kg, 6-7 kg → 6.5 kg).
    let zone_weights = WeightOverrides::new()
        .with(3, 4.0)
        .with(4, 4.0)
        .with(5, 4.0)
        .with(6, 6.5)
        .with(7, 6.5);

    add(
        entries,
        Drug::Adrenaline,
        "Cardiac arrest (IV/IO)",
        weight(
            DosingRule::per_kg(0.01, "mg")
                .with_max(1.0)
                .with_step(0.01)
                .with_overrides(zone_weights),
        ),
        Some(0.1),
    );

    add(
        entries,
        Drug::Amiodarone,
        "Shockable rhythm after 3rd shock",
        weight(DosingRule::per_kg(5.0, "mg").with_max(300.0).with_step(1.0)),
        Some(50.0),
    );

    add(
        entries,
        Drug::Atropine,
        "Symptomatic bradycardia",
        weight(
            DosingRule::per_kg(0.02, "mg")
                .with_min(0.1)
                .with_max(0.5)
                .with_step(0.01),
        ),
        Some(0.25),
    );

    add(
        entries,
        Drug::FluidBolus,
        "Shock, NaCl 0.9% bolus",
        weight(DosingRule::per_kg(20.0, "mL").with_max(1000.0).with_step(10.0)),
        None,
    );

    add(
        entries,
        Drug::Glucose10,
        "Hypoglycaemia",
        weight(DosingRule::per_kg(2.0, "mL").with_max(250.0).with_step(1.0)),
        None,
    );

    // ========================================================================
    // Analgesia and sedation
    // ========================================================================

    add(
        entries,
        Drug::Paracetamol,
        "Pain or fever (IV)",
        weight(DosingRule::per_kg(15.0, "mg").with_max(1000.0).with_step(5.0)),
        Some(10.0),
    );

    add(
        entries,
        Drug::Ibuprofen,
        "Pain or fever (oral), from 3 months",
        Dosing::AgeWeight {
            bands: AgeBands::from_pairs([(
                3,
                DosingRule::per_kg(10.0, "mg").with_max(400.0).with_step(5.0),
            )]),
        },
        Some(20.0),
    );

    add(
        entries,
        Drug::Ketamine,
        "Procedural sedation (IV)",
        weight(
            DosingRule::range_per_kg(1.0, 2.0, "mg")
                .with_max(200.0)
                .with_step(0.5),
        ),
        Some(10.0),
    );

    // ========================================================================
    // Seizures
    // ========================================================================

    add(
        entries,
        Drug::DiazepamRectal,
        "Seizure lasting over 5 minutes (rectal)",
        weight(DosingRule::per_kg(0.5, "mg").with_max(10.0).with_step(0.5)),
        Some(5.0),
    );

    add(
        entries,
        Drug::MidazolamBuccal,
        "Seizure lasting over 5 minutes (buccal)",
        Dosing::AgeFixed {
            unit: "mg".into(),
            bands: AgeBands::from_pairs([(3, 2.5), (12, 5.0), (60, 7.5), (120, 10.0)]),
        },
        Some(5.0),
    );

    // ========================================================================
    // Other
    // ========================================================================

    add(
        entries,
        Drug::Dexamethasone,
        "Croup",
        weight(DosingRule::per_kg(0.15, "mg").with_max(10.0).with_step(0.1)),
        Some(4.0),
    );

    add(
        entries,
        Drug::Ceftriaxone,
        "Purpura fulminans or meningitis",
        weight(DosingRule::per_kg(100.0, "mg").with_max(4000.0).with_step(50.0)),
        Some(100.0),
    );

    // Cap doubles from 6 years (72 months)
    add(
        entries,
        Drug::Ondansetron,
        "Vomiting, from 6 months",
        Dosing::AgeWeight {
            bands: AgeBands::from_pairs([
                (
                    6,
                    DosingRule::per_kg(0.15, "mg").with_max(4.0).with_step(0.1),
                ),
                (
                    72,
                    DosingRule::per_kg(0.15, "mg").with_max(8.0).with_step(0.1),
                ),
            ]),
        },
        Some(2.0),
    );
}

fn build_dog(entries: &mut BTreeMap<Drug, DrugEntry>) {
    add(
        entries,
        Drug::Meloxicam,
        "Pain, loading dose (SC)",
        weight(DosingRule::per_kg(0.2, "mg").with_step(0.05)),
        Some(5.0),
    );

    add(
        entries,
        Drug::Buprenorphine,
        "Pain (IV/IM)",
        weight(DosingRule::per_kg(0.02, "mg").with_step(0.01)),
        Some(0.3),
    );

    add(
        entries,
        Drug::Maropitant,
        "Vomiting (SC)",
        weight(DosingRule::per_kg(1.0, "mg").with_step(0.1)),
        Some(10.0),
    );

    add(
        entries,
        Drug::Ketamine,
        "Induction (IV), with a benzodiazepine",
        weight(DosingRule::range_per_kg(5.0, 10.0, "mg").with_step(1.0)),
        Some(100.0),
    );

    add(
        entries,
        Drug::FluidBolus,
        "Shock, crystalloid bolus over 15 minutes",
        weight(DosingRule::range_per_kg(15.0, 20.0, "mL").with_step(5.0)),
        None,
    );
}

fn build_cat(entries: &mut BTreeMap<Drug, DrugEntry>) {
    add(
        entries,
        Drug::Meloxicam,
        "Pain, single dose (SC)",
        weight(DosingRule::per_kg(0.3, "mg").with_step(0.05)),
        Some(5.0),
    );

    add(
        entries,
        Drug::Buprenorphine,
        "Pain (IV/IM/buccal)",
        weight(DosingRule::per_kg(0.02, "mg").with_step(0.01)),
        Some(0.3),
    );

    add(
        entries,
        Drug::Maropitant,
        "Vomiting (SC)",
        weight(DosingRule::per_kg(1.0, "mg").with_step(0.1)),
        Some(10.0),
    );

    add(
        entries,
        Drug::Ketamine,
        "Induction (IV), with a benzodiazepine",
        weight(DosingRule::range_per_kg(5.0, 10.0, "mg").with_step(1.0)),
        Some(100.0),
    );

    add(
        entries,
        Drug::FluidBolus,
        "Shock, crystalloid bolus over 15 minutes",
        weight(DosingRule::range_per_kg(5.0, 10.0, "mL").with_step(5.0)),
        None,
    );
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_multiple_of(value: f64, step: f64) -> bool {
    let steps = value / step;
    (steps - steps.round()).abs() <= STEP_TOLERANCE * steps.abs().max(1.0)
}

/// Validation errors for one weight-scaled rule
fn validate_rule(label: &str, rule: &DosingRule, errors: &mut Vec<String>) {
    if rule.unit.is_empty() {
        errors.push(format!("{}: empty unit", label));
    }

    match rule.per_kg {
        PerKg::Fixed { per_kg } => {
            if !is_positive(per_kg) {
                errors.push(format!("{}: per-kg factor {} is not positive", label, per_kg));
            }
        }
        PerKg::Range { min, max } => {
            if !is_positive(min) || !is_positive(max) {
                errors.push(format!(
                    "{}: per-kg range {}-{} is not positive",
                    label, min, max
                ));
            }
            if min > max {
                errors.push(format!("{}: per-kg min {} > max {}", label, min, max));
            }
        }
    }

    if let Some(floor) = rule.min_dose {
        if !is_positive(floor) {
            errors.push(format!("{}: minimum dose {} is not positive", label, floor));
        }
    }

    if let Some(cap) = rule.max_dose {
        if !is_positive(cap) {
            errors.push(format!("{}: maximum dose {} is not positive", label, cap));
        }
    }

    if let (Some(floor), Some(cap)) = (rule.min_dose, rule.max_dose) {
        if floor > cap {
            errors.push(format!(
                "{}: minimum dose {} > maximum dose {}",
                label, floor, cap
            ));
        }
    }

    if let Some(step) = rule.round_step {
        if !is_positive(step) {
            errors.push(format!("{}: round step {} is not positive", label, step));
        } else {
            // A cap or floor off the step grid would be rounded past itself
            for (name, bound) in [("minimum", rule.min_dose), ("maximum", rule.max_dose)] {
                if let Some(bound) = bound.filter(|b| is_positive(*b)) {
                    if !is_multiple_of(bound, step) {
                        errors.push(format!(
                            "{}: {} dose {} is not a multiple of round step {}",
                            label, name, bound, step
                        ));
                    }
                }
            }
        }
    }

    for (kg, substitute) in rule.overrides.iter() {
        if !is_positive(substitute) {
            errors.push(format!(
                "{}: override for {} kg has unusable weight {}",
                label, kg, substitute
            ));
        }
    }
}

fn validate_bands<T>(label: &str, bands: &AgeBands<T>, errors: &mut Vec<String>) {
    if bands.is_empty() {
        errors.push(format!("{}: no age bands", label));
    }
    if !bands.is_strictly_ordered() {
        errors.push(format!("{}: age thresholds are not strictly increasing", label));
    }
}

impl DosingRuleTable {
    /// Validate the table for consistency
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.entries.is_empty() {
            errors.push(format!("Table for {} has no entries", self.species));
        }

        for (drug, entry) in &self.entries {
            let label = format!("{}/{}", self.species, drug);

            if drug != &entry.drug {
                errors.push(format!(
                    "Table key '{}' doesn't match entry.drug '{}'",
                    drug, entry.drug
                ));
            }
            if entry.indication.is_empty() {
                errors.push(format!("{}: empty indication", label));
            }
            if let Some(concentration) = entry.concentration_per_ml {
                if !is_positive(concentration) {
                    errors.push(format!(
                        "{}: concentration {} is not positive",
                        label, concentration
                    ));
                }
            }

            match &entry.dosing {
                Dosing::Weight { rule } => validate_rule(&label, rule, &mut errors),
                Dosing::AgeFixed { unit, bands } => {
                    if unit.is_empty() {
                        errors.push(format!("{}: empty unit", label));
                    }
                    validate_bands(&label, bands, &mut errors);
                    for band in bands.bands() {
                        if !is_positive(band.value) {
                            errors.push(format!(
                                "{}: dose {} from {} months is not positive",
                                label, band.value, band.from_months
                            ));
                        }
                    }
                }
                Dosing::AgeWeight { bands } => {
                    validate_bands(&label, bands, &mut errors);
                    let unit = entry.dosing.unit();
                    for band in bands.bands() {
                        let band_label = format!("{} (from {} months)", label, band.from_months);
                        validate_rule(&band_label, &band.value, &mut errors);
                        if band.value.unit != unit {
                            errors.push(format!(
                                "{}: unit '{}' differs from '{}'",
                                band_label, band.value.unit, unit
                            ));
                        }
                    }
                }
            }
        }

        errors
    }
}
