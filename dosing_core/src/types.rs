//! Core domain types for the dosing core.
//!
//! This module defines the fundamental types used throughout the system:
//! - Species and drug identifiers
//! - Dosing rules (per-kg factors, caps, steps, weight overrides)
//! - Age bands
//! - Effective weight and computed dose results

use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Patient Types
// ============================================================================

/// Patient species. Each species has its own rule table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Human,
    Dog,
    Cat,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Human, Species::Dog, Species::Cat];

    pub fn id(&self) -> &'static str {
        match self {
            Species::Human => "human",
            Species::Dog => "dog",
            Species::Cat => "cat",
        }
    }
}

impl FromStr for Species {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "child" | "enfant" => Ok(Species::Human),
            "dog" | "canine" | "chien" => Ok(Species::Dog),
            "cat" | "feline" | "chat" => Ok(Species::Cat),
            other => Err(Error::InvalidInput(format!("unknown species '{}'", other))),
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ============================================================================
// Drug Identifiers
// ============================================================================

/// Drug (or drug + presentation) identifier.
///
/// Lookups go through this enum, so a misspelled drug is rejected when the
/// identifier is parsed rather than silently missing from a table.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Drug {
    Adrenaline,
    Amiodarone,
    Atropine,
    Paracetamol,
    Ibuprofen,
    Ketamine,
    DiazepamRectal,
    MidazolamBuccal,
    Dexamethasone,
    Ceftriaxone,
    FluidBolus,
    #[serde(rename = "glucose_10")]
    Glucose10,
    Ondansetron,
    Meloxicam,
    Buprenorphine,
    Maropitant,
}

impl Drug {
    pub const ALL: [Drug; 16] = [
        Drug::Adrenaline,
        Drug::Amiodarone,
        Drug::Atropine,
        Drug::Paracetamol,
        Drug::Ibuprofen,
        Drug::Ketamine,
        Drug::DiazepamRectal,
        Drug::MidazolamBuccal,
        Drug::Dexamethasone,
        Drug::Ceftriaxone,
        Drug::FluidBolus,
        Drug::Glucose10,
        Drug::Ondansetron,
        Drug::Meloxicam,
        Drug::Buprenorphine,
        Drug::Maropitant,
    ];

    /// Stable identifier, identical to the serde representation
    pub fn id(&self) -> &'static str {
        match self {
            Drug::Adrenaline => "adrenaline",
            Drug::Amiodarone => "amiodarone",
            Drug::Atropine => "atropine",
            Drug::Paracetamol => "paracetamol",
            Drug::Ibuprofen => "ibuprofen",
            Drug::Ketamine => "ketamine",
            Drug::DiazepamRectal => "diazepam_rectal",
            Drug::MidazolamBuccal => "midazolam_buccal",
            Drug::Dexamethasone => "dexamethasone",
            Drug::Ceftriaxone => "ceftriaxone",
            Drug::FluidBolus => "fluid_bolus",
            Drug::Glucose10 => "glucose_10",
            Drug::Ondansetron => "ondansetron",
            Drug::Meloxicam => "meloxicam",
            Drug::Buprenorphine => "buprenorphine",
            Drug::Maropitant => "maropitant",
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Drug::Adrenaline => "Adrenaline",
            Drug::Amiodarone => "Amiodarone",
            Drug::Atropine => "Atropine",
            Drug::Paracetamol => "Paracetamol",
            Drug::Ibuprofen => "Ibuprofen",
            Drug::Ketamine => "Ketamine",
            Drug::DiazepamRectal => "Diazepam (rectal)",
            Drug::MidazolamBuccal => "Midazolam (buccal)",
            Drug::Dexamethasone => "Dexamethasone",
            Drug::Ceftriaxone => "Ceftriaxone",
            Drug::FluidBolus => "NaCl 0.9% bolus",
            Drug::Glucose10 => "Glucose 10%",
            Drug::Ondansetron => "Ondansetron",
            Drug::Meloxicam => "Meloxicam",
            Drug::Buprenorphine => "Buprenorphine",
            Drug::Maropitant => "Maropitant",
        }
    }
}

impl FromStr for Drug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Drug::ALL
            .iter()
            .copied()
            .find(|d| d.id() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unknown drug '{}'", s.trim())))
    }
}

impl fmt::Display for Drug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ============================================================================
// Dosing Rule Types
// ============================================================================

/// Amount of drug per kilogram of effective weight
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PerKg {
    Fixed { per_kg: f64 },
    /// Both bounds are computed independently through the same pipeline
    Range { min: f64, max: f64 },
}

/// Sparse table of substitute weights, keyed by rounded whole kilograms.
///
/// Rounding the input weight to the nearest kilogram (half up) before the
/// lookup is part of the clinical rule. The stored value replaces the
/// weight, not the dose: the rule's per-kg factor is still applied to it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct WeightOverrides(BTreeMap<u32, f64>);

impl WeightOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a substitute weight for a rounded kilogram value
    pub fn with(mut self, rounded_kg: u32, substitute_kg: f64) -> Self {
        self.0.insert(rounded_kg, substitute_kg);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.0.iter().map(|(kg, sub)| (*kg, *sub))
    }

    /// Substitute weight for `weight_kg`, if its rounded value has an entry
    pub fn lookup(&self, weight_kg: f64) -> Option<f64> {
        if !weight_kg.is_finite() || weight_kg < 0.0 {
            return None;
        }
        let rounded = weight_kg.round();
        if rounded > f64::from(u32::MAX) {
            return None;
        }
        self.0.get(&(rounded as u32)).copied()
    }
}

impl FromIterator<(u32, f64)> for WeightOverrides {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One weight-scaled drug computation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DosingRule {
    pub per_kg: PerKg,
    pub unit: String,
    /// Hard floor, applied before the ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_dose: Option<f64>,
    /// Hard ceiling, independent of weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dose: Option<f64>,
    /// Result is snapped to the nearest multiple of this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_step: Option<f64>,
    #[serde(default, skip_serializing_if = "WeightOverrides::is_empty")]
    pub overrides: WeightOverrides,
}

impl DosingRule {
    /// Linear rule: `per_kg` units for every kilogram
    pub fn per_kg(per_kg: f64, unit: &str) -> Self {
        Self {
            per_kg: PerKg::Fixed { per_kg },
            unit: unit.to_string(),
            min_dose: None,
            max_dose: None,
            round_step: None,
            overrides: WeightOverrides::new(),
        }
    }

    /// Ranged rule: from `min` to `max` units per kilogram
    pub fn range_per_kg(min: f64, max: f64, unit: &str) -> Self {
        Self {
            per_kg: PerKg::Range { min, max },
            ..Self::per_kg(min, unit)
        }
    }

    pub fn with_min(mut self, min_dose: f64) -> Self {
        self.min_dose = Some(min_dose);
        self
    }

    pub fn with_max(mut self, max_dose: f64) -> Self {
        self.max_dose = Some(max_dose);
        self
    }

    pub fn with_step(mut self, round_step: f64) -> Self {
        self.round_step = Some(round_step);
        self
    }

    pub fn with_overrides(mut self, overrides: WeightOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

// ============================================================================
// Age Bands
// ============================================================================

/// A band starting at `from_months` and running up to the next band
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgeBand<T> {
    pub from_months: u32,
    pub value: T,
}

/// Ordered, non-overlapping age bands
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AgeBands<T>(Vec<AgeBand<T>>);

impl<T> AgeBands<T> {
    /// Build from `(from_months, value)` pairs, sorted by threshold
    pub fn from_pairs<I: IntoIterator<Item = (u32, T)>>(pairs: I) -> Self {
        let mut bands: Vec<_> = pairs
            .into_iter()
            .map(|(from_months, value)| AgeBand { from_months, value })
            .collect();
        bands.sort_by_key(|b| b.from_months);
        Self(bands)
    }

    /// The band containing `months`, or `None` below the first threshold
    pub fn select(&self, months: u32) -> Option<&T> {
        self.0
            .iter()
            .rev()
            .find(|b| b.from_months <= months)
            .map(|b| &b.value)
    }

    pub fn bands(&self) -> &[AgeBand<T>] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when thresholds are strictly increasing (no overlap, no duplicates)
    pub fn is_strictly_ordered(&self) -> bool {
        self.0.windows(2).all(|w| w[0].from_months < w[1].from_months)
    }
}

// ============================================================================
// Table Entries
// ============================================================================

/// How a table entry turns patient data into a dose
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum Dosing {
    /// Weight-scaled rule
    Weight { rule: DosingRule },
    /// Fixed dose chosen by age band, independent of weight
    AgeFixed { unit: String, bands: AgeBands<f64> },
    /// The age band picks which weight-scaled rule applies
    AgeWeight { bands: AgeBands<DosingRule> },
}

impl Dosing {
    /// Unit of the computed dose
    pub fn unit(&self) -> &str {
        match self {
            Dosing::Weight { rule } => &rule.unit,
            Dosing::AgeFixed { unit, .. } => unit,
            Dosing::AgeWeight { bands } => bands
                .bands()
                .first()
                .map(|b| b.value.unit.as_str())
                .unwrap_or(""),
        }
    }

    pub fn needs_age(&self) -> bool {
        !matches!(self, Dosing::Weight { .. })
    }

    pub fn needs_weight(&self) -> bool {
        !matches!(self, Dosing::AgeFixed { .. })
    }
}

/// One row of a rule table
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DrugEntry {
    pub drug: Drug,
    pub indication: String,
    pub dosing: Dosing,
    /// Stock presentation, in dose units per mL
    pub concentration_per_ml: Option<f64>,
}

// ============================================================================
// Weight Types
// ============================================================================

/// Weight actually used for computation (finite and strictly positive)
#[derive(Clone, Copy, Debug, Serialize, PartialEq, PartialOrd)]
#[serde(transparent)]
pub struct EffectiveWeight(f64);

impl EffectiveWeight {
    /// `None` when `kg` is not finite or not strictly positive
    pub fn new(kg: f64) -> Option<Self> {
        (kg.is_finite() && kg > 0.0).then_some(Self(kg))
    }

    /// Full-precision weight in kilograms
    pub fn kg(self) -> f64 {
        self.0
    }

    /// Weight rounded to one decimal, for display only
    pub fn display_kg(self) -> f64 {
        (self.0 * 10.0).round() / 10.0
    }
}

/// Physiologically plausible weight range for a protocol
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeightBounds {
    pub min_kg: f64,
    pub max_kg: f64,
    /// Substituted when the raw weight is missing or invalid
    pub default_kg: f64,
}

impl WeightBounds {
    /// Clamp into `[min_kg, max_kg]` (never panics, even on inverted bounds)
    pub fn clamp(&self, kg: f64) -> f64 {
        kg.max(self.min_kg).min(self.max_kg)
    }
}

// ============================================================================
// Results
// ============================================================================

/// A computed amount: a single value or a low/high pair
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Dose {
    Single(f64),
    Range { low: f64, high: f64 },
}

impl Dose {
    /// Apply `f` to every bound
    pub fn map(self, f: impl Fn(f64) -> f64) -> Dose {
        match self {
            Dose::Single(v) => Dose::Single(f(v)),
            Dose::Range { low, high } => Dose::Range {
                low: f(low),
                high: f(high),
            },
        }
    }

    pub fn low(&self) -> f64 {
        match self {
            Dose::Single(v) => *v,
            Dose::Range { low, .. } => *low,
        }
    }

    pub fn high(&self) -> f64 {
        match self {
            Dose::Single(v) => *v,
            Dose::Range { high, .. } => *high,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.low().is_finite() && self.high().is_finite()
    }
}

/// Engine output. `value == None` means "cannot compute".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DoseResult {
    pub value: Option<Dose>,
    pub unit: String,
}

impl DoseResult {
    pub fn undefined(unit: &str) -> Self {
        Self {
            value: None,
            unit: unit.to_string(),
        }
    }

    pub fn single(value: f64, unit: &str) -> Self {
        Self {
            value: Some(Dose::Single(value)),
            unit: unit.to_string(),
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    /// The value of a single (non-ranged) result
    pub fn amount(&self) -> Option<f64> {
        match self.value {
            Some(Dose::Single(v)) => Some(v),
            _ => None,
        }
    }
}

// ============================================================================
// Rule Table Type
// ============================================================================

/// All dosing entries for one species
#[derive(Clone, Debug)]
pub struct DosingRuleTable {
    pub species: Species,
    pub entries: BTreeMap<Drug, DrugEntry>,
}

impl DosingRuleTable {
    pub fn entry(&self, drug: Drug) -> Option<&DrugEntry> {
        self.entries.get(&drug)
    }

    /// Entries in stable (declaration) order
    pub fn entries(&self) -> impl Iterator<Item = &DrugEntry> {
        self.entries.values()
    }

    pub fn drugs(&self) -> impl Iterator<Item = Drug> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
