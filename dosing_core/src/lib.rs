#![forbid(unsafe_code)]

//! Core dosing computation for clinical reference screens.
//!
//! This crate provides:
//! - Domain types (species, drugs, dosing rules, dose results)
//! - Per-species dosing rule tables
//! - Weight and age resolution
//! - Dose engine (scaling, overrides, caps, step rounding, age bands)
//! - Maintenance fluid rates
//! - Display formatting
//!
//! Every computation is a pure function of its arguments. Invalid input
//! propagates as `None` and is rendered as a placeholder by the formatter.

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod weight;
pub mod age;
pub mod engine;
pub mod fluids;
pub mod format;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_rule_table, rule_table};
pub use config::Config;
pub use weight::resolve_weight;
pub use age::{months_between, months_from_label};
pub use engine::{compute_dose, dose_for_entry, prescribe, volume_ml, PrescribedDose};
pub use fluids::{maintenance_rate_ml_per_hour, scaled_maintenance_rate};
pub use format::{format, format_result, format_value, FormatOptions, PLACEHOLDER};
