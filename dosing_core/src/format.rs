//! Display formatting for computed values.
//!
//! Precision depends on magnitude: values of 100 and above show no
//! decimals, values of 10 and above show one, smaller values show two.
//! Missing or non-finite values render as a placeholder, never as "0".

use crate::{Dose, DoseResult};
use serde::{Deserialize, Serialize};

/// Rendered in place of a value that cannot be computed
pub const PLACEHOLDER: &str = "—";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormatOptions {
    pub min_decimals: usize,
    pub max_decimals: usize,
    pub placeholder: String,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            min_decimals: 0,
            max_decimals: 2,
            placeholder: PLACEHOLDER.to_string(),
        }
    }
}

/// Decimals shown for a value of this magnitude
pub fn tier_decimals(value: f64) -> usize {
    let magnitude = value.abs();
    if magnitude >= 100.0 {
        0
    } else if magnitude >= 10.0 {
        1
    } else {
        2
    }
}

/// Format a bare number, or `None` if it is not finite
pub fn format_number(value: f64, opts: &FormatOptions) -> Option<String> {
    if !value.is_finite() {
        return None;
    }

    let decimals = tier_decimals(value).max(opts.min_decimals).min(opts.max_decimals);
    let mut text = format!("{:.*}", decimals, value);
    trim_zeros(&mut text, opts.min_decimals);
    Some(text)
}

/// Drop trailing zeros (and a bare decimal point), keeping `min_decimals`
fn trim_zeros(text: &mut String, min_decimals: usize) {
    let Some(dot) = text.find('.') else {
        return;
    };

    let mut decimals = text.len() - dot - 1;
    while decimals > min_decimals && text.ends_with('0') {
        text.pop();
        decimals -= 1;
    }
    if decimals == 0 {
        text.pop();
    }
}

fn with_unit(text: String, unit: Option<&str>) -> String {
    match unit {
        Some(unit) if !unit.is_empty() => format!("{} {}", text, unit),
        _ => text,
    }
}

/// Format an optional value with an optional unit suffix
pub fn format_value(value: Option<f64>, unit: Option<&str>, opts: &FormatOptions) -> String {
    match value.and_then(|v| format_number(v, opts)) {
        Some(text) => with_unit(text, unit),
        None => opts.placeholder.clone(),
    }
}

/// Format an engine result; ranges render as `low–high unit`
pub fn format_result(result: &DoseResult, opts: &FormatOptions) -> String {
    let unit = Some(result.unit.as_str());
    match result.value {
        None => opts.placeholder.clone(),
        Some(Dose::Single(v)) => format_value(Some(v), unit, opts),
        Some(Dose::Range { low, high }) => {
            match (format_number(low, opts), format_number(high, opts)) {
                (Some(low), Some(high)) => with_unit(format!("{}–{}", low, high), unit),
                _ => opts.placeholder.clone(),
            }
        }
    }
}

/// Format with default options and no unit
pub fn format(value: Option<f64>) -> String {
    format_value(value, None, &FormatOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_tiers() {
        assert_eq!(format(Some(123.456)), "123");
        assert_eq!(format(Some(12.34)), "12.3");
        assert_eq!(format(Some(1.234)), "1.23");
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(format(Some(100.0)), "100");
        assert_eq!(format(Some(99.94)), "99.9");
        assert_eq!(format(Some(10.0)), "10");
        assert_eq!(format(Some(9.999)), "10");
        assert_eq!(format(Some(0.006)), "0.01");
    }

    #[test]
    fn test_trailing_zeros_trimmed() {
        assert_eq!(format(Some(1.5)), "1.5");
        assert_eq!(format(Some(20.0)), "20");
        assert_eq!(format(Some(0.1)), "0.1");
    }

    #[test]
    fn test_min_decimals_kept() {
        let opts = FormatOptions {
            min_decimals: 1,
            ..FormatOptions::default()
        };
        assert_eq!(format_value(Some(20.0), None, &opts), "20.0");
        assert_eq!(format_value(Some(250.0), None, &opts), "250.0");
    }

    #[test]
    fn test_max_decimals_limit() {
        let opts = FormatOptions {
            max_decimals: 1,
            ..FormatOptions::default()
        };
        assert_eq!(format_value(Some(1.234), None, &opts), "1.2");
    }

    #[test]
    fn test_placeholder_for_missing_values() {
        assert_eq!(format(None), PLACEHOLDER);
        assert_eq!(format(Some(f64::NAN)), PLACEHOLDER);
        assert_eq!(format(Some(f64::INFINITY)), PLACEHOLDER);
        assert_eq!(
            format_value(None, Some("mg"), &FormatOptions::default()),
            PLACEHOLDER
        );
    }

    #[test]
    fn test_unit_appended_verbatim() {
        let opts = FormatOptions::default();
        assert_eq!(format_value(Some(0.25), Some("µg/min"), &opts), "0.25 µg/min");
        assert_eq!(format_value(Some(65.0), Some("mL/h"), &opts), "65 mL/h");
    }

    #[test]
    fn test_format_results() {
        let opts = FormatOptions::default();
        assert_eq!(format_result(&DoseResult::single(180.0, "mg"), &opts), "180 mg");
        assert_eq!(format_result(&DoseResult::undefined("mg"), &opts), PLACEHOLDER);

        let range = DoseResult {
            value: Some(Dose::Range {
                low: 20.5,
                high: 41.0,
            }),
            unit: "mg".into(),
        };
        assert_eq!(format_result(&range, &opts), "20.5–41 mg");
    }

    #[test]
    fn test_custom_placeholder() {
        let opts = FormatOptions {
            placeholder: "n/a".into(),
            ..FormatOptions::default()
        };
        assert_eq!(format_value(None, Some("mg"), &opts), "n/a");
    }
}
