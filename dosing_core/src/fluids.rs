//! Maintenance fluid rate ("4-2-1" rule).
//!
//! The rate is a sum of three weight bands, each charged at its own rate
//! for the kilograms falling inside it:
//!
//! | band        | rate        |
//! |-------------|-------------|
//! | 0 – 10 kg   | 4 mL/kg/h   |
//! | 10 – 20 kg  | 2 mL/kg/h   |
//! | above 20 kg | 1 mL/kg/h   |

use crate::EffectiveWeight;

const FIRST_BAND_KG: f64 = 10.0;
const SECOND_BAND_KG: f64 = 20.0;

const FIRST_BAND_RATE: f64 = 4.0;
const SECOND_BAND_RATE: f64 = 2.0;
const ABOVE_BANDS_RATE: f64 = 1.0;

/// Hourly maintenance rate in mL/h, or `None` for an undefined weight
pub fn maintenance_rate_ml_per_hour(weight: Option<EffectiveWeight>) -> Option<f64> {
    let w = weight?.kg();

    let first = w.min(FIRST_BAND_KG);
    let second = (w.min(SECOND_BAND_KG) - FIRST_BAND_KG).max(0.0);
    let above = (w - SECOND_BAND_KG).max(0.0);

    Some(FIRST_BAND_RATE * first + SECOND_BAND_RATE * second + ABOVE_BANDS_RATE * above)
}

/// Maintenance rate multiplied by `factor` after the band sum
///
/// Used for high-output scenarios (e.g. ×1.25 in rhabdomyolysis).
pub fn scaled_maintenance_rate(weight: Option<EffectiveWeight>, factor: f64) -> Option<f64> {
    if !factor.is_finite() || factor <= 0.0 {
        tracing::warn!(factor, "ignoring unusable maintenance factor");
        return None;
    }
    maintenance_rate_ml_per_hour(weight).map(|rate| rate * factor)
}

/// Maintenance volume over 24 hours, in mL
pub fn daily_maintenance_ml(weight: Option<EffectiveWeight>) -> Option<f64> {
    maintenance_rate_ml_per_hour(weight).map(|rate| rate * 24.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate(kg: f64) -> f64 {
        maintenance_rate_ml_per_hour(EffectiveWeight::new(kg)).unwrap()
    }

    #[test]
    fn test_first_band_only() {
        assert_eq!(rate(5.0), 20.0);
        assert_eq!(rate(10.0), 40.0);
    }

    #[test]
    fn test_second_band() {
        assert_eq!(rate(15.0), 50.0);
        assert_eq!(rate(20.0), 60.0);
    }

    #[test]
    fn test_above_second_band() {
        assert_eq!(rate(25.0), 65.0);
        assert_eq!(rate(70.0), 110.0);
    }

    #[test]
    fn test_undefined_weight() {
        assert_eq!(maintenance_rate_ml_per_hour(None), None);
        assert_eq!(scaled_maintenance_rate(None, 1.25), None);
        assert_eq!(daily_maintenance_ml(None), None);
    }

    #[test]
    fn test_scaling_is_applied_after_the_sum() {
        let w = EffectiveWeight::new(25.0);
        assert_eq!(scaled_maintenance_rate(w, 1.25), Some(81.25));
        assert_eq!(scaled_maintenance_rate(w, 0.0), None);
        assert_eq!(scaled_maintenance_rate(w, f64::NAN), None);
    }

    #[test]
    fn test_daily_volume() {
        assert_eq!(daily_maintenance_ml(EffectiveWeight::new(15.0)), Some(1200.0));
    }
}
