//! Age resolution.
//!
//! Ages arrive as labels from a small vocabulary ("naissance", "18 mois",
//! "3 ans") or as a date of birth. Both resolve to whole months.

use chrono::{Datelike, NaiveDate};

/// Labels meaning "at birth" (0 months)
pub const BIRTH_LABELS: [&str; 2] = ["naissance", "birth"];

/// Parse an age label into months
///
/// Accepts a birth label, or a leading integer followed by a month or year
/// unit (`mois`, `month(s)`, `an(s)`, `year(s)`). Anything else is an
/// unknown age and yields `None`; it never defaults to 0.
pub fn months_from_label(label: Option<&str>) -> Option<u32> {
    let label = label?.trim().to_lowercase();

    if BIRTH_LABELS.contains(&label.as_str()) {
        return Some(0);
    }

    let digits_end = label
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(label.len());
    if digits_end == 0 {
        return None;
    }

    let count: u32 = label[..digits_end].parse().ok()?;
    match label[digits_end..].trim() {
        "mois" | "month" | "months" => Some(count),
        "an" | "ans" | "year" | "years" => count.checked_mul(12),
        _ => None,
    }
}

/// Completed months between a date of birth and `on`
///
/// Returns `None` when the birth date lies after `on`.
pub fn months_between(birth: NaiveDate, on: NaiveDate) -> Option<u32> {
    if birth > on {
        return None;
    }

    let mut months = (on.year() - birth.year()) * 12 + on.month() as i32 - birth.month() as i32;
    if on.day() < birth.day() {
        months -= 1;
    }
    u32::try_from(months).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_birth_labels() {
        assert_eq!(months_from_label(Some("naissance")), Some(0));
        assert_eq!(months_from_label(Some("  Naissance ")), Some(0));
        assert_eq!(months_from_label(Some("birth")), Some(0));
    }

    #[test]
    fn test_month_labels() {
        assert_eq!(months_from_label(Some("1 mois")), Some(1));
        assert_eq!(months_from_label(Some("18 mois")), Some(18));
        assert_eq!(months_from_label(Some("6 months")), Some(6));
        assert_eq!(months_from_label(Some("9mois")), Some(9));
    }

    #[test]
    fn test_year_labels() {
        assert_eq!(months_from_label(Some("1 an")), Some(12));
        assert_eq!(months_from_label(Some("6 ans")), Some(72));
        assert_eq!(months_from_label(Some("2 years")), Some(24));
        assert_eq!(months_from_label(Some("15 ANS")), Some(180));
    }

    #[test]
    fn test_unparsable_labels_are_unknown() {
        assert_eq!(months_from_label(None), None);
        assert_eq!(months_from_label(Some("")), None);
        assert_eq!(months_from_label(Some("ans")), None);
        assert_eq!(months_from_label(Some("3 semaines")), None);
        assert_eq!(months_from_label(Some("about 3 ans")), None);
        assert_eq!(months_from_label(Some("3.5 ans")), None);
        assert_eq!(months_from_label(Some("-2 mois")), None);
    }

    #[test]
    fn test_overflowing_year_count_is_unknown() {
        assert_eq!(months_from_label(Some("4294967295 ans")), None);
    }

    #[test]
    fn test_months_between_dates() {
        let birth = NaiveDate::from_ymd_opt(2020, 3, 15).unwrap();

        let on = NaiveDate::from_ymd_opt(2020, 3, 15).unwrap();
        assert_eq!(months_between(birth, on), Some(0));

        let on = NaiveDate::from_ymd_opt(2020, 4, 14).unwrap();
        assert_eq!(months_between(birth, on), Some(0));

        let on = NaiveDate::from_ymd_opt(2020, 4, 15).unwrap();
        assert_eq!(months_between(birth, on), Some(1));

        let on = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        assert_eq!(months_between(birth, on), Some(72));
    }

    #[test]
    fn test_birth_after_reference_date_is_unknown() {
        let birth = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let on = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(months_between(birth, on), None);
    }
}
