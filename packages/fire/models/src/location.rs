//! Composite location keys used to link forest reference tables.
//!
//! Forest tables identify a place by municipality, forest plot and dacha
//! name, typed by hand in Cyrillic with inconsistent punctuation. Keys are
//! normalized once on construction so matching compares like with like.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Punctuation dropped before names are compared.
static STRIP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-']").expect("valid regex"));

/// Spreadsheet exports write missing cells as one of these.
const ABSENT_MARKERS: &[&str] = &["", "nan", "none", "null"];

/// Normalizes a free-text place name: strips hyphens and apostrophes,
/// lowercases, trims.
///
/// Returns `None` when the value is missing or one of the absent markers.
#[must_use]
pub fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if ABSENT_MARKERS
        .iter()
        .any(|marker| trimmed.eq_ignore_ascii_case(marker))
    {
        return None;
    }
    Some(STRIP_RE.replace_all(trimmed, "").to_lowercase())
}

/// `(municipality, forest_plot, dacha)` with each part normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    pub municipality: Option<String>,
    pub forest_plot: Option<String>,
    pub dacha: Option<String>,
}

impl LocationKey {
    /// Builds a key from raw field values, normalizing each one.
    #[must_use]
    pub fn new(municipality: Option<&str>, forest_plot: Option<&str>, dacha: Option<&str>) -> Self {
        Self {
            municipality: municipality.and_then(normalize_name),
            forest_plot: forest_plot.and_then(normalize_name),
            dacha: dacha.and_then(normalize_name),
        }
    }

    /// Whether all three parts are present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.municipality.is_some() && self.forest_plot.is_some() && self.dacha.is_some()
    }

    /// Human-readable `municipality/forest_plot/dacha` label.
    #[must_use]
    pub fn label(&self) -> String {
        [&self.municipality, &self.forest_plot, &self.dacha]
            .iter()
            .map(|part| part.as_deref().unwrap_or("-"))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Forest quarter number ("kv") inside a forest plot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DistrictNumber(pub i64);

impl DistrictNumber {
    /// Parses a quarter number, accepting float renderings such as `"12.0"`
    /// that spreadsheet exports produce for integer columns.
    ///
    /// Non-numeric or fractional values are not district numbers.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return Some(Self(value));
        }
        let value = trimmed.parse::<f64>().ok()?;
        #[allow(clippy::cast_possible_truncation)]
        (value.is_finite() && value.fract() == 0.0).then_some(Self(value as i64))
    }

    /// Parses a comma-delimited list (`"1, 2,3"`), skipping entries that
    /// are not numbers.
    #[must_use]
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',').filter_map(Self::parse).collect()
    }
}

impl std::fmt::Display for DistrictNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_punctuation_and_case() {
        assert_eq!(
            normalize_name("Усть-Кутское").as_deref(),
            Some("устькутское")
        );
        assert_eq!(normalize_name("Кир'енское").as_deref(), Some("киренское"));
    }

    #[test]
    fn treats_absent_markers_as_missing() {
        assert_eq!(normalize_name("nan"), None);
        assert_eq!(normalize_name("NaN"), None);
        assert_eq!(normalize_name("   "), None);
    }

    #[test]
    fn key_completeness() {
        let key = LocationKey::new(Some("Братское"), Some("nan"), Some("Дача"));
        assert!(!key.is_complete());
        assert_eq!(key.label(), "братское/-/дача");
    }

    #[test]
    fn parses_district_numbers() {
        assert_eq!(DistrictNumber::parse("12"), Some(DistrictNumber(12)));
        assert_eq!(DistrictNumber::parse(" 12.0 "), Some(DistrictNumber(12)));
        assert_eq!(DistrictNumber::parse("12.5"), None);
        assert_eq!(DistrictNumber::parse("nan"), None);
    }

    #[test]
    fn parses_district_lists_skipping_garbage() {
        assert_eq!(
            DistrictNumber::parse_list("1, 2,x,4"),
            vec![DistrictNumber(1), DistrictNumber(2), DistrictNumber(4)]
        );
    }
}
