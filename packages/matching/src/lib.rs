#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fuzzy matching of forest locations across reference tables.
//!
//! Forest district polygons and the hazard-class / forest-type tables name
//! the same places independently, by hand, with typos and inconsistent
//! punctuation. Two [`LocationKey`]s match when the summed Levenshtein
//! distance of municipality, forest plot and dacha is below
//! [`MATCH_THRESHOLD`]; a linked row then applies only if one of its
//! quarter numbers equals the query quarter exactly.

use serde::Serialize;
use wildfire_fire_models::{DistrictNumber, LocationKey};
use wildfire_reference_models::{ForestDistrict, ForestTypeRow, HazardClassRow};

pub use wildfire_fire_models::normalize_name;

/// Summed edit distance must be strictly below this to match.
pub const MATCH_THRESHOLD: usize = 4;

/// A reference row keyed by location and a list of quarter numbers.
pub trait LinkedRow {
    fn key(&self) -> &LocationKey;
    fn districts(&self) -> &[DistrictNumber];
}

impl LinkedRow for HazardClassRow {
    fn key(&self) -> &LocationKey {
        &self.key
    }

    fn districts(&self) -> &[DistrictNumber] {
        &self.districts
    }
}

impl LinkedRow for ForestTypeRow {
    fn key(&self) -> &LocationKey {
        &self.key
    }

    fn districts(&self) -> &[DistrictNumber] {
        &self.districts
    }
}

/// Character-level Levenshtein distance with absent parts as `""`.
fn part_distance(a: Option<&str>, b: Option<&str>) -> usize {
    strsim::levenshtein(a.unwrap_or_default(), b.unwrap_or_default())
}

/// Summed distance over the three key parts.
#[must_use]
pub fn name_distance(a: &LocationKey, b: &LocationKey) -> usize {
    part_distance(a.municipality.as_deref(), b.municipality.as_deref())
        + part_distance(a.forest_plot.as_deref(), b.forest_plot.as_deref())
        + part_distance(a.dacha.as_deref(), b.dacha.as_deref())
}

/// Whether two keys name the same place. Symmetric.
#[must_use]
pub fn names_match(query: &LocationKey, reference: &LocationKey) -> bool {
    name_distance(query, reference) < MATCH_THRESHOLD
}

/// Result of joining one query location against a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome<'a, R> {
    /// Rows whose names and quarter list both matched, in table order.
    Matched(Vec<&'a R>),
    /// The query was complete but nothing matched.
    NoMatch,
    /// A query name part was absent, so no attempt was made.
    MissingField,
}

impl<'a, R> MatchOutcome<'a, R> {
    /// Matched rows, empty for the other outcomes.
    #[must_use]
    pub fn rows(&self) -> &[&'a R] {
        match self {
            Self::Matched(rows) => rows,
            Self::NoMatch | Self::MissingField => &[],
        }
    }
}

/// Joins one location and quarter number against a linked table.
///
/// Every matching row contributes. A query without a quarter number never
/// matches a quarter list.
#[must_use]
pub fn fuzzy_join<'a, R: LinkedRow>(
    key: &LocationKey,
    district: Option<DistrictNumber>,
    table: &'a [R],
) -> MatchOutcome<'a, R> {
    if !key.is_complete() {
        return MatchOutcome::MissingField;
    }
    let Some(district) = district else {
        return MatchOutcome::NoMatch;
    };

    let matched: Vec<&R> = table
        .iter()
        .filter(|row| names_match(key, row.key()))
        .filter(|row| row.districts().contains(&district))
        .collect();

    if matched.is_empty() {
        MatchOutcome::NoMatch
    } else {
        MatchOutcome::Matched(matched)
    }
}

/// Appends `label` unless already present, keeping first-seen order.
pub fn push_unique(labels: &mut Vec<String>, label: &str) {
    if !labels.iter().any(|existing| existing == label) {
        labels.push(label.to_string());
    }
}

/// Counts from matching a batch of forest districts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    /// Districts examined.
    pub processed: u64,
    /// Districts that received at least one label.
    pub matched: u64,
    /// Districts skipped for an absent name part.
    pub missing_field: u64,
}

impl MatchSummary {
    /// Share of processed districts that were matched; `None` when nothing
    /// was processed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> Option<f64> {
        (self.processed > 0).then(|| self.matched as f64 / self.processed as f64)
    }

    /// Records one outcome.
    pub fn record<R>(&mut self, outcome: &MatchOutcome<'_, R>) {
        self.processed += 1;
        match outcome {
            MatchOutcome::Matched(_) => self.matched += 1,
            MatchOutcome::MissingField => self.missing_field += 1,
            MatchOutcome::NoMatch => {}
        }
    }
}

/// Hazard classes for every district, in district order, with a summary.
#[must_use]
pub fn match_forest_districts(
    districts: &[ForestDistrict],
    table: &[HazardClassRow],
) -> (Vec<Vec<String>>, MatchSummary) {
    let mut summary = MatchSummary::default();
    let labels = districts
        .iter()
        .map(|district| {
            let outcome = fuzzy_join(&district.key, district.district, table);
            summary.record(&outcome);
            let mut labels = Vec::new();
            for row in outcome.rows() {
                push_unique(&mut labels, &row.hazard_class);
            }
            labels
        })
        .collect();

    if let Some(accuracy) = summary.accuracy() {
        log::debug!(
            "Hazard classes matched for {} of {} forest districts (accuracy {accuracy:.3}, \
             {} with missing names)",
            summary.matched,
            summary.processed,
            summary.missing_field,
        );
    }
    (labels, summary)
}
