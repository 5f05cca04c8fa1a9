#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Attribute enrichment of canonical fires and forest districts.
//!
//! Every fire (and every forest district) is enriched independently
//! against the same read-only [`ReferenceTables`], so both batch entry
//! points fan out over `rayon` and merge their [`Diagnostics`] at the end.
//! Nothing here aborts on bad data: a missing station, an incomplete
//! forest name or an empty reference table leaves the attribute `None`
//! (or the list empty) and bumps a counter.
//!
//! [`ReferenceTables`]: wildfire_reference::ReferenceTables

pub mod district;
pub mod export;
pub mod fire;
pub mod forest;
pub mod spatial;
pub mod weather;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use wildfire_matching::{MatchOutcome, MatchSummary};

pub use district::{enrich_district, enrich_districts};
pub use fire::{enrich_fire, enrich_fires};

/// How the nearest weather station to a fire is chosen.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StationDistance {
    /// Euclidean distance over raw latitude/longitude degrees.
    #[default]
    Planar,
    /// Great-circle distance.
    Haversine,
}

impl StationDistance {
    /// Distance between two `(latitude, longitude)` pairs in this metric.
    #[must_use]
    pub fn between(self, a: (f64, f64), b: (f64, f64)) -> f64 {
        match self {
            Self::Planar => wildfire_geometry::planar_point_distance(a, b),
            Self::Haversine => wildfire_geometry::haversine_km(a, b),
        }
    }
}

/// Keyword lists used to recognise a dry thunderstorm in weather codes.
///
/// Matching is case-insensitive substring search, so stems such as
/// `"гроз"` cover every inflection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThunderstormKeywords {
    pub thunderstorm: Vec<String>,
    /// Any of these in the weather text means the storm was not dry.
    pub rain: Vec<String>,
    /// Precipitation cell text meaning "none fell".
    pub no_precipitation: Vec<String>,
}

impl Default for ThunderstormKeywords {
    fn default() -> Self {
        let owned = |words: &[&str]| words.iter().map(ToString::to_string).collect();
        Self {
            thunderstorm: owned(&["thunderstorm", "гроз"]),
            rain: owned(&["rain", "shower", "drizzle", "дожд", "ливн", "ливен", "морос"]),
            no_precipitation: owned(&["no precipitation", "осадков нет"]),
        }
    }
}

/// Options shared by fire and district enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichOptions {
    pub station_distance: StationDistance,
    pub thunderstorm: ThunderstormKeywords,
}

/// Per-record data problems, summed over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    /// Records enriched.
    pub records: u64,
    /// Forest joins that matched at least one row.
    pub joins_matched: u64,
    /// Forest joins that found nothing.
    pub joins_unmatched: u64,
    /// Forest joins skipped because a name part was absent.
    pub joins_missing_field: u64,
    /// Records with no weather station to match against.
    pub no_station: u64,
    /// Records whose station has no observations.
    pub no_observations: u64,
    /// Records whose station has no `kp` forecasts.
    pub no_forecast: u64,
    /// Records with no snowiness row for their station and year.
    pub no_snowiness: u64,
}

impl Diagnostics {
    /// Sums two sets of counters.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            records: self.records + other.records,
            joins_matched: self.joins_matched + other.joins_matched,
            joins_unmatched: self.joins_unmatched + other.joins_unmatched,
            joins_missing_field: self.joins_missing_field + other.joins_missing_field,
            no_station: self.no_station + other.no_station,
            no_observations: self.no_observations + other.no_observations,
            no_forecast: self.no_forecast + other.no_forecast,
            no_snowiness: self.no_snowiness + other.no_snowiness,
        }
    }

    /// Counts one forest join.
    pub fn record_join<R>(&mut self, outcome: &MatchOutcome<'_, R>) {
        match outcome {
            MatchOutcome::Matched(_) => self.joins_matched += 1,
            MatchOutcome::NoMatch => self.joins_unmatched += 1,
            MatchOutcome::MissingField => self.joins_missing_field += 1,
        }
    }

    /// Counts a batch of forest joins already summarized by the matcher.
    pub const fn record_summary(&mut self, summary: &MatchSummary) {
        self.joins_matched += summary.matched;
        self.joins_missing_field += summary.missing_field;
        self.joins_unmatched += summary.processed - summary.matched - summary.missing_field;
    }

    /// Logs the counters at `info`, or at `warn` if any record lacked data.
    pub fn log(&self, what: &str) {
        let gaps = self.no_station + self.no_observations + self.no_forecast + self.no_snowiness;
        let message = format!(
            "{what}: {} enriched; forest joins {} matched, {} unmatched, {} missing names; \
             {} without station, {} without observations, {} without forecasts, \
             {} without snowiness",
            self.records,
            self.joins_matched,
            self.joins_unmatched,
            self.joins_missing_field,
            self.no_station,
            self.no_observations,
            self.no_forecast,
            self.no_snowiness,
        );
        if gaps > 0 || self.joins_missing_field > 0 {
            log::warn!("{message}");
        } else {
            log::info!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_as_joins() {
        let mut diagnostics = Diagnostics::default();
        diagnostics.record_summary(&MatchSummary {
            processed: 5,
            matched: 2,
            missing_field: 1,
        });
        assert_eq!(diagnostics.joins_matched, 2);
        assert_eq!(diagnostics.joins_unmatched, 2);
        assert_eq!(diagnostics.joins_missing_field, 1);
    }

    #[test]
    fn merge_sums_every_counter() {
        let a = Diagnostics {
            records: 2,
            joins_matched: 1,
            no_station: 1,
            ..Diagnostics::default()
        };
        let b = Diagnostics {
            records: 3,
            joins_missing_field: 4,
            no_snowiness: 2,
            ..Diagnostics::default()
        };
        let merged = a.merge(b);
        assert_eq!(merged.records, 5);
        assert_eq!(merged.joins_matched, 1);
        assert_eq!(merged.joins_missing_field, 4);
        assert_eq!(merged.no_station, 1);
        assert_eq!(merged.no_snowiness, 2);
        assert_eq!(a.merge(Diagnostics::default()), a);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: EnrichOptions = toml::from_str("station_distance = \"haversine\"").unwrap();
        assert_eq!(options.station_distance, StationDistance::Haversine);
        assert_eq!(options.thunderstorm, ThunderstormKeywords::default());

        let options: EnrichOptions =
            toml::from_str("[thunderstorm]\nthunderstorm = [\"storm\"]").unwrap();
        assert_eq!(options.thunderstorm.thunderstorm, vec!["storm".to_string()]);
        assert!(!options.thunderstorm.rain.is_empty());
    }

    #[test]
    fn station_distance_metrics() {
        let a = (52.0, 104.0);
        let b = (53.0, 104.0);
        assert!((StationDistance::Planar.between(a, b) - 1.0).abs() < 1e-9);
        let km = StationDistance::Haversine.between(a, b);
        assert!((km - 111.2).abs() < 1.0, "{km}");
    }
}
