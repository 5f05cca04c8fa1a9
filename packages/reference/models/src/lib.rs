#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reference table row types.
//!
//! Every table is loaded once per run and shared read-only. Rows whose
//! geometry could not be decoded never become one of these types; the
//! loader counts them in a [`LoadReport`] instead.

use chrono::NaiveDateTime;
use geo::Geometry;
use serde::Serialize;
use wildfire_fire_models::{DistrictNumber, LocationKey, WeatherReading};

/// A named geometry: road, railway, river, lake, forestry unit, locality
/// or technogenic (non-fire) object.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub id: String,
    pub name: Option<String>,
    pub geometry: Geometry<f64>,
}

/// A municipality polygon with its population density.
#[derive(Debug, Clone, PartialEq)]
pub struct Municipality {
    pub name: String,
    /// People per km². `None` when the source cell is empty or not numeric.
    pub population_density: Option<f64>,
    pub geometry: Geometry<f64>,
}

/// A synoptic weather station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherStation {
    /// WMO synoptic index.
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A forest quarter polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestDistrict {
    /// 1-based row in the source table.
    pub row: u64,
    pub key: LocationKey,
    pub district: Option<DistrictNumber>,
    pub geometry: Geometry<f64>,
}

impl ForestDistrict {
    /// `municipality/dacha/kv` label used in fire exports.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{}/{}/{}",
            self.key.municipality.as_deref().unwrap_or("-"),
            self.key.dacha.as_deref().unwrap_or("-"),
            self.district
                .map_or_else(|| "-".to_string(), |district| district.to_string()),
        )
    }
}

/// Forest hazard class assigned to a set of quarters of one dacha.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HazardClassRow {
    pub key: LocationKey,
    pub districts: Vec<DistrictNumber>,
    pub hazard_class: String,
}

/// Forest zone and seed-zoning zone assigned to a set of quarters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestTypeRow {
    pub key: LocationKey,
    pub districts: Vec<DistrictNumber>,
    pub forest_zone: Option<String>,
    pub seed_zoning_zone: Option<String>,
}

/// Snow depth of one winter at one station relative to the norm.
#[derive(Debug, Clone, PartialEq)]
pub struct SnowinessRow {
    pub station_id: i64,
    /// Year the winter started, when present.
    pub winter_start: Option<i32>,
    /// Year the winter ended; fires are matched on this year.
    pub winter_end: i32,
    /// Percent deviation from the norm.
    pub percent: f64,
}

/// One forecast value of the fire-weather index `kp`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastReading {
    pub valid_at: NaiveDateTime,
    pub kp: f64,
}

/// Observations or forecasts keyed by station id, each series sorted by
/// time.
pub type StationSeries<T> = std::collections::BTreeMap<i64, Vec<T>>;

/// Weather observations keyed by station.
pub type ObservationArchive = StationSeries<WeatherReading>;

/// `kp` forecasts keyed by station.
pub type ForecastArchive = StationSeries<ForecastReading>;

/// Row-level outcome of loading one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub table: String,
    /// Data rows read from the file(s).
    pub rows_read: u64,
    /// Rows that became records.
    pub rows_loaded: u64,
    /// Rows excluded by the table's row filter.
    pub rows_filtered: u64,
    /// Rows dropped because their geometry did not decode.
    pub skipped_geometry: u64,
    /// Rows dropped because a required field was missing or malformed.
    pub skipped_missing: u64,
    /// Rows dropped as duplicates of an earlier key.
    pub skipped_duplicate: u64,
    /// Text cells that were not valid UTF-8 and were treated as absent.
    pub invalid_text: u64,
}

impl LoadReport {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    /// Adds another report's counters into this one.
    pub fn absorb(&mut self, other: &Self) {
        self.rows_read += other.rows_read;
        self.rows_loaded += other.rows_loaded;
        self.rows_filtered += other.rows_filtered;
        self.skipped_geometry += other.skipped_geometry;
        self.skipped_missing += other.skipped_missing;
        self.skipped_duplicate += other.skipped_duplicate;
        self.invalid_text += other.invalid_text;
    }

    /// Rows that were read but not loaded for any reason other than the
    /// row filter.
    #[must_use]
    pub const fn skipped(&self) -> u64 {
        self.skipped_geometry + self.skipped_missing + self.skipped_duplicate
    }
}
