#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wildfire detection and enrichment record types.
//!
//! A [`FireDetection`] is one raw satellite/ground detection of burning
//! area. The identity resolver groups detections into canonical fires
//! ([`CanonicalId`]), the filter drops noise, and the enrichment pipeline
//! turns each surviving canonical fire into an [`EnrichedFireRecord`].
//!
//! Missing data is always modelled as [`Option::None`]. Legacy sentinels
//! such as `99999`, `"nan"` or an empty string never reach these types.

pub mod location;
pub mod progress;
pub mod weather;

use chrono::{NaiveDate, NaiveDateTime};
use geo::Geometry;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use location::{DistrictNumber, LocationKey, normalize_name};
pub use weather::{StationRef, WeatherReading};

/// Stable key of a raw detection within one batch (1-based input order).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DetectionId(pub u64);

impl std::fmt::Display for DetectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one physical fire event, allocated sequentially from 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CanonicalId(pub u32);

impl std::fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raw fire detection as ingested. Never mutated after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct FireDetection {
    /// Batch-local key (input order).
    pub id: DetectionId,
    /// Detection id as reported by the upstream source.
    pub source_id: String,
    /// Date and time of the detection.
    pub timestamp: NaiveDateTime,
    /// Burn footprint in lon/lat (WGS84).
    pub footprint: Geometry<f64>,
    /// Reported latitude. Not necessarily the footprint centroid.
    pub latitude: f64,
    /// Reported longitude.
    pub longitude: f64,
}

impl FireDetection {
    /// Calendar date of the detection.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// A detection carrying the canonical fire it was resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedDetection {
    pub detection: FireDetection,
    pub canonical_id: CanonicalId,
}

/// Fire danger class derived from the forecast fire-weather index `kp`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum HazardClass {
    /// `kp` up to 300
    #[strum(serialize = "I")]
    #[serde(rename = "I")]
    I = 1,
    /// `kp` 301 to 1000
    #[strum(serialize = "II")]
    #[serde(rename = "II")]
    II = 2,
    /// `kp` 1001 to 4000
    #[strum(serialize = "III")]
    #[serde(rename = "III")]
    III = 3,
    /// `kp` 4001 to 10000
    #[strum(serialize = "IV")]
    #[serde(rename = "IV")]
    IV = 4,
    /// `kp` above 10000
    #[strum(serialize = "V")]
    #[serde(rename = "V")]
    V = 5,
}

impl HazardClass {
    /// Classifies a fire-weather index value.
    ///
    /// Rules are checked in ascending order and a later matching rule
    /// overwrites an earlier one, so at a shared boundary the higher class
    /// wins. The gaps between the integer ranges (e.g. 300.5) fall into the
    /// next class up. Returns `None` for non-finite input.
    #[must_use]
    pub fn from_fire_weather_index(kp: f64) -> Option<Self> {
        if !kp.is_finite() {
            return None;
        }

        let mut class = Self::I;
        if kp > 300.0 {
            class = Self::II;
        }
        if kp > 1000.0 {
            class = Self::III;
        }
        if kp > 4000.0 {
            class = Self::IV;
        }
        if kp > 10_000.0 {
            class = Self::V;
        }
        Some(class)
    }

    /// Ordinal value 1-5.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

/// Snow cover of the preceding winter relative to the historical norm.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Snowiness {
    /// More than 25% below the norm
    Sparse,
    /// Within 25% of the norm
    Normal,
    /// More than 25% above the norm
    Abundant,
}

impl Snowiness {
    /// Classifies a percent deviation from the norm.
    #[must_use]
    pub fn from_percent(percent: f64) -> Option<Self> {
        if percent.is_nan() {
            None
        } else if percent < -25.0 {
            Some(Self::Sparse)
        } else if percent <= 25.0 {
            Some(Self::Normal)
        } else {
            Some(Self::Abundant)
        }
    }
}

/// A canonical fire with every derived attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedFireRecord {
    pub canonical_id: CanonicalId,
    /// Detection kept as the representative of the canonical fire.
    pub detection_id: DetectionId,
    pub source_id: String,
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub area_km2: f64,
    pub distance_to_car_road_km: Option<f64>,
    pub distance_to_railway_km: Option<f64>,
    pub distance_to_river_km: Option<f64>,
    pub distance_to_lake_km: Option<f64>,
    pub affected_municipalities: Vec<String>,
    /// `None` when the footprint touches no municipality.
    pub average_population_density: Option<f64>,
    pub affected_forestry_units: Vec<String>,
    /// Intersecting forest districts as `municipality/dacha/kv` labels.
    pub affected_forest_districts: Vec<String>,
    pub forest_hazard_classes: Vec<String>,
    pub forest_zones: Vec<String>,
    pub seed_zoning_zones: Vec<String>,
    pub weather_station: Option<StationRef>,
    pub weather: Option<WeatherReading>,
    pub weather_hazard_class: Option<HazardClass>,
    pub snowiness: Option<Snowiness>,
    pub dry_thunderstorm: Option<bool>,
}

/// A forest district with the attributes derived for a target date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedDistrictRecord {
    /// 1-based row of the district in its source table.
    pub row: u64,
    pub key: LocationKey,
    pub district: Option<DistrictNumber>,
    pub hazard_classes: Vec<String>,
    /// Station ids ordered by distance from the district centroid.
    pub nearest_stations: Vec<i64>,
    /// Station whose observations were used for the weather attributes.
    pub weather_station: Option<i64>,
    pub weather: Option<WeatherReading>,
    pub weather_hazard_class: Option<HazardClass>,
    pub snowiness: Option<Snowiness>,
    pub forest_zones: Vec<String>,
    pub seed_zoning_zones: Vec<String>,
    pub dry_thunderstorm: Option<bool>,
}
