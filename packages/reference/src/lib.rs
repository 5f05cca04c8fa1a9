#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loading of fire batches, reference tables and weather archives.
//!
//! Every table is described by a [`schema::TableSchema`] (embedded in the
//! [`registry`] or supplied as an external TOML file) and read through the
//! generic [`reader`]. Bad rows never abort a load: they are counted in a
//! [`LoadReport`] and logged once per table.

pub mod archive;
pub mod fires;
pub mod parsing;
pub mod reader;
pub mod registry;
pub mod schema;
pub mod tables;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use wildfire_fire_models::DetectionId;
use wildfire_reference_models::{
    ForecastArchive, ForestDistrict, ForestTypeRow, GeoFeature, HazardClassRow, LoadReport,
    Municipality, ObservationArchive, SnowinessRow, WeatherStation,
};

use crate::{
    fires::FireRow,
    reader::{RowSkip, RowView},
    schema::TableSchema,
};

/// Errors that abort loading a table.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A file or directory could not be read.
    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV stream itself failed.
    #[error("CSV error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A schema file is malformed.
    #[error("invalid table schema {name}: {source}")]
    Schema {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    /// No embedded schema has this name.
    #[error("unknown table schema: {0}")]
    UnknownSchema(String),

    /// A schema does not map a field the loader needs.
    #[error("schema for {table} does not map required field {field}")]
    SchemaField { table: String, field: &'static str },

    /// A named column is not present in the file's header row.
    #[error("table {table}: column {column:?} not found in header")]
    MissingColumn { table: String, column: String },

    /// A table that is required for this step has no configured path.
    #[error("table {0} is not configured")]
    NotConfigured(String),

    /// A tagged fire batch contains a row without a canonical id.
    #[error("detection {detection} has no canonical id")]
    MissingCanonicalId { detection: DetectionId },
}

/// Where one table lives, with an optional external schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableSource {
    /// CSV file, or directory for the weather archives.
    pub path: PathBuf,
    /// TOML schema replacing the embedded one.
    #[serde(default)]
    pub schema: Option<PathBuf>,
}

/// Table locations for one run. Relative paths resolve against
/// `data_dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DataSources {
    pub data_dir: PathBuf,
    /// Keyed by table name (see [`tables`]).
    pub tables: BTreeMap<String, TableSource>,
}

impl DataSources {
    /// Resolves a configured path against `data_dir`.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Configured location of a table, if any.
    #[must_use]
    pub fn path_of(&self, table: &str) -> Option<PathBuf> {
        self.tables.get(table).map(|source| self.resolve(&source.path))
    }

    /// The schema for a table: the configured external file if set,
    /// otherwise the embedded one. Required fields are checked either way.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the schema cannot be read or parsed, or
    /// does not map a required field.
    pub fn schema_for(&self, table: &str) -> Result<TableSchema, LoadError> {
        let schema = match self.tables.get(table).and_then(|s| s.schema.as_ref()) {
            Some(path) => {
                let path = self.resolve(path);
                let text = std::fs::read_to_string(&path)
                    .map_err(|source| LoadError::Io { path, source })?;
                TableSchema::from_toml(table, &text)?
            }
            None => registry::schema(table)?,
        };
        schema.require(tables::required_fields(table))?;
        Ok(schema)
    }

    /// Loads a table, or returns `None` when it is not configured.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the schema or file cannot be read.
    pub fn load_table<T, F>(
        &self,
        table: &str,
        build: F,
    ) -> Result<Option<(Vec<T>, LoadReport)>, LoadError>
    where
        F: FnMut(&RowView<'_>) -> Result<T, RowSkip>,
    {
        let Some(path) = self.path_of(table) else {
            log::warn!("{table}: not configured, attributes derived from it will be absent");
            return Ok(None);
        };
        let schema = self.schema_for(table)?;
        reader::load_table(&path, &schema, build).map(Some)
    }

    /// Loads the configured fire batch, or the file at `path` if given.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::NotConfigured`] if there is no fire table, or
    /// another [`LoadError`] if it cannot be read.
    pub fn load_fires(&self, path: Option<&Path>) -> Result<(Vec<FireRow>, LoadReport), LoadError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| self.path_of(tables::FIRES))
            .ok_or_else(|| LoadError::NotConfigured(tables::FIRES.to_string()))?;
        let schema = self.schema_for(tables::FIRES)?;
        fires::load_fires(&path, &schema)
    }

    /// Loads the forest district polygons.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the table cannot be read.
    pub fn load_forest_districts(
        &self,
    ) -> Result<(Vec<ForestDistrict>, Vec<LoadReport>), LoadError> {
        let mut reports = Vec::new();
        let districts = take(
            self.load_table(tables::FOREST_DISTRICTS, tables::forest_district)?,
            &mut reports,
        );
        Ok((districts, reports))
    }
}

fn take<T>(loaded: Option<(Vec<T>, LoadReport)>, reports: &mut Vec<LoadReport>) -> Vec<T> {
    match loaded {
        Some((rows, report)) => {
            reports.push(report);
            rows
        }
        None => Vec::new(),
    }
}

/// Known non-fire sources used to discard detections.
#[derive(Debug, Clone, Default)]
pub struct NoiseTables {
    pub technogenic_objects: Vec<GeoFeature>,
    pub localities: Vec<GeoFeature>,
    pub reports: Vec<LoadReport>,
}

impl NoiseTables {
    /// # Errors
    ///
    /// Returns [`LoadError`] if a configured table cannot be read.
    pub fn load(sources: &DataSources) -> Result<Self, LoadError> {
        let mut reports = Vec::new();
        let technogenic_objects = take(
            sources.load_table(tables::TECHNOGENIC_OBJECTS, tables::feature)?,
            &mut reports,
        );
        let localities = take(
            sources.load_table(tables::LOCALITIES, tables::feature)?,
            &mut reports,
        );
        Ok(Self {
            technogenic_objects,
            localities,
            reports,
        })
    }
}

/// Every table the enrichment pipeline reads. Loaded once, then shared
/// read-only across workers.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    pub car_roads: Vec<GeoFeature>,
    pub railways: Vec<GeoFeature>,
    pub rivers: Vec<GeoFeature>,
    pub lakes: Vec<GeoFeature>,
    pub municipalities: Vec<Municipality>,
    pub forestry_units: Vec<GeoFeature>,
    pub weather_stations: Vec<WeatherStation>,
    pub forest_districts: Vec<ForestDistrict>,
    pub hazard_classes: Vec<HazardClassRow>,
    pub forest_types: Vec<ForestTypeRow>,
    pub snowiness: Vec<SnowinessRow>,
    pub observations: ObservationArchive,
    pub forecasts: ForecastArchive,
    pub reports: Vec<LoadReport>,
}

impl ReferenceTables {
    /// Loads every configured table. Unconfigured tables are empty.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if a configured table cannot be read.
    pub fn load(sources: &DataSources) -> Result<Self, LoadError> {
        let mut reports = Vec::new();

        let car_roads = take(
            sources.load_table(tables::CAR_ROADS, tables::feature)?,
            &mut reports,
        );
        let railways = take(
            sources.load_table(tables::RAILWAYS, tables::feature)?,
            &mut reports,
        );
        let rivers = take(
            sources.load_table(tables::RIVERS, tables::feature)?,
            &mut reports,
        );
        let lakes = take(
            sources.load_table(tables::LAKES, tables::feature)?,
            &mut reports,
        );
        let municipalities = take(
            sources.load_table(tables::POPULATION_DENSITY, tables::municipality)?,
            &mut reports,
        );
        let forestry_units = take(
            sources.load_table(tables::FORESTRY, tables::feature)?,
            &mut reports,
        );

        let weather_stations = match sources
            .load_table(tables::WEATHER_STATIONS, tables::weather_station)?
        {
            Some((stations, mut report)) => {
                let stations = tables::dedup_stations(stations, &mut report);
                reports.push(report);
                stations
            }
            None => Vec::new(),
        };

        let (forest_districts, district_reports) = sources.load_forest_districts()?;
        reports.extend(district_reports);
        let hazard_classes = take(
            sources.load_table(tables::FOREST_HAZARD_CLASSES, tables::hazard_class)?,
            &mut reports,
        );
        let forest_types = take(
            sources.load_table(tables::FOREST_TYPES, tables::forest_type)?,
            &mut reports,
        );
        let snowiness = take(
            sources.load_table(tables::SNOWINESS, tables::snowiness)?,
            &mut reports,
        );

        let station_ids: Vec<i64> = weather_stations.iter().map(|s| s.id).collect();

        let observations = match sources.path_of(tables::WEATHER_OBSERVATIONS) {
            Some(dir) => {
                let schema = sources.schema_for(tables::WEATHER_OBSERVATIONS)?;
                let (archive, report) = archive::load_observations(&dir, &schema, &station_ids)?;
                reader::log_report(&report);
                reports.push(report);
                archive
            }
            None => {
                log::warn!("weather_observations: not configured, weather attributes will be absent");
                ObservationArchive::new()
            }
        };

        let forecasts = match sources.path_of(tables::WEATHER_FORECASTS) {
            Some(dir) => {
                let schema = sources.schema_for(tables::WEATHER_FORECASTS)?;
                let (archive, report) = archive::load_forecasts(&dir, &schema, &station_ids)?;
                reader::log_report(&report);
                reports.push(report);
                archive
            }
            None => {
                log::warn!("weather_forecasts: not configured, weather hazard classes will be absent");
                ForecastArchive::new()
            }
        };

        Ok(Self {
            car_roads,
            railways,
            rivers,
            lakes,
            municipalities,
            forestry_units,
            weather_stations,
            forest_districts,
            hazard_classes,
            forest_types,
            snowiness,
            observations,
            forecasts,
            reports,
        })
    }
}
