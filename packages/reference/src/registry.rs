//! Compile-time registry of table schemas.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! A run configuration may point any table at an external schema file
//! instead; see [`crate::DataSources`].

use crate::{LoadError, schema::TableSchema};

/// Number of embedded schemas. Enforced by a test.
#[cfg(test)]
const EXPECTED_SCHEMA_COUNT: usize = 16;

/// Embedded TOML schemas.
const SCHEMA_TOMLS: &[(&str, &str)] = &[
    ("fires", include_str!("../schemas/fires.toml")),
    (
        "technogenic_objects",
        include_str!("../schemas/technogenic_objects.toml"),
    ),
    ("localities", include_str!("../schemas/localities.toml")),
    ("car_roads", include_str!("../schemas/car_roads.toml")),
    ("railways", include_str!("../schemas/railways.toml")),
    ("rivers", include_str!("../schemas/rivers.toml")),
    ("lakes", include_str!("../schemas/lakes.toml")),
    (
        "population_density",
        include_str!("../schemas/population_density.toml"),
    ),
    ("forestry", include_str!("../schemas/forestry.toml")),
    (
        "weather_stations",
        include_str!("../schemas/weather_stations.toml"),
    ),
    (
        "forest_districts",
        include_str!("../schemas/forest_districts.toml"),
    ),
    (
        "forest_hazard_classes",
        include_str!("../schemas/forest_hazard_classes.toml"),
    ),
    ("forest_types", include_str!("../schemas/forest_types.toml")),
    ("snowiness", include_str!("../schemas/snowiness.toml")),
    (
        "weather_observations",
        include_str!("../schemas/weather_observations.toml"),
    ),
    (
        "weather_forecasts",
        include_str!("../schemas/weather_forecasts.toml"),
    ),
];

/// Returns all embedded schemas.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the tests below.
#[must_use]
pub fn all_schemas() -> Vec<TableSchema> {
    SCHEMA_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            TableSchema::from_toml(name, toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse table schema '{name}': {e}"))
        })
        .collect()
}

/// Looks up an embedded schema by table name.
///
/// # Errors
///
/// Returns [`LoadError::UnknownSchema`] if no schema has that name, or
/// [`LoadError::Schema`] if the embedded TOML is malformed.
pub fn schema(name: &str) -> Result<TableSchema, LoadError> {
    let (_, toml_str) = SCHEMA_TOMLS
        .iter()
        .find(|(entry, _)| *entry == name)
        .ok_or_else(|| LoadError::UnknownSchema(name.to_string()))?;
    TableSchema::from_toml(name, toml_str)
}

/// Names of every embedded schema, in registry order.
#[must_use]
pub fn schema_names() -> Vec<&'static str> {
    SCHEMA_TOMLS.iter().map(|(name, _)| *name).collect()
}

/// Returns the raw TOML of an embedded schema, for printing.
#[must_use]
pub fn schema_source(name: &str) -> Option<&'static str> {
    SCHEMA_TOMLS
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|(_, toml_str)| *toml_str)
}
