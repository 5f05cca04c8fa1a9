//! Row builders for each reference table.

use std::collections::BTreeSet;

use wildfire_fire_models::{DistrictNumber, LocationKey};
use wildfire_reference_models::{
    ForestDistrict, ForestTypeRow, GeoFeature, HazardClassRow, Municipality, SnowinessRow,
    WeatherStation,
};

use crate::reader::{RowSkip, RowView};

pub const FIRES: &str = "fires";
pub const TECHNOGENIC_OBJECTS: &str = "technogenic_objects";
pub const LOCALITIES: &str = "localities";
pub const CAR_ROADS: &str = "car_roads";
pub const RAILWAYS: &str = "railways";
pub const RIVERS: &str = "rivers";
pub const LAKES: &str = "lakes";
pub const POPULATION_DENSITY: &str = "population_density";
pub const FORESTRY: &str = "forestry";
pub const WEATHER_STATIONS: &str = "weather_stations";
pub const FOREST_DISTRICTS: &str = "forest_districts";
pub const FOREST_HAZARD_CLASSES: &str = "forest_hazard_classes";
pub const FOREST_TYPES: &str = "forest_types";
pub const SNOWINESS: &str = "snowiness";
pub const WEATHER_OBSERVATIONS: &str = "weather_observations";
pub const WEATHER_FORECASTS: &str = "weather_forecasts";

/// Logical fields a table's schema must map.
#[must_use]
pub fn required_fields(table: &str) -> &'static [&'static str] {
    match table {
        FIRES => &["timestamp", "footprint"],
        TECHNOGENIC_OBJECTS | LOCALITIES | CAR_ROADS | RAILWAYS | RIVERS | LAKES | FORESTRY => {
            &["geometry"]
        }
        POPULATION_DENSITY => &["name", "population_density", "geometry"],
        WEATHER_STATIONS => &["station_id", "latitude", "longitude"],
        FOREST_DISTRICTS => &["municipality", "forest_plot", "dacha", "district", "geometry"],
        FOREST_HAZARD_CLASSES => &[
            "municipality",
            "forest_plot",
            "dacha",
            "districts",
            "hazard_class",
        ],
        FOREST_TYPES => &["municipality", "forest_plot", "dacha", "districts"],
        SNOWINESS => &["station_id", "winter_end", "percent"],
        WEATHER_OBSERVATIONS => &["observed_at"],
        WEATHER_FORECASTS => &["valid_at", "kp"],
        _ => &[],
    }
}

fn location_key(view: &RowView<'_>) -> LocationKey {
    LocationKey::new(
        view.text("municipality"),
        view.text("forest_plot"),
        view.text("dacha"),
    )
}

/// A generic named geometry. Rows without an id column are keyed by row
/// number.
///
/// # Errors
///
/// Returns [`RowSkip`] if the geometry is absent or does not decode.
pub fn feature(view: &RowView<'_>) -> Result<GeoFeature, RowSkip> {
    Ok(GeoFeature {
        id: view
            .text("id")
            .map_or_else(|| view.row().to_string(), ToString::to_string),
        name: view.text("name").map(ToString::to_string),
        geometry: view.geometry("geometry")?,
    })
}

/// # Errors
///
/// Returns [`RowSkip`] if the name or geometry is unusable.
pub fn municipality(view: &RowView<'_>) -> Result<Municipality, RowSkip> {
    Ok(Municipality {
        name: view.required_text("name")?.to_string(),
        population_density: view.number("population_density"),
        geometry: view.geometry("geometry")?,
    })
}

/// # Errors
///
/// Returns [`RowSkip::Missing`] if the id or coordinates are unusable.
pub fn weather_station(view: &RowView<'_>) -> Result<WeatherStation, RowSkip> {
    Ok(WeatherStation {
        id: view.required_integer("station_id")?,
        name: view.text("name").unwrap_or_default().to_string(),
        latitude: view.required_number("latitude")?,
        longitude: view.required_number("longitude")?,
    })
}

/// Keeps the first station of each id.
pub fn dedup_stations(
    stations: Vec<WeatherStation>,
    report: &mut wildfire_reference_models::LoadReport,
) -> Vec<WeatherStation> {
    let mut seen = BTreeSet::new();
    let before = stations.len();
    let kept: Vec<_> = stations
        .into_iter()
        .filter(|station| seen.insert(station.id))
        .collect();
    let duplicates = (before - kept.len()) as u64;
    report.skipped_duplicate += duplicates;
    report.rows_loaded -= duplicates;
    kept
}

/// # Errors
///
/// Returns [`RowSkip`] if the geometry is absent or does not decode.
pub fn forest_district(view: &RowView<'_>) -> Result<ForestDistrict, RowSkip> {
    Ok(ForestDistrict {
        row: view.row(),
        key: location_key(view),
        district: view.text("district").and_then(DistrictNumber::parse),
        geometry: view.geometry("geometry")?,
    })
}

/// # Errors
///
/// Returns [`RowSkip::Missing`] if the hazard class cell is empty.
pub fn hazard_class(view: &RowView<'_>) -> Result<HazardClassRow, RowSkip> {
    Ok(HazardClassRow {
        key: location_key(view),
        districts: view
            .text("districts")
            .map(DistrictNumber::parse_list)
            .unwrap_or_default(),
        hazard_class: view.required_text("hazard_class")?.to_string(),
    })
}

/// Rows with neither zone carry no information and are skipped.
///
/// # Errors
///
/// Returns [`RowSkip::Missing`] if both zone cells are empty.
pub fn forest_type(view: &RowView<'_>) -> Result<ForestTypeRow, RowSkip> {
    let forest_zone = view.text("forest_zone").map(ToString::to_string);
    let seed_zoning_zone = view.text("seed_zoning_zone").map(ToString::to_string);
    if forest_zone.is_none() && seed_zoning_zone.is_none() {
        return Err(RowSkip::Missing {
            field: "forest_zone",
        });
    }
    Ok(ForestTypeRow {
        key: location_key(view),
        districts: view
            .text("districts")
            .map(DistrictNumber::parse_list)
            .unwrap_or_default(),
        forest_zone,
        seed_zoning_zone,
    })
}

/// # Errors
///
/// Returns [`RowSkip::Missing`] if the station, end year or percent is
/// unusable.
pub fn snowiness(view: &RowView<'_>) -> Result<SnowinessRow, RowSkip> {
    Ok(SnowinessRow {
        station_id: view.required_integer("station_id")?,
        winter_start: view.year("winter_start"),
        winter_end: view.required_year("winter_end")?,
        percent: view.required_number("percent")?,
    })
}
