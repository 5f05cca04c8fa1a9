//! Semicolon-delimited CSV export.
//!
//! The id column comes first, lists are joined with `", "` and absent
//! values are written as empty cells. Tagged detections are written with
//! the column names of the fires schema so a later step can read them
//! back.

use std::{fs::File, io::Write, path::Path};

use thiserror::Error;
use wildfire_fire_models::{
    EnrichedDistrictRecord, EnrichedFireRecord, TaggedDetection, WeatherReading,
};

/// Timestamp layout used in every export, readable by the loader.
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Errors from writing an export file.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output file could not be created.
    #[error("Failed to create {}: {source}", .path.display())]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    /// A record could not be written.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

const WEATHER_HEADER: [&str; 13] = [
    "observed_at",
    "precipitation",
    "wind_direction",
    "wind_speed",
    "humidity",
    "temperature",
    "dew_point",
    "pressure",
    "min_temperature",
    "max_temperature",
    "present_weather",
    "past_weather_1",
    "past_weather_2",
];

const FIRE_HEADER: [&str; 22] = [
    "canonical_id",
    "detection_id",
    "source_id",
    "timestamp",
    "latitude",
    "longitude",
    "area_km2",
    "distance_to_car_road_km",
    "distance_to_railway_km",
    "distance_to_river_km",
    "distance_to_lake_km",
    "municipalities",
    "average_population_density",
    "forestry_units",
    "forest_districts",
    "forest_hazard_classes",
    "forest_zones",
    "seed_zoning_zones",
    "weather_station_id",
    "weather_station_name",
    "weather_hazard_class",
    "snowiness",
];

const DISTRICT_HEADER: [&str; 13] = [
    "row",
    "municipality",
    "forest_plot",
    "dacha",
    "district",
    "hazard_classes",
    "nearest_stations",
    "weather_station_id",
    "weather_hazard_class",
    "snowiness",
    "forest_zones",
    "seed_zoning_zones",
    "dry_thunderstorm",
];

/// Column names of a tagged-detection export, matching the fires schema.
pub const TAGGED_HEADER: [&str; 6] = ["canonical_id", "fire_id", "dt", "lat", "lon", "poly"];

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

fn kilometres(value: Option<f64>) -> String {
    value.map(|km| format!("{km:.3}")).unwrap_or_default()
}

fn list<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn weather_cells(reading: Option<&WeatherReading>) -> Vec<String> {
    let Some(reading) = reading else {
        return vec![String::new(); WEATHER_HEADER.len()];
    };
    vec![
        reading.observed_at.format(TIMESTAMP_FORMAT).to_string(),
        optional(reading.precipitation.as_deref()),
        optional(reading.wind_direction.as_deref()),
        optional(reading.wind_speed),
        optional(reading.humidity),
        optional(reading.temperature),
        optional(reading.dew_point),
        optional(reading.pressure),
        optional(reading.min_temperature),
        optional(reading.max_temperature),
        optional(reading.present_weather.as_deref()),
        optional(reading.past_weather_1.as_deref()),
        optional(reading.past_weather_2.as_deref()),
    ]
}

fn writer<W: Write>(output: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(output)
}

fn create(path: &Path) -> Result<File, ExportError> {
    File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes enriched fires to any writer.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if a record cannot be written.
pub fn write_fires_to<W: Write>(
    output: W,
    records: &[EnrichedFireRecord],
) -> Result<(), ExportError> {
    let mut csv = writer(output);
    let mut header: Vec<&str> = FIRE_HEADER.to_vec();
    header.extend(WEATHER_HEADER);
    header.push("dry_thunderstorm");
    csv.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.canonical_id.to_string(),
            record.detection_id.to_string(),
            record.source_id.clone(),
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            record.latitude.to_string(),
            record.longitude.to_string(),
            format!("{:.3}", record.area_km2),
            kilometres(record.distance_to_car_road_km),
            kilometres(record.distance_to_railway_km),
            kilometres(record.distance_to_river_km),
            kilometres(record.distance_to_lake_km),
            list(&record.affected_municipalities),
            optional(record.average_population_density),
            list(&record.affected_forestry_units),
            list(&record.affected_forest_districts),
            list(&record.forest_hazard_classes),
            list(&record.forest_zones),
            list(&record.seed_zoning_zones),
            optional(record.weather_station.as_ref().map(|station| station.id)),
            optional(record.weather_station.as_ref().map(|station| &station.name)),
            optional(record.weather_hazard_class),
            optional(record.snowiness),
        ];
        row.extend(weather_cells(record.weather.as_ref()));
        row.push(optional(record.dry_thunderstorm));
        csv.write_record(&row)?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes enriched fires to `path`.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or written.
pub fn write_fires(path: &Path, records: &[EnrichedFireRecord]) -> Result<(), ExportError> {
    write_fires_to(create(path)?, records)?;
    log::info!("Wrote {} fire records to {}", records.len(), path.display());
    Ok(())
}

/// Writes enriched districts to any writer.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if a record cannot be written.
pub fn write_districts_to<W: Write>(
    output: W,
    records: &[EnrichedDistrictRecord],
) -> Result<(), ExportError> {
    let mut csv = writer(output);
    let mut header: Vec<&str> = DISTRICT_HEADER.to_vec();
    header.extend(WEATHER_HEADER);
    csv.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.row.to_string(),
            optional(record.key.municipality.as_deref()),
            optional(record.key.forest_plot.as_deref()),
            optional(record.key.dacha.as_deref()),
            optional(record.district),
            list(&record.hazard_classes),
            list(&record.nearest_stations),
            optional(record.weather_station),
            optional(record.weather_hazard_class),
            optional(record.snowiness),
            list(&record.forest_zones),
            list(&record.seed_zoning_zones),
            optional(record.dry_thunderstorm),
        ];
        row.extend(weather_cells(record.weather.as_ref()));
        csv.write_record(&row)?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes enriched districts to `path`.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or written.
pub fn write_districts(path: &Path, records: &[EnrichedDistrictRecord]) -> Result<(), ExportError> {
    write_districts_to(create(path)?, records)?;
    log::info!("Wrote {} district records to {}", records.len(), path.display());
    Ok(())
}

/// Writes tagged detections to any writer, footprints as WKT.
///
/// # Errors
///
/// Returns [`ExportError::Csv`] if a record cannot be written.
pub fn write_tagged_to<W: Write>(
    output: W,
    detections: &[TaggedDetection],
) -> Result<(), ExportError> {
    let mut csv = writer(output);
    csv.write_record(TAGGED_HEADER)?;
    for tagged in detections {
        let detection = &tagged.detection;
        csv.write_record([
            tagged.canonical_id.to_string(),
            detection.source_id.clone(),
            detection.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            detection.latitude.to_string(),
            detection.longitude.to_string(),
            wildfire_geometry::to_wkt(&detection.footprint),
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes tagged detections to `path`.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or written.
pub fn write_tagged(path: &Path, detections: &[TaggedDetection]) -> Result<(), ExportError> {
    write_tagged_to(create(path)?, detections)?;
    log::info!(
        "Wrote {} tagged detections to {}",
        detections.len(),
        path.display()
    );
    Ok(())
}
