//! Fire detection batches.
//!
//! A batch is either raw detections, or detections already tagged with a
//! canonical id by an earlier resolve step (the `canonical_id` column).

use std::path::Path;

use wildfire_fire_models::{CanonicalId, DetectionId, FireDetection, TaggedDetection};
use wildfire_reference_models::LoadReport;

use crate::{
    LoadError,
    reader::{self, RowSkip, RowView},
    schema::TableSchema,
};

/// A detection with the canonical id found in the file, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct FireRow {
    pub detection: FireDetection,
    pub canonical_id: Option<CanonicalId>,
}

/// Builds one detection. Reported coordinates fall back to the footprint
/// centroid when the cells are empty.
///
/// # Errors
///
/// Returns [`RowSkip`] if the timestamp or footprint is unusable.
pub fn fire_row(view: &RowView<'_>) -> Result<FireRow, RowSkip> {
    let footprint = view.geometry("footprint")?;
    let timestamp = view.required_timestamp("timestamp")?;
    let centroid = wildfire_geometry::centroid_lat_lon(&footprint);

    let latitude = view
        .number("latitude")
        .or_else(|| centroid.map(|(lat, _)| lat))
        .ok_or(RowSkip::Missing { field: "latitude" })?;
    let longitude = view
        .number("longitude")
        .or_else(|| centroid.map(|(_, lon)| lon))
        .ok_or(RowSkip::Missing { field: "longitude" })?;

    Ok(FireRow {
        detection: FireDetection {
            id: DetectionId(view.row()),
            source_id: view
                .text("source_id")
                .map_or_else(|| view.row().to_string(), ToString::to_string),
            timestamp,
            footprint,
            latitude,
            longitude,
        },
        canonical_id: view
            .integer("canonical_id")
            .and_then(|id| u32::try_from(id).ok())
            .map(CanonicalId),
    })
}

/// Loads a fire batch.
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read.
pub fn load_fires(path: &Path, schema: &TableSchema) -> Result<(Vec<FireRow>, LoadReport), LoadError> {
    reader::load_table(path, schema, fire_row)
}

/// Drops any canonical ids, keeping the raw detections.
#[must_use]
pub fn into_detections(rows: Vec<FireRow>) -> Vec<FireDetection> {
    rows.into_iter().map(|row| row.detection).collect()
}

/// Converts rows to tagged detections.
///
/// # Errors
///
/// Returns [`LoadError::MissingCanonicalId`] naming the first row without
/// a canonical id.
pub fn into_tagged(rows: Vec<FireRow>) -> Result<Vec<TaggedDetection>, LoadError> {
    rows.into_iter()
        .map(|row| match row.canonical_id {
            Some(canonical_id) => Ok(TaggedDetection {
                detection: row.detection,
                canonical_id,
            }),
            None => Err(LoadError::MissingCanonicalId {
                detection: row.detection.id,
            }),
        })
        .collect()
}
