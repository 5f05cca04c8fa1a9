//! Forest hazard classes and forest types from the quarters a fire
//! touches.

use geo::Geometry;
use wildfire_fire_models::{DistrictNumber, LocationKey};
use wildfire_matching::{fuzzy_join, push_unique};
use wildfire_reference_models::{ForestDistrict, ForestTypeRow, HazardClassRow};

use crate::Diagnostics;

/// Labels collected from every matched reference row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForestAttributes {
    /// `municipality/dacha/kv` of each intersecting quarter.
    pub districts: Vec<String>,
    pub hazard_classes: Vec<String>,
    pub forest_zones: Vec<String>,
    pub seed_zoning_zones: Vec<String>,
}

impl ForestAttributes {
    /// Adds the hazard classes and forest types of one quarter.
    pub fn add_quarter(
        &mut self,
        key: &LocationKey,
        district: Option<DistrictNumber>,
        hazard_classes: &[HazardClassRow],
        forest_types: &[ForestTypeRow],
        diagnostics: &mut Diagnostics,
    ) {
        let outcome = fuzzy_join(key, district, hazard_classes);
        diagnostics.record_join(&outcome);
        for row in outcome.rows() {
            push_unique(&mut self.hazard_classes, &row.hazard_class);
        }

        self.add_forest_types(key, district, forest_types, diagnostics);
    }

    /// Adds the forest and seed-zoning zones of one quarter.
    pub fn add_forest_types(
        &mut self,
        key: &LocationKey,
        district: Option<DistrictNumber>,
        forest_types: &[ForestTypeRow],
        diagnostics: &mut Diagnostics,
    ) {
        let outcome = fuzzy_join(key, district, forest_types);
        diagnostics.record_join(&outcome);
        for row in outcome.rows() {
            if let Some(zone) = &row.forest_zone {
                push_unique(&mut self.forest_zones, zone);
            }
            if let Some(zone) = &row.seed_zoning_zone {
                push_unique(&mut self.seed_zoning_zones, zone);
            }
        }
    }
}

/// Attributes of every quarter intersecting `footprint`.
#[must_use]
pub fn forest_attributes(
    footprint: &Geometry<f64>,
    districts: &[ForestDistrict],
    hazard_classes: &[HazardClassRow],
    forest_types: &[ForestTypeRow],
    diagnostics: &mut Diagnostics,
) -> ForestAttributes {
    let mut attributes = ForestAttributes::default();
    for district in districts
        .iter()
        .filter(|district| wildfire_geometry::intersects(footprint, &district.geometry))
    {
        push_unique(&mut attributes.districts, &district.label());
        attributes.add_quarter(
            &district.key,
            district.district,
            hazard_classes,
            forest_types,
            diagnostics,
        );
    }
    attributes
}
