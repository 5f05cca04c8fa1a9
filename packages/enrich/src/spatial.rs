//! Footprint measurements against geometric reference sets.

use geo::Geometry;
use wildfire_geometry::{distance_km, intersects};
use wildfire_matching::push_unique;
use wildfire_reference_models::{GeoFeature, Municipality};

/// Shortest distance from `footprint` to any feature, in km.
///
/// `None` when the set is empty.
#[must_use]
pub fn min_distance_km(footprint: &Geometry<f64>, features: &[GeoFeature]) -> Option<f64> {
    features
        .iter()
        .map(|feature| distance_km(footprint, &feature.geometry))
        .filter(|distance| distance.is_finite())
        .min_by(f64::total_cmp)
}

/// Names of intersecting features, first-seen order, without repeats.
/// Unnamed features are listed by id.
#[must_use]
pub fn intersecting_names(footprint: &Geometry<f64>, features: &[GeoFeature]) -> Vec<String> {
    let mut names = Vec::new();
    for feature in features {
        if intersects(footprint, &feature.geometry) {
            push_unique(&mut names, feature.name.as_deref().unwrap_or(&feature.id));
        }
    }
    names
}

/// Intersecting municipality names and their mean population density.
///
/// The mean covers only municipalities with a density value; `None` when
/// there are none.
#[must_use]
pub fn municipalities(
    footprint: &Geometry<f64>,
    municipalities: &[Municipality],
) -> (Vec<String>, Option<f64>) {
    let mut names = Vec::new();
    let mut total = 0.0;
    let mut count = 0_u32;
    for municipality in municipalities {
        if !intersects(footprint, &municipality.geometry) {
            continue;
        }
        push_unique(&mut names, &municipality.name);
        if let Some(density) = municipality.population_density {
            total += density;
            count += 1;
        }
    }
    let mean = (count > 0).then(|| total / f64::from(count));
    (names, mean)
}
