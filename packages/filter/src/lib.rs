#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filtering of resolved fire batches.
//!
//! Every filter works on whole canonical fires: if one detection of a fire
//! is disqualified, every detection sharing its [`CanonicalId`] goes with
//! it. Filters never modify detections; they return the retained subset
//! and the set of removed ids.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike as _, NaiveDate};
use geo::Geometry;
use serde::{Deserialize, Serialize};
use wildfire_fire_models::{CanonicalId, TaggedDetection};
use wildfire_reference_models::{ForestDistrict, GeoFeature};

/// Anything with a footprint the filters can test against.
pub trait HasGeometry {
    fn geometry(&self) -> &Geometry<f64>;
}

impl HasGeometry for Geometry<f64> {
    fn geometry(&self) -> &Geometry<f64> {
        self
    }
}

impl HasGeometry for GeoFeature {
    fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }
}

impl HasGeometry for ForestDistrict {
    fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }
}

/// Outcome of one filter step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filtered {
    /// Surviving detections, in input order.
    pub retained: Vec<TaggedDetection>,
    /// Canonical ids that were removed.
    pub removed: BTreeSet<CanonicalId>,
}

impl Filtered {
    fn new(step: &str, detections: &[TaggedDetection], removed: BTreeSet<CanonicalId>) -> Self {
        let retained: Vec<TaggedDetection> = detections
            .iter()
            .filter(|d| !removed.contains(&d.canonical_id))
            .cloned()
            .collect();
        log::info!(
            "{step}: removed {} fires ({} of {} detections retained)",
            removed.len(),
            retained.len(),
            detections.len()
        );
        Self { retained, removed }
    }
}

fn touches_any<G: HasGeometry>(footprint: &Geometry<f64>, others: &[G]) -> bool {
    others
        .iter()
        .any(|other| wildfire_geometry::intersects(footprint, other.geometry()))
}

/// Members of each canonical fire, in input order.
fn group(detections: &[TaggedDetection]) -> BTreeMap<CanonicalId, Vec<&TaggedDetection>> {
    let mut groups: BTreeMap<CanonicalId, Vec<&TaggedDetection>> = BTreeMap::new();
    for detection in detections {
        groups.entry(detection.canonical_id).or_default().push(detection);
    }
    groups
}

/// Removes every fire with a detection touching any noise geometry
/// (technogenic objects, localities).
#[must_use]
pub fn exclude_intersecting<G: HasGeometry>(
    detections: &[TaggedDetection],
    noise: &[G],
) -> Filtered {
    let removed = detections
        .iter()
        .filter(|d| touches_any(&d.detection.footprint, noise))
        .map(|d| d.canonical_id)
        .collect();
    Filtered::new("noise", detections, removed)
}

/// Removes every fire none of whose detections touches a forest district.
#[must_use]
pub fn exclude_non_forest(
    detections: &[TaggedDetection],
    districts: &[ForestDistrict],
) -> Filtered {
    let removed = group(detections)
        .into_iter()
        .filter(|(_, members)| {
            !members
                .iter()
                .any(|d| touches_any(&d.detection.footprint, districts))
        })
        .map(|(id, _)| id)
        .collect();
    Filtered::new("non-forest", detections, removed)
}

/// Removes fires that started before `season_start`, unless an in-season
/// detection of the same fire overlaps one of its off-season detections.
#[must_use]
pub fn exclude_out_of_season(detections: &[TaggedDetection], season_start: NaiveDate) -> Filtered {
    let removed = off_season(detections, |_| Some(season_start));
    Filtered::new("season", detections, removed)
}

/// Start of the fire season as a month and day, applied to every year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireSeason {
    pub start_month: u32,
    pub start_day: u32,
}

impl Default for FireSeason {
    fn default() -> Self {
        Self {
            start_month: 4,
            start_day: 1,
        }
    }
}

impl FireSeason {
    /// Season start in `year`, or `None` for an impossible date.
    #[must_use]
    pub fn start_in(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.start_month, self.start_day)
    }
}

/// [`exclude_out_of_season`] with the season start taken from the year of
/// each fire's earliest detection, for batches spanning several years.
#[must_use]
pub fn exclude_outside_fire_season(detections: &[TaggedDetection], season: FireSeason) -> Filtered {
    let removed = off_season(detections, |earliest| season.start_in(earliest.year()));
    Filtered::new("season", detections, removed)
}

fn off_season<F>(detections: &[TaggedDetection], season_start: F) -> BTreeSet<CanonicalId>
where
    F: Fn(NaiveDate) -> Option<NaiveDate>,
{
    group(detections)
        .into_iter()
        .filter(|(id, members)| {
            let Some(earliest) = members.iter().map(|d| d.detection.date()).min() else {
                return false;
            };
            let Some(start) = season_start(earliest) else {
                log::warn!("Fire {id}: invalid season start for {earliest}, keeping it");
                return false;
            };
            if earliest >= start {
                return false;
            }
            let (off, on): (Vec<&TaggedDetection>, Vec<&TaggedDetection>) =
                members.iter().copied().partition(|d| d.detection.date() < start);
            !on.iter().any(|late| {
                off.iter().any(|early| {
                    wildfire_geometry::intersects(&late.detection.footprint, &early.detection.footprint)
                })
            })
        })
        .map(|(id, _)| id)
        .collect()
}

/// Keeps the first detection of each canonical fire, in input order.
#[must_use]
pub fn collapse_to_representative(detections: &[TaggedDetection]) -> Vec<TaggedDetection> {
    let mut seen = BTreeSet::new();
    detections
        .iter()
        .filter(|d| seen.insert(d.canonical_id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;
    use wildfire_fire_models::{DetectionId, FireDetection, LocationKey};

    use super::*;

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        wildfire_geometry::parse(&format!(
            "POLYGON(({x} {y}, {} {y}, {} {}, {x} {}, {x} {y}))",
            x + size,
            x + size,
            y + size,
            y + size
        ))
        .unwrap()
    }

    fn at(date: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn tagged(id: u64, canonical: u32, date: &str, footprint: Geometry<f64>) -> TaggedDetection {
        TaggedDetection {
            detection: FireDetection {
                id: DetectionId(id),
                source_id: id.to_string(),
                timestamp: at(date),
                footprint,
                latitude: 0.0,
                longitude: 0.0,
            },
            canonical_id: CanonicalId(canonical),
        }
    }

    fn district(geometry: Geometry<f64>) -> ForestDistrict {
        ForestDistrict {
            row: 1,
            key: LocationKey::default(),
            district: None,
            geometry,
        }
    }

    fn ids(filtered: &Filtered) -> Vec<u64> {
        filtered.retained.iter().map(|d| d.detection.id.0).collect()
    }

    #[test]
    fn noise_removes_the_whole_fire() {
        let detections = vec![
            tagged(1, 1, "2020-06-01", square(0.0, 0.0, 1.0)),
            tagged(2, 1, "2020-06-02", square(10.0, 0.0, 1.0)),
            tagged(3, 2, "2020-06-01", square(20.0, 0.0, 1.0)),
        ];
        let noise = vec![square(10.5, 0.5, 0.1)];
        let filtered = exclude_intersecting(&detections, &noise);
        assert_eq!(ids(&filtered), vec![3]);
        assert_eq!(filtered.removed, BTreeSet::from([CanonicalId(1)]));
    }

    #[test]
    fn exclude_intersecting_is_idempotent() {
        let detections = vec![
            tagged(1, 1, "2020-06-01", square(0.0, 0.0, 1.0)),
            tagged(2, 2, "2020-06-01", square(5.0, 0.0, 1.0)),
            tagged(3, 3, "2020-06-01", square(9.0, 0.0, 1.0)),
        ];
        let noise = vec![
            GeoFeature {
                id: "flare".to_string(),
                name: None,
                geometry: square(5.5, 0.5, 0.1),
            },
        ];
        let once = exclude_intersecting(&detections, &noise);
        let twice = exclude_intersecting(&once.retained, &noise);
        assert_eq!(once.retained, twice.retained);
        assert!(twice.removed.is_empty());
    }

    #[test]
    fn one_forest_member_keeps_the_fire() {
        let detections = vec![
            tagged(1, 1, "2020-06-01", square(0.0, 0.0, 1.0)),
            tagged(2, 1, "2020-06-02", square(50.0, 0.0, 1.0)),
            tagged(3, 2, "2020-06-01", square(60.0, 0.0, 1.0)),
        ];
        let districts = vec![district(square(0.5, 0.5, 2.0))];
        let filtered = exclude_non_forest(&detections, &districts);
        assert_eq!(ids(&filtered), vec![1, 2]);
        assert_eq!(filtered.removed, BTreeSet::from([CanonicalId(2)]));
    }

    #[test]
    fn off_season_fire_is_removed() {
        let detections = vec![
            tagged(1, 1, "2020-03-10", square(0.0, 0.0, 1.0)),
            tagged(2, 1, "2020-03-12", square(0.2, 0.0, 1.0)),
            tagged(3, 2, "2020-05-01", square(5.0, 0.0, 1.0)),
        ];
        let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
        let filtered = exclude_out_of_season(&detections, start);
        assert_eq!(ids(&filtered), vec![3]);
    }

    #[test]
    fn off_season_start_continuing_into_season_is_kept() {
        let detections = vec![
            tagged(1, 1, "2020-03-28", square(0.0, 0.0, 1.0)),
            tagged(2, 1, "2020-04-03", square(0.5, 0.0, 1.0)),
            tagged(3, 2, "2020-03-28", square(10.0, 0.0, 1.0)),
            tagged(4, 2, "2020-04-03", square(10.4, 0.0, 0.2)),
            tagged(5, 2, "2020-04-04", square(12.0, 0.0, 1.0)),
        ];
        let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
        let filtered = exclude_out_of_season(&detections, start);
        assert_eq!(ids(&filtered), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn in_season_members_not_touching_early_ones_do_not_save_the_fire() {
        let detections = vec![
            tagged(1, 1, "2020-03-28", square(0.0, 0.0, 1.0)),
            tagged(2, 1, "2020-04-03", square(5.0, 0.0, 1.0)),
        ];
        let start = NaiveDate::from_ymd_opt(2020, 4, 1).unwrap();
        assert!(exclude_out_of_season(&detections, start).retained.is_empty());
    }

    #[test]
    fn fire_season_applies_per_year() {
        let detections = vec![
            tagged(1, 1, "2019-03-10", square(0.0, 0.0, 1.0)),
            tagged(2, 2, "2020-04-10", square(5.0, 0.0, 1.0)),
            tagged(3, 3, "2021-02-01", square(9.0, 0.0, 1.0)),
        ];
        let filtered = exclude_outside_fire_season(&detections, FireSeason::default());
        assert_eq!(ids(&filtered), vec![2]);
        assert_eq!(
            filtered.removed,
            BTreeSet::from([CanonicalId(1), CanonicalId(3)])
        );
    }

    #[test]
    fn invalid_season_keeps_everything() {
        let detections = vec![tagged(1, 1, "2019-03-10", square(0.0, 0.0, 1.0))];
        let season = FireSeason {
            start_month: 2,
            start_day: 30,
        };
        assert_eq!(exclude_outside_fire_season(&detections, season).retained.len(), 1);
    }

    #[test]
    fn representative_is_first_in_input_order() {
        let detections = vec![
            tagged(4, 2, "2020-06-02", square(5.0, 0.0, 1.0)),
            tagged(1, 1, "2020-06-01", square(0.0, 0.0, 1.0)),
            tagged(2, 2, "2020-06-01", square(5.0, 0.0, 1.0)),
            tagged(3, 1, "2020-06-03", square(0.0, 0.0, 1.0)),
        ];
        let representatives = collapse_to_representative(&detections);
        let ids: Vec<_> = representatives.iter().map(|d| d.detection.id.0).collect();
        assert_eq!(ids, vec![4, 1]);
    }
}
