//! Enrichment of forest districts for a target date.
//!
//! Unlike fires, districts are matched to weather by walking their
//! stations nearest-first until one has data, since many stations in the
//! registry have no archive at all.

use std::time::Instant;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use rayon::prelude::*;
use wildfire_fire_models::{EnrichedDistrictRecord, progress::ProgressCallback};
use wildfire_matching::{MatchSummary, match_forest_districts};
use wildfire_reference::ReferenceTables;
use wildfire_reference_models::ForestDistrict;

use crate::{Diagnostics, EnrichOptions, forest::ForestAttributes, weather};

/// Noon of `date`, the reference time for district weather.
#[must_use]
pub fn reference_time(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + TimeDelta::hours(12)
}

/// Derives every attribute of one forest district for `target`.
#[must_use]
pub fn enrich_district(
    district: &ForestDistrict,
    tables: &ReferenceTables,
    target: NaiveDate,
    options: &EnrichOptions,
) -> (EnrichedDistrictRecord, Diagnostics) {
    let (mut hazard_classes, summary) =
        match_forest_districts(std::slice::from_ref(district), &tables.hazard_classes);
    let mut diagnostics = Diagnostics::default();
    diagnostics.record_summary(&summary);

    let (record, rest) = enrich_matched_district(
        district,
        hazard_classes.pop().unwrap_or_default(),
        tables,
        target,
        options,
    );
    (record, diagnostics.merge(rest))
}

/// Everything but the hazard classes, which the caller has already
/// matched.
fn enrich_matched_district(
    district: &ForestDistrict,
    hazard_classes: Vec<String>,
    tables: &ReferenceTables,
    target: NaiveDate,
    options: &EnrichOptions,
) -> (EnrichedDistrictRecord, Diagnostics) {
    let mut diagnostics = Diagnostics {
        records: 1,
        ..Diagnostics::default()
    };

    let mut attributes = ForestAttributes::default();
    attributes.add_forest_types(
        &district.key,
        district.district,
        &tables.forest_types,
        &mut diagnostics,
    );

    let at = reference_time(target);
    let nearest_stations = wildfire_geometry::centroid_lat_lon(&district.geometry)
        .map(|centroid| weather::ranked_stations(&tables.weather_stations, centroid))
        .unwrap_or_default();
    if nearest_stations.is_empty() {
        diagnostics.no_station += 1;
    }

    let observed = nearest_stations.iter().find_map(|id| {
        tables
            .observations
            .get(id)
            .and_then(|series| weather::nearest_observation(series, at))
            .map(|reading| (*id, reading))
    });
    if observed.is_none() && !nearest_stations.is_empty() {
        diagnostics.no_observations += 1;
    }

    let weather_hazard_class = nearest_stations.iter().find_map(|id| {
        tables
            .forecasts
            .get(id)
            .and_then(|series| weather::weather_hazard_class(series, at))
    });
    if weather_hazard_class.is_none() && !nearest_stations.is_empty() {
        diagnostics.no_forecast += 1;
    }

    let snowiness = nearest_stations
        .iter()
        .find_map(|id| weather::snowiness(&tables.snowiness, *id, target.year()));
    if snowiness.is_none() && !nearest_stations.is_empty() {
        diagnostics.no_snowiness += 1;
    }

    let record = EnrichedDistrictRecord {
        row: district.row,
        key: district.key.clone(),
        district: district.district,
        hazard_classes,
        nearest_stations,
        weather_station: observed.map(|(id, _)| id),
        weather: observed.map(|(_, reading)| reading.clone()),
        weather_hazard_class,
        snowiness,
        forest_zones: attributes.forest_zones,
        seed_zoning_zones: attributes.seed_zoning_zones,
        dry_thunderstorm: observed
            .map(|(_, reading)| weather::is_dry_thunderstorm(reading, &options.thunderstorm)),
    };
    (record, diagnostics)
}

/// Enriches every district in parallel, in input order.
///
/// Hazard classes are matched for the whole batch first; the returned
/// [`MatchSummary`] is the matcher's own.
#[must_use]
pub fn enrich_districts(
    districts: &[ForestDistrict],
    tables: &ReferenceTables,
    target: NaiveDate,
    options: &EnrichOptions,
    progress: &dyn ProgressCallback,
) -> (Vec<EnrichedDistrictRecord>, Diagnostics, MatchSummary) {
    let start = Instant::now();
    log::info!(
        "Enriching {} forest districts for {target}",
        districts.len()
    );
    progress.set_total(districts.len() as u64);
    progress.set_message(format!("Enriching districts for {target}"));

    let (hazard_classes, summary) = match_forest_districts(districts, &tables.hazard_classes);

    let (records, diagnostics): (Vec<_>, Vec<_>) = districts
        .par_iter()
        .zip(hazard_classes.into_par_iter())
        .map(|(district, hazard_classes)| {
            let enriched =
                enrich_matched_district(district, hazard_classes, tables, target, options);
            progress.inc(1);
            enriched
        })
        .unzip();
    let mut diagnostics = diagnostics
        .into_par_iter()
        .reduce(Diagnostics::default, Diagnostics::merge);
    diagnostics.record_summary(&summary);

    progress.finish(format!("Enriched {} districts", records.len()));
    diagnostics.log("District enrichment");
    if let Some(accuracy) = summary.accuracy() {
        log::info!(
            "Hazard classes matched for {} of {} districts (accuracy {accuracy:.3}, \
             {} with missing names)",
            summary.matched,
            summary.processed,
            summary.missing_field,
        );
    }
    log::info!(
        "Enriched {} districts in {:.2}s",
        records.len(),
        start.elapsed().as_secs_f64()
    );
    (records, diagnostics, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Geometry;
    use wildfire_fire_models::{
        DistrictNumber, HazardClass, LocationKey, Snowiness, WeatherReading,
        progress::NullProgress,
    };
    use wildfire_reference_models::{
        ForecastReading, ForestTypeRow, HazardClassRow, SnowinessRow, WeatherStation,
    };

    fn square(min_x: f64, min_y: f64, size: f64) -> Geometry<f64> {
        let (max_x, max_y) = (min_x + size, min_y + size);
        wildfire_geometry::parse(&format!(
            "POLYGON(({min_x} {min_y}, {max_x} {min_y}, {max_x} {max_y}, {min_x} {max_y}, {min_x} {min_y}))"
        ))
        .unwrap()
    }

    fn key() -> LocationKey {
        LocationKey::new(Some("Братский"), Some("Тангуйское"), Some("Тангуйская"))
    }

    fn target() -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 8, 10).unwrap()
    }

    fn district(row: u64, key: LocationKey, kv: i64) -> ForestDistrict {
        ForestDistrict {
            row,
            key,
            district: Some(DistrictNumber(kv)),
            geometry: square(104.0, 52.0, 0.1),
        }
    }

    fn station(id: i64, latitude: f64) -> WeatherStation {
        WeatherStation {
            id,
            name: id.to_string(),
            latitude,
            longitude: 104.05,
        }
    }

    fn reading(observed_at: NaiveDateTime) -> WeatherReading {
        WeatherReading {
            observed_at,
            precipitation: Some("0".to_string()),
            wind_direction: None,
            wind_speed: None,
            humidity: None,
            temperature: Some(20.0),
            dew_point: None,
            pressure: None,
            min_temperature: None,
            max_temperature: None,
            present_weather: Some("Гроза".to_string()),
            past_weather_1: None,
            past_weather_2: None,
        }
    }

    fn tables() -> ReferenceTables {
        let noon = reference_time(target());
        let mut tables = ReferenceTables {
            weather_stations: vec![station(1, 55.0), station(2, 52.2), station(3, 53.0)],
            hazard_classes: vec![HazardClassRow {
                key: key(),
                districts: vec![DistrictNumber(12)],
                hazard_class: "IV".to_string(),
            }],
            forest_types: vec![ForestTypeRow {
                key: key(),
                districts: vec![DistrictNumber(12)],
                forest_zone: Some("Таежная".to_string()),
                seed_zoning_zone: Some("2".to_string()),
            }],
            snowiness: vec![SnowinessRow {
                station_id: 3,
                winter_start: Some(2019),
                winter_end: 2020,
                percent: -30.0,
            }],
            ..ReferenceTables::default()
        };
        // Station 2 is nearest but has no archive.
        tables.observations.insert(3, vec![reading(noon)]);
        tables.observations.insert(1, vec![reading(noon)]);
        tables.forecasts.insert(
            1,
            vec![ForecastReading {
                valid_at: noon,
                kp: 50.0,
            }],
        );
        tables
    }

    #[test]
    fn reference_time_is_noon() {
        assert_eq!(reference_time(target()).to_string(), "2020-08-10 12:00:00");
    }

    #[test]
    fn walks_stations_until_one_has_data() {
        let tables = tables();
        let (record, diagnostics) =
            enrich_district(&district(5, key(), 12), &tables, target(), &EnrichOptions::default());
        assert_eq!(record.row, 5);
        assert_eq!(record.nearest_stations, vec![2, 3, 1]);
        assert_eq!(record.weather_station, Some(3));
        assert_eq!(record.weather.as_ref().and_then(|w| w.temperature), Some(20.0));
        assert_eq!(record.weather_hazard_class, Some(HazardClass::I));
        assert_eq!(record.snowiness, Some(Snowiness::Sparse));
        assert_eq!(record.hazard_classes, vec!["IV"]);
        assert_eq!(record.forest_zones, vec!["Таежная"]);
        assert_eq!(record.seed_zoning_zones, vec!["2"]);
        assert_eq!(record.dry_thunderstorm, Some(true));
        assert_eq!(diagnostics.no_observations, 0);
    }

    #[test]
    fn no_stations_is_counted_once() {
        let (record, diagnostics) = enrich_district(
            &district(1, key(), 12),
            &ReferenceTables::default(),
            target(),
            &EnrichOptions::default(),
        );
        assert!(record.nearest_stations.is_empty());
        assert_eq!(record.weather, None);
        assert_eq!(record.dry_thunderstorm, None);
        assert_eq!(diagnostics.no_station, 1);
        assert_eq!(diagnostics.no_observations, 0);
        assert_eq!(diagnostics.joins_unmatched, 2);
    }

    #[test]
    fn batch_reports_accuracy() {
        let tables = tables();
        let districts = vec![
            district(1, key(), 12),
            district(2, key(), 99),
            district(3, LocationKey::new(Some("Братский"), None, None), 12),
            district(4, key(), 12),
        ];
        let (records, diagnostics, summary) = enrich_districts(
            &districts,
            &tables,
            target(),
            &EnrichOptions::default(),
            &NullProgress,
        );
        let rows: Vec<u64> = records.iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![1, 2, 3, 4]);
        assert_eq!(diagnostics.records, 4);
        assert_eq!(diagnostics.joins_missing_field, 2);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.missing_field, 1);
        assert_eq!(summary.accuracy(), Some(0.5));
    }

    #[test]
    fn batch_summary_is_the_matchers() {
        let tables = tables();
        let districts = vec![
            district(1, key(), 12),
            district(2, LocationKey::new(None, None, None), 12),
            district(3, key(), 7),
        ];
        let (records, _, summary) = enrich_districts(
            &districts,
            &tables,
            target(),
            &EnrichOptions::default(),
            &NullProgress,
        );
        let (labels, expected) = match_forest_districts(&districts, &tables.hazard_classes);
        assert_eq!(summary, expected);
        let hazard_classes: Vec<Vec<String>> =
            records.into_iter().map(|r| r.hazard_classes).collect();
        assert_eq!(hazard_classes, labels);
    }
}
