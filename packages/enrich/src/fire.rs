//! Enrichment of canonical fires.

use std::time::Instant;

use chrono::Datelike;
use rayon::prelude::*;
use wildfire_fire_models::{
    EnrichedFireRecord, StationRef, TaggedDetection, progress::ProgressCallback,
};
use wildfire_reference::ReferenceTables;

use crate::{Diagnostics, EnrichOptions, forest, spatial, weather};

/// Derives every attribute of one canonical fire from its representative
/// detection.
#[must_use]
pub fn enrich_fire(
    fire: &TaggedDetection,
    tables: &ReferenceTables,
    options: &EnrichOptions,
) -> (EnrichedFireRecord, Diagnostics) {
    let detection = &fire.detection;
    let footprint = &detection.footprint;
    let mut diagnostics = Diagnostics {
        records: 1,
        ..Diagnostics::default()
    };

    let (affected_municipalities, average_population_density) =
        spatial::municipalities(footprint, &tables.municipalities);
    let forest = forest::forest_attributes(
        footprint,
        &tables.forest_districts,
        &tables.hazard_classes,
        &tables.forest_types,
        &mut diagnostics,
    );

    let station = weather::nearest_station(
        &tables.weather_stations,
        (detection.latitude, detection.longitude),
        options.station_distance,
    );
    if station.is_none() {
        diagnostics.no_station += 1;
    }

    let reading = station.and_then(|station| {
        let reading = tables
            .observations
            .get(&station.id)
            .and_then(|series| weather::nearest_observation(series, detection.timestamp));
        if reading.is_none() {
            diagnostics.no_observations += 1;
        }
        reading
    });

    let weather_hazard_class = station.and_then(|station| {
        let class = tables
            .forecasts
            .get(&station.id)
            .and_then(|series| weather::weather_hazard_class(series, detection.timestamp));
        if class.is_none() {
            diagnostics.no_forecast += 1;
        }
        class
    });

    let snowiness = station.and_then(|station| {
        let snowiness = weather::snowiness(&tables.snowiness, station.id, detection.date().year());
        if snowiness.is_none() {
            diagnostics.no_snowiness += 1;
        }
        snowiness
    });

    let record = EnrichedFireRecord {
        canonical_id: fire.canonical_id,
        detection_id: detection.id,
        source_id: detection.source_id.clone(),
        timestamp: detection.timestamp,
        latitude: detection.latitude,
        longitude: detection.longitude,
        area_km2: wildfire_geometry::geodesic_area_km2(footprint),
        distance_to_car_road_km: spatial::min_distance_km(footprint, &tables.car_roads),
        distance_to_railway_km: spatial::min_distance_km(footprint, &tables.railways),
        distance_to_river_km: spatial::min_distance_km(footprint, &tables.rivers),
        distance_to_lake_km: spatial::min_distance_km(footprint, &tables.lakes),
        affected_municipalities,
        average_population_density,
        affected_forestry_units: spatial::intersecting_names(footprint, &tables.forestry_units),
        affected_forest_districts: forest.districts,
        forest_hazard_classes: forest.hazard_classes,
        forest_zones: forest.forest_zones,
        seed_zoning_zones: forest.seed_zoning_zones,
        weather_station: station.map(|station| StationRef {
            id: station.id,
            name: station.name.clone(),
        }),
        dry_thunderstorm: reading
            .map(|reading| weather::is_dry_thunderstorm(reading, &options.thunderstorm)),
        weather: reading.cloned(),
        weather_hazard_class,
        snowiness,
    };
    (record, diagnostics)
}

/// Enriches a batch of representatives in parallel.
///
/// Output order follows input order.
#[must_use]
pub fn enrich_fires(
    fires: &[TaggedDetection],
    tables: &ReferenceTables,
    options: &EnrichOptions,
    progress: &dyn ProgressCallback,
) -> (Vec<EnrichedFireRecord>, Diagnostics) {
    let start = Instant::now();
    log::info!("Enriching {} canonical fires", fires.len());
    progress.set_total(fires.len() as u64);
    progress.set_message("Enriching fires".to_string());

    let (records, diagnostics): (Vec<_>, Vec<_>) = fires
        .par_iter()
        .map(|fire| {
            let enriched = enrich_fire(fire, tables, options);
            progress.inc(1);
            enriched
        })
        .unzip();
    let diagnostics = diagnostics
        .into_par_iter()
        .reduce(Diagnostics::default, Diagnostics::merge);

    progress.finish(format!("Enriched {} fires", records.len()));
    diagnostics.log("Fire enrichment");
    log::info!(
        "Enriched {} fires in {:.2}s",
        records.len(),
        start.elapsed().as_secs_f64()
    );
    (records, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use geo::Geometry;
    use wildfire_fire_models::{
        CanonicalId, DetectionId, DistrictNumber, FireDetection, HazardClass, LocationKey,
        Snowiness, WeatherReading, progress::NullProgress,
    };
    use wildfire_reference_models::{
        ForecastReading, ForestDistrict, GeoFeature, HazardClassRow, Municipality, SnowinessRow,
        WeatherStation,
    };

    fn square(min_x: f64, min_y: f64, size: f64) -> Geometry<f64> {
        let (max_x, max_y) = (min_x + size, min_y + size);
        wildfire_geometry::parse(&format!(
            "POLYGON(({min_x} {min_y}, {max_x} {min_y}, {max_x} {max_y}, {min_x} {max_y}, {min_x} {min_y}))"
        ))
        .unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 8, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn fire(id: u64, canonical: u32, footprint: Geometry<f64>) -> TaggedDetection {
        TaggedDetection {
            detection: FireDetection {
                id: DetectionId(id),
                source_id: format!("F-{id}"),
                timestamp: at(10, 14),
                footprint,
                latitude: 52.05,
                longitude: 104.05,
            },
            canonical_id: CanonicalId(canonical),
        }
    }

    fn reading(observed_at: NaiveDateTime, present: &str) -> WeatherReading {
        WeatherReading {
            observed_at,
            precipitation: Some("Осадков нет".to_string()),
            wind_direction: Some("Ветер, дующий с запада".to_string()),
            wind_speed: Some(3.0),
            humidity: Some(40.0),
            temperature: Some(25.5),
            dew_point: Some(10.0),
            pressure: Some(720.0),
            min_temperature: None,
            max_temperature: Some(28.0),
            present_weather: Some(present.to_string()),
            past_weather_1: None,
            past_weather_2: None,
        }
    }

    fn tables() -> ReferenceTables {
        let key = LocationKey::new(Some("Братский"), Some("Тангуйское"), Some("Тангуйская"));
        let mut tables = ReferenceTables {
            car_roads: vec![GeoFeature {
                id: "1".to_string(),
                name: None,
                geometry: square(104.2, 52.0, 0.1),
            }],
            municipalities: vec![Municipality {
                name: "Братский район".to_string(),
                population_density: Some(1.5),
                geometry: square(103.0, 51.0, 3.0),
            }],
            forestry_units: vec![GeoFeature {
                id: "7".to_string(),
                name: Some("Тангуйское".to_string()),
                geometry: square(103.5, 51.5, 1.0),
            }],
            weather_stations: vec![
                WeatherStation {
                    id: 30710,
                    name: "Братск".to_string(),
                    latitude: 52.1,
                    longitude: 104.1,
                },
                WeatherStation {
                    id: 30715,
                    name: "Далеко".to_string(),
                    latitude: 58.0,
                    longitude: 110.0,
                },
            ],
            forest_districts: vec![ForestDistrict {
                row: 1,
                key: key.clone(),
                district: Some(DistrictNumber(12)),
                geometry: square(104.0, 52.0, 0.05),
            }],
            hazard_classes: vec![HazardClassRow {
                key,
                districts: vec![DistrictNumber(12)],
                hazard_class: "II".to_string(),
            }],
            snowiness: vec![SnowinessRow {
                station_id: 30710,
                winter_start: Some(2019),
                winter_end: 2020,
                percent: 30.0,
            }],
            ..ReferenceTables::default()
        };
        tables.observations.insert(
            30710,
            vec![
                reading(at(10, 12), "Гроза (грозы) с осадками или без них."),
                reading(at(11, 12), "Ясно"),
            ],
        );
        tables.forecasts.insert(
            30710,
            vec![ForecastReading {
                valid_at: at(10, 12),
                kp: 1500.0,
            }],
        );
        tables
    }

    #[test]
    fn enriches_every_attribute() {
        let tables = tables();
        let (record, diagnostics) =
            enrich_fire(&fire(3, 1, square(104.0, 52.0, 0.1)), &tables, &EnrichOptions::default());

        assert_eq!(record.canonical_id, CanonicalId(1));
        assert_eq!(record.detection_id, DetectionId(3));
        assert!(record.area_km2 > 70.0 && record.area_km2 < 80.0, "{}", record.area_km2);
        assert!(record.distance_to_car_road_km.unwrap() > 6.0);
        assert_eq!(record.distance_to_railway_km, None);
        assert_eq!(record.affected_municipalities, vec!["Братский район"]);
        assert_eq!(record.average_population_density, Some(1.5));
        assert_eq!(record.affected_forestry_units, vec!["Тангуйское"]);
        assert_eq!(record.affected_forest_districts, vec!["братский/тангуйская/12"]);
        assert_eq!(record.forest_hazard_classes, vec!["II"]);
        assert_eq!(record.weather_station.as_ref().map(|s| s.id), Some(30710));
        assert_eq!(record.weather.as_ref().map(|w| w.observed_at), Some(at(10, 12)));
        assert_eq!(record.weather_hazard_class, Some(HazardClass::III));
        assert_eq!(record.snowiness, Some(Snowiness::Abundant));
        assert_eq!(record.dry_thunderstorm, Some(true));
        assert_eq!(diagnostics.records, 1);
        assert_eq!(diagnostics.joins_matched, 1);
        assert_eq!(diagnostics.joins_unmatched, 1);
        assert_eq!(diagnostics.no_observations, 0);
    }

    #[test]
    fn empty_tables_leave_attributes_absent() {
        let (record, diagnostics) = enrich_fire(
            &fire(1, 1, square(104.0, 52.0, 0.1)),
            &ReferenceTables::default(),
            &EnrichOptions::default(),
        );
        assert_eq!(record.distance_to_car_road_km, None);
        assert_eq!(record.distance_to_lake_km, None);
        assert_eq!(record.average_population_density, None);
        assert!(record.affected_forest_districts.is_empty());
        assert_eq!(record.weather_station, None);
        assert_eq!(record.weather, None);
        assert_eq!(record.dry_thunderstorm, None);
        assert_eq!(diagnostics.no_station, 1);
        assert_eq!(diagnostics.no_observations, 0);
    }

    #[test]
    fn station_without_archive_is_counted() {
        let mut tables = tables();
        tables.observations.clear();
        tables.forecasts.clear();
        let (record, diagnostics) =
            enrich_fire(&fire(1, 1, square(104.0, 52.0, 0.1)), &tables, &EnrichOptions::default());
        assert!(record.weather_station.is_some());
        assert_eq!(record.weather, None);
        assert_eq!(record.weather_hazard_class, None);
        assert_eq!(diagnostics.no_observations, 1);
        assert_eq!(diagnostics.no_forecast, 1);
    }

    #[test]
    fn batch_keeps_input_order_and_sums_diagnostics() {
        let tables = tables();
        let fires: Vec<TaggedDetection> = (1..=20)
            .map(|i| fire(u64::from(i), i, square(104.0, 52.0, 0.1)))
            .collect();
        let (records, diagnostics) =
            enrich_fires(&fires, &tables, &EnrichOptions::default(), &NullProgress);
        let ids: Vec<u32> = records.iter().map(|r| r.canonical_id.0).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
        assert_eq!(diagnostics.records, 20);
        assert_eq!(diagnostics.joins_matched, 20);
    }
}
