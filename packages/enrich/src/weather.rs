//! Station matching and weather-derived attributes.

use chrono::NaiveDateTime;
use wildfire_fire_models::{HazardClass, Snowiness, WeatherReading};
use wildfire_reference_models::{ForecastReading, SnowinessRow, WeatherStation};

use crate::{StationDistance, ThunderstormKeywords};

/// Station closest to `(latitude, longitude)`. Ties keep the first station.
#[must_use]
pub fn nearest_station(
    stations: &[WeatherStation],
    location: (f64, f64),
    metric: StationDistance,
) -> Option<&WeatherStation> {
    let mut best: Option<(&WeatherStation, f64)> = None;
    for station in stations {
        let distance = metric.between(location, (station.latitude, station.longitude));
        if !distance.is_finite() {
            continue;
        }
        if best.is_none_or(|(_, shortest)| distance < shortest) {
            best = Some((station, distance));
        }
    }
    best.map(|(station, _)| station)
}

/// Station ids ordered by great-circle distance from `location`, nearest
/// first. Equal distances keep table order.
#[must_use]
pub fn ranked_stations(stations: &[WeatherStation], location: (f64, f64)) -> Vec<i64> {
    let mut ranked: Vec<(i64, f64)> = stations
        .iter()
        .map(|station| {
            let distance =
                wildfire_geometry::haversine_km(location, (station.latitude, station.longitude));
            (station.id, distance)
        })
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked.into_iter().map(|(id, _)| id).collect()
}

/// Entry whose time is closest to `at`. Ties keep the earliest entry in
/// series order.
pub fn nearest_in_time<T>(
    series: &[T],
    at: NaiveDateTime,
    time_of: impl Fn(&T) -> NaiveDateTime,
) -> Option<&T> {
    series
        .iter()
        .min_by_key(|entry| (time_of(entry) - at).abs())
}

/// Observation nearest to `at`.
#[must_use]
pub fn nearest_observation(series: &[WeatherReading], at: NaiveDateTime) -> Option<&WeatherReading> {
    nearest_in_time(series, at, |reading| reading.observed_at)
}

/// Hazard class of the forecast nearest to `at`.
#[must_use]
pub fn weather_hazard_class(series: &[ForecastReading], at: NaiveDateTime) -> Option<HazardClass> {
    nearest_in_time(series, at, |forecast| forecast.valid_at)
        .and_then(|forecast| HazardClass::from_fire_weather_index(forecast.kp))
}

/// Snowiness of the winter that ended in `year` at `station_id`.
#[must_use]
pub fn snowiness(rows: &[SnowinessRow], station_id: i64, year: i32) -> Option<Snowiness> {
    rows.iter()
        .find(|row| row.station_id == station_id && row.winter_end == year)
        .and_then(|row| Snowiness::from_percent(row.percent))
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && text.contains(&keyword.to_lowercase()))
}

/// Whether the observation records thunder without rain.
///
/// True when the weather codes mention a thunderstorm, mention no rain or
/// shower, and the precipitation cell is zero or says none fell. An empty
/// precipitation cell is not evidence of a dry storm.
#[must_use]
pub fn is_dry_thunderstorm(reading: &WeatherReading, keywords: &ThunderstormKeywords) -> bool {
    let text = reading.weather_text().to_lowercase();
    if !contains_any(&text, &keywords.thunderstorm) || contains_any(&text, &keywords.rain) {
        return false;
    }
    reading.precipitation_mm().map_or_else(
        || {
            reading.precipitation.as_deref().is_some_and(|cell| {
                contains_any(&cell.to_lowercase(), &keywords.no_precipitation)
            })
        },
        |mm| mm.abs() < f64::EPSILON,
    )
}
