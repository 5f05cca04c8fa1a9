//! Weather station references and observations.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// The weather station a fire or district was matched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationRef {
    /// Synoptic (WMO) index of the station.
    pub id: i64,
    pub name: String,
}

/// One synoptic observation (rp5 archive layout).
///
/// Numeric columns that fail to parse are `None`. Precipitation and the
/// weather-code columns are free text in the archive ("Осадков нет",
/// "Гроза слабая или умеренная без града, но с дождем") and are kept raw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub observed_at: NaiveDateTime,
    /// `RRR`
    pub precipitation: Option<String>,
    /// `DD`
    pub wind_direction: Option<String>,
    /// `Ff`, m/s
    pub wind_speed: Option<f64>,
    /// `U`, %
    pub humidity: Option<f64>,
    /// `T`, °C
    pub temperature: Option<f64>,
    /// `Td`, °C
    pub dew_point: Option<f64>,
    /// `Po`, mm Hg
    pub pressure: Option<f64>,
    /// `Tn`, °C
    pub min_temperature: Option<f64>,
    /// `Tx`, °C
    pub max_temperature: Option<f64>,
    /// `WW`
    pub present_weather: Option<String>,
    /// `W1`
    pub past_weather_1: Option<String>,
    /// `W2`
    pub past_weather_2: Option<String>,
}

impl WeatherReading {
    /// Present and past weather code text joined for keyword checks.
    #[must_use]
    pub fn weather_text(&self) -> String {
        [
            &self.present_weather,
            &self.past_weather_1,
            &self.past_weather_2,
        ]
        .iter()
        .filter_map(|code| code.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Precipitation amount in mm when the `RRR` column is numeric.
    #[must_use]
    pub fn precipitation_mm(&self) -> Option<f64> {
        self.precipitation
            .as_deref()
            .and_then(|value| value.trim().replace(',', ".").parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }
}
