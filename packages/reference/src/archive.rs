//! Per-station weather observation and forecast archives.
//!
//! Archives are directories holding one CSV per station. A file belongs to
//! a station when its name contains the station id as a whole number
//! (`30710.01.01.2019.csv` is station 30710, not 3071). A schema that maps
//! a `station_id` column takes the station from each row instead.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use wildfire_fire_models::WeatherReading;
use wildfire_reference_models::{
    ForecastArchive, ForecastReading, LoadReport, ObservationArchive, StationSeries,
};

use crate::{
    LoadError,
    reader::{self, RowSkip, RowView},
    schema::TableSchema,
};

/// Lists the `.csv` files of a directory, sorted by name.
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the directory cannot be read.
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Whether `name` contains `station_id` as a complete digit run.
#[must_use]
pub fn contains_station_id(name: &str, station_id: i64) -> bool {
    let id = station_id.to_string();
    name.split(|c: char| !c.is_ascii_digit())
        .any(|run| run == id)
}

/// Builds one observation from an archive row.
///
/// # Errors
///
/// Returns [`RowSkip::Missing`] if the observation time is unusable.
pub fn observation(view: &RowView<'_>) -> Result<WeatherReading, RowSkip> {
    let text = |field: &str| view.text(field).map(ToString::to_string);
    Ok(WeatherReading {
        observed_at: view.required_timestamp("observed_at")?,
        precipitation: text("precipitation"),
        wind_direction: text("wind_direction"),
        wind_speed: view.number("wind_speed"),
        humidity: view.number("humidity"),
        temperature: view.number("temperature"),
        dew_point: view.number("dew_point"),
        pressure: view.number("pressure"),
        min_temperature: view.number("min_temperature"),
        max_temperature: view.number("max_temperature"),
        present_weather: text("present_weather"),
        past_weather_1: text("past_weather_1"),
        past_weather_2: text("past_weather_2"),
    })
}

/// Builds one `kp` forecast from a forecast row.
///
/// # Errors
///
/// Returns [`RowSkip::Missing`] if the time or `kp` value is unusable.
pub fn forecast(view: &RowView<'_>) -> Result<ForecastReading, RowSkip> {
    Ok(ForecastReading {
        valid_at: view.required_timestamp("valid_at")?,
        kp: view.required_number("kp")?,
    })
}

/// Loads the observation archive for the given stations.
///
/// # Errors
///
/// Returns [`LoadError`] if the directory or a file cannot be read.
pub fn load_observations(
    dir: &Path,
    schema: &TableSchema,
    station_ids: &[i64],
) -> Result<(ObservationArchive, LoadReport), LoadError> {
    load_series(dir, schema, station_ids, observation, |reading| {
        reading.observed_at
    })
}

/// Loads the `kp` forecast archive for the given stations.
///
/// # Errors
///
/// Returns [`LoadError`] if the directory or a file cannot be read.
pub fn load_forecasts(
    dir: &Path,
    schema: &TableSchema,
    station_ids: &[i64],
) -> Result<(ForecastArchive, LoadReport), LoadError> {
    load_series(dir, schema, station_ids, forecast, |reading| reading.valid_at)
}

fn load_series<T, F, K>(
    dir: &Path,
    schema: &TableSchema,
    station_ids: &[i64],
    mut build: F,
    time_of: K,
) -> Result<(StationSeries<T>, LoadReport), LoadError>
where
    F: FnMut(&RowView<'_>) -> Result<T, RowSkip>,
    K: Fn(&T) -> NaiveDateTime,
{
    let files = csv_files(dir)?;
    let stations_from_rows = schema.columns.contains_key("station_id");
    let mut report = LoadReport::new(&schema.name);
    let mut series: StationSeries<T> = BTreeMap::new();
    let mut files_read = 0_usize;

    for path in &files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_station = station_ids
            .iter()
            .copied()
            .find(|id| contains_station_id(&name, *id));

        if file_station.is_none() && !stations_from_rows {
            log::debug!("{}: {name} matches no known station", schema.name);
            continue;
        }

        let rows = reader::read_table(path, schema, &mut report, |view| {
            let station = view
                .integer("station_id")
                .or(file_station)
                .ok_or(RowSkip::Missing {
                    field: "station_id",
                })?;
            Ok((station, build(view)?))
        })?;
        files_read += 1;

        for (station, item) in rows {
            series.entry(station).or_default().push(item);
        }
    }

    for items in series.values_mut() {
        items.sort_by_key(|item| time_of(item));
    }

    log::info!(
        "{}: {files_read} of {} files matched, {} stations with data",
        schema.name,
        files.len(),
        series.len()
    );
    Ok((series, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wildfire_archive_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn station_id_must_be_a_whole_digit_run() {
        assert!(contains_station_id("30710.01.01.2019.csv", 30710));
        assert!(contains_station_id("station_30710.csv", 30710));
        assert!(!contains_station_id("30710.csv", 3071));
        assert!(!contains_station_id("130710.csv", 30710));
    }

    #[test]
    fn observations_are_grouped_by_station_and_sorted() {
        let dir = temp_dir("observations");
        std::fs::write(
            dir.join("30710.01.06.2020.csv"),
            "# rp5 preamble\n\
             \"Local time\";\"T\";\"Po\";\"U\";\"DD\";\"Ff\";\"WW\";\"W1\";\"W2\";\"Tn\";\"Tx\";\"RRR\";\"Td\"\n\
             \"02.06.2020 12:00\";\"21.5\";\"720.1\";\"40\";\"West\";\"3\";\"\";\"\";\"\";\"\";\"\";\"Осадков нет\";\"5.2\"\n\
             \"01.06.2020 12:00\";\"18.0\";\"719.0\";\"55\";\"North\";\"2\";\"Гроза\";\"\";\"\";\"\";\"\";\"0.3\";\"8.0\"\n",
        )
        .unwrap();
        std::fs::write(dir.join("99999.csv"), "Local time;T\n01.06.2020 12:00;1\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let schema = registry::schema("weather_observations").unwrap();
        let (archive, report) = load_observations(&dir, &schema, &[30710, 30309]).unwrap();

        assert_eq!(archive.len(), 1);
        let readings = &archive[&30710];
        assert_eq!(readings.len(), 2);
        assert!(readings[0].observed_at < readings[1].observed_at);
        assert_eq!(readings[0].present_weather.as_deref(), Some("Гроза"));
        assert_eq!(readings[1].precipitation.as_deref(), Some("Осадков нет"));
        assert_eq!(readings[1].temperature, Some(21.5));
        assert_eq!(report.rows_loaded, 2);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn forecasts_read_positional_columns() {
        let dir = temp_dir("forecasts");
        let header = (0..11).map(|i| format!("c{i}")).collect::<Vec<_>>().join(";");
        std::fs::write(
            dir.join("kp_30710.csv"),
            format!("{header}\n;;;15.06.2020 00:00;;;;;;;4500\n;;;16.06.2020 00:00;;;;;;;bad\n"),
        )
        .unwrap();

        let schema = registry::schema("weather_forecasts").unwrap();
        let (archive, report) = load_forecasts(&dir, &schema, &[30710]).unwrap();

        assert_eq!(archive[&30710].len(), 1);
        assert!((archive[&30710][0].kp - 4500.0).abs() < f64::EPSILON);
        assert_eq!(report.skipped_missing, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = std::env::temp_dir().join("wildfire_archive_does_not_exist");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(matches!(csv_files(&dir), Err(LoadError::Io { .. })));
    }
}
