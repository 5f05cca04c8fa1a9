//! Run configuration (`wildfire.toml`).
//!
//! ```toml
//! [data]
//! data_dir = "data"
//!
//! [data.tables.fires]
//! path = "fires.csv"
//!
//! [data.tables.weather_observations]
//! path = "weather"            # directory of rp5 archives
//!
//! [resolve]
//! window = "day_gap"
//!
//! [filter.season]
//! start_month = 4
//! start_day = 1
//!
//! [enrich]
//! station_distance = "planar"
//!
//! [districts]
//! target_date = "2020-08-10"
//!
//! [output]
//! dir = "output"
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use wildfire_enrich::EnrichOptions;
use wildfire_filter::FireSeason;
use wildfire_identity::AdjacencyWindow;
use wildfire_reference::DataSources;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "WILDFIRE_CONFIG";

/// Config file used when neither `--config` nor [`CONFIG_ENV`] is set.
pub const DEFAULT_CONFIG: &str = "wildfire.toml";

/// Errors from reading the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`RunConfig`].
    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The fire season start is not a calendar date.
    #[error("Fire season start {month}-{day} is not a valid date")]
    InvalidSeason { month: u32, day: u32 },
    /// District enrichment was requested without a date.
    #[error("No target date: set [districts] target_date or pass --date")]
    MissingTargetDate,
}

/// Identity resolution settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub window: AdjacencyWindow,
}

/// Which filters run and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Drop fires touching technogenic objects or localities.
    pub exclude_noise: bool,
    /// Drop fires touching no forest district.
    pub exclude_non_forest: bool,
    /// Season start applied to each fire's own year.
    pub season: FireSeason,
    /// Fixed season start date; overrides `season` when set.
    pub season_start: Option<NaiveDate>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            exclude_noise: true,
            exclude_non_forest: true,
            season: FireSeason::default(),
            season_start: None,
        }
    }
}

/// Forest-district enrichment settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DistrictConfig {
    pub target_date: Option<NaiveDate>,
}

/// Output file names, relative to `dir`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub tagged: PathBuf,
    pub filtered: PathBuf,
    pub fires: PathBuf,
    pub districts: PathBuf,
    pub summary: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
            tagged: PathBuf::from("tagged_fires.csv"),
            filtered: PathBuf::from("filtered_fires.csv"),
            fires: PathBuf::from("enriched_fires.csv"),
            districts: PathBuf::from("enriched_districts.csv"),
            summary: PathBuf::from("summary.json"),
        }
    }
}

impl OutputConfig {
    /// `file` resolved against `dir` unless already absolute.
    #[must_use]
    pub fn path(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.dir.join(file)
        }
    }
}

/// Everything one run needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub data: DataSources,
    pub resolve: ResolveConfig,
    pub filter: FilterConfig,
    pub enrich: EnrichOptions,
    pub districts: DistrictConfig,
    pub output: OutputConfig,
}

impl RunConfig {
    /// Parses and validates a config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or
    /// [`ConfigError::InvalidSeason`] for an impossible season start.
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// The config path: `explicit`, else [`CONFIG_ENV`], else
    /// [`DEFAULT_CONFIG`].
    #[must_use]
    pub fn locate(explicit: Option<&Path>) -> (PathBuf, bool) {
        if let Some(path) = explicit {
            return (path.to_path_buf(), true);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => (PathBuf::from(path), true),
            None => (PathBuf::from(DEFAULT_CONFIG), false),
        }
    }

    /// Loads the located config. A missing default file means defaults;
    /// a missing file that was asked for is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, requested) = Self::locate(explicit);
        if !requested && !path.exists() {
            log::warn!(
                "{} not found, using defaults (no tables configured)",
                path.display()
            );
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&path, &text)?;
        log::info!(
            "Loaded config {} ({} tables configured)",
            path.display(),
            config.data.tables.len()
        );
        Ok(config)
    }

    /// Target date for district enrichment, `--date` first.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingTargetDate`] if neither is set.
    pub fn target_date(&self, cli: Option<NaiveDate>) -> Result<NaiveDate, ConfigError> {
        cli.or(self.districts.target_date)
            .ok_or(ConfigError::MissingTargetDate)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let season = self.filter.season;
        // 2000 is a leap year, so 29 February passes.
        if season.start_in(2000).is_none() {
            return Err(ConfigError::InvalidSeason {
                month: season.start_month,
                day: season.start_day,
            });
        }
        Ok(())
    }
}
