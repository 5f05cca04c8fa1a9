//! Pipeline stages shared by the subcommands.
//!
//! Each stage logs its own timing; [`RunSummary`] collects what every
//! stage reports so a run can be audited from one JSON file.

use std::{
    collections::BTreeMap,
    fs::File,
    path::{Path, PathBuf},
    time::Instant,
};

use chrono::NaiveDate;
use serde::Serialize;
use wildfire_cli_utils::{IndicatifProgress, MultiProgress};
use wildfire_enrich::{Diagnostics, export};
use wildfire_filter::Filtered;
use wildfire_fire_models::{
    EnrichedDistrictRecord, EnrichedFireRecord, FireDetection, TaggedDetection,
};
use wildfire_matching::MatchSummary;
use wildfire_reference::{NoiseTables, ReferenceTables, fires};
use wildfire_reference_models::LoadReport;

use crate::config::RunConfig;

pub type BoxError = Box<dyn std::error::Error>;

/// Counters from every stage that ran.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub tables: Vec<LoadReport>,
    pub detections: Option<usize>,
    pub canonical_fires: Option<usize>,
    /// Fires removed by each filter step.
    pub removed: BTreeMap<String, usize>,
    pub retained_fires: Option<usize>,
    pub fire_diagnostics: Option<Diagnostics>,
    pub district_diagnostics: Option<Diagnostics>,
    pub hazard_matching: Option<MatchSummary>,
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    /// Writes the summary as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write(&self, path: &Path) -> Result<(), BoxError> {
        ensure_parent(path)?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        log::info!("Wrote run summary to {}", path.display());
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

fn distinct_fires(detections: &[TaggedDetection]) -> usize {
    wildfire_filter::collapse_to_representative(detections).len()
}

/// Loads raw detections, ignoring any canonical ids in the file.
///
/// # Errors
///
/// Returns an error if the fire table is not configured or unreadable.
pub fn load_detections(
    config: &RunConfig,
    input: Option<&Path>,
    summary: &mut RunSummary,
) -> Result<Vec<FireDetection>, BoxError> {
    let (rows, report) = config.data.load_fires(input)?;
    summary.tables.push(report);
    let detections = fires::into_detections(rows);
    summary.detections = Some(detections.len());
    Ok(detections)
}

/// Loads detections tagged by an earlier `resolve`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or a row has no canonical
/// id.
pub fn load_tagged(
    config: &RunConfig,
    input: Option<&Path>,
    summary: &mut RunSummary,
) -> Result<Vec<TaggedDetection>, BoxError> {
    let (rows, report) = config.data.load_fires(input)?;
    summary.tables.push(report);
    let tagged = fires::into_tagged(rows)?;
    summary.detections = Some(tagged.len());
    summary.canonical_fires = Some(distinct_fires(&tagged));
    Ok(tagged)
}

/// Groups detections into canonical fires.
///
/// # Errors
///
/// Returns an error if resolution finds an inconsistent cluster.
pub fn resolve(
    config: &RunConfig,
    detections: &[FireDetection],
    multi: &MultiProgress,
    summary: &mut RunSummary,
) -> Result<Vec<TaggedDetection>, BoxError> {
    let progress = IndicatifProgress::records_bar(multi, "Resolving canonical fires");
    let assignment = wildfire_identity::resolve_canonical_fires(
        detections,
        config.resolve.window,
        progress.as_ref(),
    )?;
    let tagged = assignment.tag(detections)?;
    summary.canonical_fires = Some(distinct_fires(&tagged));
    Ok(tagged)
}

fn record(summary: &mut RunSummary, step: &str, filtered: Filtered) -> Vec<TaggedDetection> {
    summary.removed.insert(step.to_string(), filtered.removed.len());
    filtered.retained
}

/// Runs the configured filters in order: noise, non-forest, season.
///
/// # Errors
///
/// Returns an error if a reference table cannot be loaded.
pub fn filter(
    config: &RunConfig,
    tagged: Vec<TaggedDetection>,
    summary: &mut RunSummary,
) -> Result<Vec<TaggedDetection>, BoxError> {
    let start = Instant::now();
    let settings = config.filter;
    let mut retained = tagged;

    if settings.exclude_noise {
        let noise = NoiseTables::load(&config.data)?;
        summary.tables.extend(noise.reports);
        retained = record(
            summary,
            "technogenic_objects",
            wildfire_filter::exclude_intersecting(&retained, &noise.technogenic_objects),
        );
        retained = record(
            summary,
            "localities",
            wildfire_filter::exclude_intersecting(&retained, &noise.localities),
        );
    }

    if settings.exclude_non_forest {
        let (districts, reports) = config.data.load_forest_districts()?;
        summary.tables.extend(reports);
        if districts.is_empty() {
            log::warn!("No forest districts loaded, skipping the non-forest filter");
        } else {
            retained = record(
                summary,
                "non_forest",
                wildfire_filter::exclude_non_forest(&retained, &districts),
            );
        }
    }

    let season = match settings.season_start {
        Some(season_start) => wildfire_filter::exclude_out_of_season(&retained, season_start),
        None => wildfire_filter::exclude_outside_fire_season(&retained, settings.season),
    };
    retained = record(summary, "out_of_season", season);

    summary.retained_fires = Some(distinct_fires(&retained));
    log::info!(
        "Filtering kept {} detections in {:.2}s",
        retained.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(retained)
}

/// Loads every enrichment table.
///
/// # Errors
///
/// Returns an error if a configured table cannot be read.
pub fn load_reference(
    config: &RunConfig,
    summary: &mut RunSummary,
) -> Result<ReferenceTables, BoxError> {
    let start = Instant::now();
    let mut tables = ReferenceTables::load(&config.data)?;
    summary.tables.append(&mut tables.reports);
    log::info!(
        "Loaded reference tables in {:.2}s",
        start.elapsed().as_secs_f64()
    );
    Ok(tables)
}

/// Enriches one representative per canonical fire.
#[must_use]
pub fn enrich(
    config: &RunConfig,
    tables: &ReferenceTables,
    tagged: &[TaggedDetection],
    multi: &MultiProgress,
    summary: &mut RunSummary,
) -> Vec<EnrichedFireRecord> {
    let representatives = wildfire_filter::collapse_to_representative(tagged);
    let progress = IndicatifProgress::records_bar(multi, "Enriching fires");
    let (records, diagnostics) = wildfire_enrich::enrich_fires(
        &representatives,
        tables,
        &config.enrich,
        progress.as_ref(),
    );
    summary.fire_diagnostics = Some(diagnostics);
    records
}

/// Enriches every forest district for `target`.
#[must_use]
pub fn districts(
    config: &RunConfig,
    tables: &ReferenceTables,
    target: NaiveDate,
    multi: &MultiProgress,
    summary: &mut RunSummary,
) -> Vec<EnrichedDistrictRecord> {
    let progress = IndicatifProgress::records_bar(multi, "Enriching forest districts");
    let (records, diagnostics, matching) = wildfire_enrich::enrich_districts(
        &tables.forest_districts,
        tables,
        target,
        &config.enrich,
        progress.as_ref(),
    );
    summary.district_diagnostics = Some(diagnostics);
    summary.hazard_matching = Some(matching);
    records
}

/// Writes tagged detections, creating the output directory.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_tagged(
    path: &Path,
    detections: &[TaggedDetection],
    summary: &mut RunSummary,
) -> Result<(), BoxError> {
    ensure_parent(path)?;
    export::write_tagged(path, detections)?;
    summary.outputs.push(path.to_path_buf());
    Ok(())
}

/// Writes enriched fires, creating the output directory.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_fires(
    path: &Path,
    records: &[EnrichedFireRecord],
    summary: &mut RunSummary,
) -> Result<(), BoxError> {
    ensure_parent(path)?;
    export::write_fires(path, records)?;
    summary.outputs.push(path.to_path_buf());
    Ok(())
}

/// Writes enriched districts, creating the output directory.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_districts(
    path: &Path,
    records: &[EnrichedDistrictRecord],
    summary: &mut RunSummary,
) -> Result<(), BoxError> {
    ensure_parent(path)?;
    export::write_districts(path, records)?;
    summary.outputs.push(path.to_path_buf());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildfire_reference::TableSource;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wildfire_cli_{name}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config_for(dir: &Path) -> RunConfig {
        let mut config = RunConfig::default();
        config.data.data_dir = dir.to_path_buf();
        config.data.tables.insert(
            "fires".to_string(),
            TableSource {
                path: PathBuf::from("fires.csv"),
                schema: None,
            },
        );
        config.output.dir = dir.join("out");
        config
    }

    const FIRES: &str = "fire_id;dt;lat;lon;poly\n\
        A;01.06.2020 10:00;52.05;104.05;POLYGON((104 52,104.1 52,104.1 52.1,104 52.1,104 52))\n\
        B;02.06.2020 10:00;52.05;104.05;POLYGON((104.05 52.05,104.15 52.05,104.15 52.15,104.05 52.15,104.05 52.05))\n\
        C;01.03.2020 10:00;55.05;110.05;POLYGON((110 55,110.1 55,110.1 55.1,110 55.1,110 55))\n";

    #[test]
    fn resolve_filter_and_enrich_without_reference_tables() {
        let dir = scratch("pipeline");
        std::fs::write(dir.join("fires.csv"), FIRES).unwrap();
        let config = config_for(&dir);
        let multi = MultiProgress::with_draw_target(indicatif_hidden());
        let mut summary = RunSummary::default();

        let detections = load_detections(&config, None, &mut summary).unwrap();
        assert_eq!(detections.len(), 3);

        let tagged = resolve(&config, &detections, &multi, &mut summary).unwrap();
        assert_eq!(summary.canonical_fires, Some(2));
        assert_eq!(tagged[0].canonical_id, tagged[1].canonical_id);

        let tagged_path = config.output.path(&config.output.tagged);
        write_tagged(&tagged_path, &tagged, &mut summary).unwrap();
        let reread = load_tagged(&config, Some(&tagged_path), &mut summary).unwrap();
        assert_eq!(reread.len(), 3);

        // Only the season filter has data to act on: fire C starts in March.
        let filtered = filter(&config, reread, &mut summary).unwrap();
        assert_eq!(summary.removed.get("out_of_season"), Some(&1));
        assert_eq!(summary.retained_fires, Some(1));

        let tables = load_reference(&config, &mut summary).unwrap();
        let records = enrich(&config, &tables, &filtered, &multi, &mut summary);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_id, "A");
        assert_eq!(summary.fire_diagnostics.map(|d| d.no_station), Some(1));

        let summary_path = config.output.path(&config.output.summary);
        summary.write(&summary_path).unwrap();
        let json = std::fs::read_to_string(&summary_path).unwrap();
        assert!(json.contains("\"canonical_fires\": 2"));

        std::fs::remove_dir_all(&dir).ok();
    }

    fn indicatif_hidden() -> wildfire_cli_utils::ProgressDrawTarget {
        wildfire_cli_utils::ProgressDrawTarget::hidden()
    }
}
