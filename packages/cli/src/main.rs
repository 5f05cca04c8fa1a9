#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `wildfire`: canonical fire resolution, filtering and enrichment.
//!
//! Each stage can run on its own, reading the previous stage's CSV, or
//! the whole chain can run at once with `wildfire run`. Logging goes
//! through [`wildfire_cli_utils::init_logger`]; set `RUST_LOG=info` to see
//! stage timings and load reports.

mod config;
mod pipeline;

use std::{path::PathBuf, time::Instant};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use wildfire_cli_utils::IndicatifProgress;

use crate::{
    config::RunConfig,
    pipeline::{BoxError, RunSummary},
};

#[derive(Parser)]
#[command(name = "wildfire", about = "Wildfire event enrichment")]
struct Cli {
    /// Run config (defaults to `$WILDFIRE_CONFIG`, then `wildfire.toml`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Group raw detections into canonical fires and write them tagged
    Resolve {
        /// Raw detections (defaults to the configured `fires` table)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Drop noise, non-forest and out-of-season fires from a tagged batch
    Filter {
        /// Tagged detections (defaults to the configured tagged output)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Enrich one representative per canonical fire
    Enrich {
        /// Tagged detections (defaults to the configured filtered output)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Enrich every forest district for a target date
    Districts {
        /// Target date, `YYYY-MM-DD` (overrides `[districts] target_date`)
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Resolve, filter and enrich in one go, plus districts if a target
    /// date is configured
    Run {
        /// Raw detections (defaults to the configured `fires` table)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// List the embedded table schemas
    Schemas {
        /// Print one schema's TOML instead of the list
        name: Option<String>,
    },
}

fn list_schemas(name: Option<&str>) -> Result<(), BoxError> {
    if let Some(name) = name {
        let source = wildfire_reference::registry::schema_source(name)
            .ok_or_else(|| format!("Unknown schema: {name}"))?;
        print!("{source}");
        return Ok(());
    }

    println!("{:<24} DESCRIPTION", "TABLE");
    println!("{}", "-".repeat(72));
    for schema in wildfire_reference::registry::all_schemas() {
        println!("{:<24} {}", schema.name, schema.description);
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<(), BoxError> {
    let multi = wildfire_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = RunConfig::load(cli.config.as_deref())?;
    let output = &config.output;
    let mut summary = RunSummary::default();
    let start = Instant::now();

    match cli.command {
        Commands::Resolve {
            input,
            output: path,
        } => {
            let detections = pipeline::load_detections(&config, input.as_deref(), &mut summary)?;
            let tagged = pipeline::resolve(&config, &detections, &multi, &mut summary)?;
            let path = path.unwrap_or_else(|| output.path(&output.tagged));
            pipeline::write_tagged(&path, &tagged, &mut summary)?;
        }
        Commands::Filter {
            input,
            output: path,
        } => {
            let input = input.unwrap_or_else(|| output.path(&output.tagged));
            let tagged = pipeline::load_tagged(&config, Some(&input), &mut summary)?;
            let filtered = pipeline::filter(&config, tagged, &mut summary)?;
            let path = path.unwrap_or_else(|| output.path(&output.filtered));
            pipeline::write_tagged(&path, &filtered, &mut summary)?;
        }
        Commands::Enrich {
            input,
            output: path,
        } => {
            let input = input.unwrap_or_else(|| output.path(&output.filtered));
            let tagged = pipeline::load_tagged(&config, Some(&input), &mut summary)?;
            let tables = pipeline::load_reference(&config, &mut summary)?;
            let records = pipeline::enrich(&config, &tables, &tagged, &multi, &mut summary);
            let path = path.unwrap_or_else(|| output.path(&output.fires));
            pipeline::write_fires(&path, &records, &mut summary)?;
        }
        Commands::Districts { date, output: path } => {
            let target = config.target_date(date)?;
            let tables = pipeline::load_reference(&config, &mut summary)?;
            let records = pipeline::districts(&config, &tables, target, &multi, &mut summary);
            let path = path.unwrap_or_else(|| output.path(&output.districts));
            pipeline::write_districts(&path, &records, &mut summary)?;
        }
        Commands::Run { input } => {
            let target = config.districts.target_date;
            let stages = IndicatifProgress::stages_bar(&multi, 3 + u64::from(target.is_some()));

            stages.set_message("Resolving".to_string());
            let detections = pipeline::load_detections(&config, input.as_deref(), &mut summary)?;
            let tagged = pipeline::resolve(&config, &detections, &multi, &mut summary)?;
            pipeline::write_tagged(&output.path(&output.tagged), &tagged, &mut summary)?;
            stages.inc(1);

            stages.set_message("Filtering".to_string());
            let filtered = pipeline::filter(&config, tagged, &mut summary)?;
            pipeline::write_tagged(&output.path(&output.filtered), &filtered, &mut summary)?;
            stages.inc(1);

            stages.set_message("Enriching fires".to_string());
            let tables = pipeline::load_reference(&config, &mut summary)?;
            let records = pipeline::enrich(&config, &tables, &filtered, &multi, &mut summary);
            pipeline::write_fires(&output.path(&output.fires), &records, &mut summary)?;
            stages.inc(1);

            match target {
                Some(target) => {
                    stages.set_message("Enriching districts".to_string());
                    let records =
                        pipeline::districts(&config, &tables, target, &multi, &mut summary);
                    pipeline::write_districts(
                        &output.path(&output.districts),
                        &records,
                        &mut summary,
                    )?;
                    stages.inc(1);
                }
                None => log::info!("No [districts] target_date configured, skipping districts"),
            }
            stages.finish("Run complete".to_string());
        }
        Commands::Schemas { name } => return list_schemas(name.as_deref()),
    }

    summary.write(&output.path(&output.summary))?;
    log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}
