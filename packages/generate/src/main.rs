#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI tool for generating the hexagon map datasets.
//!
//! Aggregates census tracts onto H3 hexagons per area, then runs
//! tippecanoe to produce `PMTiles` archives for the map site.

use std::path::PathBuf;

use civic_hex_area::{AreaDefinition, DataPaths, all_areas};
use civic_hex_cli_utils::{IndicatifProgress, MultiProgress};
use civic_hex_generate::annotate::annotate_points;
use civic_hex_generate::tiles::build_pmtiles;
use civic_hex_generate::{aggregate_area, interactive, resolve_areas};
use civic_hex_hexagon::progress::ProgressCallback as _;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "civic_hex_generate", about = "Hexagon map generation tool")]
struct Cli {
    /// Directory holding the downloaded source datasets
    #[arg(long, global = true)]
    src_dir: Option<PathBuf>,

    /// Directory the processed outputs are written to
    #[arg(long, global = true)]
    processed_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate census tracts onto hexagons
    Aggregate {
        /// Area to generate (repeatable; all areas when omitted)
        #[arg(long = "area")]
        areas: Vec<String>,
    },
    /// Build `PMTiles` from previously aggregated `GeoJSON`
    Pmtiles {
        /// Area to build (repeatable; all areas when omitted)
        #[arg(long = "area")]
        areas: Vec<String>,
    },
    /// Aggregate and build `PMTiles`
    All {
        /// Area to generate (repeatable; all areas when omitted)
        #[arg(long = "area")]
        areas: Vec<String>,
    },
    /// Tag point features with the distance to the nearest reference point
    Annotate {
        /// Point `GeoJSON` to annotate
        #[arg(long)]
        points: PathBuf,
        /// Reference point `GeoJSON`
        #[arg(long)]
        reference: PathBuf,
        /// Property name for the distance in meters
        #[arg(long, default_value = "dist_m")]
        key: String,
        /// Output file (defaults to overwriting `--points`)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List the configured areas
    List,
    /// Pick an action from a menu
    Interactive,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = civic_hex_cli_utils::init_logger();
    let cli = Cli::parse();

    let defaults = DataPaths::default();
    let paths = DataPaths {
        src_dir: cli.src_dir.unwrap_or(defaults.src_dir),
        processed_dir: cli.processed_dir.unwrap_or(defaults.processed_dir),
    };

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Aggregate { areas } => {
            run_areas(&multi, &paths, &resolve_areas(&areas)?, true, false)?;
        }
        Commands::Pmtiles { areas } => {
            run_areas(&multi, &paths, &resolve_areas(&areas)?, false, true)?;
        }
        Commands::All { areas } => {
            run_areas(&multi, &paths, &resolve_areas(&areas)?, true, true)?;
        }
        Commands::Annotate {
            points,
            reference,
            key,
            output,
        } => {
            let output = output.unwrap_or_else(|| points.clone());
            annotate_points(&points, &reference, &key, &output)?;
        }
        Commands::List => {
            for area in all_areas() {
                println!(
                    "{:<18} {:<20} res {:<2} {}",
                    area.id, area.name, area.resolution, area.description
                );
            }
        }
        Commands::Interactive => interactive::run(&multi, &paths)?,
    }

    Ok(())
}

/// Runs aggregation and/or tile building for each area in turn.
fn run_areas(
    multi: &MultiProgress,
    paths: &DataPaths,
    areas: &[AreaDefinition],
    aggregate: bool,
    pmtiles: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let steps = IndicatifProgress::steps_bar(multi, "Areas", areas.len() as u64);

    for area in areas {
        steps.set_message(area.name.clone());

        if aggregate {
            let bar = IndicatifProgress::features_bar(multi, &format!("Loading {}", area.id));
            aggregate_area(area, paths, &bar)?;
        }
        if pmtiles {
            build_pmtiles(
                &paths.output_for(area),
                &paths.pmtiles_for(area),
                &area.layer,
            )?;
        }

        steps.inc(1);
    }

    steps.finish(format!("{} areas done", areas.len()));
    Ok(())
}
