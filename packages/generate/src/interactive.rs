//! Interactive menu for the generate tool.
//!
//! Provides a terminal-based UI using `dialoguer` that lets users pick an
//! action and the areas to run it on without memorizing CLI flags.

use std::path::PathBuf;

use civic_hex_area::{DataPaths, all_areas};
use civic_hex_cli_utils::{IndicatifProgress, MultiProgress};
use civic_hex_hexagon::progress::ProgressCallback as _;
use dialoguer::{Input, MultiSelect, Select};

use crate::aggregate_area;
use crate::annotate::annotate_points;
use crate::tiles::build_pmtiles;

/// Actions offered by the menu.
enum Action {
    All,
    Aggregate,
    Pmtiles,
    Annotate,
}

impl Action {
    const ALL: &[Self] = &[Self::All, Self::Aggregate, Self::Pmtiles, Self::Annotate];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::All => "Aggregate and build tiles",
            Self::Aggregate => "Aggregate hexagons",
            Self::Pmtiles => "Build PMTiles",
            Self::Annotate => "Annotate points with nearest distance",
        }
    }
}

/// Runs the interactive generation menu.
///
/// # Errors
///
/// Returns an error if user input fails or the chosen action fails.
pub fn run(multi: &MultiProgress, paths: &DataPaths) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to generate?")
        .items(&labels)
        .default(0)
        .interact()?;
    let action = &Action::ALL[idx];

    if matches!(action, Action::Annotate) {
        return annotate(paths);
    }

    let areas = all_areas();
    let names: Vec<String> = areas
        .iter()
        .map(|a| format!("{} ({})", a.name, a.id))
        .collect();
    let defaults = vec![true; areas.len()];
    let picked = MultiSelect::new()
        .with_prompt("Areas (space to toggle)")
        .items(&names)
        .defaults(&defaults)
        .interact()?;

    if picked.is_empty() {
        log::warn!("No areas selected");
        return Ok(());
    }

    let steps = IndicatifProgress::steps_bar(multi, "Areas", picked.len() as u64);
    for area in picked.into_iter().map(|i| &areas[i]) {
        steps.set_message(area.name.clone());

        if matches!(action, Action::All | Action::Aggregate) {
            let bar = IndicatifProgress::features_bar(multi, &format!("Loading {}", area.id));
            aggregate_area(area, paths, &bar)?;
        }
        if matches!(action, Action::All | Action::Pmtiles) {
            build_pmtiles(
                &paths.output_for(area),
                &paths.pmtiles_for(area),
                &area.layer,
            )?;
        }

        steps.inc(1);
    }
    steps.finish("Done".to_string());

    Ok(())
}

fn annotate(paths: &DataPaths) -> Result<(), Box<dyn std::error::Error>> {
    let src = paths.src_dir.display().to_string();
    let points: String = Input::new()
        .with_prompt("Points GeoJSON to annotate")
        .with_initial_text(format!("{src}/"))
        .interact_text()?;
    let reference: String = Input::new()
        .with_prompt("Reference points GeoJSON")
        .with_initial_text(format!("{src}/"))
        .interact_text()?;
    let key: String = Input::new()
        .with_prompt("Property name")
        .default("dist_m".to_string())
        .interact_text()?;
    let output: String = Input::new()
        .with_prompt("Output file")
        .default(points.clone())
        .interact_text()?;

    annotate_points(
        &PathBuf::from(points),
        &PathBuf::from(reference),
        &key,
        &PathBuf::from(output),
    )?;

    Ok(())
}
