#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Library for generating the hexagon map datasets.
//!
//! For each configured area, loads the parish boundary, the
//! point-of-interest dataset and the census tracts, runs the areal-weighted
//! aggregation and writes the result as a `GeoJSON` `FeatureCollection`
//! under the processed data directory. [`tiles`] turns those files into
//! `PMTiles` archives via tippecanoe, and [`annotate`] tags point datasets
//! with distances to a reference set.
//!
//! All inputs are loaded before aggregation starts and outputs are written
//! atomically, so an interrupted run never leaves a partial file behind.

pub mod annotate;
pub mod interactive;
pub mod tiles;

use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use civic_hex_area::{AreaDefinition, AreaError, DataPaths, all_areas, area_by_id};
use civic_hex_hexagon::progress::ProgressCallback;
use civic_hex_hexagon::source::load_source_features;
use civic_hex_hexagon::{
    AggregateError, AggregateStats, Aggregator, GridError, H3Grid, to_feature_collection,
};
use civic_hex_spatial::{BoundaryIndex, PointIndex, SpatialError};
use geojson::FeatureCollection;
use tempfile::NamedTempFile;

/// Errors that can occur while generating outputs.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// An input dataset could not be loaded.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// The aggregation run aborted.
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// The configured grid is unusable.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// An area could not be resolved.
    #[error(transparent)]
    Area(#[from] AreaError),

    /// Output serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A file could not be written.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The tile builder could not be run or reported failure.
    #[error("tippecanoe failed: {message}")]
    Tippecanoe {
        /// Exit status or spawn error.
        message: String,
    },

    /// The tile builder finished but its output is not a `PMTiles`
    /// archive.
    #[error("{0} is not a PMTiles archive")]
    NotPmtiles(PathBuf),
}

impl GenerateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Summary of one area's aggregation run.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    /// Area that was generated.
    pub area_id: String,
    /// File the `FeatureCollection` was written to.
    pub output: PathBuf,
    /// Feature outcome counts.
    pub stats: AggregateStats,
    /// Hexagon features written.
    pub hexagons: usize,
    /// Attribute total redistributed over hexagons.
    pub distributed_total: f64,
}

/// Resolves `--area` arguments to definitions. No ids means every
/// built-in area.
///
/// # Errors
///
/// Returns [`AreaError::Unknown`] for the first id that is not configured.
pub fn resolve_areas(ids: &[String]) -> Result<Vec<AreaDefinition>, AreaError> {
    if ids.is_empty() {
        return Ok(all_areas());
    }
    ids.iter().map(|id| area_by_id(id)).collect()
}

/// Builds the grid configured for `area`.
///
/// # Errors
///
/// Returns [`GridError::Resolution`] if the resolution is out of range.
pub fn grid_for(area: &AreaDefinition, boundary: &BoundaryIndex) -> Result<H3Grid, GridError> {
    let grid = H3Grid::new(area.resolution)?;
    Ok(match boundary.extent() {
        Some(extent) if area.clip_to_boundary => grid.with_extent(extent),
        _ => grid,
    })
}

/// Runs the full aggregation for one area and writes its output file.
///
/// # Errors
///
/// Returns an error if any input fails to load, the aggregation aborts, or
/// the output cannot be written. No output is written on error.
pub fn aggregate_area(
    area: &AreaDefinition,
    paths: &DataPaths,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<AggregateReport, GenerateError> {
    log::info!("Generating {} ({})", area.name, area.id);

    let boundary = BoundaryIndex::load(&paths.boundary_for(area), &area.boundary_fields)?;
    let points = PointIndex::load(&paths.points_for(area))?;
    let features =
        load_source_features(&paths.tracts_for(area), &area.tract_fields, area.attribute)?;
    let grid = grid_for(area, &boundary)?;

    progress.set_total(features.len() as u64);
    progress.set_message(format!("Aggregating {}", area.id));

    let mut aggregator = Aggregator::new(&grid, &boundary, &points, area.attribute);
    let stats = aggregator.add_all(&features, progress.as_ref())?;
    let output = aggregator.finish();

    let path = paths.output_for(area);
    write_geojson_atomic(&path, &to_feature_collection(&output, &area.labels))?;

    let report = AggregateReport {
        area_id: area.id.clone(),
        output: path,
        stats,
        hexagons: output.hexagons.len(),
        distributed_total: output.distributed_total(),
    };

    log::info!(
        "{}: {} hexagons, {} uncovered, {} outside boundary, {:.2} {} redistributed -> {}",
        report.area_id,
        report.hexagons,
        stats.uncovered,
        stats.filtered_out,
        report.distributed_total,
        area.attribute,
        report.output.display(),
    );
    progress.finish(format!("{}: {} hexagons", area.id, report.hexagons));

    Ok(report)
}

/// Writes `collection` to `path` without ever exposing a partial file.
///
/// The JSON is written to a temporary file in the destination directory and
/// then persisted over `path`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written or moved into place.
pub fn write_geojson_atomic(path: &Path, collection: &FeatureCollection) -> Result<(), GenerateError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| GenerateError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| GenerateError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, collection)?;
        writer.flush().map_err(|e| GenerateError::io(path, e))?;
    }
    tmp.persist(path)
        .map_err(|e| GenerateError::io(path, e.error))?;

    log::debug!(
        "Wrote {} features to {}",
        collection.features.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use civic_hex_hexagon::progress::null_progress;
    use civic_hex_spatial::parse_feature_collection;

    use super::*;

    const AREA: &str = r#"
        id = "fixture"
        name = "Fixture"
        attribute = "children_under_14"
        resolution = 8
        layer = "fixture_h3"
        output = "fixture_h3.geojson"

        [inputs]
        tracts = "tracts.geojson"
        boundary = "boundary.geojson"
        points = "points.geojson"

        [labels]
        attribute = "children_under_14"
        point_count = "playground_count"
        ratio = "children_per_playground"
    "#;

    fn square(x: f64, y: f64, half: f64) -> serde_json::Value {
        serde_json::json!([[
            [x - half, y - half],
            [x + half, y - half],
            [x + half, y + half],
            [x - half, y + half],
            [x - half, y - half]
        ]])
    }

    fn write_json(path: &Path, value: &serde_json::Value) {
        std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    fn write_fixture(src: &Path) {
        write_json(
            &src.join("boundary.geojson"),
            &serde_json::json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": { "DICOFRE": "110601", "FREGUESIA": "Santo António" },
                    "geometry": { "type": "Polygon", "coordinates": square(-9.14, 38.72, 0.05) }
                }]
            }),
        );
        write_json(
            &src.join("points.geojson"),
            &serde_json::json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "properties": {},
                    "geometry": { "type": "Point", "coordinates": [-9.141, 38.721] }
                }]
            }),
        );
        write_json(
            &src.join("tracts.geojson"),
            &serde_json::json!({
                "type": "FeatureCollection",
                "features": [
                    {
                        "type": "Feature",
                        "properties": {
                            "BGRI2021": "inside", "DTMNFR21": "110601",
                            "N_INDIVIDUOS": 400, "N_INDIVIDUOS_0_14": 60
                        },
                        "geometry": { "type": "Polygon", "coordinates": square(-9.14, 38.72, 0.006) }
                    },
                    {
                        "type": "Feature",
                        "properties": {
                            "BGRI2021": "porto", "DTMNFR21": "131210",
                            "N_INDIVIDUOS": 100, "N_INDIVIDUOS_0_14": 10
                        },
                        "geometry": { "type": "Polygon", "coordinates": square(-8.61, 41.15, 0.002) }
                    }
                ]
            }),
        );
    }

    #[test]
    fn aggregates_area_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths {
            src_dir: dir.path().join("src"),
            processed_dir: dir.path().join("processed"),
        };
        std::fs::create_dir_all(&paths.src_dir).unwrap();
        write_fixture(&paths.src_dir);
        let area = civic_hex_area::parse_area_toml(AREA).unwrap();

        let report = aggregate_area(&area, &paths, &null_progress()).unwrap();

        assert_eq!(report.stats.filtered_out, 1);
        assert_eq!(report.stats.distributed, 1);
        assert!(report.hexagons > 1);
        assert!((report.distributed_total - 60.0).abs() < 0.5);

        let raw = std::fs::read_to_string(&report.output).unwrap();
        let written = parse_feature_collection(&raw).unwrap();
        assert_eq!(written.features.len(), report.hexagons);
        let playgrounds: u64 = written
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["playground_count"].as_u64().unwrap())
            .sum();
        assert_eq!(playgrounds, 1);
    }

    #[test]
    fn missing_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths {
            src_dir: dir.path().join("src"),
            processed_dir: dir.path().join("processed"),
        };
        let area = civic_hex_area::parse_area_toml(AREA).unwrap();

        let result = aggregate_area(&area, &paths, &null_progress());

        assert!(matches!(
            result,
            Err(GenerateError::Spatial(SpatialError::Io { .. }))
        ));
        assert!(!paths.output_for(&area).exists());
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.geojson");
        let empty = FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: None,
        };

        write_geojson_atomic(&path, &empty).unwrap();
        std::fs::write(&path, "stale").unwrap();
        write_geojson_atomic(&path, &empty).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(parse_feature_collection(&raw).unwrap().features.is_empty());
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn resolves_requested_areas() {
        assert_eq!(resolve_areas(&[]).unwrap().len(), all_areas().len());

        let picked = resolve_areas(&["pre_escolar".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "pre_escolar");

        assert!(matches!(
            resolve_areas(&["pre_escolar".to_string(), "nope".to_string()]),
            Err(AreaError::Unknown(_))
        ));
    }
}
