#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Hexagon map area definitions.
//!
//! An area pairs one redistributed attribute with one point-of-interest
//! dataset (children vs playgrounds, children vs pre-schools, ...). Each is
//! described by a TOML file under `packages/area/areas/`, embedded at compile
//! time; see [`registry`].

pub mod registry;

use std::path::{Path, PathBuf};

use civic_hex_hexagon::models::Attribute;
use civic_hex_hexagon::output::OutputLabels;
use civic_hex_hexagon::source::SourceSchema;
use civic_hex_spatial::BoundarySchema;
use serde::Deserialize;

pub use registry::{all_areas, area_by_id};

/// Finest resolution of the H3 grid.
const MAX_RESOLUTION: u8 = 15;

/// Errors raised while resolving area definitions.
#[derive(Debug, thiserror::Error)]
pub enum AreaError {
    /// A definition is not valid TOML or misses required fields.
    #[error("Invalid area definition: {0}")]
    Toml(#[from] toml::de::Error),

    /// A definition parsed but its values are unusable.
    #[error("Invalid area definition {id}: {message}")]
    Invalid {
        /// Area id as written in the definition.
        id: String,
        /// What is wrong with it.
        message: String,
    },

    /// No built-in area has this id.
    #[error("Unknown area: {0}")]
    Unknown(String),
}

/// Input datasets of an area, relative to [`DataPaths::src_dir`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AreaInputs {
    /// Census tract `GeoJSON`.
    pub tracts: String,
    /// Parish boundary `GeoJSON`.
    pub boundary: String,
    /// Point-of-interest `GeoJSON`.
    pub points: String,
}

/// A complete, config-driven hexagon map definition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AreaDefinition {
    /// Unique identifier (e.g. `"parques_infantis"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Tract count redistributed onto the grid.
    pub attribute: Attribute,
    /// H3 resolution of the output grid.
    pub resolution: u8,
    /// Vector tile layer name.
    pub layer: String,
    /// Output `GeoJSON` file name, relative to
    /// [`DataPaths::processed_dir`].
    pub output: String,
    /// Restricts the grid to the bounding box of the reference boundary.
    /// Tracts reaching past it keep only their in-extent hexagons.
    #[serde(default)]
    pub clip_to_boundary: bool,
    pub inputs: AreaInputs,
    #[serde(default)]
    pub labels: OutputLabels,
    /// Property names of the tract dataset.
    #[serde(default)]
    pub tract_fields: SourceSchema,
    /// Property names of the boundary dataset.
    #[serde(default)]
    pub boundary_fields: BoundarySchema,
}

impl AreaDefinition {
    fn validate(self) -> Result<Self, AreaError> {
        let invalid = |message: String| AreaError::Invalid {
            id: self.id.clone(),
            message,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id is empty".to_string()));
        }
        if self.resolution > MAX_RESOLUTION {
            return Err(invalid(format!(
                "resolution {} is above {MAX_RESOLUTION}",
                self.resolution
            )));
        }
        if self.layer.trim().is_empty() || self.output.trim().is_empty() {
            return Err(invalid("layer and output must be set".to_string()));
        }

        Ok(self)
    }
}

/// Parses and validates an [`AreaDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed, misses required fields or
/// carries unusable values.
pub fn parse_area_toml(toml_str: &str) -> Result<AreaDefinition, AreaError> {
    let area: AreaDefinition = toml::de::from_str(toml_str)?;
    area.validate()
}

/// Where raw inputs are read from and processed outputs are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    /// Root of the downloaded source datasets.
    pub src_dir: PathBuf,
    /// Directory served to the map site.
    pub processed_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            src_dir: Path::new("data").join("src"),
            processed_dir: Path::new("site")
                .join("assets")
                .join("data")
                .join("processed"),
        }
    }
}

impl DataPaths {
    #[must_use]
    pub fn tracts_for(&self, area: &AreaDefinition) -> PathBuf {
        self.src_dir.join(&area.inputs.tracts)
    }

    #[must_use]
    pub fn boundary_for(&self, area: &AreaDefinition) -> PathBuf {
        self.src_dir.join(&area.inputs.boundary)
    }

    #[must_use]
    pub fn points_for(&self, area: &AreaDefinition) -> PathBuf {
        self.src_dir.join(&area.inputs.points)
    }

    /// Aggregated `GeoJSON` written by the generate pipeline.
    #[must_use]
    pub fn output_for(&self, area: &AreaDefinition) -> PathBuf {
        self.processed_dir.join(&area.output)
    }

    /// Tile archive built from [`Self::output_for`].
    #[must_use]
    pub fn pmtiles_for(&self, area: &AreaDefinition) -> PathBuf {
        self.output_for(area).with_extension("pmtiles")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        id = "test"
        name = "Test"
        attribute = "population"
        resolution = 8
        layer = "test_h3"
        output = "test_h3.geojson"

        [inputs]
        tracts = "t.geojson"
        boundary = "b.geojson"
        points = "p.geojson"
    "#;

    #[test]
    fn parses_minimal_definition_with_defaults() {
        let area = parse_area_toml(MINIMAL).unwrap();

        assert_eq!(area.attribute, Attribute::Population);
        assert!(!area.clip_to_boundary);
        assert_eq!(area.labels, OutputLabels::default());
        assert_eq!(area.tract_fields, SourceSchema::default());
        assert_eq!(area.boundary_fields, BoundarySchema::default());
    }

    #[test]
    fn partial_label_tables_keep_remaining_defaults() {
        let toml_str = format!("{MINIMAL}\n[labels]\nratio = \"per_point\"\n");
        let area = parse_area_toml(&toml_str).unwrap();

        assert_eq!(area.labels.ratio, "per_point");
        assert_eq!(area.labels.sub_areas, OutputLabels::default().sub_areas);
    }

    #[test]
    fn rejects_out_of_range_resolution() {
        let toml_str = MINIMAL.replace("resolution = 8", "resolution = 16");
        assert!(matches!(
            parse_area_toml(&toml_str),
            Err(AreaError::Invalid { .. })
        ));
    }

    #[test]
    fn rejects_unknown_attribute() {
        let toml_str = MINIMAL.replace("\"population\"", "\"households\"");
        assert!(matches!(parse_area_toml(&toml_str), Err(AreaError::Toml(_))));
    }

    #[test]
    fn paths_follow_data_layout() {
        let area = parse_area_toml(MINIMAL).unwrap();
        let paths = DataPaths::default();

        assert_eq!(paths.points_for(&area), Path::new("data/src/p.geojson"));
        assert_eq!(
            paths.output_for(&area),
            Path::new("site/assets/data/processed/test_h3.geojson")
        );
        assert_eq!(
            paths.pmtiles_for(&area),
            Path::new("site/assets/data/processed/test_h3.pmtiles")
        );
    }
}
