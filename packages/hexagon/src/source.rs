//! Loads census-tract source features from `GeoJSON`.
//!
//! The whole dataset is validated up front: one malformed tract fails the
//! load before any aggregation starts.

use std::path::Path;

use civic_hex_hexagon_models::{Attribute, Demographics, SourceFeature};
use civic_hex_spatial::{
    SpatialError, feature_multipolygon, property_f64, property_string, read_feature_collection,
};
use geo::Area;
use geojson::{Feature, FeatureCollection};
use serde::Deserialize;

/// Property names used to read source features.
///
/// Defaults match the INE BGRI 2021 subsection dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceSchema {
    /// Unique tract identifier.
    pub id: String,
    /// Sub-area (parish) code.
    pub sub_area_code: String,
    /// Resident population.
    pub population: String,
    /// Residents aged 0 to 14.
    pub children_under_14: String,
}

impl Default for SourceSchema {
    fn default() -> Self {
        Self {
            id: "BGRI2021".to_string(),
            sub_area_code: "DTMNFR21".to_string(),
            population: "N_INDIVIDUOS".to_string(),
            children_under_14: "N_INDIVIDUOS_0_14".to_string(),
        }
    }
}

/// Loads every source feature from a `GeoJSON` file for a run that
/// redistributes `attribute`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or any feature is malformed.
pub fn load_source_features(
    path: &Path,
    schema: &SourceSchema,
    attribute: Attribute,
) -> Result<Vec<SourceFeature>, SpatialError> {
    let collection = read_feature_collection(path)?;
    let features = parse_source_features(&collection, schema, attribute)?;
    log::info!(
        "Loaded {} source features from {}",
        features.len(),
        path.display()
    );
    Ok(features)
}

/// Parses every feature of `collection`.
///
/// Only the count for `attribute` is required. The other count is read when
/// present and valid, and is 0 otherwise.
///
/// # Errors
///
/// Returns [`SpatialError::InputFormat`] naming the first malformed
/// feature.
pub fn parse_source_features(
    collection: &FeatureCollection,
    schema: &SourceSchema,
    attribute: Attribute,
) -> Result<Vec<SourceFeature>, SpatialError> {
    collection
        .features
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            parse_source_feature(feature, schema, attribute)
                .map_err(|message| SpatialError::input_format(format!("feature #{i}: {message}")))
        })
        .collect()
}

fn parse_source_feature(
    feature: &Feature,
    schema: &SourceSchema,
    attribute: Attribute,
) -> Result<SourceFeature, String> {
    let id = property_string(feature, &schema.id)
        .ok_or_else(|| format!("missing id property '{}'", schema.id))?;
    let sub_area_code = property_string(feature, &schema.sub_area_code)
        .ok_or_else(|| format!("{id}: missing sub-area property '{}'", schema.sub_area_code))?;

    let count = |selected: Attribute, key: &str| -> Result<f64, String> {
        let value = property_f64(feature, key);
        if selected != attribute {
            return Ok(value.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0));
        }
        let value = value.ok_or_else(|| format!("{id}: missing numeric property '{key}'"))?;
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(format!("{id}: property '{key}' must be a non-negative number"))
        }
    };
    let demographics = Demographics {
        population: count(Attribute::Population, &schema.population)?,
        children_under_14: count(Attribute::ChildrenUnder14, &schema.children_under_14)?,
    };

    let geometry = feature_multipolygon(feature)
        .ok_or_else(|| format!("{id}: geometry is not a Polygon or MultiPolygon"))?;
    if geometry.0.is_empty() {
        return Err(format!("{id}: geometry is empty"));
    }
    if geometry.unsigned_area() <= 0.0 {
        log::debug!("{id}: geometry has zero area");
    }

    Ok(SourceFeature {
        id,
        sub_area_code,
        demographics,
        geometry,
    })
}
