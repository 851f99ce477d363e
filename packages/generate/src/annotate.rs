//! Tags point datasets with the distance to the nearest reference point
//! (e.g. each playground with its distance to the closest kiosk).

use std::path::Path;

use civic_hex_spatial::{PointIndex, SpatialError, read_feature_collection};
use geojson::{FeatureCollection, JsonValue};

use crate::{GenerateError, write_geojson_atomic};

/// Sets property `key` on every feature of `points` to the haversine
/// distance in meters (2 decimals) to the nearest point of `reference`, or
/// `null` when `reference` is empty. Returns how many features got a
/// distance.
///
/// # Errors
///
/// Returns [`SpatialError::InputFormat`] if a feature is not a `Point`.
pub fn annotate_collection(
    points: &mut FeatureCollection,
    reference: &PointIndex,
    key: &str,
) -> Result<usize, SpatialError> {
    let mut annotated = 0;

    for (i, feature) in points.features.iter_mut().enumerate() {
        let point = match feature
            .geometry
            .clone()
            .map(geo::Geometry::<f64>::try_from)
        {
            Some(Ok(geo::Geometry::Point(point))) => point,
            _ => {
                return Err(SpatialError::input_format(format!(
                    "feature #{i}: expected a Point geometry"
                )));
            }
        };

        let distance = reference.closest_distance_to(point);
        if distance.is_some() {
            annotated += 1;
        }
        feature.set_property(key, distance.map_or(JsonValue::Null, JsonValue::from));
    }

    Ok(annotated)
}

/// Reads `points_path`, annotates it against `reference_path` and writes
/// the result to `output` atomically. `output` may be `points_path`.
///
/// # Errors
///
/// Returns an error if either dataset fails to load or the output cannot
/// be written.
pub fn annotate_points(
    points_path: &Path,
    reference_path: &Path,
    key: &str,
    output: &Path,
) -> Result<usize, GenerateError> {
    let mut points = read_feature_collection(points_path)?;
    let reference = PointIndex::load(reference_path)?;

    if reference.is_empty() {
        log::warn!(
            "{} has no points; every {key} will be null",
            reference_path.display()
        );
    }

    let annotated = annotate_collection(&mut points, &reference, key)?;
    write_geojson_atomic(output, &points)?;

    log::info!(
        "Annotated {annotated}/{} features of {} with {key} -> {}",
        points.features.len(),
        points_path.display(),
        output.display()
    );
    Ok(annotated)
}
