#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial indexes for hexagon aggregation.
//!
//! Loads the city reference boundary (parish polygons) and point-of-interest
//! datasets from `GeoJSON` once at startup, builds R-tree indexes over them,
//! and answers the read-only queries the aggregation driver needs:
//! containment, parish name lookup, points-in-polygon counts and
//! nearest-point distances.

pub mod boundary;
pub mod geodesy;
pub mod points;

use std::path::{Path, PathBuf};

use geo::{BoundingRect, MultiPolygon, Rect};
use geojson::{Feature, FeatureCollection, GeoJson};
use rstar::AABB;

pub use boundary::{BoundaryIndex, BoundarySchema, SubArea};
pub use points::PointIndex;

/// Errors that can occur while loading spatial datasets.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// A dataset file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A dataset is not the `GeoJSON` shape it was expected to be.
    #[error("Input format error: {message}")]
    InputFormat {
        /// Description of what went wrong.
        message: String,
    },
}

impl SpatialError {
    /// Shorthand for an [`SpatialError::InputFormat`] error.
    #[must_use]
    pub fn input_format(message: impl Into<String>) -> Self {
        Self::InputFormat {
            message: message.into(),
        }
    }
}

/// A sub-area code that is not part of the reference dataset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown sub-area code: {code}")]
pub struct LookupError {
    /// The code that failed to resolve.
    pub code: String,
}

/// Rounds to 2 decimal places. Applying it twice changes nothing.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Reads a `GeoJSON` `FeatureCollection` from disk.
///
/// # Errors
///
/// Returns [`SpatialError::Io`] if the file cannot be read and
/// [`SpatialError::InputFormat`] if it is not a `FeatureCollection`.
pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, SpatialError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SpatialError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_feature_collection(&raw)
        .map_err(|e| SpatialError::input_format(format!("{}: {e}", path.display())))
}

/// Parses a `GeoJSON` string that must hold a `FeatureCollection`.
///
/// # Errors
///
/// Returns [`SpatialError::InputFormat`] if the string is not valid
/// `GeoJSON` or holds something other than a `FeatureCollection`.
pub fn parse_feature_collection(raw: &str) -> Result<FeatureCollection, SpatialError> {
    match raw.parse::<GeoJson>() {
        Ok(GeoJson::FeatureCollection(collection)) => Ok(collection),
        Ok(_) => Err(SpatialError::input_format(
            "expected a GeoJSON FeatureCollection",
        )),
        Err(e) => Err(SpatialError::input_format(e.to_string())),
    }
}

/// Converts a feature's geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
#[must_use]
pub fn feature_multipolygon(feature: &Feature) -> Option<MultiPolygon<f64>> {
    let geometry = feature.geometry.clone()?;
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Reads a string-ish property. Numeric codes are rendered without a
/// fractional part when they are integral, so `110601` and `110601.0`
/// both read as `"110601"`.
#[must_use]
pub fn property_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        serde_json::Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 => format!("{f}"),
            _ => n.to_string(),
        }),
        _ => None,
    }
}

/// Reads a numeric property, accepting numbers and numeric strings.
#[must_use]
pub fn property_f64(feature: &Feature, key: &str) -> Option<f64> {
    match feature.property(key)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| rect_envelope(&rect),
    )
}

fn rect_envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Describes a feature for error messages: its position plus its id
/// property when one is present.
fn describe_feature(index: usize, feature: &Feature, id_key: Option<&str>) -> String {
    id_key
        .and_then(|key| property_string(feature, key))
        .map_or_else(
            || format!("feature #{index}"),
            |id| format!("feature #{index} ({id})"),
        )
}
