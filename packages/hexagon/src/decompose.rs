//! Hexagon weight decomposition.
//!
//! Splits a source polygon into the grid cells it overlaps. Each cell's
//! weight is the share of the source area that falls inside it, so
//! multiplying an extensive count by the weights redistributes it without
//! creating or losing any of it. Weights are never renormalized: whatever
//! residual the planar cell boundaries leave at the edges stays visible.

use std::collections::BTreeSet;

use civic_hex_hexagon_models::WeightedCell;
use geo::{Area, BooleanOps, MultiPolygon, Polygon};

use crate::grid::{GridError, HexGrid};

/// Weights at or below this are boundary-touching slivers produced by
/// floating point noise in the overlay, not real overlap.
const MIN_WEIGHT: f64 = 1e-9;

/// Decomposes `geometry` into weighted hexagons of `grid`.
///
/// Cells are returned in discovery order, each at most once even when it
/// overlaps several parts of a multipolygon. An empty result means the
/// geometry has no area or no covered cell overlaps it.
///
/// # Errors
///
/// Returns [`GridError`] if the grid cannot index the geometry's
/// coordinates.
pub fn decompose<G: HexGrid + ?Sized>(
    geometry: &MultiPolygon<f64>,
    grid: &G,
) -> Result<Vec<WeightedCell>, GridError> {
    let total_area = geometry.unsigned_area();
    if total_area <= 0.0 || !total_area.is_finite() {
        return Ok(Vec::new());
    }

    let mut seen = BTreeSet::new();
    let mut weighted = Vec::new();

    for polygon in geometry {
        for cell in grid.cells_intersecting(polygon)? {
            if !seen.insert(cell.id) {
                continue;
            }

            let weight = intersection_area(&cell.boundary, geometry) / total_area;
            if weight > MIN_WEIGHT {
                weighted.push(WeightedCell { cell, weight });
            }
        }
    }

    Ok(weighted)
}

/// Planar area (square degrees) of the overlap between a cell and a
/// geometry.
#[must_use]
pub fn intersection_area(cell: &Polygon<f64>, geometry: &MultiPolygon<f64>) -> f64 {
    cell.intersection(geometry).unsigned_area()
}
