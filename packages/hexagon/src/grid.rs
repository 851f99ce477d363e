//! Hexagonal grid capability.
//!
//! The engine only needs a handful of primitives from a hierarchical
//! hexagonal index: locate the cell containing a point, list a cell's
//! neighbours, and produce a cell's boundary. [`HexGrid`] captures those and
//! derives "cells intersecting a polygon" from them; [`H3Grid`] provides them
//! through `h3o`.

use std::collections::{BTreeSet, VecDeque};

use civic_hex_hexagon_models::{CellId, HexagonCell};
use geo::{Intersects, LineString, Point, Polygon, Rect};
use h3o::{CellIndex, LatLng, Resolution};

/// Errors raised by the grid index.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Invalid H3 resolution: {0}")]
    Resolution(#[from] h3o::error::InvalidResolution),

    #[error("Invalid coordinate: {0}")]
    Coordinate(#[from] h3o::error::InvalidLatLng),

    #[error("Invalid cell index: {0}")]
    Cell(#[from] h3o::error::InvalidCellIndex),
}

/// A fixed-resolution hexagonal grid.
pub trait HexGrid {
    /// Grid resolution (higher means smaller cells).
    fn resolution(&self) -> u8;

    /// Returns the cell containing a lon/lat point.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if the coordinate is not representable.
    fn cell_at(&self, point: Point<f64>) -> Result<CellId, GridError>;

    /// Returns the cells sharing an edge with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if `id` is not a valid cell.
    fn neighbors(&self, id: CellId) -> Result<Vec<CellId>, GridError>;

    /// Returns the cell's boundary and center.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if `id` is not a valid cell.
    fn cell(&self, id: CellId) -> Result<HexagonCell, GridError>;

    /// Whether the grid covers `cell`. Grids restricted to a region return
    /// `false` for cells outside it.
    fn covers(&self, _cell: &HexagonCell) -> bool {
        true
    }

    /// Every covered cell whose boundary intersects `polygon`.
    ///
    /// Seeds from the cells holding the polygon's exterior vertices and
    /// flood-fills across neighbours while their boundaries keep
    /// intersecting the polygon. Hexagons that touch always share an edge,
    /// so the intersecting cells of a connected polygon form one connected
    /// region and the fill reaches all of them.
    ///
    /// # Errors
    ///
    /// Returns [`GridError`] if a vertex or cell cannot be indexed.
    fn cells_intersecting(&self, polygon: &Polygon<f64>) -> Result<Vec<HexagonCell>, GridError> {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        for coord in polygon.exterior().coords() {
            let seed = self.cell_at(Point::from(*coord))?;
            if visited.insert(seed) {
                queue.push_back(seed);
            }
        }

        let mut found = Vec::new();
        while let Some(id) = queue.pop_front() {
            let cell = self.cell(id)?;
            if !cell.boundary.intersects(polygon) {
                continue;
            }

            for neighbor in self.neighbors(id)? {
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }

            // Uncovered cells still propagate the fill so covered cells
            // beyond them are reached.
            if self.covers(&cell) {
                found.push(cell);
            }
        }

        Ok(found)
    }
}

/// The H3 global grid at one resolution, optionally restricted to a
/// rectangular region.
#[derive(Debug, Clone, Copy)]
pub struct H3Grid {
    resolution: Resolution,
    extent: Option<Rect<f64>>,
}

impl H3Grid {
    /// Creates an unrestricted grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Resolution`] if `resolution` is above 15.
    pub fn new(resolution: u8) -> Result<Self, GridError> {
        Ok(Self {
            resolution: Resolution::try_from(resolution)?,
            extent: None,
        })
    }

    /// Restricts the grid to cells intersecting `extent` (lon/lat degrees).
    #[must_use]
    pub const fn with_extent(mut self, extent: Rect<f64>) -> Self {
        self.extent = Some(extent);
        self
    }

    /// The region the grid is restricted to, if any.
    #[must_use]
    pub const fn extent(&self) -> Option<Rect<f64>> {
        self.extent
    }
}

fn to_h3(id: CellId) -> Result<CellIndex, GridError> {
    Ok(CellIndex::try_from(id.raw())?)
}

fn from_h3(cell: CellIndex) -> CellId {
    CellId::new(u64::from(cell))
}

impl HexGrid for H3Grid {
    fn resolution(&self) -> u8 {
        u8::from(self.resolution)
    }

    fn cell_at(&self, point: Point<f64>) -> Result<CellId, GridError> {
        let coord = LatLng::new(point.y(), point.x())?;
        Ok(from_h3(coord.to_cell(self.resolution)))
    }

    fn neighbors(&self, id: CellId) -> Result<Vec<CellId>, GridError> {
        let cell = to_h3(id)?;
        Ok(cell
            .grid_disk::<Vec<_>>(1)
            .into_iter()
            .filter(|&n| n != cell)
            .map(from_h3)
            .collect())
    }

    fn cell(&self, id: CellId) -> Result<HexagonCell, GridError> {
        let cell = to_h3(id)?;

        // Hexagons have 6 vertices; pentagons have 5 (extremely rare).
        let ring: LineString<f64> = cell
            .boundary()
            .iter()
            .map(|v| (v.lng(), v.lat()))
            .collect::<Vec<_>>()
            .into();
        let center = LatLng::from(cell);

        Ok(HexagonCell {
            id,
            boundary: Polygon::new(ring, vec![]),
            centroid: Point::new(center.lng(), center.lat()),
        })
    }

    fn covers(&self, cell: &HexagonCell) -> bool {
        self.extent
            .is_none_or(|extent| cell.boundary.intersects(&extent))
    }
}
