#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Domain types shared by the hexagon aggregation engine.
//!
//! Source features (census tracts) carry the demographic counts that get
//! redistributed, and hexagon cells are the grid entities they are
//! redistributed onto. Cells never own statistics; the aggregation driver
//! keys its accumulators by [`CellId`].

use std::fmt;

use geo::{MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Opaque identifier of a hexagonal grid cell.
///
/// Wraps the raw 64-bit H3 index. Displays as the canonical lowercase
/// hexadecimal H3 string (e.g. `8839220d6bfffff`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellId(u64);

impl CellId {
    /// Wraps a raw grid index.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw grid index.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for CellId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<CellId> for u64 {
    fn from(id: CellId) -> Self {
        id.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// A cell of a fixed-resolution hexagonal grid.
#[derive(Debug, Clone, PartialEq)]
pub struct HexagonCell {
    /// Grid identifier.
    pub id: CellId,
    /// Cell boundary in lon/lat degrees. The exterior ring is closed.
    pub boundary: Polygon<f64>,
    /// Grid-defined center of the cell (x = longitude, y = latitude).
    pub centroid: Point<f64>,
}

impl HexagonCell {
    /// Returns the closed boundary ring as `[lng, lat]` positions, the
    /// shape `GeoJSON` polygon rings use.
    #[must_use]
    pub fn ring_positions(&self) -> Vec<Vec<f64>> {
        self.boundary
            .exterior()
            .coords()
            .map(|c| vec![c.x, c.y])
            .collect()
    }
}

/// A hexagon produced by decomposing a source polygon, tagged with the
/// fraction of the source area that falls inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedCell {
    pub cell: HexagonCell,
    /// `intersection_area / source_area`, in `(0, 1]`.
    pub weight: f64,
}

/// Redistributable demographic counts of a source feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    /// Resident population.
    pub population: f64,
    /// Residents aged 0 to 14.
    pub children_under_14: f64,
}

/// Selects which demographic count an aggregation run redistributes.
///
/// Chosen once per run; the aggregation driver never looks attributes up by
/// name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Attribute {
    Population,
    #[serde(rename = "children_under_14")]
    #[strum(serialize = "children_under_14")]
    ChildrenUnder14,
}

impl Attribute {
    /// Returns the selected count from `demographics`.
    #[must_use]
    pub const fn select(self, demographics: &Demographics) -> f64 {
        match self {
            Self::Population => demographics.population,
            Self::ChildrenUnder14 => demographics.children_under_14,
        }
    }
}

/// One census-tract polygon record.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    /// Unique tract identifier (e.g. the BGRI 2021 subsection code).
    pub id: String,
    /// Administrative sub-area (parish) code.
    pub sub_area_code: String,
    pub demographics: Demographics,
    /// Tract geometry in lon/lat degrees. Never empty.
    pub geometry: MultiPolygon<f64>,
}

impl SourceFeature {
    /// Returns the count selected by `attribute`.
    #[must_use]
    pub const fn value(&self, attribute: Attribute) -> f64 {
        attribute.select(&self.demographics)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn cell_id_displays_as_h3_hex() {
        let id = CellId::new(0x0883_9220_d6bf_ffff);
        assert_eq!(id.to_string(), "8839220d6bfffff");
        assert_eq!(u64::from(id), 0x0883_9220_d6bf_ffff);
    }

    #[test]
    fn attribute_selects_matching_count() {
        let demographics = Demographics {
            population: 120.0,
            children_under_14: 17.0,
        };
        assert!((Attribute::Population.select(&demographics) - 120.0).abs() < f64::EPSILON);
        assert!((Attribute::ChildrenUnder14.select(&demographics) - 17.0).abs() < f64::EPSILON);
    }

    #[test]
    fn attribute_names_are_snake_case() {
        assert_eq!(Attribute::ChildrenUnder14.as_ref(), "children_under_14");
        assert_eq!(
            Attribute::from_str("population").ok(),
            Some(Attribute::Population)
        );
    }

    #[test]
    fn ring_positions_are_closed() {
        let cell = HexagonCell {
            id: CellId::new(1),
            boundary: Polygon::new(
                vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)].into(),
                vec![],
            ),
            centroid: Point::new(0.5, 0.5),
        };
        let ring = cell.ring_positions();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }
}
