#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Areal-weighted hexagon aggregation.
//!
//! Redistributes census-tract counts onto an H3 grid: every tract inside
//! the city boundary is decomposed into the hexagons it overlaps, each
//! tagged with the fraction of the tract's area it covers, and the
//! [`aggregate::Aggregator`] accumulates weighted counts, contributing
//! tract ids and parish names per hexagon. Point-of-interest statistics are
//! computed once per hexagon. Tracts that decompose to nothing are reported
//! on their own as uncovered records.
//!
//! The finished accumulator is serialized to a `GeoJSON`
//! `FeatureCollection` by [`output::to_feature_collection`].

pub mod aggregate;
pub mod decompose;
pub mod grid;
pub mod output;
pub mod progress;
pub mod source;

pub use civic_hex_hexagon_models as models;

use civic_hex_spatial::LookupError;

pub use aggregate::{AggregateOutput, AggregateStats, Aggregator, FeatureOutcome};
pub use decompose::decompose;
pub use grid::{GridError, H3Grid, HexGrid};
pub use output::{OutputLabels, to_feature_collection};

/// Errors that abort an aggregation run.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The hexagonal grid rejected an input (coordinates, cell index).
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// A source feature references a sub-area code the reference boundary
    /// does not know.
    #[error("Source feature {source_id}: {error}")]
    Lookup {
        /// Id of the offending source feature.
        source_id: String,
        /// The failed lookup.
        error: LookupError,
    },
}
