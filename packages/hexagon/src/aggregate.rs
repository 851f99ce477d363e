//! Aggregation driver.
//!
//! Walks the source features once. Each feature ends in exactly one of
//! three terminal states ([`FeatureOutcome`]): filtered out by the city
//! boundary, uncovered (its decomposition is empty), or distributed over one
//! or more hexagons. Accumulation is additive, so feature order only changes
//! floating point summation order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use civic_hex_hexagon_models::{Attribute, CellId, HexagonCell, SourceFeature};
use civic_hex_spatial::{BoundaryIndex, PointIndex};
use geo::MultiPolygon;

use crate::AggregateError;
use crate::decompose::decompose;
use crate::grid::HexGrid;
use crate::progress::ProgressCallback;

/// Terminal state of one source feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureOutcome {
    /// Outside the reference boundary; ignored.
    FilteredOut,
    /// Inside the boundary but overlapping no covered hexagon.
    Uncovered,
    /// Redistributed over `cells` hexagons.
    Distributed { cells: usize },
}

/// Per-run counts of feature outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub filtered_out: usize,
    pub uncovered: usize,
    pub distributed: usize,
}

impl AggregateStats {
    const fn record(&mut self, outcome: FeatureOutcome) {
        match outcome {
            FeatureOutcome::FilteredOut => self.filtered_out += 1,
            FeatureOutcome::Uncovered => self.uncovered += 1,
            FeatureOutcome::Distributed { .. } => self.distributed += 1,
        }
    }

    /// Total number of features seen.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.filtered_out + self.uncovered + self.distributed
    }
}

/// Accumulated statistics for one hexagon.
#[derive(Debug, Clone)]
pub struct HexagonAggregate {
    cell: HexagonCell,
    /// source id -> weight, full precision
    contributions: BTreeMap<String, f64>,
    sub_areas: BTreeSet<String>,
    attribute_sum: f64,
    point_count: usize,
    nearest_distance: Option<f64>,
}

impl HexagonAggregate {
    /// Creates an empty aggregate. Point statistics depend only on the cell
    /// geometry, so they are computed here and never again.
    fn new(cell: HexagonCell, points: &PointIndex) -> Self {
        let point_count = points.count_in_area(&cell.boundary);
        let nearest_distance = points.closest_distance_from(&cell.boundary);

        Self {
            cell,
            contributions: BTreeMap::new(),
            sub_areas: BTreeSet::new(),
            attribute_sum: 0.0,
            point_count,
            nearest_distance,
        }
    }

    fn contribute(&mut self, source_id: &str, weight: f64, value: f64, sub_area: &str) {
        *self
            .contributions
            .entry(source_id.to_string())
            .or_insert(0.0) += weight;
        self.attribute_sum += value * weight;
        if !self.sub_areas.contains(sub_area) {
            self.sub_areas.insert(sub_area.to_string());
        }
    }

    #[must_use]
    pub const fn cell(&self) -> &HexagonCell {
        &self.cell
    }

    /// Contributing source ids and their full-precision weights.
    #[must_use]
    pub const fn contributions(&self) -> &BTreeMap<String, f64> {
        &self.contributions
    }

    /// Sub-area names of the contributing features, sorted.
    #[must_use]
    pub fn sorted_sub_areas(&self) -> Vec<&str> {
        self.sub_areas.iter().map(String::as_str).collect()
    }

    /// Weighted sum of the redistributed attribute, full precision.
    #[must_use]
    pub const fn attribute_sum(&self) -> f64 {
        self.attribute_sum
    }

    #[must_use]
    pub const fn point_count(&self) -> usize {
        self.point_count
    }

    /// Meters from the cell centroid to the nearest point of interest.
    #[must_use]
    pub const fn nearest_distance(&self) -> Option<f64> {
        self.nearest_distance
    }

    /// Attribute per point of interest; `None` when the cell has no points.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        ratio(self.attribute_sum, self.point_count)
    }
}

/// A source feature that overlaps no hexagon, reported with statistics
/// computed directly on its own geometry.
#[derive(Debug, Clone)]
pub struct UncoveredRecord {
    pub source_id: String,
    /// The feature's own (not redistributed) attribute value.
    pub attribute_value: f64,
    pub point_count: usize,
    pub nearest_distance: Option<f64>,
    pub geometry: MultiPolygon<f64>,
}

impl UncoveredRecord {
    /// Attribute per point of interest; `None` when the feature holds no
    /// points.
    #[must_use]
    pub fn ratio(&self) -> Option<f64> {
        ratio(self.attribute_value, self.point_count)
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(value: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| value / count as f64)
}

/// Everything an aggregation run produced, ready to serialize.
#[derive(Debug, Clone)]
pub struct AggregateOutput {
    pub attribute: Attribute,
    pub uncovered: Vec<UncoveredRecord>,
    /// Hexagons in first-contribution order.
    pub hexagons: Vec<HexagonAggregate>,
    pub stats: AggregateStats,
}

impl AggregateOutput {
    /// Sum of the redistributed attribute over all hexagons.
    #[must_use]
    pub fn distributed_total(&self) -> f64 {
        self.hexagons.iter().map(HexagonAggregate::attribute_sum).sum()
    }
}

/// Owns the per-run hexagon accumulator.
///
/// Aggregates live in an arena in first-contribution order; `slots` maps a
/// cell id to its arena position.
pub struct Aggregator<'a, G: HexGrid + ?Sized> {
    grid: &'a G,
    boundary: &'a BoundaryIndex,
    points: &'a PointIndex,
    attribute: Attribute,
    hexagons: Vec<HexagonAggregate>,
    slots: HashMap<CellId, usize>,
    uncovered: Vec<UncoveredRecord>,
    stats: AggregateStats,
}

impl<'a, G: HexGrid + ?Sized> Aggregator<'a, G> {
    /// Creates a driver redistributing `attribute` over `grid`.
    #[must_use]
    pub fn new(
        grid: &'a G,
        boundary: &'a BoundaryIndex,
        points: &'a PointIndex,
        attribute: Attribute,
    ) -> Self {
        Self {
            grid,
            boundary,
            points,
            attribute,
            hexagons: Vec::new(),
            slots: HashMap::new(),
            uncovered: Vec::new(),
            stats: AggregateStats::default(),
        }
    }

    /// Processes one source feature.
    ///
    /// # Errors
    ///
    /// Returns [`AggregateError::Grid`] if the feature cannot be decomposed
    /// and [`AggregateError::Lookup`] if its sub-area code is unknown. The
    /// accumulator is untouched when an error is returned.
    pub fn add(&mut self, feature: &SourceFeature) -> Result<FeatureOutcome, AggregateError> {
        let outcome = self.process(feature)?;
        self.stats.record(outcome);
        Ok(outcome)
    }

    fn process(&mut self, feature: &SourceFeature) -> Result<FeatureOutcome, AggregateError> {
        if !self.boundary.contains(&feature.geometry) {
            log::trace!("{}: outside the reference boundary", feature.id);
            return Ok(FeatureOutcome::FilteredOut);
        }

        let cells = decompose(&feature.geometry, self.grid)?;
        let value = feature.value(self.attribute);

        if cells.is_empty() {
            log::debug!("{}: no hexagon coverage", feature.id);
            self.uncovered.push(UncoveredRecord {
                source_id: feature.id.clone(),
                attribute_value: value,
                point_count: self.points.count_in_area(&feature.geometry),
                nearest_distance: self.points.closest_distance_from(&feature.geometry),
                geometry: feature.geometry.clone(),
            });
            return Ok(FeatureOutcome::Uncovered);
        }

        let sub_area = self
            .boundary
            .name_for(&feature.sub_area_code)
            .map_err(|error| AggregateError::Lookup {
                source_id: feature.id.clone(),
                error,
            })?;

        let count = cells.len();
        for weighted in cells {
            let slot = match self.slots.get(&weighted.cell.id) {
                Some(&slot) => slot,
                None => {
                    let slot = self.hexagons.len();
                    self.slots.insert(weighted.cell.id, slot);
                    self.hexagons
                        .push(HexagonAggregate::new(weighted.cell, self.points));
                    slot
                }
            };
            self.hexagons[slot].contribute(&feature.id, weighted.weight, value, sub_area);
        }

        Ok(FeatureOutcome::Distributed { cells: count })
    }

    /// Processes every feature, reporting one progress unit per feature.
    ///
    /// # Errors
    ///
    /// Stops at the first feature that fails; see [`Self::add`].
    pub fn add_all<'f>(
        &mut self,
        features: impl IntoIterator<Item = &'f SourceFeature>,
        progress: &dyn ProgressCallback,
    ) -> Result<AggregateStats, AggregateError> {
        for feature in features {
            self.add(feature)?;
            progress.inc(1);
        }

        log::info!(
            "Processed {} features: {} distributed over {} hexagons, {} uncovered, {} outside boundary",
            self.stats.total(),
            self.stats.distributed,
            self.hexagons.len(),
            self.stats.uncovered,
            self.stats.filtered_out,
        );

        Ok(self.stats)
    }

    /// Number of hexagons touched so far.
    #[must_use]
    pub fn hexagon_count(&self) -> usize {
        self.hexagons.len()
    }

    /// Ends the run, handing over the accumulated records.
    #[must_use]
    pub fn finish(self) -> AggregateOutput {
        AggregateOutput {
            attribute: self.attribute,
            uncovered: self.uncovered,
            hexagons: self.hexagons,
            stats: self.stats,
        }
    }
}
