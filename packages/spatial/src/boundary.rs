//! City reference boundary built from sub-area (parish) polygons.
//!
//! The union of all sub-areas is the city boundary used to filter source
//! features, and each sub-area contributes a code -> name mapping used to
//! label hexagons.

use std::collections::BTreeMap;
use std::path::Path;

use geo::{BoundingRect, InteriorPoint, Intersects, MultiPolygon, Point, Rect};
use geojson::FeatureCollection;
use rstar::{AABB, RTree, RTreeObject};
use serde::Deserialize;

use crate::{
    LookupError, SpatialError, compute_envelope, describe_feature, feature_multipolygon,
    property_string, read_feature_collection,
};

/// One administrative sub-area of the reference boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct SubArea {
    /// Sub-area code as used by source features (e.g. `"110601"`).
    pub code: String,
    /// Canonical display name.
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// Property names used to read sub-areas from a `GeoJSON` dataset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoundarySchema {
    /// Property holding the sub-area code.
    pub code: String,
    /// Property holding the display name.
    pub name: String,
}

impl Default for BoundarySchema {
    fn default() -> Self {
        Self {
            code: "DICOFRE".to_string(),
            name: "FREGUESIA".to_string(),
        }
    }
}

/// A sub-area polygon stored in the R-tree.
struct SubAreaEntry {
    sub_area: SubArea,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SubAreaEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built containment index over the reference boundary.
///
/// Constructed once per run; every query afterwards is read-only.
pub struct BoundaryIndex {
    entries: RTree<SubAreaEntry>,
    /// sub-area code -> display name
    names: BTreeMap<String, String>,
    extent: Option<Rect<f64>>,
}

impl BoundaryIndex {
    /// Builds the index from already-parsed sub-areas.
    #[must_use]
    pub fn new(sub_areas: Vec<SubArea>) -> Self {
        let mut names = BTreeMap::new();
        let mut extent: Option<Rect<f64>> = None;
        let mut entries = Vec::with_capacity(sub_areas.len());

        for sub_area in sub_areas {
            if let Some(rect) = sub_area.geometry.bounding_rect() {
                extent = Some(extent.map_or(rect, |current| merge_rects(&current, &rect)));
            }
            names.insert(sub_area.code.clone(), sub_area.name.clone());
            entries.push(SubAreaEntry {
                envelope: compute_envelope(&sub_area.geometry),
                sub_area,
            });
        }

        Self {
            entries: RTree::bulk_load(entries),
            names,
            extent,
        }
    }

    /// Loads sub-area polygons from a `GeoJSON` file and builds the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or any feature lacks a
    /// code, a name, or a polygonal geometry.
    pub fn load(path: &Path, schema: &BoundarySchema) -> Result<Self, SpatialError> {
        let collection = read_feature_collection(path)?;
        let index = Self::from_feature_collection(&collection, schema)?;
        log::info!(
            "Loaded {} sub-areas ({} codes) from {}",
            index.len(),
            index.names.len(),
            path.display()
        );
        Ok(index)
    }

    /// Builds the index from a parsed `FeatureCollection`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InputFormat`] if any feature lacks a code,
    /// a name, or a polygonal geometry.
    pub fn from_feature_collection(
        collection: &FeatureCollection,
        schema: &BoundarySchema,
    ) -> Result<Self, SpatialError> {
        let sub_areas = collection
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| {
                let describe = || describe_feature(i, feature, Some(&schema.code));
                let code = property_string(feature, &schema.code).ok_or_else(|| {
                    SpatialError::input_format(format!(
                        "{}: missing sub-area code property '{}'",
                        describe(),
                        schema.code
                    ))
                })?;
                let name = property_string(feature, &schema.name).ok_or_else(|| {
                    SpatialError::input_format(format!(
                        "{}: missing sub-area name property '{}'",
                        describe(),
                        schema.name
                    ))
                })?;
                let geometry = feature_multipolygon(feature).ok_or_else(|| {
                    SpatialError::input_format(format!(
                        "{}: geometry is not a Polygon or MultiPolygon",
                        describe()
                    ))
                })?;

                Ok(SubArea {
                    code,
                    name,
                    geometry,
                })
            })
            .collect::<Result<Vec<_>, SpatialError>>()?;

        Ok(Self::new(sub_areas))
    }

    /// Whether `geometry` lies within the reference boundary.
    ///
    /// A geometry is inside when its interior point falls inside (or on the
    /// edge of) any sub-area. Tracts are drawn from the same census
    /// geography as the parishes, so one representative point decides.
    #[must_use]
    pub fn contains(&self, geometry: &MultiPolygon<f64>) -> bool {
        geometry
            .interior_point()
            .is_some_and(|point| self.sub_area_at(point).is_some())
    }

    /// Look up the sub-area containing a lon/lat point.
    ///
    /// Sub-areas tile the city without overlap, so first match wins.
    #[must_use]
    pub fn sub_area_at(&self, point: Point<f64>) -> Option<&SubArea> {
        let query_env = AABB::from_point([point.x(), point.y()]);

        self.entries
            .locate_in_envelope_intersecting(&query_env)
            .find(|entry| entry.sub_area.geometry.intersects(&point))
            .map(|entry| &entry.sub_area)
    }

    /// Resolves a sub-area code to its display name.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the code is not in the reference dataset.
    pub fn name_for(&self, code: &str) -> Result<&str, LookupError> {
        self.names
            .get(code)
            .map(String::as_str)
            .ok_or_else(|| LookupError {
                code: code.to_string(),
            })
    }

    /// Bounding rectangle of the whole boundary, if it has any geometry.
    #[must_use]
    pub const fn extent(&self) -> Option<Rect<f64>> {
        self.extent
    }

    /// Number of sub-area polygons in the index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.size() == 0
    }
}

fn merge_rects(a: &Rect<f64>, b: &Rect<f64>) -> Rect<f64> {
    Rect::new(
        geo::coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
        geo::coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
    )
}
