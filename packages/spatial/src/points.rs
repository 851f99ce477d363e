//! Point-of-interest index (playgrounds, schools, kiosks, ...).

use std::path::Path;

use geo::{BoundingRect, Centroid, Intersects, Point, Rect};
use geojson::FeatureCollection;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::geodesy::{point_distance_m, unit_vector};
use crate::{SpatialError, describe_feature, read_feature_collection, rect_envelope, round2};

/// Areas the index can be queried with: anything with a bounding box, a
/// centroid and a point-intersection test (`Polygon`, `MultiPolygon`, ...).
pub trait QueryArea:
    BoundingRect<f64, Output = Option<Rect<f64>>>
    + Centroid<Output = Option<Point<f64>>>
    + Intersects<Point<f64>>
{
}

impl<G> QueryArea for G where
    G: BoundingRect<f64, Output = Option<Rect<f64>>>
        + Centroid<Output = Option<Point<f64>>>
        + Intersects<Point<f64>>
{
}

/// Immutable snapshot of point-of-interest locations.
///
/// Points on a polygon's edge count as inside it.
pub struct PointIndex {
    /// Lon/lat coordinates, for area queries.
    tree: RTree<[f64; 2]>,
    /// The same points on the unit sphere, for nearest-point queries.
    sphere: RTree<GeomWithData<[f64; 3], Point<f64>>>,
}

impl PointIndex {
    /// Builds the index from lon/lat points.
    #[must_use]
    pub fn new(points: impl IntoIterator<Item = Point<f64>>) -> Self {
        let points: Vec<Point<f64>> = points.into_iter().collect();
        let sphere = points
            .iter()
            .map(|&p| GeomWithData::new(unit_vector(p), p))
            .collect();
        Self {
            tree: RTree::bulk_load(points.iter().map(|p| [p.x(), p.y()]).collect()),
            sphere: RTree::bulk_load(sphere),
        }
    }

    /// Loads point features from a `GeoJSON` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds a feature whose
    /// geometry is missing or not a `Point`/`MultiPoint`.
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let collection = read_feature_collection(path)?;
        let index = Self::from_feature_collection(&collection)?;
        log::info!(
            "Loaded {} points of interest from {}",
            index.len(),
            path.display()
        );
        Ok(index)
    }

    /// Builds the index from a parsed `FeatureCollection`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InputFormat`] if a feature's geometry is
    /// missing or not a `Point`/`MultiPoint`.
    pub fn from_feature_collection(collection: &FeatureCollection) -> Result<Self, SpatialError> {
        let mut points = Vec::with_capacity(collection.features.len());

        for (i, feature) in collection.features.iter().enumerate() {
            let geometry = feature.geometry.clone().ok_or_else(|| {
                SpatialError::input_format(format!(
                    "{}: point feature has no geometry",
                    describe_feature(i, feature, None)
                ))
            })?;

            match geo::Geometry::<f64>::try_from(geometry) {
                Ok(geo::Geometry::Point(point)) => points.push(point),
                Ok(geo::Geometry::MultiPoint(multi)) => points.extend(multi),
                _ => {
                    return Err(SpatialError::input_format(format!(
                        "{}: expected a Point or MultiPoint geometry",
                        describe_feature(i, feature, None)
                    )));
                }
            }
        }

        Ok(Self::new(points))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Number of indexed points inside `area`, edges included.
    #[must_use]
    pub fn count_in_area<A: QueryArea>(&self, area: &A) -> usize {
        let Some(rect) = area.bounding_rect() else {
            return 0;
        };

        self.tree
            .locate_in_envelope(&rect_envelope(&rect))
            .filter(|c| area.intersects(&Point::new(c[0], c[1])))
            .count()
    }

    /// Distance in meters (2 decimals) from the centroid of `area` to the
    /// nearest indexed point.
    ///
    /// Returns `None` when the index is empty or `area` has no centroid.
    #[must_use]
    pub fn closest_distance_from<A: QueryArea>(&self, area: &A) -> Option<f64> {
        self.closest_distance_to(area.centroid()?)
    }

    /// Distance in meters (2 decimals) from `point` to the nearest indexed
    /// point, or `None` when the index is empty.
    #[must_use]
    pub fn closest_distance_to(&self, point: Point<f64>) -> Option<f64> {
        self.sphere
            .nearest_neighbor(&unit_vector(point))
            .map(|nearest| round2(point_distance_m(point, nearest.data)))
    }
}
