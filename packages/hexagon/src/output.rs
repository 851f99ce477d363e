//! `GeoJSON` serialization of a finished aggregation run.
//!
//! This is the only place values are rounded: ledger weights, attribute
//! sums, distances and ratios all go out with 2 decimals. Sub-area names
//! are emitted sorted. Missing derived values are JSON `null`.

use civic_hex_spatial::round2;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use serde::Deserialize;

use crate::aggregate::{AggregateOutput, HexagonAggregate, UncoveredRecord};

/// Coverage tag of features redistributed over hexagons.
pub const COVERAGE_DISTRIBUTED: &str = "distributed";
/// Coverage tag of source features that overlap no hexagon.
pub const COVERAGE_NONE: &str = "none";

/// Property names written to each output feature.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputLabels {
    /// Contribution ledger on hexagons, plain source id on uncovered
    /// features.
    pub source_ids: String,
    pub sub_areas: String,
    pub attribute: String,
    pub point_count: String,
    pub nearest_distance: String,
    pub ratio: String,
    pub coverage: String,
}

impl Default for OutputLabels {
    fn default() -> Self {
        Self {
            source_ids: "bgri_2021_id".to_string(),
            sub_areas: "freguesias".to_string(),
            attribute: "population".to_string(),
            point_count: "points".to_string(),
            nearest_distance: "nearest_point_distance".to_string(),
            ratio: "ratio".to_string(),
            coverage: "coverage".to_string(),
        }
    }
}

fn rounded(value: Option<f64>) -> JsonValue {
    value.map_or(JsonValue::Null, |v| JsonValue::from(round2(v)))
}

fn feature(properties: JsonObject, geometry: Value) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn uncovered_feature(record: &UncoveredRecord, labels: &OutputLabels) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert(
        labels.source_ids.clone(),
        JsonValue::from(record.source_id.as_str()),
    );
    properties.insert(
        labels.attribute.clone(),
        rounded(Some(record.attribute_value)),
    );
    properties.insert(
        labels.point_count.clone(),
        JsonValue::from(record.point_count),
    );
    properties.insert(
        labels.nearest_distance.clone(),
        rounded(record.nearest_distance),
    );
    properties.insert(labels.ratio.clone(), rounded(record.ratio()));
    properties.insert(labels.coverage.clone(), JsonValue::from(COVERAGE_NONE));

    feature(properties, Value::from(&record.geometry))
}

fn hexagon_feature(hexagon: &HexagonAggregate, labels: &OutputLabels) -> Feature {
    let ledger: JsonObject = hexagon
        .contributions()
        .iter()
        .map(|(id, weight)| (id.clone(), JsonValue::from(round2(*weight))))
        .collect();

    let mut properties = JsonObject::new();
    properties.insert(labels.source_ids.clone(), JsonValue::Object(ledger));
    properties.insert(
        labels.sub_areas.clone(),
        JsonValue::from(hexagon.sorted_sub_areas()),
    );
    properties.insert(
        labels.attribute.clone(),
        rounded(Some(hexagon.attribute_sum())),
    );
    properties.insert(
        labels.point_count.clone(),
        JsonValue::from(hexagon.point_count()),
    );
    properties.insert(
        labels.nearest_distance.clone(),
        rounded(hexagon.nearest_distance()),
    );
    properties.insert(labels.ratio.clone(), rounded(hexagon.ratio()));
    properties.insert(
        labels.coverage.clone(),
        JsonValue::from(COVERAGE_DISTRIBUTED),
    );

    feature(
        properties,
        Value::MultiPolygon(vec![vec![hexagon.cell().ring_positions()]]),
    )
}

/// Serializes `output`: uncovered records first, then hexagons in the
/// order they were first contributed to.
#[must_use]
pub fn to_feature_collection(output: &AggregateOutput, labels: &OutputLabels) -> FeatureCollection {
    let features = output
        .uncovered
        .iter()
        .map(|record| uncovered_feature(record, labels))
        .chain(
            output
                .hexagons
                .iter()
                .map(|hexagon| hexagon_feature(hexagon, labels)),
        )
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use civic_hex_hexagon_models::Attribute;
    use civic_hex_spatial::{PointIndex, parse_feature_collection};
    use geo::{Point, Rect};

    use super::*;
    use crate::aggregate::Aggregator;
    use crate::aggregate::tests::{lisbon_boundary, square, tract, two_cells};
    use crate::grid::H3Grid;
    use crate::progress::NullProgress;

    fn labels() -> OutputLabels {
        OutputLabels {
            attribute: "children_under_14".to_string(),
            point_count: "playground_count".to_string(),
            nearest_distance: "nearest_playground_distance".to_string(),
            ratio: "children_per_playground".to_string(),
            ..OutputLabels::default()
        }
    }

    fn sample_output() -> AggregateOutput {
        let grid = H3Grid::new(9).unwrap();
        let boundary = lisbon_boundary();
        let points = PointIndex::new([Point::new(-9.1405, 38.7203)]);
        let features = vec![
            tract("a", square(Point::new(-9.14, 38.72), 0.003), 37.0),
            tract("b", square(Point::new(-9.138, 38.721), 0.002), 11.0),
        ];
        let mut aggregator =
            Aggregator::new(&grid, &boundary, &points, Attribute::ChildrenUnder14);
        aggregator.add_all(&features, &NullProgress).unwrap();
        aggregator.finish()
    }

    fn numeric_fields(collection: &FeatureCollection, labels: &OutputLabels) -> Vec<Vec<JsonValue>> {
        collection
            .features
            .iter()
            .map(|f| {
                let props = f.properties.as_ref().unwrap();
                vec![
                    props[&labels.source_ids].clone(),
                    props[&labels.attribute].clone(),
                    props[&labels.point_count].clone(),
                    props[&labels.nearest_distance].clone(),
                    props[&labels.ratio].clone(),
                ]
            })
            .collect()
    }

    #[test]
    fn round_trip_is_idempotent() {
        let labels = labels();
        let written = to_feature_collection(&sample_output(), &labels);
        let text = serde_json::to_string(&written).unwrap();
        let reparsed = parse_feature_collection(&text).unwrap();

        assert_eq!(
            numeric_fields(&written, &labels),
            numeric_fields(&reparsed, &labels)
        );

        for feature in &reparsed.features {
            let props = feature.properties.as_ref().unwrap();
            let value = props[&labels.attribute].as_f64().unwrap();
            assert!((round2(value) - value).abs() < f64::EPSILON);
            for weight in props[&labels.source_ids].as_object().unwrap().values() {
                let weight = weight.as_f64().unwrap();
                assert!((round2(weight) - weight).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn hexagon_features_carry_every_property() {
        let labels = labels();
        let output = sample_output();
        let collection = to_feature_collection(&output, &labels);

        assert_eq!(collection.features.len(), output.hexagons.len());
        for feature in &collection.features {
            let props = feature.properties.as_ref().unwrap();
            assert_eq!(props[&labels.coverage], COVERAGE_DISTRIBUTED);
            assert_eq!(
                props[&labels.sub_areas],
                serde_json::json!(["Santo António"])
            );
            let count = props[&labels.point_count].as_u64().unwrap();
            assert_eq!(props[&labels.ratio].is_null(), count == 0);
            assert!(props[&labels.nearest_distance].is_number());
            assert!(matches!(
                feature.geometry.as_ref().map(|g| &g.value),
                Some(Value::MultiPolygon(parts)) if parts.len() == 1 && parts[0].len() == 1
            ));
        }
    }

    #[test]
    fn sub_area_names_are_sorted() {
        let grid = H3Grid::new(8).unwrap();
        let (first, _) = two_cells(&grid);
        let boundary = civic_hex_spatial::BoundaryIndex::new(vec![
            civic_hex_spatial::SubArea {
                code: "2".to_string(),
                name: "Belém".to_string(),
                geometry: geo::MultiPolygon(vec![square(first.centroid, 0.05)]),
            },
            civic_hex_spatial::SubArea {
                code: "1".to_string(),
                name: "Alvalade".to_string(),
                geometry: geo::MultiPolygon(vec![square(Point::new(0.0, 0.0), 1.0)]),
            },
        ]);
        let points = PointIndex::new(Vec::new());
        let mut later = tract("x", square(first.centroid, 0.000_3), 1.0);
        later.sub_area_code = "2".to_string();
        let mut earlier = tract("y", square(first.centroid, 0.000_2), 1.0);
        earlier.sub_area_code = "1".to_string();

        let mut aggregator =
            Aggregator::new(&grid, &boundary, &points, Attribute::ChildrenUnder14);
        aggregator.add_all([&later, &earlier], &NullProgress).unwrap();
        let collection = to_feature_collection(&aggregator.finish(), &labels());

        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["freguesias"], serde_json::json!(["Alvalade", "Belém"]));
        assert_eq!(props["bgri_2021_id"], serde_json::json!({ "x": 1.0, "y": 1.0 }));
    }

    #[test]
    fn uncovered_records_come_first() {
        let porto = Rect::new(
            geo::coord! { x: -8.70, y: 41.10 },
            geo::coord! { x: -8.55, y: 41.20 },
        );
        let covered = H3Grid::new(8).unwrap();
        let clipped = covered.with_extent(porto);
        let boundary = lisbon_boundary();
        let points = PointIndex::new(Vec::new());

        let mut aggregator =
            Aggregator::new(&clipped, &boundary, &points, Attribute::ChildrenUnder14);
        aggregator
            .add(&tract("gap", square(Point::new(-9.14, 38.72), 0.001), 3.0))
            .unwrap();
        let mut output = aggregator.finish();

        let mut other = Aggregator::new(&covered, &boundary, &points, Attribute::ChildrenUnder14);
        other
            .add(&tract("hex", square(Point::new(-9.13, 38.73), 0.000_2), 2.0))
            .unwrap();
        output.hexagons = other.finish().hexagons;

        let collection = to_feature_collection(&output, &labels());
        assert_eq!(collection.features.len(), 2);

        let first = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(first["coverage"], COVERAGE_NONE);
        assert_eq!(first["bgri_2021_id"], "gap");
        assert_eq!(first["children_under_14"], 3.0);
        assert_eq!(first["playground_count"], 0);
        assert!(first["children_per_playground"].is_null());
        assert!(first["nearest_playground_distance"].is_null());

        let second = collection.features[1].properties.as_ref().unwrap();
        assert_eq!(second["coverage"], COVERAGE_DISTRIBUTED);
    }
}
