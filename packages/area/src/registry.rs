//! Area registry: loads all area definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/area/areas/` is baked into the binary at
//! compile time via [`include_str!`]. Adding an area means adding a TOML
//! file and listing it below.

use crate::{AreaDefinition, AreaError, parse_area_toml};

/// TOML configs embedded at compile time.
const AREA_TOMLS: &[(&str, &str)] = &[
    (
        "parques_infantis",
        include_str!("../areas/parques_infantis.toml"),
    ),
    ("pre_escolar", include_str!("../areas/pre_escolar.toml")),
    ("populacao", include_str!("../areas/populacao.toml")),
];

/// Returns all configured area definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so this
/// is caught by the registry tests).
#[must_use]
pub fn all_areas() -> Vec<AreaDefinition> {
    AREA_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_area_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up one built-in area.
///
/// # Errors
///
/// Returns [`AreaError::Unknown`] if no area has this id.
pub fn area_by_id(id: &str) -> Result<AreaDefinition, AreaError> {
    all_areas()
        .into_iter()
        .find(|area| area.id == id)
        .ok_or_else(|| AreaError::Unknown(id.to_string()))
}

#[cfg(test)]
mod tests {
    use civic_hex_hexagon::models::Attribute;

    use super::*;

    #[test]
    fn loads_all_areas() {
        assert_eq!(all_areas().len(), AREA_TOMLS.len());
    }

    #[test]
    fn file_names_match_ids() {
        for ((name, _), area) in AREA_TOMLS.iter().zip(all_areas()) {
            assert_eq!(*name, area.id);
        }
    }

    #[test]
    fn outputs_and_layers_are_unique() {
        let areas = all_areas();
        let mut outputs: Vec<&str> = areas.iter().map(|a| a.output.as_str()).collect();
        let mut layers: Vec<&str> = areas.iter().map(|a| a.layer.as_str()).collect();
        outputs.sort_unstable();
        outputs.dedup();
        layers.sort_unstable();
        layers.dedup();

        assert_eq!(outputs.len(), areas.len());
        assert_eq!(layers.len(), areas.len());
    }

    #[test]
    fn playground_area_counts_children() {
        let area = area_by_id("parques_infantis").unwrap();

        assert_eq!(area.attribute, Attribute::ChildrenUnder14);
        assert_eq!(area.labels.point_count, "playground_count");
        assert_eq!(area.labels.ratio, "children_per_playground");
    }

    #[test]
    fn unknown_area_is_an_error() {
        assert!(matches!(
            area_by_id("nope"),
            Err(AreaError::Unknown(id)) if id == "nope"
        ));
    }
}
