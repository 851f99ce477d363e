//! `PMTiles` generation via tippecanoe.

use std::ffi::OsString;
use std::io::Read as _;
use std::path::Path;
use std::process::Command;

use crate::GenerateError;

/// Magic bytes every `PMTiles` archive starts with.
const PMTILES_MAGIC: &[u8; 7] = b"PMTiles";

/// Arguments passed to tippecanoe for one layer.
#[must_use]
pub fn tippecanoe_args(input: &Path, output: &Path, layer: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-Z",
        "0",
        "-z",
        "12",
        "--no-feature-limit",
        "--no-tile-size-limit",
        "--simplification=1",
        "-l",
        layer,
        "-o",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(output.as_os_str().to_owned());
    args.push(OsString::from("--force"));
    args.push(input.as_os_str().to_owned());
    args
}

/// Whether `path` starts with the `PMTiles` header. Unreadable or short
/// files are not archives.
#[must_use]
pub fn is_pmtiles(path: &Path) -> bool {
    let mut header = [0_u8; PMTILES_MAGIC.len()];
    std::fs::File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .is_ok_and(|()| &header == PMTILES_MAGIC)
}

/// Builds a `PMTiles` archive from a `GeoJSON` file, replacing `output`.
///
/// # Errors
///
/// Returns [`GenerateError::Tippecanoe`] if tippecanoe cannot be spawned or
/// exits unsuccessfully, and [`GenerateError::NotPmtiles`] if it succeeds
/// without producing a `PMTiles` archive.
pub fn build_pmtiles(input: &Path, output: &Path, layer: &str) -> Result<(), GenerateError> {
    if let Some(dir) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| GenerateError::io(dir, e))?;
    }

    log::info!("Running tippecanoe to generate {}...", output.display());

    let status = Command::new("tippecanoe")
        .args(tippecanoe_args(input, output, layer))
        .status()
        .map_err(|e| GenerateError::Tippecanoe {
            message: e.to_string(),
        })?;

    if !status.success() {
        return Err(GenerateError::Tippecanoe {
            message: status.to_string(),
        });
    }

    if !is_pmtiles(output) {
        return Err(GenerateError::NotPmtiles(output.to_path_buf()));
    }

    log::info!("PMTiles generated: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_name_layer_output_and_input() {
        let args = tippecanoe_args(
            Path::new("in.geojson"),
            Path::new("out.pmtiles"),
            "parques_infantis_h3",
        );
        let args: Vec<&str> = args.iter().map(|a| a.to_str().unwrap()).collect();

        assert_eq!(
            args,
            [
                "-Z",
                "0",
                "-z",
                "12",
                "--no-feature-limit",
                "--no-tile-size-limit",
                "--simplification=1",
                "-l",
                "parques_infantis_h3",
                "-o",
                "out.pmtiles",
                "--force",
                "in.geojson",
            ]
        );
    }

    #[test]
    fn detects_pmtiles_header() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.pmtiles");
        let other = dir.path().join("b.pmtiles");
        let short = dir.path().join("c.pmtiles");
        std::fs::write(&archive, b"PMTiles\x03rest-of-header").unwrap();
        std::fs::write(&other, b"{\"type\":\"FeatureCollection\"}").unwrap();
        std::fs::write(&short, b"PMT").unwrap();

        assert!(is_pmtiles(&archive));
        assert!(!is_pmtiles(&other));
        assert!(!is_pmtiles(&short));
        assert!(!is_pmtiles(&dir.path().join("missing.pmtiles")));
    }
}
