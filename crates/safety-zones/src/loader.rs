//! Zone loading from JSON files

use crate::{Result, SafetyZone, ZoneIndex};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// Container for zone JSON, either `{"safety_zones": [...]}` or a bare array
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZoneFile {
    Wrapped { safety_zones: Vec<SafetyZone> },
    Bare(Vec<SafetyZone>),
}

/// Load and validate a zone index from a JSON file
pub fn load_zones(path: &Path) -> Result<ZoneIndex> {
    info!("Loading safety zones from {:?}", path);

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let zones = match serde_json::from_reader(reader)? {
        ZoneFile::Wrapped { safety_zones } => safety_zones,
        ZoneFile::Bare(zones) => zones,
    };

    let index = ZoneIndex::new(zones)?;
    info!("Loaded {} safety zones", index.len());

    Ok(index)
}
