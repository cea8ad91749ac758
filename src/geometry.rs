// 🧭 Geometry Features - Region identifiers from a GeoJSON FeatureCollection
// Only the code and name properties are read; geometry stays opaque.

use crate::region::RegionCode;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryLayout {
    pub code_property: String,
    pub name_property: String,
}

impl Default for GeometryLayout {
    fn default() -> Self {
        GeometryLayout {
            code_property: "SIGUNGU_CD".to_string(),
            name_property: "SIGUNGU_NM".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default)]
    pub geometry: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

/// Code and name of one geometry-scheme region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionFeature {
    pub code: RegionCode,
    pub name: String,
}

impl RegionFeature {
    pub fn new(code: RegionCode, name: &str) -> Self {
        RegionFeature {
            code,
            name: name.to_string(),
        }
    }
}

fn property_text(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl FeatureCollection {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read geometry file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse geometry file: {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let collection: FeatureCollection =
            serde_json::from_str(content).context("Failed to parse GeoJSON")?;
        if collection.kind != "FeatureCollection" {
            bail!("Expected a FeatureCollection, found '{}'", collection.kind);
        }
        Ok(collection)
    }

    /// Region features with a valid 5-digit code and a name
    ///
    /// Features lacking either are logged and skipped.
    pub fn region_features(&self, layout: &GeometryLayout) -> Vec<RegionFeature> {
        let mut regions = Vec::with_capacity(self.features.len());

        for (index, feature) in self.features.iter().enumerate() {
            let code = property_text(&feature.properties, &layout.code_property);
            let name = property_text(&feature.properties, &layout.name_property);

            match (code.as_deref().map(RegionCode::region), name) {
                (Some(Ok(code)), Some(name)) => regions.push(RegionFeature { code, name }),
                (Some(Err(e)), _) => log::warn!("Feature {}: {}", index, e),
                _ => log::warn!(
                    "Feature {}: missing '{}' or '{}' property",
                    index,
                    layout.code_property,
                    layout.name_property
                ),
            }
        }

        regions
    }
}

// ============================================================================
// TESTS
// ============================================================================
