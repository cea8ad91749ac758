// ⚙️ Engine Configuration - Static tables for one pair of reporting years
// Loaded from JSON; every field defaults, so a partial file overrides only
// what it names.

use crate::geometry::GeometryLayout;
use crate::records::MigrationLayout;
use crate::region::{ProvinceTable, RegionCode};
use crate::registry::{default_overrides, RegistryLayout};
use crate::rules::RuleTable;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Province code → name, for geometry codes and registry names alike
    pub provinces: ProvinceTable,

    /// Composed name → admin code, applied after registry matching
    pub overrides: BTreeMap<String, RegionCode>,

    /// Remap and split tables for the legacy year
    pub rules: RuleTable,

    pub migration: MigrationLayout,
    pub registry: RegistryLayout,
    pub geometry: GeometryLayout,

    /// Exclude malformed migration rows instead of aborting
    pub allow_rejected_records: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            provinces: ProvinceTable::default(),
            overrides: default_overrides(),
            rules: RuleTable::korea_2023_2024(),
            migration: MigrationLayout::default(),
            registry: RegistryLayout::default(),
            geometry: GeometryLayout::default(),
            allow_rejected_records: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.provinces.is_empty() {
            anyhow::bail!("Province table is empty");
        }
        if let Some(code) = self.provinces.entries().keys().find(|c| !c.is_province()) {
            anyhow::bail!("Province table key '{}' is not a 2-digit code", code);
        }
        self.rules.validate().context("Invalid reconciliation rules")?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
