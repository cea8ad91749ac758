// 🏛️ Administrative Registry - Name → region code table
// Retired registry entries never take part in matching; manual overrides
// are applied last and win over anything derived from the registry.

use crate::region::{RegionCode, REGION_WIDTH};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ============================================================================
// REGISTRY ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryRow {
    pub status: String,

    /// Full administrative code (10 digits, first 5 significant)
    pub admin_code: String,

    pub name: String,

    /// Non-empty ⇒ entry is retired/superseded
    pub retired_on: Option<String>,
}

impl RegistryRow {
    pub fn new(admin_code: &str, name: &str) -> Self {
        RegistryRow {
            status: String::new(),
            admin_code: admin_code.to_string(),
            name: name.to_string(),
            retired_on: None,
        }
    }

    pub fn retired(mut self, date: &str) -> Self {
        self.retired_on = Some(date.to_string());
        self
    }

    pub fn is_active(&self) -> bool {
        self.retired_on
            .as_deref()
            .map(|d| d.trim().is_empty())
            .unwrap_or(true)
    }

    /// Significant 5-digit region code, if the admin code carries one
    pub fn region_code(&self) -> Option<RegionCode> {
        let prefix = self.admin_code.trim().get(..REGION_WIDTH)?;
        RegionCode::region(prefix).ok()
    }
}

// ============================================================================
// LAYOUT + LOADER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryLayout {
    pub status: usize,
    pub code: usize,
    pub name: usize,
    pub retired: usize,

    /// Leading rows (titles, headers) to skip
    pub skip_rows: usize,
}

impl Default for RegistryLayout {
    fn default() -> Self {
        RegistryLayout {
            status: 2,
            code: 3,
            name: 4,
            retired: 5,
            skip_rows: 2,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryLoad {
    pub rows: Vec<RegistryRow>,

    /// Rows missing code or name
    pub skipped: usize,
}

fn non_empty(fields: &StringRecord, column: usize) -> Option<String> {
    fields
        .get(column)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn load_registry_csv(path: &Path, layout: &RegistryLayout) -> Result<RegistryLoad> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open registry file: {}", path.display()))?;

    let mut load = RegistryLoad::default();

    for (index, result) in reader.records().enumerate().skip(layout.skip_rows) {
        let fields = result.with_context(|| {
            format!("Failed to read registry line {} in {}", index + 1, path.display())
        })?;

        let (Some(admin_code), Some(name)) =
            (non_empty(&fields, layout.code), non_empty(&fields, layout.name))
        else {
            load.skipped += 1;
            continue;
        };

        load.rows.push(RegistryRow {
            status: non_empty(&fields, layout.status).unwrap_or_default(),
            admin_code,
            name,
            retired_on: non_empty(&fields, layout.retired),
        });
    }

    log::info!(
        "Loaded {} registry rows from {} ({} skipped)",
        load.rows.len(),
        path.display(),
        load.skipped
    );

    Ok(load)
}

// ============================================================================
// ADMIN NAME TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminNameTable {
    names: BTreeMap<String, RegionCode>,
    retired_rows: usize,
    unusable_codes: usize,
}

impl AdminNameTable {
    /// Build from registry rows, then apply manual overrides
    ///
    /// Later active rows with the same name replace earlier ones.
    pub fn build(rows: &[RegistryRow], overrides: &BTreeMap<String, RegionCode>) -> Self {
        let mut table = AdminNameTable::default();

        for row in rows {
            if !row.is_active() {
                table.retired_rows += 1;
                continue;
            }
            let Some(code) = row.region_code() else {
                log::debug!("Registry code '{}' has no region prefix", row.admin_code);
                table.unusable_codes += 1;
                continue;
            };
            if let Some(previous) = table.names.insert(row.name.clone(), code.clone()) {
                if previous != code {
                    log::debug!("Registry name '{}': {} replaced by {}", row.name, previous, code);
                }
            }
        }

        for (name, code) in overrides {
            table.names.insert(name.clone(), code.clone());
        }

        log::info!(
            "Admin name table: {} names ({} retired rows excluded, {} overrides)",
            table.names.len(),
            table.retired_rows,
            overrides.len()
        );

        table
    }

    pub fn get(&self, name: &str) -> Option<&RegionCode> {
        self.names.get(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn retired_rows(&self) -> usize {
        self.retired_rows
    }

    pub fn unusable_codes(&self) -> usize {
        self.unusable_codes
    }
}

/// Overrides for names the registry cannot resolve on its own
pub fn default_overrides() -> BTreeMap<String, RegionCode> {
    let mut overrides = BTreeMap::new();
    // Sejong has no sub-region level in the registry
    overrides.insert(
        "세종특별자치시 세종시".to_string(),
        RegionCode::from_trusted("36110"),
    );
    overrides
}

// ============================================================================
// TESTS
// ============================================================================
