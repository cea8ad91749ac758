// 🔀 Crosswalk Builder - Geometry scheme → administrative scheme by name
// The two schemes share no key; only the composed "{province} {region}"
// name links them. Gaps are reported, never fatal.

use crate::geometry::RegionFeature;
use crate::region::{ProvinceTable, RegionCode};
use crate::registry::AdminNameTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum unmatched entries listed in the report
pub const PREVIEW_LIMIT: usize = 20;

// ============================================================================
// CROSSWALK
// ============================================================================

/// Geometry region code → administrative region code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crosswalk(BTreeMap<RegionCode, RegionCode>);

impl Crosswalk {
    pub fn get(&self, geometry_code: &RegionCode) -> Option<&RegionCode> {
        self.0.get(geometry_code)
    }

    pub fn contains(&self, geometry_code: &RegionCode) -> bool {
        self.0.contains_key(geometry_code)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<RegionCode, RegionCode> {
        &self.0
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct CrosswalkBuilder<'a> {
    provinces: &'a ProvinceTable,
    admin: &'a AdminNameTable,
}

impl<'a> CrosswalkBuilder<'a> {
    pub fn new(provinces: &'a ProvinceTable, admin: &'a AdminNameTable) -> Self {
        CrosswalkBuilder { provinces, admin }
    }

    pub fn lookup_name(&self, feature: &RegionFeature) -> String {
        self.provinces
            .compose_name(feature.code.as_str(), &feature.name)
    }

    /// Match every feature by composed name
    pub fn build(&self, features: &[RegionFeature]) -> Crosswalk {
        let mut entries = BTreeMap::new();

        for feature in features {
            let name = self.lookup_name(feature);
            match self.admin.get(&name) {
                Some(admin_code) => {
                    entries.insert(feature.code.clone(), admin_code.clone());
                }
                None => log::debug!("No registry match for '{}' ({})", name, feature.code),
            }
        }

        log::info!(
            "Crosswalk matched {} of {} geometry features",
            entries.len(),
            features.len()
        );

        Crosswalk(entries)
    }

    /// Report every feature whose code is absent from the crosswalk
    pub fn validate(&self, features: &[RegionFeature], crosswalk: &Crosswalk) -> UnmatchedReport {
        let mut seen = BTreeMap::new();

        for feature in features {
            if !crosswalk.contains(&feature.code) {
                seen.entry(feature.code.clone())
                    .or_insert_with(|| self.lookup_name(feature));
            }
        }

        UnmatchedReport {
            features: features.len(),
            unmatched: seen
                .into_iter()
                .map(|(code, name)| UnmatchedRegion { code, name })
                .collect(),
        }
    }
}

// ============================================================================
// VALIDATION REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedRegion {
    pub code: RegionCode,
    pub name: String,
}

impl fmt::Display for UnmatchedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedReport {
    pub features: usize,

    /// One entry per unmatched geometry code, ordered by code
    pub unmatched: Vec<UnmatchedRegion>,
}

impl UnmatchedReport {
    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }

    pub fn preview(&self) -> &[UnmatchedRegion] {
        &self.unmatched[..self.unmatched.len().min(PREVIEW_LIMIT)]
    }

    /// Entries beyond the preview
    pub fn remainder(&self) -> usize {
        self.unmatched.len().saturating_sub(PREVIEW_LIMIT)
    }
}

impl fmt::Display for UnmatchedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_complete() {
            return writeln!(
                f,
                "Success: all {} geometry regions are mapped to admin codes.",
                self.features
            );
        }

        writeln!(
            f,
            "Warning: {} regions in the geometry are NOT mapped to admin codes:",
            self.unmatched.len()
        )?;
        for region in self.preview() {
            writeln!(f, " - {}", region)?;
        }
        if self.remainder() > 0 {
            writeln!(f, " ... and {} more.", self.remainder())?;
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
