// 🗺️ Region Codes - Fixed-width hierarchical identifiers
// Province = 2 digits, region = 5 digits, parent = leading 2 digits.
// Codes are compared as strings, never as numbers.

use crate::error::{OdError, OdResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const PROVINCE_WIDTH: usize = 2;
pub const SUB_REGION_WIDTH: usize = 3;
pub const REGION_WIDTH: usize = PROVINCE_WIDTH + SUB_REGION_WIDTH;

// ============================================================================
// REGION CODE
// ============================================================================

/// Validated region identifier (province or region scheme)
///
/// Always zero-padded to its scheme's width. Construction fails on any
/// other width or on non-digit characters; nothing is padded or trimmed
/// beyond surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionCode(String);

impl RegionCode {
    /// 5-digit region code
    pub fn region(value: &str) -> OdResult<Self> {
        Self::with_width(value, REGION_WIDTH)
    }

    /// 2-digit province code
    pub fn province(value: &str) -> OdResult<Self> {
        Self::with_width(value, PROVINCE_WIDTH)
    }

    /// Build a region code from its province and sub-region components
    ///
    /// Each component is checked for its own width first, so "1" + "1010"
    /// is rejected even though the concatenation has five digits.
    pub fn compose(province: &str, sub_region: &str) -> OdResult<Self> {
        let province = Self::province(province)?;
        let sub_region = sub_region.trim();
        if !is_digits(sub_region, SUB_REGION_WIDTH) {
            return Err(OdError::InvalidRegionCode {
                value: sub_region.to_string(),
                width: SUB_REGION_WIDTH,
            });
        }
        Ok(RegionCode(format!("{}{}", province.0, sub_region)))
    }

    fn with_width(value: &str, width: usize) -> OdResult<Self> {
        let value = value.trim();
        if is_digits(value, width) {
            Ok(RegionCode(value.to_string()))
        } else {
            Err(OdError::InvalidRegionCode {
                value: value.to_string(),
                width,
            })
        }
    }

    /// Literal codes from built-in tables
    pub(crate) fn from_trusted(value: &str) -> Self {
        RegionCode(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent province prefix (the whole code for a province code)
    pub fn province_prefix(&self) -> &str {
        &self.0[..PROVINCE_WIDTH]
    }

    pub fn is_province(&self) -> bool {
        self.0.len() == PROVINCE_WIDTH
    }
}

fn is_digits(value: &str, width: usize) -> bool {
    value.len() == width && value.bytes().all(|b| b.is_ascii_digit())
}

impl TryFrom<String> for RegionCode {
    type Error = OdError;

    fn try_from(value: String) -> OdResult<Self> {
        match value.trim().len() {
            PROVINCE_WIDTH => Self::province(&value),
            _ => Self::region(&value),
        }
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// PROVINCE TABLE
// ============================================================================

/// Province code → province name lookup
///
/// Used both to interpret geometry codes and to compose registry names,
/// and re-emitted verbatim as the province lookup artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvinceTable(BTreeMap<RegionCode, String>);

impl ProvinceTable {
    pub fn new(entries: BTreeMap<RegionCode, String>) -> Self {
        ProvinceTable(entries)
    }

    /// Name for the province owning `code` (any width)
    pub fn name_for(&self, code: &str) -> Option<&str> {
        let prefix = code.get(..PROVINCE_WIDTH)?;
        self.0
            .iter()
            .find(|(province, _)| province.as_str() == prefix)
            .map(|(_, name)| name.as_str())
    }

    /// Compose the lookup name "{province} {sub-region}"
    ///
    /// An unknown province yields just the trimmed sub-region name, which
    /// then simply fails to match.
    pub fn compose_name(&self, code: &str, sub_region_name: &str) -> String {
        let province = self.name_for(code).unwrap_or("");
        format!("{} {}", province, sub_region_name.trim())
            .trim()
            .to_string()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<RegionCode, String> {
        &self.0
    }
}

impl Default for ProvinceTable {
    fn default() -> Self {
        let entries = [
            ("11", "서울특별시"),
            ("21", "부산광역시"),
            ("22", "대구광역시"),
            ("23", "인천광역시"),
            ("24", "광주광역시"),
            ("25", "대전광역시"),
            ("26", "울산광역시"),
            ("29", "세종특별자치시"),
            ("31", "경기도"),
            ("32", "강원특별자치도"),
            ("33", "충청북도"),
            ("34", "충청남도"),
            ("35", "전북특별자치도"),
            ("36", "전라남도"),
            ("37", "경상북도"),
            ("38", "경상남도"),
            ("39", "제주특별자치도"),
        ];

        ProvinceTable(
            entries
                .into_iter()
                .map(|(code, name)| (RegionCode(code.to_string()), name.to_string()))
                .collect(),
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
