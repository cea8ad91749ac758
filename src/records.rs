// 📥 Migration Records - One row per migrating household observation
// Headerless CSV, five relevant fields at fixed positions.

use crate::aggregation::MAX_COUNT;
use crate::error::{OdError, OdResult};
use crate::region::RegionCode;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub source: RegionCode,
    pub target: RegionCode,
    pub person_count: u64,
}

impl MigrationRecord {
    pub fn new(source: RegionCode, target: RegionCode, person_count: u64) -> Self {
        MigrationRecord {
            source,
            target,
            person_count,
        }
    }

    /// Build a record from raw CSV fields using the configured layout
    pub fn from_fields(fields: &StringRecord, layout: &MigrationLayout) -> OdResult<Self> {
        let field = |name: &'static str, column: usize| {
            fields
                .get(column)
                .ok_or(OdError::MissingField { field: name, column })
        };

        let source = RegionCode::compose(
            field("source_province", layout.source_province)?,
            field("source_sub_region", layout.source_sub_region)?,
        )?;
        let target = RegionCode::compose(
            field("target_province", layout.target_province)?,
            field("target_sub_region", layout.target_sub_region)?,
        )?;
        let person_count = parse_person_count(field("person_count", layout.person_count)?)?;

        Ok(MigrationRecord::new(source, target, person_count))
    }

    /// Intra-region moves are not edges
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Accepts "3" and "3.0"; rejects fractions, negatives, NaN, blanks and
/// anything above `MAX_COUNT`
pub fn parse_person_count(raw: &str) -> OdResult<u64> {
    let trimmed = raw.trim();
    if let Ok(count) = trimmed.parse::<u64>() {
        return if count <= MAX_COUNT {
            Ok(count)
        } else {
            Err(OdError::InvalidPersonCount(raw.to_string()))
        };
    }

    match trimmed.parse::<f64>() {
        // MAX_COUNT as f64 rounds up to 2^63, so the bound is exclusive
        Ok(value)
            if value.is_finite()
                && value >= 0.0
                && value < MAX_COUNT as f64
                && value.fract() == 0.0 =>
        {
            Ok(value as u64)
        }
        _ => Err(OdError::InvalidPersonCount(raw.to_string())),
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Column positions in the yearly migration file
///
/// Defaults follow the household-move microdata: the destination
/// (move-in) fields come first, the origin (move-out) fields at 6/7.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationLayout {
    pub target_province: usize,
    pub target_sub_region: usize,
    pub source_province: usize,
    pub source_sub_region: usize,
    pub person_count: usize,
    pub has_headers: bool,
}

impl Default for MigrationLayout {
    fn default() -> Self {
        MigrationLayout {
            target_province: 0,
            target_sub_region: 1,
            source_province: 6,
            source_sub_region: 7,
            person_count: 14,
            has_headers: false,
        }
    }
}

// ============================================================================
// LOADER
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// 1-based line in the source file
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<MigrationRecord>,
    pub rejected: Vec<RejectedRow>,
}

impl LoadedRecords {
    /// Fail if any row was rejected
    pub fn ensure_clean(&self, file: &str) -> OdResult<()> {
        match self.rejected.first() {
            None => Ok(()),
            Some(first) => Err(OdError::RejectedRecords {
                file: file.to_string(),
                count: self.rejected.len(),
                first_line: first.line,
                first_reason: first.reason.clone(),
            }),
        }
    }
}

/// Load one year's migration records
///
/// Malformed rows are collected, never coerced; the caller decides
/// whether rejections abort the stage.
pub fn load_migration_csv(path: &Path, layout: &MigrationLayout) -> Result<LoadedRecords> {
    let mut reader = ReaderBuilder::new()
        .has_headers(layout.has_headers)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open migration file: {}", path.display()))?;

    let mut loaded = LoadedRecords::default();

    for result in reader.records() {
        let fields = result
            .with_context(|| format!("Failed to read CSV record in {}", path.display()))?;
        let line = fields
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();

        match MigrationRecord::from_fields(&fields, layout) {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                log::warn!("{}:{}: rejected migration record: {}", path.display(), line, e);
                loaded.rejected.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
            }
        }
    }

    log::info!(
        "Loaded {} migration records from {} ({} rejected)",
        loaded.records.len(),
        path.display(),
        loaded.rejected.len()
    );

    Ok(loaded)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(fields: &[&str]) -> StringRecord {
        StringRecord::from(fields.to_vec())
    }

    fn full_row(target: (&str, &str), source: (&str, &str), count: &str) -> StringRecord {
        let mut fields = vec!["x"; 15];
        fields[0] = target.0;
        fields[1] = target.1;
        fields[6] = source.0;
        fields[7] = source.1;
        fields[14] = count;
        row(&fields)
    }

    #[test]
    fn test_from_fields_default_layout() {
        let fields = full_row(("11", "010"), ("21", "020"), "3");
        let record = MigrationRecord::from_fields(&fields, &MigrationLayout::default()).unwrap();

        assert_eq!(record.source.as_str(), "21020");
        assert_eq!(record.target.as_str(), "11010");
        assert_eq!(record.person_count, 3);
        assert!(!record.is_self_loop());
    }

    #[test]
    fn test_from_fields_rejects_bad_width() {
        let fields = full_row(("11", "10"), ("21", "020"), "3");
        let err = MigrationRecord::from_fields(&fields, &MigrationLayout::default()).unwrap_err();
        assert!(matches!(err, OdError::InvalidRegionCode { .. }));
    }

    #[test]
    fn test_from_fields_missing_column() {
        let fields = row(&["11", "010"]);
        let err = MigrationRecord::from_fields(&fields, &MigrationLayout::default()).unwrap_err();
        assert_eq!(
            err,
            OdError::MissingField {
                field: "source_province",
                column: 6
            }
        );
    }

    #[test]
    fn test_parse_person_count() {
        assert_eq!(parse_person_count("4").unwrap(), 4);
        assert_eq!(parse_person_count(" 2.0 ").unwrap(), 2);
        assert!(parse_person_count("").is_err());
        assert!(parse_person_count("abc").is_err());
        assert!(parse_person_count("-1").is_err());
        assert!(parse_person_count("1.5").is_err());
        assert!(parse_person_count("NaN").is_err());
    }

    #[test]
    fn test_parse_person_count_rejects_out_of_range() {
        assert_eq!(
            parse_person_count("1e20"),
            Err(OdError::InvalidPersonCount("1e20".to_string()))
        );
        assert!(parse_person_count("18446744073709551615").is_err());
        assert!(parse_person_count("9223372036854775808").is_err());
        assert_eq!(parse_person_count("9223372036854775807").unwrap(), MAX_COUNT);
        assert_eq!(parse_person_count("1e3").unwrap(), 1000);
    }

    #[test]
    fn test_load_collects_rejections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "11,010,a,a,a,a,21,020,a,a,a,a,a,a,2").unwrap();
        writeln!(file, "11,010,a,a,a,a,21,020,a,a,a,a,a,a,oops").unwrap();
        writeln!(file, "11,010,a,a,a,a,21,020,a,a,a,a,a,a,1").unwrap();
        file.flush().unwrap();

        let loaded = load_migration_csv(file.path(), &MigrationLayout::default()).unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.rejected.len(), 1);
        assert_eq!(loaded.rejected[0].line, 2);

        let err = loaded.ensure_clean("2023.csv").unwrap_err();
        assert!(matches!(err, OdError::RejectedRecords { count: 1, first_line: 2, .. }));
    }

    #[test]
    fn test_rejected_line_accounts_for_multiline_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "11,010,\"first\nsecond\",a,a,a,21,020,a,a,a,a,a,a,2").unwrap();
        writeln!(file, "11,010,a,a,a,a,21,020,a,a,a,a,a,a,oops").unwrap();
        file.flush().unwrap();

        let loaded = load_migration_csv(file.path(), &MigrationLayout::default()).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.rejected[0].line, 3);
    }

    #[test]
    fn test_rejected_line_skips_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "a,b,c,d,e,f,g,h,i,j,k,l,m,n,o").unwrap();
        writeln!(file, "11,010,a,a,a,a,21,020,a,a,a,a,a,a,-3").unwrap();
        file.flush().unwrap();

        let layout = MigrationLayout {
            has_headers: true,
            ..MigrationLayout::default()
        };
        let loaded = load_migration_csv(file.path(), &layout).unwrap();
        assert_eq!(loaded.rejected[0].line, 2);
    }
}
