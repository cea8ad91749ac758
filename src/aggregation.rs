// 📊 Aggregator - Group move records into origin-destination pairs
// count = sum of persons, household_count = number of records per pair

use crate::error::{OdError, OdResult};
use crate::records::MigrationRecord;
use crate::region::RegionCode;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Upper bound for any person or household total; keeps year-over-year
/// differences representable as i64
pub const MAX_COUNT: u64 = i64::MAX as u64;

// ============================================================================
// OD AGGREGATE
// ============================================================================

/// One (source, target) edge within a single year's dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OdAggregate {
    pub source: RegionCode,
    pub target: RegionCode,

    /// Total persons moved along this edge
    pub count: u64,

    /// Number of underlying records (households), not persons
    pub household_count: u64,

    /// Value derived through proportional splitting
    #[serde(default)]
    pub estimated: bool,
}

impl OdAggregate {
    pub fn new(source: RegionCode, target: RegionCode, count: u64, household_count: u64) -> Self {
        OdAggregate {
            source,
            target,
            count,
            household_count,
            estimated: false,
        }
    }

    pub fn key(&self) -> (RegionCode, RegionCode) {
        (self.source.clone(), self.target.clone())
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Add two totals for one edge, failing past `MAX_COUNT`
pub fn add_count(
    total: u64,
    value: u64,
    source: &RegionCode,
    target: &RegionCode,
) -> OdResult<u64> {
    total
        .checked_add(value)
        .filter(|sum| *sum <= MAX_COUNT)
        .ok_or_else(|| OdError::CountOverflow {
            source_code: source.to_string(),
            target_code: target.to_string(),
        })
}

/// Aggregate one year's records, dropping intra-region moves first
///
/// Output is sorted by (source, target).
pub fn aggregate(records: &[MigrationRecord]) -> OdResult<Vec<OdAggregate>> {
    let mut groups: BTreeMap<(RegionCode, RegionCode), (u64, u64)> = BTreeMap::new();
    let mut self_loops = 0usize;

    for record in records {
        if record.is_self_loop() {
            self_loops += 1;
            continue;
        }

        let entry = groups
            .entry((record.source.clone(), record.target.clone()))
            .or_insert((0, 0));
        entry.0 = add_count(entry.0, record.person_count, &record.source, &record.target)?;
        entry.1 = add_count(entry.1, 1, &record.source, &record.target)?;
    }

    log::debug!(
        "Aggregated {} records into {} edges ({} intra-region moves dropped)",
        records.len(),
        groups.len(),
        self_loops
    );

    Ok(groups
        .into_iter()
        .map(|((source, target), (count, households))| {
            OdAggregate::new(source, target, count, households)
        })
        .collect())
}

/// Re-group rows whose keys may now collide
///
/// Sums count and household_count; a group is estimated if any
/// contributing row was. Output is sorted by (source, target).
pub fn group_and_sum(rows: Vec<OdAggregate>) -> OdResult<Vec<OdAggregate>> {
    let mut groups: BTreeMap<(RegionCode, RegionCode), OdAggregate> = BTreeMap::new();

    for row in rows {
        match groups.entry(row.key()) {
            Entry::Occupied(mut existing) => {
                let existing = existing.get_mut();
                existing.count = add_count(existing.count, row.count, &row.source, &row.target)?;
                existing.household_count = add_count(
                    existing.household_count,
                    row.household_count,
                    &row.source,
                    &row.target,
                )?;
                existing.estimated |= row.estimated;
            }
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
        }
    }

    Ok(groups.into_values().collect())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> RegionCode {
        RegionCode::region(s).unwrap()
    }

    fn record(source: &str, target: &str, persons: u64) -> MigrationRecord {
        MigrationRecord::new(code(source), code(target), persons)
    }

    #[test]
    fn test_aggregate_sums_persons_and_counts_records() {
        let records = vec![
            record("11010", "21020", 3),
            record("11010", "21020", 1),
            record("11010", "22030", 2),
        ];

        let aggregates = aggregate(&records).unwrap();
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0], OdAggregate::new(code("11010"), code("21020"), 4, 2));
        assert_eq!(aggregates[1], OdAggregate::new(code("11010"), code("22030"), 2, 1));
    }

    #[test]
    fn test_aggregate_drops_self_loops() {
        let records = vec![record("11010", "11010", 5), record("11010", "11020", 1)];

        let aggregates = aggregate(&records).unwrap();
        assert_eq!(aggregates.len(), 1);
        assert!(aggregates.iter().all(|a| a.source != a.target));
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_group_and_sum_merges_collisions() {
        let mut estimated = OdAggregate::new(code("27720"), code("11010"), 5, 2);
        estimated.estimated = true;

        let rows = vec![
            OdAggregate::new(code("27720"), code("11010"), 10, 3),
            estimated,
            OdAggregate::new(code("11010"), code("27720"), 1, 1),
        ];

        let grouped = group_and_sum(rows).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].source.as_str(), "11010");
        assert!(!grouped[0].estimated);
        assert_eq!(grouped[1].count, 15);
        assert_eq!(grouped[1].household_count, 5);
        assert!(grouped[1].estimated);
    }

    #[test]
    fn test_aggregate_overflow_is_an_error() {
        let huge = crate::records::parse_person_count("5e18").unwrap();
        let records = vec![record("11010", "21020", huge), record("11010", "21020", huge)];

        assert_eq!(
            aggregate(&records),
            Err(OdError::CountOverflow {
                source_code: "11010".to_string(),
                target_code: "21020".to_string(),
            })
        );
    }

    #[test]
    fn test_group_and_sum_overflow_is_an_error() {
        let rows = vec![
            OdAggregate::new(code("27720"), code("11010"), MAX_COUNT, 1),
            OdAggregate::new(code("27720"), code("11010"), 1, 1),
        ];

        assert!(matches!(
            group_and_sum(rows),
            Err(OdError::CountOverflow { .. })
        ));
    }
}
