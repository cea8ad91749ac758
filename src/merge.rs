// 🔗 Merger - Current edges with their historical comparison
// Left-biased join driven by the current year's (source, target) keys.

use crate::aggregation::OdAggregate;
use crate::region::RegionCode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedEdge {
    pub source: RegionCode,
    pub target: RegionCode,
    pub count: u64,
    pub household_count: u64,
    pub count_previous: u64,
    pub diff: i64,

    /// Historical value came from a split-derived row
    pub estimated: bool,
}

impl MergedEdge {
    pub fn new(current: &OdAggregate, previous: Option<&OdAggregate>) -> Self {
        let count_previous = previous.map(|p| p.count).unwrap_or(0);

        MergedEdge {
            source: current.source.clone(),
            target: current.target.clone(),
            count: current.count,
            household_count: current.household_count,
            count_previous,
            diff: current.count as i64 - count_previous as i64,
            estimated: previous.map(|p| p.estimated).unwrap_or(false),
        }
    }
}

/// Join current-year edges against reconciled legacy edges
///
/// Pairs present only in the legacy set are dropped. Output keeps the
/// order of `current`.
pub fn merge(current: &[OdAggregate], reconciled_legacy: &[OdAggregate]) -> Vec<MergedEdge> {
    let previous: HashMap<(&RegionCode, &RegionCode), &OdAggregate> = reconciled_legacy
        .iter()
        .map(|agg| ((&agg.source, &agg.target), agg))
        .collect();

    let mut matched = 0usize;
    let merged: Vec<MergedEdge> = current
        .iter()
        .map(|agg| {
            let prev = previous.get(&(&agg.source, &agg.target)).copied();
            if prev.is_some() {
                matched += 1;
            }
            MergedEdge::new(agg, prev)
        })
        .collect();

    log::info!(
        "Merged {} current edges ({} with a previous-year value, {} legacy-only edges dropped)",
        merged.len(),
        matched,
        previous.len().saturating_sub(matched)
    );

    merged
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

    fn agg(source: &str, target: &str, count: u64, households: u64) -> OdAggregate {
        OdAggregate::new(code(source), code(target), count, households)
    }

    #[test]
    fn test_merge_scenario() {
        let legacy = vec![agg("11010", "21020", 10, 1)];
        let current = vec![agg("11010", "21020", 12, 1)];

        let merged = merge(&current, &legacy);
        assert_eq!(
            merged,
            vec![MergedEdge {
                source: code("11010"),
                target: code("21020"),
                count: 12,
                household_count: 1,
                count_previous: 10,
                diff: 2,
                estimated: false,
            }]
        );
    }

    #[test]
    fn test_merge_missing_previous_is_zero() {
        let merged = merge(&[agg("11010", "21020", 5, 2)], &[]);
        assert_eq!(merged[0].count_previous, 0);
        assert_eq!(merged[0].diff, 5);
        assert!(!merged[0].estimated);
    }

    #[test]
    fn test_merge_drops_legacy_only_pairs() {
        let legacy = vec![agg("11010", "21020", 10, 1), agg("21020", "11010", 4, 1)];
        let current = vec![agg("11010", "21020", 3, 1)];

        let merged = merge(&current, &legacy);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].diff, -7);
    }

    #[test]
    fn test_merge_propagates_estimated() {
        let mut previous = agg("41192", "11010", 60, 6);
        previous.estimated = true;
        let merged = merge(&[agg("41192", "11010", 70, 7)], &[previous]);

        assert!(merged[0].estimated);
        assert_eq!(merged[0].diff, 10);
        assert!(merged.iter().all(|e| e.diff == e.count as i64 - e.count_previous as i64));
    }
}
