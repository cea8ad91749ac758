// ⚖️ Code Reconciler - Rewrite a legacy year onto the current coding scheme
//
// Two phases, each independently testable:
//   1. rewrite:        remap pass, then split pass (rows scaled, rounded once)
//   2. group_and_sum:  re-aggregate rows whose keys now collide
//
// Codes covered by no rule pass through unchanged.

use crate::aggregation::{group_and_sum, OdAggregate, MAX_COUNT};
use crate::error::{OdError, OdResult};
use crate::region::RegionCode;
use crate::rules::{ReconciliationRule, RuleSet, SplitShare};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub rows_in: usize,
    pub rows_rewritten: usize,
    pub rows_out: usize,
    pub remapped_rows: usize,
    pub split_rows: usize,
    pub dropped_self_loops: usize,
    pub rules: Vec<ReconciliationRule>,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        format!(
            "Reconciled {} legacy edges → {} edges ({} remapped, {} split-derived rows, {} self-loops dropped, {} rules)",
            self.rows_in,
            self.rows_out,
            self.remapped_rows,
            self.split_rows,
            self.dropped_self_loops,
            self.rules.len()
        )
    }
}

// ============================================================================
// REWRITE
// ============================================================================

/// A row in flight through the split pass
///
/// `factor` is the product of every split weight applied so far; rounding
/// happens once, after the last split.
#[derive(Debug, Clone)]
struct WeightedRow {
    source: RegionCode,
    target: RegionCode,
    factor: f64,
    split: bool,
}

#[derive(Debug, Default)]
pub struct Rewrite {
    pub rows: Vec<OdAggregate>,
    pub remapped_rows: usize,
    pub split_rows: usize,
    pub dropped_self_loops: usize,
}

/// Scale a value by a split factor and round half away from zero
pub fn scale(value: u64, factor: f64) -> u64 {
    ((value as f64 * factor).round() as u64).min(MAX_COUNT)
}

// ============================================================================
// CODE RECONCILER
// ============================================================================

pub struct CodeReconciler<'a> {
    rules: &'a RuleSet,
}

impl<'a> CodeReconciler<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        CodeReconciler { rules }
    }

    /// Rewrite codes and re-aggregate
    pub fn reconcile(
        &self,
        legacy: &[OdAggregate],
    ) -> OdResult<(Vec<OdAggregate>, ReconciliationReport)> {
        let rewrite = self.rewrite(legacy)?;
        let rows_rewritten = rewrite.rows.len();
        let reconciled = group_and_sum(rewrite.rows)?;

        let report = ReconciliationReport {
            rows_in: legacy.len(),
            rows_rewritten,
            rows_out: reconciled.len(),
            remapped_rows: rewrite.remapped_rows,
            split_rows: rewrite.split_rows,
            dropped_self_loops: rewrite.dropped_self_loops,
            rules: self.rules.rules(),
            reconciled_at: Utc::now(),
        };

        log::info!("{}", report.summary());
        Ok((reconciled, report))
    }

    /// Apply remap then split rules, without re-aggregating
    pub fn rewrite(&self, legacy: &[OdAggregate]) -> OdResult<Rewrite> {
        let mut out = Rewrite::default();

        for agg in legacy {
            // 1. Remap pass
            let source = self.rules.remap(&agg.source).clone();
            let target = self.rules.remap(&agg.target).clone();
            if source != agg.source || target != agg.target {
                out.remapped_rows += 1;
            }

            if source == target {
                if self.rules.split_for(&source).is_some() {
                    return Err(OdError::UnsupportedSplitComposition {
                        source_code: agg.source.to_string(),
                        target_code: agg.target.to_string(),
                    });
                }
                log::debug!(
                    "Dropping {} → {}: remapped onto a single region",
                    agg.source,
                    agg.target
                );
                out.dropped_self_loops += 1;
                continue;
            }

            // 2. Split pass
            let mut rows = vec![WeightedRow {
                source,
                target,
                factor: 1.0,
                split: false,
            }];

            for (legacy_code, shares) in self.rules.splits() {
                rows = rows
                    .into_iter()
                    .flat_map(|row| {
                        let on_source = &row.source == legacy_code;
                        let on_target = &row.target == legacy_code;
                        let mut expanded = vec![row];
                        if on_source {
                            expanded = split_side(expanded, shares, Side::Source);
                        }
                        if on_target {
                            expanded = split_side(expanded, shares, Side::Target);
                        }
                        expanded
                    })
                    .collect();
            }

            for row in rows {
                if row.source == row.target {
                    out.dropped_self_loops += 1;
                    continue;
                }

                if row.split {
                    out.split_rows += 1;
                }

                out.rows.push(OdAggregate {
                    source: row.source,
                    target: row.target,
                    count: scale(agg.count, row.factor),
                    household_count: scale(agg.household_count, row.factor),
                    estimated: agg.estimated || row.split,
                });
            }
        }

        Ok(out)
    }
}

#[derive(Clone, Copy)]
enum Side {
    Source,
    Target,
}

fn split_side(
    rows: Vec<WeightedRow>,
    shares: &[SplitShare],
    side: Side,
) -> Vec<WeightedRow> {
    rows.into_iter()
        .flat_map(|row| {
            shares.iter().map(move |share| {
                let mut next = row.clone();
                match side {
                    Side::Source => next.source = share.code.clone(),
                    Side::Target => next.target = share.code.clone(),
                }
                next.factor *= share.weight;
                next.split = true;
                next
            })
        })
        .collect()
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

    fn split(from: &str, shares: &[(&str, f64)]) -> ReconciliationRule {
        ReconciliationRule::Split {
            from: code(from),
            shares: shares
                .iter()
                .map(|(c, w)| SplitShare {
                    code: code(c),
                    weight: *w,
                })
                .collect(),
        }
    }

    fn remap(from: &str, to: &str) -> ReconciliationRule {
        ReconciliationRule::Remap {
            from: code(from),
            to: code(to),
        }
    }

    #[test]
    fn test_empty_rules_are_identity() {
        let rules = RuleSet::new();
        let legacy = vec![agg("11010", "21020", 10, 1), agg("21020", "11010", 7, 3)];

        let (reconciled, report) = CodeReconciler::new(&rules).reconcile(&legacy).unwrap();
        assert_eq!(reconciled, legacy);
        assert_eq!(report.remapped_rows, 0);
        assert_eq!(report.split_rows, 0);
    }

    #[test]
    fn test_split_scenario() {
        let rules =
            RuleSet::from_rules(vec![split("41190", &[("41192", 0.6), ("41194", 0.4)])]).unwrap();
        let legacy = vec![agg("41190", "11010", 100, 10)];

        let (reconciled, report) = CodeReconciler::new(&rules).reconcile(&legacy).unwrap();

        let mut expected_y = agg("41192", "11010", 60, 6);
        expected_y.estimated = true;
        let mut expected_z = agg("41194", "11010", 40, 4);
        expected_z.estimated = true;

        assert_eq!(reconciled, vec![expected_y, expected_z]);
        assert_eq!(report.split_rows, 2);
    }

    #[test]
    fn test_split_target_side() {
        let rules =
            RuleSet::from_rules(vec![split("41190", &[("41192", 0.5), ("41194", 0.5)])]).unwrap();
        let legacy = vec![agg("11010", "41190", 9, 3)];

        let reconciled = CodeReconciler::new(&rules).rewrite(&legacy).unwrap().rows;
        assert_eq!(reconciled.len(), 2);
        assert!(reconciled.iter().all(|r| r.source.as_str() == "11010" && r.estimated));
        // 4.5 and 1.5 both round away from zero
        assert_eq!(reconciled[0].count, 5);
        assert_eq!(reconciled[0].household_count, 2);
    }

    #[test]
    fn test_count_conservation_under_split() {
        let weights = [("41192", 0.37), ("41194", 0.41), ("41196", 0.22)];
        let rules = RuleSet::from_rules(vec![split("41190", &weights)]).unwrap();

        for count in [1u64, 7, 99, 1001, 12345] {
            let legacy = vec![agg("41190", "11010", count, count)];
            let rows = CodeReconciler::new(&rules).rewrite(&legacy).unwrap().rows;
            let total: u64 = rows.iter().map(|r| r.count).sum();
            let tolerance = (weights.len() - 1) as i64;
            assert!((total as i64 - count as i64).abs() <= tolerance);
        }
    }

    #[test]
    fn test_rounding_happens_after_scaling() {
        let rules =
            RuleSet::from_rules(vec![split("41190", &[("41192", 0.5), ("41194", 0.5)])]).unwrap();
        let legacy = vec![agg("41190", "11010", 5, 1)];

        let rows = CodeReconciler::new(&rules).rewrite(&legacy).unwrap().rows;
        assert_eq!(rows[0].count, 3);
        assert_eq!(rows[0].household_count, 1);
    }

    #[test]
    fn test_remap_collision_is_reaggregated() {
        let rules = RuleSet::from_rules(vec![remap("47720", "27720")]).unwrap();
        let legacy = vec![
            agg("47720", "11010", 10, 2),
            agg("27720", "11010", 5, 1),
            agg("11010", "47720", 3, 1),
        ];

        let (reconciled, report) = CodeReconciler::new(&rules).reconcile(&legacy).unwrap();
        assert_eq!(
            reconciled,
            vec![agg("11010", "27720", 3, 1), agg("27720", "11010", 15, 3)]
        );
        assert_eq!(report.remapped_rows, 2);
        assert_eq!(report.rows_out, 2);
    }

    #[test]
    fn test_remap_self_loop_is_dropped() {
        let rules = RuleSet::from_rules(vec![remap("47720", "27720")]).unwrap();
        let legacy = vec![agg("47720", "27720", 4, 1)];

        let rewrite = CodeReconciler::new(&rules).rewrite(&legacy).unwrap();
        assert!(rewrite.rows.is_empty());
        assert_eq!(rewrite.dropped_self_loops, 1);
    }

    #[test]
    fn test_same_split_on_both_sides_is_unsupported() {
        let rules = RuleSet::from_rules(vec![
            remap("47720", "41190"),
            split("41190", &[("41192", 0.5), ("41194", 0.5)]),
        ])
        .unwrap();
        let legacy = vec![agg("47720", "41190", 4, 1)];

        let err = CodeReconciler::new(&rules).reconcile(&legacy).unwrap_err();
        assert!(matches!(err, OdError::UnsupportedSplitComposition { .. }));
    }

    #[test]
    fn test_two_split_rules_compose_before_rounding() {
        let rules = RuleSet::from_rules(vec![
            split("41190", &[("41192", 0.5), ("41194", 0.5)]),
            split("43110", &[("43111", 0.5), ("43112", 0.5)]),
        ])
        .unwrap();
        let legacy = vec![agg("41190", "43110", 10, 2)];

        let rows = CodeReconciler::new(&rules).rewrite(&legacy).unwrap().rows;
        assert_eq!(rows.len(), 4);
        // 10 * 0.25 = 2.5 → 3, rounded once
        assert!(rows.iter().all(|r| r.count == 3 && r.estimated));
    }

    #[test]
    fn test_split_rows_carry_weighted_shares_on_both_sides() {
        let rules = RuleSet::from_rules(vec![split("41190", &[("41192", 0.75), ("41194", 0.25)])])
            .unwrap();
        let legacy = vec![agg("41190", "11010", 8, 4), agg("11010", "41190", 4, 4)];

        let rows = CodeReconciler::new(&rules).rewrite(&legacy).unwrap().rows;
        let counts: Vec<u64> = rows.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![6, 2, 3, 1]);
        assert!(rows.iter().all(|r| r.estimated));
    }

    #[test]
    fn test_uncovered_codes_pass_through() {
        let rules = RuleSet::from_rules(vec![remap("47720", "27720")]).unwrap();
        let legacy = vec![agg("11010", "21020", 1, 1)];

        let (reconciled, _) = CodeReconciler::new(&rules).reconcile(&legacy).unwrap();
        assert_eq!(reconciled, legacy);
    }
}
