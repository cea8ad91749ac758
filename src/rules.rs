// 🏷️ Reconciliation Rules - Rules as Data
// Static remap/split tables for one pair of reporting years. Only split
// weights are derived at run time, from the current year's distribution.

use crate::aggregation::OdAggregate;
use crate::error::{OdError, OdResult};
use crate::region::RegionCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Tolerance used when checking that split weights sum to 1
pub const WEIGHT_TOLERANCE: f64 = 1e-9;

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitShare {
    pub code: RegionCode,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconciliationRule {
    /// 1:1 rewrite of a renumbered region
    Remap { from: RegionCode, to: RegionCode },

    /// One historical region subdivided into several current regions
    Split {
        from: RegionCode,
        shares: Vec<SplitShare>,
    },
}

impl ReconciliationRule {
    pub fn legacy_code(&self) -> &RegionCode {
        match self {
            ReconciliationRule::Remap { from, .. } => from,
            ReconciliationRule::Split { from, .. } => from,
        }
    }

    /// Sum of split weights (1.0 for a remap)
    pub fn weight_total(&self) -> f64 {
        match self {
            ReconciliationRule::Remap { .. } => 1.0,
            ReconciliationRule::Split { shares, .. } => shares.iter().map(|s| s.weight).sum(),
        }
    }

    /// Check a resolved rule on its own
    ///
    /// Splits need at least one share, every weight in [0, 1], and weights
    /// summing to 1 within `WEIGHT_TOLERANCE`.
    pub fn validate(&self) -> OdResult<()> {
        let code = self.legacy_code();
        match self {
            ReconciliationRule::Remap { to, .. } => {
                if to == code {
                    return Err(invalid(code, "remap onto itself"));
                }
            }
            ReconciliationRule::Split { shares, .. } => {
                if shares.is_empty() {
                    return Err(invalid(code, "split has no targets"));
                }
                if shares
                    .iter()
                    .any(|s| !s.weight.is_finite() || !(0.0..=1.0).contains(&s.weight))
                {
                    return Err(invalid(code, "split weight outside [0, 1]"));
                }
                if shares.iter().any(|s| &s.code == code) {
                    return Err(invalid(code, "split lists its own code as a target"));
                }
                let total = self.weight_total();
                if (total - 1.0).abs() > WEIGHT_TOLERANCE {
                    return Err(invalid(
                        code,
                        &format!("split weights sum to {} instead of 1", total),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// RULE TABLE (configuration)
// ============================================================================

/// Configured rules before split weights are known
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTable {
    /// legacy code → current code
    pub remap: BTreeMap<RegionCode, RegionCode>,

    /// legacy code → current codes it was subdivided into
    pub split: BTreeMap<RegionCode, Vec<RegionCode>>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the 2023 → 2024 household-move releases
    pub fn korea_2023_2024() -> Self {
        let code = RegionCode::from_trusted;
        let mut table = RuleTable::new();

        // Gunwi county moved from Gyeongbuk to Daegu
        table.remap.insert(code("47720"), code("27720"));

        // Bucheon re-established three districts
        table.split.insert(
            code("41190"),
            vec![code("41192"), code("41194"), code("41196")],
        );

        table
    }

    pub fn is_empty(&self) -> bool {
        self.remap.is_empty() && self.split.is_empty()
    }

    /// Check rule consistency
    ///
    /// Each rule must target a disjoint legacy code and no rule may feed
    /// into another legacy code (rules are applied in a single pass).
    pub fn validate(&self) -> OdResult<()> {
        for (from, to) in &self.remap {
            if from == to {
                return Err(invalid(from, "remap onto itself"));
            }
            if self.split.contains_key(from) {
                return Err(invalid(from, "code has both a remap and a split rule"));
            }
            if self.remap.contains_key(to) {
                return Err(invalid(from, "remap target is itself remapped"));
            }
        }

        for (from, targets) in &self.split {
            if targets.is_empty() {
                return Err(invalid(from, "split has no targets"));
            }
            let distinct: BTreeSet<&RegionCode> = targets.iter().collect();
            if distinct.len() != targets.len() {
                return Err(invalid(from, "split lists a target more than once"));
            }
            if distinct.contains(from) {
                return Err(invalid(from, "split lists its own code as a target"));
            }
            if targets
                .iter()
                .any(|t| self.split.contains_key(t) || self.remap.contains_key(t))
            {
                return Err(invalid(from, "split target is itself a legacy code"));
            }
        }

        Ok(())
    }

    /// Resolve split weights against the current year's aggregates
    pub fn resolve(&self, current: &[OdAggregate]) -> OdResult<RuleSet> {
        self.validate()?;

        let mut rules: Vec<ReconciliationRule> = self
            .remap
            .iter()
            .map(|(from, to)| ReconciliationRule::Remap {
                from: from.clone(),
                to: to.clone(),
            })
            .collect();

        for (from, targets) in &self.split {
            let shares = split_weights(targets, current);
            log::info!(
                "Split {} → {}",
                from,
                shares
                    .iter()
                    .map(|s| format!("{}:{:.4}", s.code, s.weight))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            rules.push(ReconciliationRule::Split {
                from: from.clone(),
                shares,
            });
        }

        RuleSet::from_rules(rules)
    }
}

fn invalid(code: &RegionCode, reason: &str) -> OdError {
    OdError::InvalidRule {
        code: code.to_string(),
        reason: reason.to_string(),
    }
}

/// Weight of each target = its share of inbound household volume
///
/// Falls back to uniform 1/n when the targets carry no inbound
/// households at all in the current year.
pub fn split_weights(targets: &[RegionCode], current: &[OdAggregate]) -> Vec<SplitShare> {
    let volumes: Vec<u64> = targets
        .iter()
        .map(|code| {
            current
                .iter()
                .filter(|agg| &agg.target == code)
                .map(|agg| agg.household_count)
                .sum()
        })
        .collect();

    let total: u64 = volumes.iter().sum();

    if total == 0 {
        log::warn!(
            "No current-year volume for split targets {:?}; using uniform weights",
            targets.iter().map(|c| c.as_str()).collect::<Vec<_>>()
        );
        let uniform = 1.0 / targets.len() as f64;
        return targets
            .iter()
            .map(|code| SplitShare {
                code: code.clone(),
                weight: uniform,
            })
            .collect();
    }

    targets
        .iter()
        .zip(volumes)
        .map(|(code, volume)| SplitShare {
            code: code.clone(),
            weight: volume as f64 / total as f64,
        })
        .collect()
}

// ============================================================================
// RULE SET (resolved)
// ============================================================================

/// Resolved rules ready for the reconciler
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    remaps: BTreeMap<RegionCode, RegionCode>,
    splits: BTreeMap<RegionCode, Vec<SplitShare>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set from resolved rules; later rules for the same code win
    pub fn from_rules(rules: Vec<ReconciliationRule>) -> OdResult<Self> {
        let mut set = RuleSet::new();
        for rule in rules {
            set.add_rule(rule)?;
        }
        Ok(set)
    }

    pub fn add_rule(&mut self, rule: ReconciliationRule) -> OdResult<()> {
        rule.validate()?;
        match rule {
            ReconciliationRule::Remap { from, to } => {
                self.remaps.insert(from, to);
            }
            ReconciliationRule::Split { from, shares } => {
                self.splits.insert(from, shares);
            }
        }
        Ok(())
    }

    pub fn remap<'a>(&'a self, code: &'a RegionCode) -> &'a RegionCode {
        self.remaps.get(code).unwrap_or(code)
    }

    pub fn split_for(&self, code: &RegionCode) -> Option<&[SplitShare]> {
        self.splits.get(code).map(|shares| shares.as_slice())
    }

    /// Splits in ascending legacy-code order
    pub fn splits(&self) -> impl Iterator<Item = (&RegionCode, &[SplitShare])> {
        self.splits.iter().map(|(code, shares)| (code, shares.as_slice()))
    }

    pub fn rule_count(&self) -> usize {
        self.remaps.len() + self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }

    pub fn rules(&self) -> Vec<ReconciliationRule> {
        let remaps = self.remaps.iter().map(|(from, to)| ReconciliationRule::Remap {
            from: from.clone(),
            to: to.clone(),
        });
        let splits = self.splits.iter().map(|(from, shares)| ReconciliationRule::Split {
            from: from.clone(),
            shares: shares.clone(),
        });
        remaps.chain(splits).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
