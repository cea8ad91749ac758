// 🕸️ Adjacency Builder - Dual-indexed outflow/inflow document
// Every region seen as a source or target gets both sub-maps, even if empty.

use crate::merge::MergedEdge;
use crate::region::RegionCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Edge payload as consumed by the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeStats {
    pub val: u64,
    pub diff: i64,
    pub hh_cnt: u64,

    /// Present (value 1) only for estimated edges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub est: Option<u8>,
}

impl From<&MergedEdge> for EdgeStats {
    fn from(edge: &MergedEdge) -> Self {
        EdgeStats {
            val: edge.count,
            diff: edge.diff,
            hh_cnt: edge.household_count,
            est: edge.estimated.then_some(1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionFlows {
    /// Keyed by target
    #[serde(rename = "out")]
    pub outflow: BTreeMap<RegionCode, EdgeStats>,

    /// Keyed by source
    #[serde(rename = "in")]
    pub inflow: BTreeMap<RegionCode, EdgeStats>,
}

/// Region code → {out, in}
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjacencyDocument(BTreeMap<RegionCode, RegionFlows>);

impl AdjacencyDocument {
    pub fn build(edges: &[MergedEdge]) -> Self {
        let mut regions: BTreeMap<RegionCode, RegionFlows> = BTreeMap::new();

        for edge in edges {
            let stats = EdgeStats::from(edge);

            regions
                .entry(edge.source.clone())
                .or_default()
                .outflow
                .insert(edge.target.clone(), stats.clone());

            regions
                .entry(edge.target.clone())
                .or_default()
                .inflow
                .insert(edge.source.clone(), stats);
        }

        log::info!(
            "Built adjacency for {} regions from {} edges",
            regions.len(),
            edges.len()
        );

        AdjacencyDocument(regions)
    }

    pub fn region(&self, code: &RegionCode) -> Option<&RegionFlows> {
        self.0.get(code)
    }

    pub fn region_count(&self) -> usize {
        self.0.len()
    }

    /// Minified JSON, key-ordered
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
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

    fn edge(source: &str, target: &str, count: u64, previous: u64, estimated: bool) -> MergedEdge {
        MergedEdge {
            source: code(source),
            target: code(target),
            count,
            household_count: 1,
            count_previous: previous,
            diff: count as i64 - previous as i64,
            estimated,
        }
    }

    #[test]
    fn test_scenario_out_and_in_match() {
        let doc = AdjacencyDocument::build(&[edge("11010", "21020", 12, 10, false)]);

        let expected = EdgeStats {
            val: 12,
            diff: 2,
            hh_cnt: 1,
            est: None,
        };
        assert_eq!(doc.region(&code("11010")).unwrap().outflow[&code("21020")], expected);
        assert_eq!(doc.region(&code("21020")).unwrap().inflow[&code("11010")], expected);
    }

    #[test]
    fn test_every_region_has_both_maps() {
        let doc = AdjacencyDocument::build(&[edge("11010", "21020", 1, 0, false)]);
        let json: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert_eq!(json["11010"]["in"], serde_json::json!({}));
        assert_eq!(json["21020"]["out"], serde_json::json!({}));
        assert_eq!(doc.region_count(), 2);
    }

    #[test]
    fn test_est_key_only_when_estimated() {
        let doc = AdjacencyDocument::build(&[
            edge("41192", "11010", 70, 60, true),
            edge("11010", "21020", 5, 5, false),
        ]);
        let json = doc.to_json().unwrap();

        assert!(json.contains(r#""11010":{"val":70,"diff":10,"hh_cnt":1,"est":1}"#));
        assert!(json.contains(r#""21020":{"val":5,"diff":0,"hh_cnt":1}"#));
    }

    #[test]
    fn test_output_is_deterministic() {
        let edges = vec![
            edge("21020", "11010", 3, 1, false),
            edge("11010", "21020", 2, 4, false),
        ];
        let mut reversed = edges.clone();
        reversed.reverse();

        assert_eq!(
            AdjacencyDocument::build(&edges).to_json().unwrap(),
            AdjacencyDocument::build(&reversed).to_json().unwrap()
        );
    }
}
