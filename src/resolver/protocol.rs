//! Resolver wire format
//!
//! One request per attribute per scan. Key values travel column-major:
//! `columns[c][t]` is column `c` of the `t`-th key. Each response candidate
//! carries one value per key row in the same order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Batched resolution request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub keyword: String,
    pub max_candidates: usize,
    pub local_table_name: String,
    pub column_names: Vec<String>,
    pub columns: Vec<Vec<Value>>,
    #[serde(default)]
    pub restriction_predicates: Vec<String>,
}

impl ResolveRequest {
    /// Number of key rows in the request
    pub fn key_count(&self) -> usize {
        self.columns.first().map(Vec::len).unwrap_or(0)
    }

    /// The `t`-th key tuple
    pub fn key(&self, t: usize) -> Vec<Value> {
        self.columns
            .iter()
            .map(|col| col.get(t).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// One candidate across all requested keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCandidate {
    pub values: Vec<Value>,
    pub selectivity: f64,
}

/// Batched resolution response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
    pub in_union: Vec<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_names() {
        let req = ResolveRequest {
            keyword: "gdp".into(),
            max_candidates: 3,
            local_table_name: "nation".into(),
            column_names: vec!["n_name".into()],
            columns: vec![vec![json!("FRANCE"), json!("PERU")]],
            restriction_predicates: vec!["> 100".into()],
        };
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["maxCandidates"], 3);
        assert_eq!(wire["localTableName"], "nation");
        assert_eq!(wire["columns"][0][1], "PERU");
        assert_eq!(wire["restrictionPredicates"][0], "> 100");
        assert_eq!(req.key_count(), 2);
        assert_eq!(req.key(1), vec![json!("PERU")]);
    }

    #[test]
    fn test_response_without_candidates_or_explanation() {
        let resp: ResolveResponse = serde_json::from_value(json!({"inUnion": [false]})).unwrap();
        assert!(resp.candidates.is_empty());
        assert!(resp.explanation.is_none());
    }
}
