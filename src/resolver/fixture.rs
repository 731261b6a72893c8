//! Resolver answering from canned candidate tables
//!
//! Used by the CLI scenario runner and by tests. Records every request it
//! receives so callers can assert on batching.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::executor::PredicateFilter;
use crate::planner::FilterOp;

use super::client::CandidateResolver;
use super::errors::{ResolverError, ResolverResult};
use super::protocol::{ResolveRequest, ResolveResponse, ResponseCandidate};

/// Candidates for one key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureEntry {
    pub key: Vec<Value>,
    pub candidates: Vec<Value>,
}

/// Canned answers for one keyword
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureTable {
    pub entries: Vec<FixtureEntry>,
    /// Reported per-candidate selectivities; measured from the restrictions if absent
    #[serde(default)]
    pub selectivities: Option<Vec<f64>>,
    #[serde(default)]
    pub explanation: Option<Value>,
}

impl FixtureTable {
    pub fn entry(mut self, key: Vec<Value>, candidates: Vec<Value>) -> Self {
        self.entries.push(FixtureEntry { key, candidates });
        self
    }

    pub fn with_selectivities(mut self, selectivities: Vec<f64>) -> Self {
        self.selectivities = Some(selectivities);
        self
    }

    fn candidates_for(&self, key: &[Value]) -> &[Value] {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.candidates.as_slice())
            .unwrap_or(&[])
    }
}

/// A restriction as the resolver reads it back from the wire
enum Restriction {
    Compare(FilterOp),
    IsNumeric,
}

impl Restriction {
    fn parse(text: &str) -> ResolverResult<Self> {
        let text = text.trim();
        if text == "isNumeric()" {
            return Ok(Restriction::IsNumeric);
        }
        let (symbol, operand) = text
            .split_once(' ')
            .ok_or_else(|| ResolverError::Transport(format!("unsupported restriction '{}'", text)))?;
        let operand = match operand.trim() {
            "NULL" => Value::Null,
            raw => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Number(_)) => v,
                _ => Value::String(raw.to_string()),
            },
        };
        let op = match symbol {
            "=" => FilterOp::Eq(operand),
            "<>" => FilterOp::Ne(operand),
            ">=" => FilterOp::Gte(operand),
            ">" => FilterOp::Gt(operand),
            "<=" => FilterOp::Lte(operand),
            "<" => FilterOp::Lt(operand),
            other => {
                return Err(ResolverError::Transport(format!(
                    "unsupported operator '{}'",
                    other
                )))
            }
        };
        Ok(Restriction::Compare(op))
    }

    fn passes(&self, value: &Value) -> bool {
        match self {
            Restriction::IsNumeric => value.is_number(),
            Restriction::Compare(op) => PredicateFilter::matches_value(value, op),
        }
    }
}

/// In-process resolver over fixture tables
#[derive(Debug, Default)]
pub struct FixtureResolver {
    tables: BTreeMap<String, FixtureTable>,
    requests: Vec<ResolveRequest>,
    failure: Option<ResolverError>,
}

impl FixtureResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: BTreeMap<String, FixtureTable>) -> Self {
        Self {
            tables,
            ..Self::default()
        }
    }

    pub fn with_table(mut self, keyword: impl Into<String>, table: FixtureTable) -> Self {
        self.tables.insert(keyword.into(), table);
        self
    }

    /// Make every call fail with `error`
    pub fn failing(error: ResolverError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> &[ResolveRequest] {
        &self.requests
    }

    /// Requests received so far for one keyword
    pub fn calls_for(&self, keyword: &str) -> usize {
        self.requests.iter().filter(|r| r.keyword == keyword).count()
    }
}

impl CandidateResolver for FixtureResolver {
    fn resolve(&mut self, request: &ResolveRequest) -> ResolverResult<ResolveResponse> {
        self.requests.push(request.clone());
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let table = self.tables.get(&request.keyword).ok_or_else(|| {
            ResolverError::Transport(format!("no source for keyword '{}'", request.keyword))
        })?;
        let restrictions = request
            .restriction_predicates
            .iter()
            .map(|r| Restriction::parse(r))
            .collect::<ResolverResult<Vec<_>>>()?;
        let passes = |v: &Value| !v.is_null() && restrictions.iter().all(|r| r.passes(v));

        let keys: Vec<Vec<Value>> = (0..request.key_count()).map(|t| request.key(t)).collect();
        let per_key: Vec<&[Value]> = keys.iter().map(|k| table.candidates_for(k)).collect();

        let count = per_key
            .iter()
            .map(|c| c.len())
            .max()
            .unwrap_or(0)
            .min(request.max_candidates);

        let candidates = (0..count)
            .map(|i| {
                let values: Vec<Value> = per_key
                    .iter()
                    .map(|c| c.get(i).cloned().unwrap_or(Value::Null))
                    .collect();
                let selectivity = match &table.selectivities {
                    Some(s) => s.get(i).copied().unwrap_or(1.0),
                    None if values.is_empty() => 1.0,
                    None => {
                        values.iter().filter(|v| passes(*v)).count() as f64 / values.len() as f64
                    }
                };
                ResponseCandidate {
                    values,
                    selectivity,
                }
            })
            .collect();

        let in_union = per_key
            .iter()
            .map(|c| c.iter().take(count).any(|v| passes(v)))
            .collect();

        Ok(ResolveResponse {
            candidates,
            in_union,
            explanation: table.explanation.clone(),
        })
    }
}
