//! Explain output for open-attribute pipelines
//!
//! Produces deterministic, human-readable explain output, plus a JSON
//! form for tooling.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::attribute::{AttributeRegistry, Strategy};
use crate::config::EngineConfig;
use crate::executor::{collect_attributes, render_tree, PlanNode};

/// State of one open attribute
#[derive(Debug, Clone, Serialize)]
pub struct AttributeExplain {
    pub keyword: String,
    pub strategy: Strategy,
    pub radix: usize,
    pub selective: bool,
    /// Estimate currently used for costing
    pub selectivity: f64,
    pub candidate_selectivities: Vec<f64>,
    pub union_selectivity: Option<f64>,
    pub keys: usize,
    pub resolved_at: Option<DateTime<Utc>>,
    pub reoptimized: bool,
    /// Resolver explanations merged into one object; non-object entries are listed
    pub explanation: Value,
}

/// Explain output
#[derive(Debug, Clone, Serialize)]
pub struct PipelineExplain {
    pub generated_at: DateTime<Utc>,
    pub max_candidates: usize,
    /// Upper bound on passes: the product of all radices
    pub combinations: usize,
    pub attributes: Vec<AttributeExplain>,
    /// Operator tree, one indented line per node
    pub tree: Vec<String>,
}

impl PipelineExplain {
    pub fn from_pipeline(pipeline: &dyn PlanNode, attributes: &AttributeRegistry, config: &EngineConfig) -> Self {
        let mut explained = Vec::new();
        for id in collect_attributes(pipeline) {
            let attr = match attributes.get(id) {
                Some(attr) => attr,
                None => continue,
            };
            explained.push(AttributeExplain {
                keyword: attr.keyword.clone(),
                strategy: attr.strategy,
                radix: attr.radix(config.max_candidates),
                selective: attr.flags.selective,
                selectivity: attr.estimated_selectivity(config),
                candidate_selectivities: attr.candidate_selectivities.clone(),
                union_selectivity: attr.union_selectivity,
                keys: attr.cache.len(),
                resolved_at: attr.resolved_at,
                reoptimized: attr.reoptimized,
                explanation: merge_explanations(&attr.explanations),
            });
        }
        let combinations = explained
            .iter()
            .fold(1usize, |acc, a| acc.saturating_mul(a.radix));

        Self {
            generated_at: Utc::now(),
            max_candidates: config.max_candidates,
            combinations,
            attributes: explained,
            tree: render_tree(pipeline),
        }
    }
}

/// Later explanations win on conflicting keys
fn merge_explanations(explanations: &[Value]) -> Value {
    let mut merged = serde_json::Map::new();
    let mut other = Vec::new();
    for explanation in explanations {
        match explanation {
            Value::Object(map) => {
                for (k, v) in map {
                    merged.insert(k.clone(), v.clone());
                }
            }
            Value::Null => {}
            v => other.push(v.clone()),
        }
    }
    if !other.is_empty() {
        merged.insert("other".to_string(), Value::Array(other));
    }
    Value::Object(merged)
}

impl fmt::Display for PipelineExplain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN OPEN ATTRIBUTES ===")?;
        writeln!(f, "Generated: {}", self.generated_at.to_rfc3339())?;
        writeln!(f, "Max Candidates: {}", self.max_candidates)?;
        writeln!(f, "Combinations: {}", self.combinations)?;

        if !self.attributes.is_empty() {
            writeln!(f, "Attributes:")?;
            for attr in &self.attributes {
                writeln!(
                    f,
                    "  - {}: strategy={} radix={} keys={} selectivity={:.3}",
                    attr.keyword, attr.strategy, attr.radix, attr.keys, attr.selectivity
                )?;
                if !attr.candidate_selectivities.is_empty() {
                    let sels: Vec<String> = attr
                        .candidate_selectivities
                        .iter()
                        .map(|s| format!("{:.3}", s))
                        .collect();
                    writeln!(f, "    candidate selectivities: [{}]", sels.join(", "))?;
                }
                if let Some(union) = attr.union_selectivity {
                    writeln!(f, "    union selectivity: {:.3}", union)?;
                }
                if let Some(at) = attr.resolved_at {
                    writeln!(f, "    resolved at: {}", at.to_rfc3339())?;
                }
                if attr.reoptimized {
                    writeln!(f, "    reoptimized")?;
                }
                if attr.explanation.as_object().map(|m| !m.is_empty()).unwrap_or(false) {
                    writeln!(f, "    explanation: {}", attr.explanation)?;
                }
            }
        }

        writeln!(f, "Pipeline:")?;
        for line in &self.tree {
            writeln!(f, "  {}", line)?;
        }
        Ok(())
    }
}
