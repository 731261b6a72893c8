//! Declarative pipeline descriptions
//!
//! A `PipelineSpec` is the serialized form of an operator tree. Building
//! one checks that every column, source, and attribute it names exists, so
//! a bad description is rejected before anything executes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attribute::{
    AttributeFlags, AttributeRegistry, KeyColumnOps, KeySpec, OpenAttribute, Strategy,
};
use crate::config::EngineConfig;
use crate::executor::{
    find_join, unexpanded_joins, CandidateExpansion, ExecutorError, ExecutorResult, Filter, Materialize,
    NestedLoopJoin, OpenAttributeJoin, PlanNode, Row, Stage, ValuesScan,
};

use super::ast::Predicate;
use super::errors::{PlannerError, PlannerResult};
use super::reoptimizer::Replanner;

/// A local table: column names plus rows as JSON objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Value>,
}

/// Definition of one open attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub keyword: String,
    /// Defaults to the keyword
    #[serde(default)]
    pub output_column: Option<String>,
    pub key: Vec<String>,
    /// Per-column comparison overrides; unlisted columns compare exactly
    #[serde(default)]
    pub key_ops: BTreeMap<String, KeyColumnOps>,
    #[serde(default)]
    pub local_table: Option<String>,
    #[serde(default)]
    pub restrictions: Vec<Predicate>,
    /// Defaults to the configured strategy
    #[serde(default)]
    pub strategy: Option<Strategy>,
    #[serde(default)]
    pub flags: AttributeFlags,
}

impl AttributeSpec {
    pub fn to_attribute(&self, config: &EngineConfig) -> OpenAttribute {
        let mut key = KeySpec::exact(self.key.iter().cloned());
        for (column, ops) in &self.key_ops {
            key = key.with_ops(column, *ops);
        }
        let output = self
            .output_column
            .clone()
            .unwrap_or_else(|| self.keyword.clone());
        let mut attr = OpenAttribute::new(self.keyword.clone(), output, key)
            .with_flags(self.flags)
            .with_strategy(self.strategy.unwrap_or(config.default_strategy));
        if let Some(table) = &self.local_table {
            attr = attr.with_local_table(table.clone());
        }
        for restriction in &self.restrictions {
            attr = attr.with_restriction(restriction.clone());
        }
        attr
    }
}

/// Register every attribute in order; ids follow the list order
pub fn register_attributes(specs: &[AttributeSpec], config: &EngineConfig) -> PlannerResult<AttributeRegistry> {
    let mut registry = AttributeRegistry::new();
    for spec in specs {
        if spec.key.is_empty() {
            return Err(PlannerError::pipeline_invalid(format!(
                "attribute '{}' has no key columns",
                spec.keyword
            )));
        }
        if registry.by_keyword(&spec.keyword).is_some() {
            return Err(PlannerError::pipeline_invalid(format!(
                "attribute '{}' is defined twice",
                spec.keyword
            )));
        }
        registry.insert(spec.to_attribute(config));
    }
    Ok(registry)
}

/// Operator tree description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PipelineSpec {
    Scan {
        source: String,
        #[serde(default)]
        cost: Option<f64>,
    },
    Filter {
        input: Box<PipelineSpec>,
        predicates: Vec<Predicate>,
    },
    Join {
        input: Box<PipelineSpec>,
        attribute: String,
        #[serde(default)]
        quals: Vec<Predicate>,
    },
    Expand {
        input: Box<PipelineSpec>,
        attribute: String,
    },
    Materialize {
        input: Box<PipelineSpec>,
        #[serde(default)]
        rewind_for: Option<String>,
    },
    NestedLoop {
        outer: Box<PipelineSpec>,
        inner: Box<PipelineSpec>,
        /// Equality pairs (outer column, inner column); empty is a cross product
        #[serde(default)]
        on: Vec<(String, String)>,
    },
}

impl PipelineSpec {
    /// Build the operator tree
    ///
    /// Every join of an attribute that is not `direct` needs an expansion
    /// above it, or its tokens would reach the output unsubstituted.
    pub fn build(
        &self,
        sources: &BTreeMap<String, SourceTable>,
        attributes: &AttributeRegistry,
    ) -> PlannerResult<Box<dyn PlanNode>> {
        let node = self.build_node(sources, attributes)?;
        if let Some(id) = unexpanded_joins(node.as_ref(), attributes).first() {
            let keyword = attributes.get(*id).map(|a| a.keyword.as_str()).unwrap_or_default();
            return Err(PlannerError::pipeline_invalid(format!(
                "join for '{}' has no expansion above it",
                keyword
            )));
        }
        Ok(node)
    }

    fn build_node(
        &self,
        sources: &BTreeMap<String, SourceTable>,
        attributes: &AttributeRegistry,
    ) -> PlannerResult<Box<dyn PlanNode>> {
        match self {
            PipelineSpec::Scan { source, cost } => {
                let table = sources
                    .get(source)
                    .ok_or_else(|| PlannerError::unknown_source(source.clone()))?;
                let rows = table.rows.iter().map(Row::from_json).collect();
                let mut scan = ValuesScan::new(source.clone(), table.columns.clone(), rows);
                if let Some(cost) = cost {
                    scan = scan.with_cost(*cost);
                }
                Ok(Box::new(scan))
            }
            PipelineSpec::Filter { input, predicates } => {
                let child = input.build_node(sources, attributes)?;
                let columns = child.output_columns();
                for predicate in predicates {
                    require_column(&columns, &predicate.field, "Filter")?;
                }
                Ok(Box::new(Filter::new(child, predicates.clone())))
            }
            PipelineSpec::Join {
                input,
                attribute,
                quals,
            } => {
                let attr = attribute_named(attributes, attribute)?;
                let child = input.build_node(sources, attributes)?;
                let columns = child.output_columns();
                if attr.key.project(&columns).is_empty() {
                    return Err(PlannerError::pipeline_invalid(format!(
                        "join for '{}' sees none of its key columns {:?}",
                        attr.keyword, attr.key.columns
                    )));
                }
                let join = OpenAttributeJoin::new(child, attr, quals.clone());
                let joined = join.output_columns();
                for qual in quals {
                    require_column(&joined, &qual.field, "OpenAttributeJoin")?;
                }
                Ok(Box::new(join))
            }
            PipelineSpec::Expand { input, attribute } => {
                let attr = attribute_named(attributes, attribute)?;
                let child = input.build_node(sources, attributes)?;
                if find_join(child.as_ref(), attr.id()).is_none() {
                    return Err(PlannerError::pipeline_invalid(format!(
                        "expansion of '{}' has no join below it",
                        attr.keyword
                    )));
                }
                Ok(Box::new(CandidateExpansion::new(child, attr)))
            }
            PipelineSpec::Materialize { input, rewind_for } => {
                let child = input.build_node(sources, attributes)?;
                let mut node = Materialize::new(child);
                if let Some(keyword) = rewind_for {
                    node = node.rewind_for(attribute_named(attributes, keyword)?.id());
                }
                Ok(Box::new(node))
            }
            PipelineSpec::NestedLoop { outer, inner, on } => {
                let outer = outer.build_node(sources, attributes)?;
                let inner = inner.build_node(sources, attributes)?;
                let outer_columns = outer.output_columns();
                let inner_columns = inner.output_columns();
                for (left, right) in on {
                    require_column(&outer_columns, left, "NestedLoopJoin")?;
                    require_column(&inner_columns, right, "NestedLoopJoin")?;
                }
                Ok(Box::new(NestedLoopJoin::new(outer, inner, on.clone())))
            }
        }
    }
}

fn attribute_named<'a>(attributes: &'a AttributeRegistry, keyword: &str) -> PlannerResult<&'a OpenAttribute> {
    attributes
        .by_keyword(keyword)
        .ok_or_else(|| PlannerError::unknown_attribute(keyword))
}

fn require_column(columns: &[String], column: &str, node: &str) -> PlannerResult<()> {
    if columns.iter().any(|c| c == column) {
        Ok(())
    } else {
        Err(PlannerError::unknown_column(column, node))
    }
}

/// Replanner backed by one alternative pipeline description
///
/// Offers its pipeline on the first request only.
pub struct SpecReplanner {
    spec: Option<PipelineSpec>,
    sources: BTreeMap<String, SourceTable>,
}

impl SpecReplanner {
    pub fn new(spec: PipelineSpec, sources: BTreeMap<String, SourceTable>) -> Self {
        Self {
            spec: Some(spec),
            sources,
        }
    }
}

impl Replanner for SpecReplanner {
    fn replan(
        &mut self,
        attributes: &AttributeRegistry,
        _config: &EngineConfig,
    ) -> ExecutorResult<Option<Box<dyn PlanNode>>> {
        let spec = match self.spec.take() {
            Some(spec) => spec,
            None => return Ok(None),
        };
        spec.build(&self.sources, attributes)
            .map(Some)
            .map_err(|e| ExecutorError::execution_failed(Stage::Reoptimize, e.to_string()))
    }
}
