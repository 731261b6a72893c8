//! Open-attribute join
//!
//! Attaches one open attribute to every input row. The whole input is
//! spooled first so all distinct keys go to the resolver in one batch;
//! later passes replay the spool unless something beneath changed.

use std::collections::BTreeSet;

use crate::attribute::{AttributeId, KeySpec, KeyTuple, OpenAttribute, Strategy};
use crate::cache::resolve_all;
use crate::planner::{Predicate, StrategyReoptimizer};

use super::context::ExecutionContext;
use super::errors::{ExecutorError, ExecutorResult, Stage};
use super::filters::PredicateFilter;
use super::node::{AttributeBinding, BindingRole, PlanNode, RescanSignal};
use super::row::{BundleToken, Datum, Row};
use super::visit::{is_affected, subtree_cost};

/// Join of an input pipeline with the candidates of one open attribute
pub struct OpenAttributeJoin {
    child: Box<dyn PlanNode>,
    attribute: AttributeId,
    keyword: String,
    output_column: String,
    /// Join/output predicates checked after the attribute is attached;
    /// those on a token field travel with the token to its expansion
    quals: Vec<Predicate>,
    spec: Option<KeySpec>,
    spool: Vec<(Row, KeyTuple)>,
    spooled: bool,
    position: usize,
    opened: bool,
}

impl OpenAttributeJoin {
    pub fn new(child: Box<dyn PlanNode>, attribute: &OpenAttribute, quals: Vec<Predicate>) -> Self {
        Self {
            child,
            attribute: attribute.id(),
            keyword: attribute.keyword.clone(),
            output_column: attribute.output_column.clone(),
            quals,
            spec: None,
            spool: Vec::new(),
            spooled: false,
            position: 0,
            opened: false,
        }
    }

    pub fn attribute(&self) -> AttributeId {
        self.attribute
    }

    /// Pull the whole input, register its keys and resolve them in one call
    fn fill_spool(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        let child_columns = self.child.output_columns();
        let spec = {
            let attr = ctx.attributes.lookup_mut(self.attribute)?;
            let spec = match attr.cache.keyed_on() {
                Some(spec) => spec.clone(),
                None => attr.key.project(&child_columns),
            };
            if spec.is_empty() {
                return Err(ExecutorError::execution_failed(
                    Stage::Join,
                    "no join key column is available below the join",
                )
                .with_keyword(self.keyword.as_str()));
            }
            attr.cache.begin_scan();
            spec
        };

        self.spool.clear();
        while let Some(row) = self.child.next(ctx)? {
            let key = row.key(&spec.columns);
            ctx.attributes
                .lookup_mut(self.attribute)?
                .cache
                .register(&spec, key.clone())
                .map_err(|e| e.with_keyword(self.keyword.as_str()))?;
            ctx.metrics.increment_rows_spooled();
            self.spool.push((row, key));
        }

        let query_id = ctx.query_id().to_string();
        let sent = resolve_all(
            ctx.attributes.lookup_mut(self.attribute)?,
            ctx.resolver.as_mut(),
            &ctx.config,
            &ctx.metrics,
            &query_id,
        )?;
        if sent > 0 {
            let cost = subtree_cost(&*self);
            StrategyReoptimizer::reconsider(
                ctx.attributes.lookup_mut(self.attribute)?,
                cost,
                &ctx.config,
                &ctx.metrics,
                &query_id,
            );
        }

        self.spec = Some(spec);
        self.spooled = true;
        self.position = 0;
        Ok(())
    }

    fn reset_spool(&mut self) {
        self.spool.clear();
        self.spooled = false;
        self.position = 0;
    }
}

impl PlanNode for OpenAttributeJoin {
    fn describe(&self) -> String {
        format!("OpenAttributeJoin({} -> {})", self.keyword, self.output_column)
    }

    fn output_columns(&self) -> Vec<String> {
        let mut columns = self.child.output_columns();
        if !columns.contains(&self.output_column) {
            columns.push(self.output_column.clone());
        }
        columns
    }

    fn children(&self) -> Vec<&dyn PlanNode> {
        vec![self.child.as_ref()]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        let child: &mut dyn PlanNode = self.child.as_mut();
        vec![child]
    }

    fn attribute_binding(&self) -> Option<AttributeBinding> {
        Some(AttributeBinding {
            attribute: self.attribute,
            role: BindingRole::Join,
        })
    }

    fn own_cost(&self) -> f64 {
        0.0
    }

    fn open(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.reset_spool();
        self.opened = true;
        self.child.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        if !self.opened {
            return Err(ExecutorError::execution_failed(Stage::Join, "join pulled before open")
                .with_keyword(self.keyword.as_str()));
        }
        if !self.spooled {
            self.fill_spool(ctx)?;
        }
        let spec = match &self.spec {
            Some(spec) => spec,
            None => return Ok(None),
        };

        while self.position < self.spool.len() {
            let (source, key) = &self.spool[self.position];
            self.position += 1;

            let attr = ctx.attributes.lookup(self.attribute)?;
            let bundle = attr.cache.lookup(&attr.keyword, spec, key)?;
            if ctx.config.preselection && !bundle.in_union() {
                continue;
            }

            let mut row = source.clone();
            if attr.strategy == Strategy::Direct {
                let digit = ctx.digit(self.attribute);
                row.set_scalar(self.output_column.as_str(), bundle.value(digit).clone());
                row.choose(self.attribute, digit);
                if !PredicateFilter::matches(&row, &attr.restrictions) {
                    continue;
                }
            } else {
                row.set(
                    self.output_column.as_str(),
                    Datum::Candidates(BundleToken::new(self.attribute, bundle)),
                );
            }

            if PredicateFilter::matches_or_defer(&mut row, &self.quals) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn rescan(&mut self, signal: &RescanSignal, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        let recompute = match signal {
            RescanSignal::FullReset => true,
            RescanSignal::TargetedReset(changed) => {
                !self.spooled || is_affected(self.child.as_ref(), changed, ctx)
            }
        };
        if recompute {
            self.reset_spool();
            self.child.rescan(signal, ctx)
        } else {
            self.position = 0;
            Ok(())
        }
    }

    fn close(&mut self) {
        self.reset_spool();
        self.spec = None;
        self.opened = false;
        self.child.close();
    }

    fn reacts_to(&self, changed: &BTreeSet<AttributeId>, ctx: &ExecutionContext) -> bool {
        changed.contains(&self.attribute)
            && ctx
                .attributes
                .get(self.attribute)
                .map(|a| a.strategy == Strategy::Direct)
                .unwrap_or(false)
    }

    fn prime(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        if !self.spooled {
            self.fill_spool(ctx)?;
        }
        Ok(())
    }
}
