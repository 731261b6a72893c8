//! Candidate expansion
//!
//! Turns bundle tokens into concrete values. Every row pulled from below
//! is buffered; when only this attribute's digit moved, the next pass is
//! served from the buffer without touching the input again.

use std::collections::{BTreeSet, VecDeque};

use crate::attribute::{AttributeId, OpenAttribute, Strategy};

use super::context::ExecutionContext;
use super::errors::{ExecutorError, ExecutorResult, Stage};
use super::filters::PredicateFilter;
use super::node::{AttributeBinding, BindingRole, PlanNode, RescanSignal};
use super::row::Row;
use super::visit::is_affected;

/// Expansion stage for one open attribute
pub struct CandidateExpansion {
    child: Box<dyn PlanNode>,
    attribute: AttributeId,
    keyword: String,
    output_column: String,
    /// Rows pulled from the input during the current materialization
    buffer: Vec<Row>,
    /// Input was drained into the buffer
    materialized: bool,
    position: usize,
    /// Rows produced from one source row but not yet returned
    pending: VecDeque<Row>,
    opened: bool,
}

impl CandidateExpansion {
    pub fn new(child: Box<dyn PlanNode>, attribute: &OpenAttribute) -> Self {
        Self {
            child,
            attribute: attribute.id(),
            keyword: attribute.keyword.clone(),
            output_column: attribute.output_column.clone(),
            buffer: Vec::new(),
            materialized: false,
            position: 0,
            pending: VecDeque::new(),
            opened: false,
        }
    }

    fn clear_buffer(&mut self) {
        self.buffer.clear();
        self.materialized = false;
        self.position = 0;
        self.pending.clear();
    }

    /// Next source row: replayed from the buffer, or pulled and buffered
    fn next_source(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        if self.position < self.buffer.len() {
            let row = self.buffer[self.position].clone();
            self.position += 1;
            ctx.metrics.increment_rows_replayed();
            return Ok(Some(row));
        }
        if self.materialized {
            return Ok(None);
        }
        match self.child.next(ctx)? {
            Some(row) => {
                self.buffer.push(row.clone());
                self.position = self.buffer.len();
                Ok(Some(row))
            }
            None => {
                self.materialized = true;
                Ok(None)
            }
        }
    }

    /// Row with candidate `index` in place of the token; `None` if the
    /// restrictions or the predicates deferred on the token reject it
    fn substitute(&self, row: &Row, index: usize, attr: &OpenAttribute) -> Option<Row> {
        let token = match row.get(&self.output_column).and_then(|d| d.as_token()) {
            Some(token) => token.clone(),
            None => return Some(row.clone()),
        };
        let mut out = row.clone();
        out.set_scalar(self.output_column.as_str(), token.bundle.value(index).clone());
        out.choose(self.attribute, index);
        if PredicateFilter::matches(&out, &attr.restrictions)
            && PredicateFilter::matches(&out, &token.deferred)
        {
            Some(out)
        } else {
            None
        }
    }
}

impl PlanNode for CandidateExpansion {
    fn describe(&self) -> String {
        format!("CandidateExpansion({})", self.keyword)
    }

    fn output_columns(&self) -> Vec<String> {
        self.child.output_columns()
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
            role: BindingRole::Expansion,
        })
    }

    fn own_cost(&self) -> f64 {
        0.0
    }

    fn open(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.clear_buffer();
        self.opened = true;
        self.child.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        if !self.opened {
            return Err(ExecutorError::execution_failed(Stage::Expand, "expansion pulled before open")
                .with_keyword(self.keyword.as_str()));
        }
        if let Some(row) = self.pending.pop_front() {
            return Ok(Some(row));
        }

        let strategy = ctx.attributes.lookup(self.attribute)?.strategy;
        if strategy == Strategy::Direct {
            return self.child.next(ctx);
        }

        loop {
            let source = match self.next_source(ctx)? {
                Some(row) => row,
                None => return Ok(None),
            };
            let attr = ctx.attributes.lookup(self.attribute)?;
            match strategy {
                Strategy::Combinatorial => {
                    let count = source
                        .get(&self.output_column)
                        .and_then(|d| d.as_token())
                        .map(|t| t.bundle.count().min(ctx.config.max_candidates))
                        .unwrap_or(1);
                    for index in 0..count {
                        if let Some(row) = self.substitute(&source, index, attr) {
                            self.pending.push_back(row);
                        }
                    }
                    if let Some(row) = self.pending.pop_front() {
                        return Ok(Some(row));
                    }
                }
                _ => {
                    let digit = ctx.digit(self.attribute);
                    if let Some(row) = self.substitute(&source, digit, attr) {
                        return Ok(Some(row));
                    }
                }
            }
        }
    }

    fn rescan(&mut self, signal: &RescanSignal, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        let direct = ctx.attributes.lookup(self.attribute)?.strategy == Strategy::Direct;
        let recompute = match signal {
            RescanSignal::FullReset => true,
            RescanSignal::TargetedReset(changed) => {
                direct || !self.materialized || is_affected(self.child.as_ref(), changed, ctx)
            }
        };
        if recompute {
            self.clear_buffer();
            self.child.rescan(signal, ctx)
        } else {
            self.position = 0;
            self.pending.clear();
            Ok(())
        }
    }

    fn close(&mut self) {
        self.clear_buffer();
        self.opened = false;
        self.child.close();
    }

    fn reacts_to(&self, changed: &BTreeSet<AttributeId>, ctx: &ExecutionContext) -> bool {
        changed.contains(&self.attribute)
            && ctx
                .attributes
                .get(self.attribute)
                .map(|a| a.strategy != Strategy::Direct)
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::attribute::{AttributeRegistry, KeySpec};
    use crate::config::EngineConfig;
    use crate::executor::{OpenAttributeJoin, ValuesScan};
    use crate::planner::Predicate;
    use crate::resolver::{FixtureResolver, FixtureTable};
    use serde_json::json;

    fn build(
        attr: OpenAttribute,
    ) -> (ExecutionContext, CandidateExpansion, Rc<RefCell<FixtureResolver>>) {
        let mut registry = AttributeRegistry::new();
        let id = registry.insert(attr);
        let scan = ValuesScan::new(
            "nation",
            vec!["n_name".into()],
            vec![
                Row::new().with("n_name", json!("FRANCE")),
                Row::new().with("n_name", json!("PERU")),
            ],
        );
        let join = OpenAttributeJoin::new(Box::new(scan), registry.lookup(id).unwrap(), vec![]);
        let expand = CandidateExpansion::new(Box::new(join), registry.lookup(id).unwrap());
        let resolver = Rc::new(RefCell::new(FixtureResolver::new().with_table(
            "gdp",
            FixtureTable::default()
                .entry(vec![json!("FRANCE")], vec![json!(10), json!(20), json!(30)])
                .entry(vec![json!("PERU")], vec![json!(1), json!(2), json!(3)]),
        )));
        let config = EngineConfig {
            dynamic_strategy: false,
            ..EngineConfig::default()
        };
        let ctx = ExecutionContext::new(config, registry, Box::new(Rc::clone(&resolver)));
        (ctx, expand, resolver)
    }

    fn gdp(strategy: Strategy) -> OpenAttribute {
        OpenAttribute::new("gdp", "gdp", KeySpec::exact(["n_name"])).with_strategy(strategy)
    }

    fn values(expand: &mut CandidateExpansion, ctx: &mut ExecutionContext) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Some(row) = expand.next(ctx).unwrap() {
            out.push(row.scalar("gdp").cloned().unwrap());
        }
        out
    }

    #[test]
    fn test_deferred_substitutes_digit() {
        let (mut ctx, mut expand, _) = build(gdp(Strategy::Deferred));
        expand.open(&mut ctx).unwrap();
        assert_eq!(values(&mut expand, &mut ctx), vec![json!(10), json!(1)]);
    }

    #[test]
    fn test_replay_for_changed_digit_does_not_repull() {
        let (mut ctx, mut expand, resolver) = build(gdp(Strategy::Deferred));
        let id = AttributeId(0);
        expand.open(&mut ctx).unwrap();
        values(&mut expand, &mut ctx);
        let spooled = ctx.metrics.snapshot().rows_spooled;

        ctx.set_digit(id, 2);
        expand.rescan(&RescanSignal::targeted([id]), &mut ctx).unwrap();
        assert_eq!(values(&mut expand, &mut ctx), vec![json!(30), json!(3)]);

        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.rows_spooled, spooled);
        assert_eq!(snapshot.rows_replayed, 2);
        assert_eq!(resolver.borrow().calls_for("gdp"), 1);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let (mut ctx, mut expand, _) = build(gdp(Strategy::Deferred));
        let id = AttributeId(0);
        expand.open(&mut ctx).unwrap();
        let first: Vec<Row> = std::iter::from_fn(|| expand.next(&mut ctx).unwrap()).collect();
        expand.rescan(&RescanSignal::targeted([id]), &mut ctx).unwrap();
        let second: Vec<Row> = std::iter::from_fn(|| expand.next(&mut ctx).unwrap()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_full_reset_repulls() {
        let (mut ctx, mut expand, _) = build(gdp(Strategy::Deferred));
        expand.open(&mut ctx).unwrap();
        values(&mut expand, &mut ctx);
        expand.rescan(&RescanSignal::FullReset, &mut ctx).unwrap();
        values(&mut expand, &mut ctx);
        let snapshot = ctx.metrics.snapshot();
        assert_eq!(snapshot.rows_spooled, 4);
        assert_eq!(snapshot.rows_replayed, 0);
    }

    #[test]
    fn test_combinatorial_emits_every_candidate() {
        let (mut ctx, mut expand, _) = build(gdp(Strategy::Combinatorial));
        expand.open(&mut ctx).unwrap();
        assert_eq!(
            values(&mut expand, &mut ctx),
            vec![json!(10), json!(20), json!(30), json!(1), json!(2), json!(3)]
        );
    }

    #[test]
    fn test_combinatorial_respects_cap_and_restrictions() {
        let attr = gdp(Strategy::Combinatorial).with_restriction(Predicate::gt("gdp", json!(1)));
        let (mut ctx, mut expand, _) = build(attr);
        ctx.config.max_candidates = 2;
        expand.open(&mut ctx).unwrap();
        assert_eq!(values(&mut expand, &mut ctx), vec![json!(10), json!(20), json!(2)]);
    }

    #[test]
    fn test_direct_passes_through() {
        let (mut ctx, mut expand, _) = build(gdp(Strategy::Direct));
        let id = AttributeId(0);
        expand.open(&mut ctx).unwrap();
        ctx.set_digit(id, 1);
        assert_eq!(values(&mut expand, &mut ctx), vec![json!(20), json!(2)]);
        assert!(!expand.reacts_to(&[id].into_iter().collect(), &ctx));
    }

    #[test]
    fn test_choices_recorded() {
        let (mut ctx, mut expand, _) = build(gdp(Strategy::Deferred));
        let id = AttributeId(0);
        ctx.set_digit(id, 1);
        expand.open(&mut ctx).unwrap();
        let row = expand.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.choice(id), Some(1));
    }
}
