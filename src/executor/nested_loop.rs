//! Nested-loop equi-join of two pipelines

use crate::planner::FilterOp;

use super::context::ExecutionContext;
use super::errors::ExecutorResult;
use super::filters::PredicateFilter;
use super::node::{PlanNode, RescanSignal};
use super::row::Row;
use super::visit::is_affected;

/// Joins every outer row with the buffered inner rows
///
/// `on` pairs an outer column with an inner column; an empty list gives
/// the cross product.
pub struct NestedLoopJoin {
    outer: Box<dyn PlanNode>,
    inner: Box<dyn PlanNode>,
    on: Vec<(String, String)>,
    inner_rows: Vec<Row>,
    inner_complete: bool,
    current: Option<Row>,
    inner_position: usize,
}

impl NestedLoopJoin {
    pub fn new(outer: Box<dyn PlanNode>, inner: Box<dyn PlanNode>, on: Vec<(String, String)>) -> Self {
        Self {
            outer,
            inner,
            on,
            inner_rows: Vec::new(),
            inner_complete: false,
            current: None,
            inner_position: 0,
        }
    }

    fn load_inner(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        while let Some(row) = self.inner.next(ctx)? {
            self.inner_rows.push(row);
        }
        self.inner_complete = true;
        Ok(())
    }

    fn joins(&self, outer: &Row, inner: &Row) -> bool {
        self.on.iter().all(|(left, right)| {
            match (outer.scalar(left), inner.scalar(right)) {
                (Some(l), Some(r)) => PredicateFilter::matches_value(l, &FilterOp::Eq(r.clone())),
                _ => false,
            }
        })
    }
}

impl PlanNode for NestedLoopJoin {
    fn describe(&self) -> String {
        if self.on.is_empty() {
            return "NestedLoopJoin(cross)".to_string();
        }
        let conds: Vec<String> = self.on.iter().map(|(l, r)| format!("{} = {}", l, r)).collect();
        format!("NestedLoopJoin({})", conds.join(" AND "))
    }

    fn output_columns(&self) -> Vec<String> {
        let mut columns = self.outer.output_columns();
        for column in self.inner.output_columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    fn children(&self) -> Vec<&dyn PlanNode> {
        vec![self.outer.as_ref(), self.inner.as_ref()]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        let outer: &mut dyn PlanNode = self.outer.as_mut();
        let inner: &mut dyn PlanNode = self.inner.as_mut();
        vec![outer, inner]
    }

    fn own_cost(&self) -> f64 {
        0.0
    }

    fn open(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.inner_rows.clear();
        self.inner_complete = false;
        self.current = None;
        self.inner_position = 0;
        self.outer.open(ctx)?;
        self.inner.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        if !self.inner_complete {
            self.load_inner(ctx)?;
        }
        loop {
            if let Some(outer) = &self.current {
                while self.inner_position < self.inner_rows.len() {
                    let inner = &self.inner_rows[self.inner_position];
                    self.inner_position += 1;
                    if self.joins(outer, inner) {
                        return Ok(Some(outer.merge(inner)));
                    }
                }
            }
            match self.outer.next(ctx)? {
                Some(row) => {
                    self.current = Some(row);
                    self.inner_position = 0;
                }
                None => {
                    self.current = None;
                    return Ok(None);
                }
            }
        }
    }

    fn rescan(&mut self, signal: &RescanSignal, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.current = None;
        self.inner_position = 0;
        let reload_inner = match signal {
            RescanSignal::FullReset => true,
            RescanSignal::TargetedReset(changed) => {
                !self.inner_complete || is_affected(self.inner.as_ref(), changed, ctx)
            }
        };
        if reload_inner {
            self.inner_rows.clear();
            self.inner_complete = false;
            self.inner.rescan(signal, ctx)?;
        }
        self.outer.rescan(signal, ctx)
    }

    fn close(&mut self) {
        self.inner_rows.clear();
        self.inner_complete = false;
        self.current = None;
        self.outer.close();
        self.inner.close();
    }
}
