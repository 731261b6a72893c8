//! Row filter
//!
//! Predicates on a field that still holds a bundle token ride along with
//! the token and are checked by the expansion stage.

use crate::planner::Predicate;

use super::context::ExecutionContext;
use super::errors::ExecutorResult;
use super::filters::PredicateFilter;
use super::node::{PlanNode, RescanSignal};
use super::row::Row;

/// Passes rows matching every predicate
pub struct Filter {
    child: Box<dyn PlanNode>,
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new(child: Box<dyn PlanNode>, predicates: Vec<Predicate>) -> Self {
        Self { child, predicates }
    }
}

impl PlanNode for Filter {
    fn describe(&self) -> String {
        let preds: Vec<String> = self
            .predicates
            .iter()
            .map(|p| format!("{} {}", p.field, p.restriction_string()))
            .collect();
        format!("Filter({})", preds.join(" AND "))
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

    fn own_cost(&self) -> f64 {
        0.0
    }

    fn open(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.child.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        while let Some(mut row) = self.child.next(ctx)? {
            if PredicateFilter::matches_or_defer(&mut row, &self.predicates) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn rescan(&mut self, signal: &RescanSignal, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.child.rescan(signal, ctx)
    }

    fn close(&mut self) {
        self.child.close();
    }
}
