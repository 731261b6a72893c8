//! In-memory row source

use super::context::ExecutionContext;
use super::errors::{ExecutorError, ExecutorResult, Stage};
use super::node::{PlanNode, RescanSignal};
use super::row::Row;

/// Emits a fixed list of rows, in order, on every pass
pub struct ValuesScan {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    position: usize,
    cost: Option<f64>,
    opened: bool,
}

impl ValuesScan {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
            position: 0,
            cost: None,
            opened: false,
        }
    }

    /// Override the estimated cost (defaults to one unit per row)
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }
}

impl PlanNode for ValuesScan {
    fn describe(&self) -> String {
        format!("ValuesScan({}, {} rows)", self.name, self.rows.len())
    }

    fn output_columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn children(&self) -> Vec<&dyn PlanNode> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        Vec::new()
    }

    fn own_cost(&self) -> f64 {
        self.cost.unwrap_or(self.rows.len() as f64)
    }

    fn open(&mut self, _ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self, _ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        if !self.opened {
            return Err(ExecutorError::execution_failed(
                Stage::Scan,
                format!("scan '{}' pulled before open", self.name),
            ));
        }
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn rescan(&mut self, _signal: &RescanSignal, _ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.position = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.position = 0;
    }
}
