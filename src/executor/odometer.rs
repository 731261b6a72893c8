//! Combination driver
//!
//! Runs the pipeline once per digit vector. Digits are kept in ascending
//! attribute id order, least significant first; each attribute's radix is
//! its resolved candidate count capped at `max_candidates`. After every
//! pass only the operators depending on a changed digit are recomputed.

use std::collections::BTreeSet;

use crate::attribute::{AttributeId, Strategy};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::planner::{PlanSwapController, StrategyReoptimizer};

use super::context::ExecutionContext;
use super::errors::{ExecutorError, ExecutorResult, Stage};
use super::node::{PlanNode, RescanSignal};
use super::row::Row;
use super::visit::collect_attributes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Closed,
    Running,
    Done,
}

/// Enumerates every candidate combination over a pipeline
pub struct CombinationDriver {
    pipeline: Box<dyn PlanNode>,
    /// Digit order, least significant first
    order: Vec<AttributeId>,
    /// Radix per digit; empty until the first pass completed
    radices: Vec<usize>,
    budget: usize,
    passes: usize,
    state: DriverState,
}

impl CombinationDriver {
    pub fn new(pipeline: Box<dyn PlanNode>) -> Self {
        Self {
            pipeline,
            order: Vec::new(),
            radices: Vec::new(),
            budget: 1,
            passes: 0,
            state: DriverState::Closed,
        }
    }

    pub fn pipeline(&self) -> &dyn PlanNode {
        self.pipeline.as_ref()
    }

    /// Radix per attribute, least significant first; empty before the first pass ends
    pub fn radices(&self) -> Vec<(AttributeId, usize)> {
        self.order.iter().copied().zip(self.radices.iter().copied()).collect()
    }

    /// Number of passes allowed against the current pipeline
    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn open(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.pipeline.open(ctx)?;
        self.restart(ctx);

        if ctx.config.reoptimization && ctx.replanner.is_some() {
            self.pipeline.prime(ctx)?;
            StrategyReoptimizer::request_replan(ctx)?;
            if let Some(replacement) = ctx.pending_replacement.take() {
                PlanSwapController::swap(&mut self.pipeline, replacement, ctx)?;
                self.restart(ctx);
            }
        }
        self.state = DriverState::Running;
        Ok(())
    }

    /// Next annotated row across all combinations
    pub fn next(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        loop {
            match self.state {
                DriverState::Closed => {
                    return Err(ExecutorError::execution_failed(
                        Stage::Enumerate,
                        "driver pulled before open",
                    ))
                }
                DriverState::Done => return Ok(None),
                DriverState::Running => {}
            }

            if let Some(mut row) = self.pipeline.next(ctx)? {
                for &id in &self.order {
                    let strategy = ctx.attributes.lookup(id)?.strategy;
                    if strategy != Strategy::Combinatorial {
                        row.choose_default(id, ctx.digit(id));
                    }
                }
                return Ok(Some(row));
            }
            self.finish_pass(ctx)?;
        }
    }

    pub fn close(&mut self) {
        self.pipeline.close();
        self.state = DriverState::Closed;
    }

    /// Open, drain and close
    pub fn run(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Vec<Row>> {
        self.open(ctx)?;
        let mut rows = Vec::new();
        while let Some(row) = self.next(ctx)? {
            rows.push(row);
        }
        self.close();
        Ok(rows)
    }

    /// Zero every digit of the current pipeline and forget its radices
    fn restart(&mut self, ctx: &mut ExecutionContext) {
        self.order = collect_attributes(self.pipeline.as_ref()).into_iter().collect();
        ctx.digits.clear();
        for &id in &self.order {
            ctx.set_digit(id, 0);
        }
        self.radices.clear();
        self.budget = 1;
        self.passes = 0;
    }

    fn finish_pass(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        ctx.metrics.increment_combinations();
        self.passes += 1;

        if self.radices.is_empty() && !self.order.is_empty() {
            let cap = ctx.config.max_candidates;
            let mut radices = Vec::with_capacity(self.order.len());
            for &id in &self.order {
                radices.push(ctx.attributes.lookup(id)?.radix(cap));
            }
            self.budget = radices.iter().fold(1usize, |acc, r| acc.saturating_mul(*r));
            self.radices = radices;
        }

        if let Some(replacement) = ctx.pending_replacement.take() {
            PlanSwapController::swap(&mut self.pipeline, replacement, ctx)?;
            self.restart(ctx);
            return Ok(());
        }

        let changed = match self.advance(ctx) {
            Some(changed) if self.passes < self.budget => changed,
            _ => {
                self.state = DriverState::Done;
                let passes = self.passes.to_string();
                log_event_with_fields(
                    Event::EnumerationComplete,
                    &[("query_id", ctx.query_id()), ("combinations", passes.as_str())],
                );
                return Ok(());
            }
        };

        if Logger::enabled(Severity::Trace) {
            let digits: Vec<String> = self.order.iter().map(|id| ctx.digit(*id).to_string()).collect();
            let digits = digits.join(",");
            log_event_with_fields(
                Event::CombinationAdvance,
                &[("query_id", ctx.query_id()), ("digits", digits.as_str())],
            );
        }
        self.pipeline.rescan(&RescanSignal::TargetedReset(changed), ctx)
    }

    /// Increment with carry; `None` once the most significant digit carries
    fn advance(&self, ctx: &mut ExecutionContext) -> Option<BTreeSet<AttributeId>> {
        let mut changed = BTreeSet::new();
        for (&id, &radix) in self.order.iter().zip(&self.radices) {
            let digit = ctx.digit(id) + 1;
            if digit < radix {
                ctx.set_digit(id, digit);
                changed.insert(id);
                return Some(changed);
            }
            if ctx.digit(id) != 0 {
                ctx.set_digit(id, 0);
                changed.insert(id);
            }
        }
        None
    }
}
