//! Plan swap
//!
//! Replaces the running pipeline with a reoptimized one between two
//! combination passes.
//!
//! # Order
//!
//! 1. Validate the replacement; an incompatible one is rejected before
//!    anything changes
//! 2. Per joined attribute, keep the cache if the new join sees every
//!    column it was keyed on, otherwise drop it
//! 3. Close the old pipeline
//! 4. Open the new pipeline and reconsider kept attributes
//! 5. Zero the digits

use std::collections::BTreeSet;

use crate::attribute::AttributeId;
use crate::executor::{
    collect_attributes, find_join, join_input_columns, joined_attributes, subtree_cost,
    unexpanded_joins, ExecutionContext, ExecutorError, ExecutorResult, PlanNode,
};
use crate::observability::{log_event_with_fields, Event};

use super::reoptimizer::StrategyReoptimizer;

/// What a swap did with each joined attribute
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapReport {
    /// Caches reused as is
    pub transplanted: Vec<AttributeId>,
    /// Caches dropped; these attributes resolve again
    pub reset: Vec<AttributeId>,
}

pub struct PlanSwapController;

impl PlanSwapController {
    /// Replace `pipeline` with `replacement`
    pub fn swap(
        pipeline: &mut Box<dyn PlanNode>,
        replacement: Box<dyn PlanNode>,
        ctx: &mut ExecutionContext,
    ) -> ExecutorResult<SwapReport> {
        let query_id = ctx.query_id().to_string();
        log_event_with_fields(Event::PlanSwapBegin, &[("query_id", query_id.as_str())]);

        if let Err(err) = Self::validate(pipeline.as_ref(), replacement.as_ref(), ctx) {
            log_event_with_fields(
                Event::PlanSwapRejected,
                &[
                    ("query_id", query_id.as_str()),
                    ("keyword", err.keyword().unwrap_or("")),
                    ("reason", err.message()),
                ],
            );
            return Err(err);
        }

        let mut report = SwapReport::default();
        for id in joined_attributes(replacement.as_ref()) {
            let inputs = join_input_columns(replacement.as_ref(), id).unwrap_or_default();
            let attr = ctx.attributes.lookup_mut(id)?;
            let covered = match attr.cache.keyed_on() {
                Some(spec) => spec.is_covered_by(&inputs),
                None => continue,
            };
            let attribute = id.to_string();
            let fields = [
                ("query_id", query_id.as_str()),
                ("attribute", attribute.as_str()),
                ("keyword", attr.keyword.as_str()),
            ];
            if covered {
                log_event_with_fields(Event::CacheTransplant, &fields);
                ctx.metrics.increment_caches_transplanted();
                report.transplanted.push(id);
            } else {
                log_event_with_fields(Event::CacheReset, &fields);
                attr.reset_resolution();
                report.reset.push(id);
            }
        }

        pipeline.close();
        *pipeline = replacement;
        pipeline.open(ctx)?;

        for id in collect_attributes(pipeline.as_ref()) {
            ctx.attributes.lookup_mut(id)?.reoptimized = true;
        }
        for &id in &report.transplanted {
            let cost = find_join(pipeline.as_ref(), id).map(subtree_cost).unwrap_or(0.0);
            StrategyReoptimizer::reconsider(
                ctx.attributes.lookup_mut(id)?,
                cost,
                &ctx.config,
                &ctx.metrics,
                &query_id,
            );
        }

        ctx.digits.clear();
        ctx.metrics.increment_plan_swaps();
        let transplanted = report.transplanted.len().to_string();
        let reset = report.reset.len().to_string();
        log_event_with_fields(
            Event::PlanSwapComplete,
            &[
                ("query_id", query_id.as_str()),
                ("transplanted", transplanted.as_str()),
                ("reset", reset.as_str()),
            ],
        );
        Ok(report)
    }

    /// Rejects a replacement that cannot stand in for `current`
    fn validate(current: &dyn PlanNode, replacement: &dyn PlanNode, ctx: &ExecutionContext) -> ExecutorResult<()> {
        let before: BTreeSet<String> = current.output_columns().into_iter().collect();
        let after: BTreeSet<String> = replacement.output_columns().into_iter().collect();
        if before != after {
            return Err(ExecutorError::incompatible_replan(format!(
                "replacement produces {:?}, running pipeline produces {:?}",
                after, before
            )));
        }

        for id in collect_attributes(replacement) {
            if ctx.attributes.get(id).is_none() {
                return Err(ExecutorError::incompatible_replan(format!(
                    "replacement uses unknown attribute {}",
                    id
                )));
            }
        }

        for id in joined_attributes(replacement) {
            let inputs = join_input_columns(replacement, id).unwrap_or_default();
            if let Some(attr) = ctx.attributes.get(id) {
                if attr.key.project(&inputs).is_empty() {
                    return Err(ExecutorError::incompatible_replan(format!(
                        "join for '{}' sees none of its key columns {:?}",
                        attr.keyword, attr.key.columns
                    ))
                    .with_keyword(attr.keyword.as_str()));
                }
            }
        }

        if let Some(attr) = unexpanded_joins(replacement, &ctx.attributes)
            .first()
            .and_then(|id| ctx.attributes.get(*id))
        {
            return Err(ExecutorError::incompatible_replan(format!(
                "join for '{}' has no expansion above it",
                attr.keyword
            ))
            .with_keyword(attr.keyword.as_str()));
        }
        Ok(())
    }
}
