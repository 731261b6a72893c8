//! Strategy reoptimization
//!
//! Once an attribute's candidates are resolved its real selectivities are
//! known. The reoptimizer compares visiting the attribute lazily (one
//! candidate per row) against the exhaustive strategy and may switch the
//! attribute to direct. It also asks the host for a full replan once.

use crate::attribute::{AttributeRegistry, OpenAttribute, Strategy};
use crate::config::EngineConfig;
use crate::executor::{ExecutionContext, ExecutorResult, PlanNode};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// Produces a replacement pipeline from what the query learned so far
pub trait Replanner {
    /// `None` keeps the running pipeline
    fn replan(
        &mut self,
        attributes: &AttributeRegistry,
        config: &EngineConfig,
    ) -> ExecutorResult<Option<Box<dyn PlanNode>>>;
}

/// Costs compared by the reoptimizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyCosts {
    /// Subplan cost times the observed average selectivity
    pub lazy: f64,
    /// Subplan cost normalized to one unfiltered run
    pub combinatorial: f64,
}

/// Outcome of reconsidering one attribute
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Switched(StrategyCosts),
    Kept(StrategyCosts),
    /// No selectivities yet
    Unmeasured,
}

pub struct StrategyReoptimizer;

impl StrategyReoptimizer {
    /// Costs of both strategies, or `None` before resolution
    pub fn costs(attr: &OpenAttribute, subplan_cost: f64, config: &EngineConfig) -> Option<StrategyCosts> {
        let average = attr.average_selectivity()?;
        let mut combinatorial = subplan_cost;
        if attr.flags.selective && config.cost_model.uses_selectivity() {
            combinatorial /= attr.estimated_selectivity(config);
        }
        if config.cost_model.uses_candidates() {
            combinatorial /= config.max_candidates as f64;
        }
        Some(StrategyCosts {
            lazy: subplan_cost * average,
            combinatorial,
        })
    }

    /// Re-evaluate the strategy of a freshly resolved attribute
    ///
    /// Switches to direct when lazy evaluation beats the exhaustive
    /// strategy by the correction margin and dynamic switching is on.
    /// Updates the selectivity estimate either way.
    pub fn reconsider(
        attr: &mut OpenAttribute,
        subplan_cost: f64,
        config: &EngineConfig,
        metrics: &MetricsRegistry,
        query_id: &str,
    ) -> Decision {
        let costs = match Self::costs(attr, subplan_cost, config) {
            Some(costs) => costs,
            None => return Decision::Unmeasured,
        };
        let average = attr.average_selectivity().unwrap_or(1.0);
        let favours_lazy = costs.lazy < costs.combinatorial * config.correction_factor;

        if config.static_reoptimization {
            if favours_lazy {
                attr.selectivity = Some(average);
            } else if config.preselection {
                attr.selectivity = attr.union_selectivity;
            } else {
                attr.selectivity = Some(1.0);
                attr.flags.selective = false;
            }
        } else {
            attr.selectivity = Some(average);
        }

        let lazy = format!("{:.3}", costs.lazy);
        let combinatorial = format!("{:.3}", costs.combinatorial);
        let fields = [
            ("query_id", query_id),
            ("keyword", attr.keyword.as_str()),
            ("lazy_cost", lazy.as_str()),
            ("combinatorial_cost", combinatorial.as_str()),
        ];

        if favours_lazy && config.dynamic_strategy && attr.strategy != Strategy::Direct {
            log_event_with_fields(Event::StrategySwitch, &fields);
            attr.strategy = Strategy::Direct;
            metrics.increment_strategy_switches();
            Decision::Switched(costs)
        } else {
            log_event_with_fields(Event::StrategyKept, &fields);
            Decision::Kept(costs)
        }
    }

    /// Ask the replanner for a replacement pipeline, at most once per query
    ///
    /// A replacement is parked on the context; the driver swaps it in at
    /// the next pass boundary. Returns whether one was produced.
    pub fn request_replan(ctx: &mut ExecutionContext) -> ExecutorResult<bool> {
        if !ctx.config.reoptimization || ctx.attributes.iter().any(|a| a.reoptimized) {
            return Ok(false);
        }
        let query_id = ctx.query_id().to_string();
        let replanner = match ctx.replanner.as_mut() {
            Some(replanner) => replanner,
            None => return Ok(false),
        };
        log_event_with_fields(Event::ReplanRequested, &[("query_id", query_id.as_str())]);
        match replanner.replan(&ctx.attributes, &ctx.config)? {
            Some(replacement) => {
                ctx.request_swap(replacement);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
