//! Planning side of open attributes
//!
//! The host optimizer owns join ordering; this module provides what it
//! needs from the open-attribute engine:
//!
//! - Cost estimates for subplans under an open attribute
//! - Runtime strategy reoptimization once selectivities are measured
//! - Swapping in a replanned pipeline between combination passes
//! - Declarative pipeline descriptions and explain output

mod ast;
mod cost;
mod errors;
mod explain;
mod reoptimizer;
mod spec;
mod swap;

pub use ast::{FilterOp, Predicate};
pub use cost::{estimate_cost, CostEstimate, CostModel};
pub use errors::{PlannerError, PlannerErrorCode, PlannerResult, Severity};
pub use explain::{AttributeExplain, PipelineExplain};
pub use reoptimizer::{Decision, Replanner, StrategyCosts, StrategyReoptimizer};
pub use spec::{register_attributes, AttributeSpec, PipelineSpec, SourceTable, SpecReplanner};
pub use swap::{PlanSwapController, SwapReport};
