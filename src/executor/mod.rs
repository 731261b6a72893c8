//! Pipeline execution for open attributes
//!
//! Operators are pull-based and single-threaded. Rows flow
//! scan → join (attach candidates) → expansion (substitute values), and the
//! combination driver re-runs the pipeline once per digit vector.
//!
//! # Rescans
//!
//! - `FullReset`: every operator recomputes from its sources
//! - `TargetedReset(changed)`: operators whose subtree does not react to
//!   `changed` replay their buffers instead of pulling again
//!
//! # Errors
//!
//! Every failure is fatal to the running query; nothing is retried.

mod context;
mod errors;
mod expand;
mod filter;
mod filters;
mod join;
mod materialize;
mod nested_loop;
mod node;
mod odometer;
mod row;
mod scan;
mod visit;

pub use context::ExecutionContext;
pub use errors::{ExecutorError, ExecutorErrorCode, ExecutorResult, Stage};
pub use expand::CandidateExpansion;
pub use filter::Filter;
pub use filters::PredicateFilter;
pub use join::OpenAttributeJoin;
pub use materialize::Materialize;
pub use nested_loop::NestedLoopJoin;
pub use node::{AttributeBinding, BindingRole, PlanNode, RescanSignal};
pub use odometer::CombinationDriver;
pub use row::{BundleToken, Datum, Row};
pub use scan::ValuesScan;
pub use visit::{
    bindings, collect_attributes, find_join, is_affected, join_input_columns, joined_attributes,
    render_tree, subtree_cost, unexpanded_joins, walk,
};
