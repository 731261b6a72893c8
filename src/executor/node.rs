//! Pull-based pipeline interface
//!
//! Every operator is a resumable producer: `open`, then `next` until it
//! returns `None`, `rescan` to start another pass, `close` once.

use std::collections::BTreeSet;

use crate::attribute::AttributeId;

use super::context::ExecutionContext;
use super::errors::ExecutorResult;
use super::row::Row;

/// Why a pipeline is asked for another pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RescanSignal {
    /// Everything below must be recomputed from its sources
    FullReset,
    /// Only operators depending on these attributes' digits must recompute;
    /// everything else replays what it buffered
    TargetedReset(BTreeSet<AttributeId>),
}

impl RescanSignal {
    pub fn targeted(changed: impl IntoIterator<Item = AttributeId>) -> Self {
        RescanSignal::TargetedReset(changed.into_iter().collect())
    }
}

/// What an operator does for an open attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingRole {
    /// Attaches candidates to rows
    Join,
    /// Turns tokens into values
    Expansion,
    /// Buffers rows so the subtree can be replayed
    Rewind,
}

/// Capability exposed by attribute-aware operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    pub attribute: AttributeId,
    pub role: BindingRole,
}

/// A pipeline operator
pub trait PlanNode {
    /// One-line description for explain output
    fn describe(&self) -> String;

    /// Fields present on every produced row
    fn output_columns(&self) -> Vec<String>;

    fn children(&self) -> Vec<&dyn PlanNode>;

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode>;

    /// The attribute this operator works for, if any
    fn attribute_binding(&self) -> Option<AttributeBinding> {
        None
    }

    /// Estimated cost of this operator alone
    fn own_cost(&self) -> f64;

    fn open(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()>;

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>>;

    fn rescan(&mut self, signal: &RescanSignal, ctx: &mut ExecutionContext) -> ExecutorResult<()>;

    /// Release buffers; the node is not used afterwards
    fn close(&mut self);

    /// Whether this operator's own output changes when `changed` digits move
    fn reacts_to(&self, _changed: &BTreeSet<AttributeId>, _ctx: &ExecutionContext) -> bool {
        false
    }

    /// Resolve candidates ahead of the first pass
    fn prime(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        for child in self.children_mut() {
            child.prime(ctx)?;
        }
        Ok(())
    }
}
