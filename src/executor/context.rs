//! Per-query execution state shared by all operators

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::attribute::{AttributeId, AttributeRegistry};
use crate::config::EngineConfig;
use crate::observability::MetricsRegistry;
use crate::planner::Replanner;
use crate::resolver::CandidateResolver;

use super::node::PlanNode;

/// Everything a pipeline needs besides its own operators
pub struct ExecutionContext {
    pub config: EngineConfig,
    pub attributes: AttributeRegistry,
    /// Current odometer digit per attribute; absent means 0
    pub digits: BTreeMap<AttributeId, usize>,
    pub resolver: Box<dyn CandidateResolver>,
    pub replanner: Option<Box<dyn Replanner>>,
    /// Replacement pipeline waiting for the next pass boundary
    pub pending_replacement: Option<Box<dyn PlanNode>>,
    pub metrics: MetricsRegistry,
    query_id: String,
}

impl ExecutionContext {
    pub fn new(
        config: EngineConfig,
        attributes: AttributeRegistry,
        resolver: Box<dyn CandidateResolver>,
    ) -> Self {
        Self {
            config,
            attributes,
            digits: BTreeMap::new(),
            resolver,
            replanner: None,
            pending_replacement: None,
            metrics: MetricsRegistry::new(),
            query_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_replanner(mut self, replanner: Box<dyn Replanner>) -> Self {
        self.replanner = Some(replanner);
        self
    }

    /// Identifier carried by every log event of this query
    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn digit(&self, attribute: AttributeId) -> usize {
        self.digits.get(&attribute).copied().unwrap_or(0)
    }

    pub fn set_digit(&mut self, attribute: AttributeId, digit: usize) {
        self.digits.insert(attribute, digit);
    }

    /// Hand a replacement pipeline to the driver; it swaps at the next pass boundary
    pub fn request_swap(&mut self, replacement: Box<dyn PlanNode>) {
        self.pending_replacement = Some(replacement);
    }
}
