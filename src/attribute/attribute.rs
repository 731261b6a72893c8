//! Open attribute definition and runtime state

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::CandidateCache;
use crate::config::EngineConfig;
use crate::planner::Predicate;

use super::key::KeySpec;

/// Identity of an open attribute within one query
///
/// Ids are dense and ascending in registration order; the odometer uses
/// that order for digit significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeId(pub u32);

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an attribute's candidates reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Every candidate becomes its own row at the expansion stage
    Combinatorial,
    /// A bundle token travels downstream; the odometer digit picks the value
    Deferred,
    /// The digit's candidate is inlined at the join; nothing is buffered
    Direct,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Combinatorial => "combinatorial",
            Strategy::Deferred => "deferred",
            Strategy::Direct => "direct",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the attribute is used by the query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeFlags {
    #[serde(default)]
    pub selective: bool,
    #[serde(default)]
    pub aggregated: bool,
    #[serde(default)]
    pub grouped: bool,
    #[serde(default)]
    pub sorted: bool,
}

/// A column resolved at runtime from the resolver service
#[derive(Debug)]
pub struct OpenAttribute {
    id: AttributeId,
    /// Keyword the user asked for, e.g. `gdp`
    pub keyword: String,
    /// Row field the candidate value (or token) is written to
    pub output_column: String,
    /// Name of the local table being extended
    pub local_table: String,
    pub key: KeySpec,
    /// Predicates on the attribute's value
    pub restrictions: Vec<Predicate>,
    pub flags: AttributeFlags,
    pub strategy: Strategy,
    /// Pre-resolution estimate; the configured default applies when unset
    pub selectivity: Option<f64>,
    /// Per-candidate selectivities from the last resolution
    pub candidate_selectivities: Vec<f64>,
    /// Fraction of resolved keys passing the restrictions under some candidate
    pub union_selectivity: Option<f64>,
    /// Candidates per key reported by the last resolution (at least one)
    pub candidate_count: usize,
    pub cache: CandidateCache,
    /// Opaque resolver explanations, one per resolution
    pub explanations: Vec<Value>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Set once the attribute went through a full replan
    pub reoptimized: bool,
}

impl OpenAttribute {
    pub fn new(keyword: impl Into<String>, output_column: impl Into<String>, key: KeySpec) -> Self {
        Self {
            id: AttributeId(0),
            keyword: keyword.into(),
            output_column: output_column.into(),
            local_table: String::new(),
            key,
            restrictions: Vec::new(),
            flags: AttributeFlags::default(),
            strategy: Strategy::Deferred,
            selectivity: None,
            candidate_selectivities: Vec::new(),
            union_selectivity: None,
            candidate_count: 0,
            cache: CandidateCache::new(),
            explanations: Vec::new(),
            resolved_at: None,
            reoptimized: false,
        }
    }

    pub fn with_local_table(mut self, table: impl Into<String>) -> Self {
        self.local_table = table.into();
        self
    }

    /// Add a restriction; marks the attribute selective
    pub fn with_restriction(mut self, predicate: Predicate) -> Self {
        self.restrictions.push(predicate);
        self.flags.selective = true;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_flags(mut self, flags: AttributeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: AttributeId) {
        self.id = id;
    }

    /// True once every registered key has a resolved bundle
    pub fn is_resolved(&self) -> bool {
        !self.cache.is_empty() && self.cache.resolved_count() == self.cache.len()
    }

    /// Mean of the per-candidate selectivities, if resolved
    pub fn average_selectivity(&self) -> Option<f64> {
        if self.candidate_selectivities.is_empty() {
            return None;
        }
        let sum: f64 = self.candidate_selectivities.iter().sum();
        Some(sum / self.candidate_selectivities.len() as f64)
    }

    /// Selectivity assumed before measurements
    pub fn estimated_selectivity(&self, config: &EngineConfig) -> f64 {
        self.selectivity.unwrap_or(config.default_selectivity)
    }

    /// Odometer radix: candidates per key, capped; 1 when expanded in-stream
    pub fn radix(&self, cap: usize) -> usize {
        if self.strategy == Strategy::Combinatorial {
            return 1;
        }
        self.candidate_count.max(1).min(cap.max(1))
    }

    /// Restrictions in resolver wire form
    pub fn restriction_strings(&self, config: &EngineConfig) -> Vec<String> {
        let mut out: Vec<String> = if config.send_predicates {
            self.restrictions
                .iter()
                .map(Predicate::restriction_string)
                .collect()
        } else {
            Vec::new()
        };
        if config.send_numeric_constraint {
            out.push("isNumeric()".to_string());
        }
        out
    }

    /// Drop every resolved bundle and measurement
    pub fn reset_resolution(&mut self) {
        self.cache.clear();
        self.candidate_selectivities.clear();
        self.union_selectivity = None;
        self.candidate_count = 0;
        self.resolved_at = None;
    }
}
