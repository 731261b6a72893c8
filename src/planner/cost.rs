//! Cost interface for the host optimizer
//!
//! Pure functions only; nothing here plans standard operators.

use serde::{Deserialize, Serialize};

/// Which factors scale the cost of an open-attribute subplan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModel {
    /// Selectivity only
    #[default]
    OnlyS,
    /// Candidate count only
    OnlyK,
    /// Selectivity and candidate count
    Both,
    /// Neither; the subplan cost is used as is
    None,
}

impl CostModel {
    pub fn uses_selectivity(&self) -> bool {
        matches!(self, CostModel::OnlyS | CostModel::Both)
    }

    pub fn uses_candidates(&self) -> bool {
        matches!(self, CostModel::OnlyK | CostModel::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CostModel::OnlyS => "only_s",
            CostModel::OnlyK => "only_k",
            CostModel::Both => "both",
            CostModel::None => "none",
        }
    }
}

/// Startup and per-run cost of an open-attribute subplan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub startup_cost: f64,
    pub run_cost: f64,
}

impl CostEstimate {
    pub fn total(&self) -> f64 {
        self.startup_cost + self.run_cost
    }
}

/// Estimate the cost of running a subplan under an open attribute
///
/// Startup pays one full subplan execution (spooling and resolution).
/// The run cost scales the subplan by the selectivity and the candidate
/// count, as far as `model` includes them.
pub fn estimate_cost(
    subplan_cost: f64,
    selectivity: f64,
    max_candidates: usize,
    model: CostModel,
) -> CostEstimate {
    let mut run_cost = subplan_cost;
    if model.uses_selectivity() {
        run_cost *= selectivity;
    }
    if model.uses_candidates() {
        run_cost *= max_candidates as f64;
    }
    CostEstimate {
        startup_cost: subplan_cost,
        run_cost,
    }
}
