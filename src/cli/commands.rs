//! CLI command implementations
//!
//! Every command works on a scenario file: engine configuration, local
//! source tables, attribute definitions, the pipeline to run, and canned
//! resolver answers. The resolver never leaves the process.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::executor::{CombinationDriver, ExecutionContext, PlanNode};
use crate::observability::{Logger, MetricsSnapshot};
use crate::planner::{
    estimate_cost, register_attributes, AttributeSpec, CostEstimate, CostModel, PipelineExplain,
    PipelineSpec, SourceTable, SpecReplanner,
};
use crate::resolver::{FixtureResolver, FixtureTable};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_json_file, write_json_lines, write_text};

/// Scenario file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Engine configuration (optional, all defaults)
    #[serde(default)]
    pub config: EngineConfig,

    /// Local tables by name
    #[serde(default)]
    pub sources: BTreeMap<String, SourceTable>,

    /// Open attributes; ids follow this order
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,

    pub pipeline: PipelineSpec,

    /// Resolver answers by keyword
    #[serde(default)]
    pub fixtures: BTreeMap<String, FixtureTable>,

    /// Pipeline offered once as the replan when reoptimization is on
    #[serde(default)]
    pub replan: Option<PipelineSpec>,
}

impl Scenario {
    /// Load a scenario from file
    pub fn load(path: &Path) -> CliResult<Self> {
        read_json_file(path)
    }

    /// Build the execution context and the pipeline under `config`
    pub fn prepare(&self, config: EngineConfig) -> CliResult<(ExecutionContext, Box<dyn PlanNode>)> {
        config.validate()?;
        let attributes = register_attributes(&self.attributes, &config)?;
        let pipeline = self.pipeline.build(&self.sources, &attributes)?;
        let resolver = FixtureResolver::from_tables(self.fixtures.clone());

        let mut ctx = ExecutionContext::new(config, attributes, Box::new(resolver));
        if let Some(replan) = &self.replan {
            ctx = ctx.with_replanner(Box::new(SpecReplanner::new(
                replan.clone(),
                self.sources.clone(),
            )));
        }
        Ok((ctx, pipeline))
    }

    /// The configuration file wins over the scenario's own
    fn effective_config(&self, config_path: Option<&Path>) -> CliResult<EngineConfig> {
        match config_path {
            Some(path) => Ok(EngineConfig::load(path)?),
            None => Ok(self.config.clone()),
        }
    }
}

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run {
            scenario,
            config,
            metrics,
        } => run_scenario(&scenario, config.as_deref(), metrics),
        Command::Explain {
            scenario,
            config,
            analyze,
            json,
        } => explain(&scenario, config.as_deref(), analyze, json),
        Command::Cost {
            subplan,
            selectivity,
            model,
            config,
        } => cost(subplan, selectivity, model.as_deref(), config.as_deref()),
    }
}

/// Enumerate all combinations and print one JSON line per row
pub fn run_scenario(scenario_path: &Path, config_path: Option<&Path>, metrics: bool) -> CliResult<()> {
    let scenario = Scenario::load(scenario_path)?;
    let config = scenario.effective_config(config_path)?;
    Logger::set_min_severity(config.log_level);

    let (rows, snapshot) = execute(&scenario, config)?;
    let mut lines = rows;
    if metrics {
        lines.push(json!({ "metrics": snapshot }));
    }
    write_json_lines(&lines)
}

/// Print the pipeline's explain output
pub fn explain(scenario_path: &Path, config_path: Option<&Path>, analyze: bool, as_json: bool) -> CliResult<()> {
    let scenario = Scenario::load(scenario_path)?;
    let config = scenario.effective_config(config_path)?;
    Logger::set_min_severity(config.log_level);

    let explain = explain_scenario(&scenario, config, analyze)?;
    if as_json {
        write_json_lines(&[serde_json::to_value(&explain)?])
    } else {
        write_text(&explain.to_string())
    }
}

/// Print the cost estimate of a subplan
pub fn cost(
    subplan: f64,
    selectivity: Option<f64>,
    model: Option<&str>,
    config_path: Option<&Path>,
) -> CliResult<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let model = match model {
        Some(name) => parse_cost_model(name)?,
        None => config.cost_model,
    };
    let estimate = evaluate_cost(subplan, selectivity, model, &config)?;
    write_json_lines(&[json!({
        "model": model.as_str(),
        "startup_cost": estimate.startup_cost,
        "run_cost": estimate.run_cost,
        "total_cost": estimate.total(),
    })])
}

/// Run a scenario to completion; rows are rendered with their choices
pub fn execute(scenario: &Scenario, config: EngineConfig) -> CliResult<(Vec<Value>, MetricsSnapshot)> {
    let (mut ctx, pipeline) = scenario.prepare(config)?;
    let mut driver = CombinationDriver::new(pipeline);
    let rows = driver.run(&mut ctx)?;
    let rendered = rows.iter().map(|r| r.to_json(&ctx.attributes)).collect();
    Ok((rendered, ctx.metrics.snapshot()))
}

/// Explain a scenario, after executing it when `analyze` is set
pub fn explain_scenario(scenario: &Scenario, config: EngineConfig, analyze: bool) -> CliResult<PipelineExplain> {
    let (mut ctx, pipeline) = scenario.prepare(config)?;
    if !analyze {
        return Ok(PipelineExplain::from_pipeline(
            pipeline.as_ref(),
            &ctx.attributes,
            &ctx.config,
        ));
    }
    let mut driver = CombinationDriver::new(pipeline);
    driver.run(&mut ctx)?;
    Ok(PipelineExplain::from_pipeline(
        driver.pipeline(),
        &ctx.attributes,
        &ctx.config,
    ))
}

/// Validate inputs and evaluate the cost function
pub fn evaluate_cost(
    subplan: f64,
    selectivity: Option<f64>,
    model: CostModel,
    config: &EngineConfig,
) -> CliResult<CostEstimate> {
    if !subplan.is_finite() || subplan < 0.0 {
        return Err(CliError::config_error(format!(
            "subplan cost must be a non-negative number, got {}",
            subplan
        )));
    }
    let selectivity = selectivity.unwrap_or(config.default_selectivity);
    if !(selectivity > 0.0 && selectivity <= 1.0) {
        return Err(CliError::config_error(format!(
            "selectivity must be in (0, 1], got {}",
            selectivity
        )));
    }
    Ok(estimate_cost(subplan, selectivity, config.max_candidates, model))
}

fn parse_cost_model(name: &str) -> CliResult<CostModel> {
    serde_json::from_value(Value::String(name.to_string()))
        .map_err(|_| CliError::config_error(format!("Unknown cost model: '{}'", name)))
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scenario_json() -> Value {
        json!({
            "config": {"dynamic_strategy": false},
            "sources": {
                "nation": {
                    "columns": ["n_name"],
                    "rows": [{"n_name": "FRANCE"}]
                }
            },
            "attributes": [{"keyword": "gdp", "key": ["n_name"]}],
            "pipeline": {
                "op": "expand",
                "attribute": "gdp",
                "input": {
                    "op": "join",
                    "attribute": "gdp",
                    "input": {"op": "scan", "source": "nation"}
                }
            },
            "fixtures": {
                "gdp": {
                    "entries": [{"key": ["FRANCE"], "candidates": [10, 20]}],
                    "explanation": {"source": "fixture"}
                }
            }
        })
    }

    fn write_scenario(temp_dir: &TempDir, scenario: &Value) -> std::path::PathBuf {
        let path = temp_dir.path().join("scenario.json");
        fs::write(&path, scenario.to_string()).unwrap();
        path
    }

    #[test]
    fn test_execute_enumerates_candidates() {
        let scenario: Scenario = serde_json::from_value(scenario_json()).unwrap();
        let config = scenario.config.clone();
        let (rows, metrics) = execute(&scenario, config).unwrap();
        assert_eq!(
            rows,
            vec![
                json!({"n_name": "FRANCE", "gdp": 10, "_choices": {"gdp": 0}}),
                json!({"n_name": "FRANCE", "gdp": 20, "_choices": {"gdp": 1}}),
            ]
        );
        assert_eq!(metrics.resolver_calls, 1);
        assert_eq!(metrics.combinations, 2);
    }

    #[test]
    fn test_explain_analyze_shows_resolution() {
        let scenario: Scenario = serde_json::from_value(scenario_json()).unwrap();
        let config = scenario.config.clone();

        let before = explain_scenario(&scenario, config.clone(), false).unwrap();
        assert_eq!(before.attributes[0].keys, 0);

        let after = explain_scenario(&scenario, config, true).unwrap();
        assert_eq!(after.attributes[0].keys, 1);
        assert_eq!(after.attributes[0].radix, 2);
        assert!(after.attributes[0].resolved_at.is_some());
        assert_eq!(after.attributes[0].explanation, json!({"source": "fixture"}));
    }

    #[test]
    fn test_config_file_overrides_scenario() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("engine.json");
        fs::write(&config_path, json!({"max_candidates": 1}).to_string()).unwrap();

        let scenario: Scenario = serde_json::from_value(scenario_json()).unwrap();
        let config = scenario.effective_config(Some(&config_path)).unwrap();
        assert_eq!(config.max_candidates, 1);
        assert!(config.dynamic_strategy);
    }

    #[test]
    fn test_run_scenario_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_scenario(&temp_dir, &scenario_json());
        run_scenario(&path, None, true).unwrap();
    }

    #[test]
    fn test_unknown_attribute_is_invalid_scenario() {
        let mut scenario = scenario_json();
        scenario["attributes"] = json!([{"keyword": "population", "key": ["n_name"]}]);
        let temp_dir = TempDir::new().unwrap();
        let path = write_scenario(&temp_dir, &scenario);

        let result = run_scenario(&path, None, false);
        assert_eq!(result.unwrap_err().code(), &CliErrorCode::ScenarioInvalid);
    }

    #[test]
    fn test_missing_fixture_fails_execution() {
        let mut scenario = scenario_json();
        scenario["fixtures"] = json!({});
        let scenario: Scenario = serde_json::from_value(scenario).unwrap();
        let config = scenario.config.clone();
        let err = execute(&scenario, config).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ExecutionFailed);
        assert!(err.message().contains("OPENATTR_RESOLVER_UNAVAILABLE"));
    }

    #[test]
    fn test_evaluate_cost() {
        let config = EngineConfig::default();
        let estimate = evaluate_cost(100.0, Some(0.5), CostModel::Both, &config).unwrap();
        assert_eq!(estimate.startup_cost, 100.0);
        assert_eq!(estimate.run_cost, 150.0);

        let estimate = evaluate_cost(100.0, None, CostModel::OnlyS, &config).unwrap();
        assert!((estimate.run_cost - 33.0).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_cost_rejects_bad_input() {
        let config = EngineConfig::default();
        assert!(evaluate_cost(-1.0, None, CostModel::OnlyS, &config).is_err());
        assert!(evaluate_cost(10.0, Some(0.0), CostModel::OnlyS, &config).is_err());
        assert!(parse_cost_model("only_q").is_err());
        assert_eq!(parse_cost_model("none").unwrap(), CostModel::None);
    }
}
