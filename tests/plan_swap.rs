//! Plan Swap Tests
//!
//! Tests for swapping in a replanned pipeline:
//! - Caches whose key columns the new join still sees are transplanted
//! - Caches the new join cannot key are dropped and resolved again
//! - Incompatible replacements are rejected before anything changes
//! - A query is replanned at most once

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use openattr::attribute::{AttributeId, AttributeRegistry};
use openattr::config::EngineConfig;
use openattr::executor::{
    CombinationDriver, ExecutionContext, ExecutorError, ExecutorErrorCode, ExecutorResult,
    PlanNode, Stage,
};
use openattr::planner::{
    register_attributes, AttributeSpec, PipelineSpec, Replanner, SourceTable, SpecReplanner,
};
use openattr::resolver::{FixtureResolver, FixtureTable};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn config() -> EngineConfig {
    EngineConfig {
        reoptimization: true,
        dynamic_strategy: false,
        ..EngineConfig::default()
    }
}

fn sources() -> BTreeMap<String, SourceTable> {
    serde_json::from_value(json!({
        "nation": {
            "columns": ["n_name", "n_code"],
            "rows": [{"n_name": "FRANCE", "n_code": "FR"}]
        },
        "nation_reordered": {
            "columns": ["n_code", "n_name"],
            "rows": [{"n_code": "FR", "n_name": "FRANCE"}]
        },
        "names": {
            "columns": ["n_name"],
            "rows": [{"n_name": "FRANCE"}]
        },
        "codes": {
            "columns": ["n_code"],
            "rows": [{"n_code": "FR"}]
        }
    }))
    .unwrap()
}

fn attributes(config: &EngineConfig) -> AttributeRegistry {
    let specs: Vec<AttributeSpec> = serde_json::from_value(json!([
        {"keyword": "gdp", "key": ["n_name", "n_code"]}
    ]))
    .unwrap();
    register_attributes(&specs, config).unwrap()
}

fn spec(value: Value) -> PipelineSpec {
    serde_json::from_value(value).unwrap()
}

fn over(source: &str) -> PipelineSpec {
    spec(json!({
        "op": "expand",
        "attribute": "gdp",
        "input": {
            "op": "join",
            "attribute": "gdp",
            "input": {"op": "scan", "source": source}
        }
    }))
}

fn resolver() -> Rc<RefCell<FixtureResolver>> {
    Rc::new(RefCell::new(
        FixtureResolver::new().with_table(
            "gdp",
            FixtureTable::default()
                .entry(vec![json!("FRANCE"), json!("FR")], vec![json!(1), json!(2)])
                .entry(vec![json!("FRANCE")], vec![json!(1), json!(2)]),
        ),
    ))
}

fn setup(
    config: EngineConfig,
    replan: Option<PipelineSpec>,
) -> (ExecutionContext, CombinationDriver, Rc<RefCell<FixtureResolver>>) {
    let registry = attributes(&config);
    let pipeline = over("nation").build(&sources(), &registry).unwrap();
    let resolver = resolver();
    let mut ctx = ExecutionContext::new(config, registry, Box::new(Rc::clone(&resolver)));
    if let Some(replan) = replan {
        ctx = ctx.with_replanner(Box::new(SpecReplanner::new(replan, sources())));
    }
    (ctx, CombinationDriver::new(pipeline), resolver)
}

// =============================================================================
// Transplant Tests
// =============================================================================

/// The replacement sees both key columns: bundles move over without a second call.
#[test]
fn test_transplant_keeps_bundles() {
    let (mut ctx, mut driver, resolver) = setup(config(), Some(over("nation_reordered")));
    let rows = driver.run(&mut ctx).unwrap();

    let values: Vec<Value> = rows.iter().map(|r| r.scalar("gdp").cloned().unwrap()).collect();
    assert_eq!(values, vec![json!(1), json!(2)]);
    assert_eq!(resolver.borrow().calls_for("gdp"), 1);

    let metrics = ctx.metrics.snapshot();
    assert_eq!(metrics.plan_swaps, 1);
    assert_eq!(metrics.caches_transplanted, 1);
    assert!(ctx.attributes.get(AttributeId(0)).unwrap().reoptimized);
    assert!(driver.pipeline().describe().starts_with("CandidateExpansion"));
}

/// The swap happens before any row is produced.
#[test]
fn test_swap_precedes_output() {
    let (mut ctx, mut driver, _) = setup(config(), Some(over("nation_reordered")));
    driver.open(&mut ctx).unwrap();
    assert_eq!(ctx.metrics.snapshot().plan_swaps, 1);
    assert_eq!(ctx.metrics.snapshot().combinations, 0);
    driver.close();
}

// =============================================================================
// Reset Tests
// =============================================================================

/// The replacement joins on the name only: the cache is dropped and resolved again.
#[test]
fn test_uncovered_key_forces_fresh_resolution() {
    let replan = spec(json!({
        "op": "nested_loop",
        "outer": {
            "op": "expand",
            "attribute": "gdp",
            "input": {
                "op": "join",
                "attribute": "gdp",
                "input": {"op": "scan", "source": "names"}
            }
        },
        "inner": {"op": "scan", "source": "codes"}
    }));
    let (mut ctx, mut driver, resolver) = setup(config(), Some(replan));
    let rows = driver.run(&mut ctx).unwrap();

    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.scalar("n_code") == Some(&json!("FR"))));

    let resolver = resolver.borrow();
    assert_eq!(resolver.calls_for("gdp"), 2);
    assert_eq!(resolver.requests()[1].column_names, vec!["n_name".to_string()]);
    assert_eq!(ctx.metrics.snapshot().caches_transplanted, 0);
}

// =============================================================================
// Rejection Tests
// =============================================================================

/// A replacement with a different output shape is fatal and never swapped in.
#[test]
fn test_incompatible_replacement_rejected() {
    let replan = spec(json!({"op": "scan", "source": "names"}));
    let (mut ctx, mut driver, _) = setup(config(), Some(replan));
    let err = driver.run(&mut ctx).unwrap_err();

    assert_eq!(err.code(), ExecutorErrorCode::IncompatibleReplan);
    assert!(err.is_fatal());
    assert_eq!(ctx.metrics.snapshot().plan_swaps, 0);
    assert!(driver.pipeline().describe().starts_with("CandidateExpansion"));
}

// =============================================================================
// Replan-Once Tests
// =============================================================================

/// Offers a fresh replacement on every request.
struct EagerReplanner {
    calls: Rc<RefCell<usize>>,
}

impl Replanner for EagerReplanner {
    fn replan(
        &mut self,
        attributes: &AttributeRegistry,
        _config: &EngineConfig,
    ) -> ExecutorResult<Option<Box<dyn PlanNode>>> {
        *self.calls.borrow_mut() += 1;
        let node = over("nation")
            .build(&sources(), attributes)
            .map_err(|e| ExecutorError::execution_failed(Stage::Reoptimize, e.to_string()))?;
        Ok(Some(node))
    }
}

/// Once attributes are reoptimized, later runs on the same query do not replan.
#[test]
fn test_replan_at_most_once() {
    let calls = Rc::new(RefCell::new(0));
    let (ctx, mut driver, _) = setup(config(), None);
    let mut ctx = ctx.with_replanner(Box::new(EagerReplanner {
        calls: Rc::clone(&calls),
    }));

    driver.run(&mut ctx).unwrap();
    driver.run(&mut ctx).unwrap();
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(ctx.metrics.snapshot().plan_swaps, 1);
}

/// Without reoptimization the replanner is never consulted.
#[test]
fn test_no_replan_when_disabled() {
    let calls = Rc::new(RefCell::new(0));
    let config = EngineConfig {
        reoptimization: false,
        ..config()
    };
    let (ctx, mut driver, _) = setup(config, None);
    let mut ctx = ctx.with_replanner(Box::new(EagerReplanner {
        calls: Rc::clone(&calls),
    }));

    let rows = driver.run(&mut ctx).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(*calls.borrow(), 0);
}
