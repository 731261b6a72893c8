//! Candidate Cache Tests
//!
//! Tests for resolution invariants:
//! - One batched resolver call per attribute per scan
//! - Keys without candidates get exactly one null candidate outside the union
//! - Resolver failures abort the query naming the attribute and stage
//! - Restrictions travel to the resolver in wire form

use std::cell::RefCell;
use std::rc::Rc;

use openattr::attribute::{AttributeId, AttributeRegistry, KeySpec, OpenAttribute};
use openattr::config::EngineConfig;
use openattr::executor::{
    CandidateExpansion, CombinationDriver, ExecutionContext, ExecutorErrorCode, OpenAttributeJoin,
    Row, Stage, ValuesScan,
};
use openattr::planner::Predicate;
use openattr::resolver::{
    CandidateResolver, FixtureResolver, FixtureTable, ResolveRequest, ResolveResponse,
    ResolverError, ResolverResult, ResponseCandidate,
};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn pinned_config() -> EngineConfig {
    EngineConfig {
        dynamic_strategy: false,
        ..EngineConfig::default()
    }
}

fn gdp() -> OpenAttribute {
    OpenAttribute::new("gdp", "gdp", KeySpec::exact(["n_name"])).with_local_table("nation")
}

fn driver_over(names: &[&str], attr: OpenAttribute) -> (AttributeRegistry, CombinationDriver) {
    let mut registry = AttributeRegistry::new();
    let id = registry.insert(attr);
    let rows = names
        .iter()
        .map(|n| Row::new().with("n_name", json!(n)))
        .collect();
    let scan = ValuesScan::new("nation", vec!["n_name".into()], rows);
    let attr = registry.get(id).unwrap();
    let join = OpenAttributeJoin::new(Box::new(scan), attr, vec![]);
    let expand = CandidateExpansion::new(Box::new(join), attr);
    (registry, CombinationDriver::new(Box::new(expand)))
}

fn fixture() -> FixtureTable {
    FixtureTable::default()
        .entry(vec![json!("FRANCE")], vec![json!(2700), json!(2900)])
        .entry(vec![json!("SPAIN")], vec![json!(1400), json!(1500)])
        .entry(vec![json!("ITALY")], vec![json!(2000), json!(2100)])
}

// =============================================================================
// Batching Tests
// =============================================================================

/// Many rows with duplicate keys still produce one request with distinct keys.
#[test]
fn test_one_call_for_duplicate_keys() {
    let mut names = Vec::new();
    for _ in 0..40 {
        names.extend(["FRANCE", "SPAIN", "ITALY"]);
    }
    let (registry, mut driver) = driver_over(&names, gdp());
    let resolver = Rc::new(RefCell::new(FixtureResolver::new().with_table("gdp", fixture())));
    let mut ctx = ExecutionContext::new(pinned_config(), registry, Box::new(Rc::clone(&resolver)));

    let rows = driver.run(&mut ctx).unwrap();
    assert_eq!(rows.len(), 120 * 2);

    let resolver = resolver.borrow();
    assert_eq!(resolver.requests().len(), 1);
    let request = &resolver.requests()[0];
    assert_eq!(request.key_count(), 3);
    assert_eq!(request.column_names, vec!["n_name".to_string()]);
    assert_eq!(
        request.columns,
        vec![vec![json!("FRANCE"), json!("SPAIN"), json!("ITALY")]]
    );
    assert_eq!(request.local_table_name, "nation");
    assert_eq!(ctx.metrics.snapshot().keys_resolved, 3);
}

/// Later combination passes reuse the resolved bundles.
#[test]
fn test_no_calls_after_first_pass() {
    let (registry, mut driver) = driver_over(&["FRANCE", "SPAIN"], gdp());
    let resolver = Rc::new(RefCell::new(FixtureResolver::new().with_table("gdp", fixture())));
    let mut ctx = ExecutionContext::new(pinned_config(), registry, Box::new(Rc::clone(&resolver)));

    driver.run(&mut ctx).unwrap();
    assert_eq!(ctx.metrics.snapshot().combinations, 2);
    assert_eq!(resolver.borrow().calls_for("gdp"), 1);
    assert_eq!(ctx.metrics.resolver_calls(), 1);
}

/// Bundles are shared per key, not copied per row.
#[test]
fn test_one_bundle_per_distinct_key() {
    let (registry, mut driver) = driver_over(&["FRANCE", "FRANCE", "SPAIN"], gdp());
    let mut ctx = ExecutionContext::new(
        pinned_config(),
        registry,
        Box::new(FixtureResolver::new().with_table("gdp", fixture())),
    );
    driver.run(&mut ctx).unwrap();

    let attr = ctx.attributes.get(AttributeId(0)).unwrap();
    assert_eq!(attr.cache.len(), 2);
    assert!(attr.is_resolved());
    assert_eq!(attr.candidate_count, 2);
}

// =============================================================================
// Null Candidate Tests
// =============================================================================

/// A key without candidates yields exactly one null candidate outside the union.
#[test]
fn test_zero_candidates_synthesize_null() {
    let (registry, mut driver) = driver_over(&["FRANCE", "ATLANTIS"], gdp());
    let table = fixture().entry(vec![json!("ATLANTIS")], vec![]);
    let mut ctx = ExecutionContext::new(
        pinned_config(),
        registry,
        Box::new(FixtureResolver::new().with_table("gdp", table)),
    );
    let rows = driver.run(&mut ctx).unwrap();

    let attr = ctx.attributes.get(AttributeId(0)).unwrap();
    let atlantis = attr
        .cache
        .bundles()
        .find(|b| b.key() == [json!("ATLANTIS")])
        .unwrap();
    assert_eq!(atlantis.count(), 1);
    assert!(atlantis.is_null(0));
    assert!(!atlantis.in_union());
    assert_eq!(ctx.metrics.snapshot().null_candidates, 1);

    // the null key still produces rows, with a null value
    let atlantis_rows: Vec<_> = rows
        .iter()
        .filter(|r| r.scalar("n_name") == Some(&json!("ATLANTIS")))
        .collect();
    assert_eq!(atlantis_rows.len(), 2);
    assert!(atlantis_rows.iter().all(|r| r.scalar("gdp") == Some(&json!(null))));
}

/// Preselection drops rows whose key passes under no candidate.
#[test]
fn test_preselection_skips_keys_outside_union() {
    let (registry, mut driver) = driver_over(
        &["FRANCE", "SPAIN"],
        gdp().with_restriction(Predicate::gt("gdp", json!(2000))),
    );
    let config = EngineConfig {
        preselection: true,
        ..pinned_config()
    };
    let mut ctx = ExecutionContext::new(
        config,
        registry,
        Box::new(FixtureResolver::new().with_table("gdp", fixture())),
    );
    let rows = driver.run(&mut ctx).unwrap();

    assert!(rows.iter().all(|r| r.scalar("n_name") == Some(&json!("FRANCE"))));
    let attr = ctx.attributes.get(AttributeId(0)).unwrap();
    assert_eq!(attr.union_selectivity, Some(0.5));
}

// =============================================================================
// Restriction Tests
// =============================================================================

/// Restrictions are rendered as `op constant` strings.
#[test]
fn test_restrictions_sent_to_resolver() {
    let (registry, mut driver) = driver_over(
        &["FRANCE"],
        gdp().with_restriction(Predicate::gt("gdp", json!(100))),
    );
    let resolver = Rc::new(RefCell::new(FixtureResolver::new().with_table("gdp", fixture())));
    let config = EngineConfig {
        send_numeric_constraint: true,
        ..pinned_config()
    };
    let mut ctx = ExecutionContext::new(config, registry, Box::new(Rc::clone(&resolver)));
    driver.run(&mut ctx).unwrap();

    let resolver = resolver.borrow();
    assert_eq!(
        resolver.requests()[0].restriction_predicates,
        vec!["> 100".to_string(), "isNumeric()".to_string()]
    );
}

/// Restrictions stay local when sending is off.
#[test]
fn test_restrictions_withheld() {
    let (registry, mut driver) = driver_over(
        &["FRANCE"],
        gdp().with_restriction(Predicate::gt("gdp", json!(100))),
    );
    let resolver = Rc::new(RefCell::new(FixtureResolver::new().with_table("gdp", fixture())));
    let config = EngineConfig {
        send_predicates: false,
        ..pinned_config()
    };
    let mut ctx = ExecutionContext::new(config, registry, Box::new(Rc::clone(&resolver)));
    driver.run(&mut ctx).unwrap();
    assert!(resolver.borrow().requests()[0].restriction_predicates.is_empty());
}

// =============================================================================
// Failure Tests
// =============================================================================

/// Transport failures abort the query, naming the attribute and stage.
#[test]
fn test_transport_failure_is_fatal() {
    let (registry, mut driver) = driver_over(&["FRANCE"], gdp());
    let mut ctx = ExecutionContext::new(
        pinned_config(),
        registry,
        Box::new(FixtureResolver::failing(ResolverError::Transport(
            "connection refused".into(),
        ))),
    );
    let err = driver.run(&mut ctx).unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::ResolverUnavailable);
    assert!(err.is_fatal());
    assert_eq!(err.keyword(), Some("gdp"));
    assert_eq!(err.stage(), Stage::Resolve);
    assert_eq!(ctx.metrics.resolver_calls(), 1);
}

/// Answers with the wrong shape for the request.
struct ShortUnionResolver;

impl CandidateResolver for ShortUnionResolver {
    fn resolve(&mut self, request: &ResolveRequest) -> ResolverResult<ResolveResponse> {
        Ok(ResolveResponse {
            candidates: vec![ResponseCandidate {
                values: vec![json!(1); request.key_count()],
                selectivity: 1.0,
            }],
            in_union: vec![],
            explanation: None,
        })
    }
}

/// A response that does not match the request is malformed, not retried.
#[test]
fn test_malformed_response_is_fatal() {
    let (registry, mut driver) = driver_over(&["FRANCE", "SPAIN"], gdp());
    let mut ctx = ExecutionContext::new(pinned_config(), registry, Box::new(ShortUnionResolver));
    let err = driver.run(&mut ctx).unwrap_err();
    assert_eq!(err.code(), ExecutorErrorCode::ResolverMalformedResponse);
    assert_eq!(err.keyword(), Some("gdp"));
    assert_eq!(ctx.metrics.resolver_calls(), 1);
}
