//! Batched resolution of an attribute's pending keys

use chrono::Utc;
use serde_json::Value;

use crate::attribute::OpenAttribute;
use crate::config::EngineConfig;
use crate::executor::{ExecutorError, ExecutorResult, Stage};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::resolver::{CandidateResolver, ResolveRequest, ResolveResponse};

use super::bundle::CandidateBundle;

/// Resolve every unresolved key of `attr` with a single resolver call
///
/// Allowed once per scan. Returns the number of keys sent; zero means the
/// resolver was not called because nothing was pending.
pub fn resolve_all(
    attr: &mut OpenAttribute,
    resolver: &mut dyn CandidateResolver,
    config: &EngineConfig,
    metrics: &MetricsRegistry,
    query_id: &str,
) -> ExecutorResult<usize> {
    if attr.cache.resolved_this_scan() {
        return Err(ExecutorError::cache_invariant(
            Stage::Resolve,
            "resolution requested twice in one scan",
        )
        .with_keyword(attr.keyword.as_str()));
    }
    attr.cache.mark_resolved_this_scan();

    let pending = attr.cache.pending();
    if pending.is_empty() {
        return Ok(0);
    }
    let spec = attr.cache.keyed_on().cloned().ok_or_else(|| {
        ExecutorError::cache_invariant(Stage::Resolve, "pending keys without a key spec")
            .with_keyword(attr.keyword.as_str())
    })?;

    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(pending.len()); spec.len()];
    for &index in &pending {
        for (column, value) in columns.iter_mut().zip(attr.cache.entry(index).key()) {
            column.push(value.clone());
        }
    }
    let request = ResolveRequest {
        keyword: attr.keyword.clone(),
        max_candidates: config.max_candidates,
        local_table_name: attr.local_table.clone(),
        column_names: spec.columns.clone(),
        columns,
        restriction_predicates: attr.restriction_strings(config),
    };

    let keyword = attr.keyword.clone();
    let key_count = pending.len().to_string();
    let scope = ObservationScope::with_fields(
        "RESOLVE",
        &[
            ("query_id", query_id),
            ("keyword", keyword.as_str()),
            ("keys", key_count.as_str()),
        ],
    );

    metrics.increment_resolver_calls();
    let response = match resolver.resolve(&request) {
        Ok(response) => response,
        Err(err) => {
            scope.fail_fatal(&err.to_string());
            return Err(ExecutorError::from_resolver(&keyword, err));
        }
    };
    if let Err(reason) = validate(&response, pending.len()) {
        scope.fail_fatal(&reason);
        return Err(ExecutorError::malformed_response(&keyword, reason));
    }

    let used = response.candidates.len().min(config.max_candidates);
    for (t, &index) in pending.iter().enumerate() {
        let key = attr.cache.entry(index).key().to_vec();
        let values: Vec<Value> = response.candidates[..used]
            .iter()
            .map(|c| c.values[t].clone())
            .collect();
        let bundle = if values.iter().all(Value::is_null) {
            metrics.increment_null_candidates();
            log_event_with_fields(
                Event::NullCandidateSynthesized,
                &[("query_id", query_id), ("keyword", keyword.as_str())],
            );
            CandidateBundle::null_candidate(key)
        } else {
            CandidateBundle::resolved(key, values, response.in_union[t])
        };
        attr.cache.fill(index, bundle);
    }

    attr.candidate_selectivities = response.candidates[..used]
        .iter()
        .map(|c| c.selectivity)
        .collect();
    attr.candidate_count = attr.cache.max_candidate_count().max(1);
    let resolved = attr.cache.resolved_count();
    if resolved > 0 {
        attr.union_selectivity = Some(attr.cache.in_union_count() as f64 / resolved as f64);
    }
    if let Some(explanation) = response.explanation {
        attr.explanations.push(explanation);
    }
    attr.resolved_at = Some(Utc::now());
    metrics.add_keys_resolved(pending.len() as u64);

    let candidates = used.to_string();
    scope.complete_with_fields(&[("candidates", candidates.as_str())]);
    Ok(pending.len())
}

fn validate(response: &ResolveResponse, keys: usize) -> Result<(), String> {
    if response.in_union.len() != keys {
        return Err(format!(
            "inUnion has {} entries, expected {}",
            response.in_union.len(),
            keys
        ));
    }
    for (i, candidate) in response.candidates.iter().enumerate() {
        if candidate.values.len() != keys {
            return Err(format!(
                "candidate {} has {} values, expected {}",
                i,
                candidate.values.len(),
                keys
            ));
        }
        if !candidate.selectivity.is_finite() {
            return Err(format!("candidate {} has a non-finite selectivity", i));
        }
    }
    Ok(())
}
