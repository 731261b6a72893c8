//! Per-attribute candidate cache
//!
//! Maps join-key tuples to shared bundles. Hashing and equality go
//! through the `KeySpec` passed into each call; the cache remembers the
//! spec it was keyed on so a plan swap can decide whether to keep it.

use std::collections::HashMap;
use std::rc::Rc;

use crate::attribute::{KeySpec, KeyTuple};
use crate::executor::{ExecutorError, ExecutorResult, Stage};

use super::bundle::CandidateBundle;

/// Candidate bundles of one open attribute
#[derive(Debug, Default)]
pub struct CandidateCache {
    keyed_on: Option<KeySpec>,
    /// Insertion order is the order keys are sent to the resolver
    entries: Vec<Rc<CandidateBundle>>,
    buckets: HashMap<u64, Vec<usize>>,
    resolved_this_scan: bool,
}

impl CandidateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key spec of the registered entries, if any were registered
    pub fn keyed_on(&self) -> Option<&KeySpec> {
        self.keyed_on.as_ref()
    }

    /// Ensure a bundle exists for `key`; idempotent
    pub fn register(&mut self, spec: &KeySpec, key: KeyTuple) -> ExecutorResult<()> {
        self.check_spec(spec)?;
        if self.find(spec, &key).is_some() {
            return Ok(());
        }
        if self.keyed_on.is_none() {
            self.keyed_on = Some(spec.clone());
        }
        let hash = spec.hash(&key);
        self.buckets.entry(hash).or_default().push(self.entries.len());
        self.entries.push(Rc::new(CandidateBundle::unresolved(key)));
        Ok(())
    }

    /// Resolved bundle for `key`
    ///
    /// A key that was never registered, or is still unresolved, is an
    /// internal fault.
    pub fn lookup(
        &self,
        keyword: &str,
        spec: &KeySpec,
        key: &[serde_json::Value],
    ) -> ExecutorResult<Rc<CandidateBundle>> {
        self.check_spec(spec).map_err(|e| e.with_keyword(keyword))?;
        let index = self.find(spec, key).ok_or_else(|| {
            ExecutorError::cache_invariant(Stage::Join, "lookup of a key that was never registered")
                .with_keyword(keyword)
        })?;
        let bundle = &self.entries[index];
        if !bundle.is_resolved() {
            return Err(
                ExecutorError::cache_invariant(Stage::Join, "lookup before the key was resolved")
                    .with_keyword(keyword),
            );
        }
        Ok(Rc::clone(bundle))
    }

    fn find(&self, spec: &KeySpec, key: &[serde_json::Value]) -> Option<usize> {
        self.buckets
            .get(&spec.hash(key))?
            .iter()
            .copied()
            .find(|&i| spec.matches(self.entries[i].key(), key))
    }

    fn check_spec(&self, spec: &KeySpec) -> ExecutorResult<()> {
        match &self.keyed_on {
            Some(keyed_on) if keyed_on != spec => Err(ExecutorError::cache_invariant(
                Stage::Join,
                format!(
                    "cache keyed on {:?} accessed with key {:?}",
                    keyed_on.columns, spec.columns
                ),
            )),
            _ => Ok(()),
        }
    }

    /// Start a new scan; allows one more resolution
    pub fn begin_scan(&mut self) {
        self.resolved_this_scan = false;
    }

    pub fn resolved_this_scan(&self) -> bool {
        self.resolved_this_scan
    }

    pub(crate) fn mark_resolved_this_scan(&mut self) {
        self.resolved_this_scan = true;
    }

    /// Indices of unresolved entries in insertion order
    pub(crate) fn pending(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_resolved())
            .map(|(i, _)| i)
            .collect()
    }

    pub(crate) fn entry(&self, index: usize) -> &CandidateBundle {
        &self.entries[index]
    }

    /// Replace an unresolved entry with its resolved bundle
    pub(crate) fn fill(&mut self, index: usize, bundle: CandidateBundle) {
        self.entries[index] = Rc::new(bundle);
    }

    /// Hard clear: drops every bundle and the key spec
    pub fn clear(&mut self) {
        self.keyed_on = None;
        self.entries.clear();
        self.buckets.clear();
        self.resolved_this_scan = false;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries.iter().filter(|b| b.is_resolved()).count()
    }

    /// Resolved keys passing the restrictions under some candidate
    pub fn in_union_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|b| b.is_resolved() && b.in_union())
            .count()
    }

    /// Largest candidate count across resolved bundles
    pub fn max_candidate_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|b| b.is_resolved())
            .map(|b| b.count())
            .max()
            .unwrap_or(0)
    }

    pub fn bundles(&self) -> impl Iterator<Item = &Rc<CandidateBundle>> {
        self.entries.iter()
    }
}
