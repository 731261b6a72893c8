//! Candidate bundles
//!
//! One bundle per distinct join key. Created unresolved when the key is
//! first seen, replaced exactly once by its resolved form, immutable after.

use serde_json::Value;

use crate::attribute::KeyTuple;

static NULL: Value = Value::Null;

/// All candidates the resolver proposed for one join key
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBundle {
    key: KeyTuple,
    values: Vec<Value>,
    resolved: bool,
    in_union: bool,
}

impl CandidateBundle {
    /// A bundle awaiting resolution
    pub fn unresolved(key: KeyTuple) -> Self {
        Self {
            key,
            values: Vec::new(),
            resolved: false,
            in_union: false,
        }
    }

    /// A resolved bundle; zero candidates become one null candidate
    pub fn resolved(key: KeyTuple, values: Vec<Value>, in_union: bool) -> Self {
        if values.is_empty() {
            return Self::null_candidate(key);
        }
        Self {
            key,
            values,
            resolved: true,
            in_union,
        }
    }

    /// The single null candidate used when the resolver proposed nothing
    pub fn null_candidate(key: KeyTuple) -> Self {
        Self {
            key,
            values: vec![Value::Null],
            resolved: true,
            in_union: false,
        }
    }

    pub fn key(&self) -> &[Value] {
        &self.key
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Passes the attribute's restrictions under at least one candidate
    pub fn in_union(&self) -> bool {
        self.in_union
    }

    /// Number of candidates
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Candidate at `index`; null when the index is past this bundle's count
    pub fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&NULL)
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.value(index).is_null()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unresolved_bundle() {
        let bundle = CandidateBundle::unresolved(vec![json!("France")]);
        assert!(!bundle.is_resolved());
        assert_eq!(bundle.count(), 0);
        assert!(!bundle.in_union());
    }

    #[test]
    fn test_resolved_bundle() {
        let bundle = CandidateBundle::resolved(
            vec![json!("France")],
            vec![json!(10), json!(null), json!(30)],
            true,
        );
        assert!(bundle.is_resolved());
        assert_eq!(bundle.count(), 3);
        assert_eq!(bundle.value(2), &json!(30));
        assert!(bundle.is_null(1));
        assert!(bundle.in_union());
    }

    #[test]
    fn test_zero_candidates_yield_one_null() {
        let bundle = CandidateBundle::resolved(vec![json!("Atlantis")], vec![], true);
        assert_eq!(bundle.count(), 1);
        assert!(bundle.is_null(0));
        assert!(!bundle.in_union());
    }

    #[test]
    fn test_index_past_count_is_null() {
        let bundle = CandidateBundle::resolved(vec![json!(1)], vec![json!(5)], true);
        assert!(bundle.is_null(1));
        assert!(bundle.is_null(17));
    }
}
