//! Predicate evaluation over rows
//!
//! No type coercion: numbers compare numerically, strings lexically,
//! anything else only by equality. Null never matches; a token matches
//! only once it has been substituted by a value.

use std::cmp::Ordering;

use serde_json::Value;

use crate::planner::{FilterOp, Predicate};

use super::row::{Datum, Row};

/// Evaluates predicates against rows
pub struct PredicateFilter;

impl PredicateFilter {
    /// Checks if a row matches all predicates
    pub fn matches(row: &Row, predicates: &[Predicate]) -> bool {
        predicates.iter().all(|pred| match row.scalar(&pred.field) {
            Some(value) => Self::matches_value(value, &pred.op),
            None => false,
        })
    }

    /// Checks the predicates decidable now. A predicate on a field holding
    /// a bundle token is attached to the token instead, for the expansion
    /// stage to check against each substituted candidate.
    pub fn matches_or_defer(row: &mut Row, predicates: &[Predicate]) -> bool {
        for pred in predicates {
            match row.get_mut(&pred.field) {
                Some(Datum::Candidates(token)) => token.deferred.push(pred.clone()),
                Some(Datum::Scalar(value)) => {
                    if !Self::matches_value(value, &pred.op) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    /// Checks one value against one comparison
    pub fn matches_value(value: &Value, op: &FilterOp) -> bool {
        if value.is_null() {
            return false;
        }
        match op {
            FilterOp::Eq(expected) => value == expected,
            FilterOp::Ne(expected) => !expected.is_null() && value != expected,
            FilterOp::Gte(bound) => Self::compare(value, bound).map_or(false, Ordering::is_ge),
            FilterOp::Gt(bound) => Self::compare(value, bound).map_or(false, Ordering::is_gt),
            FilterOp::Lte(bound) => Self::compare(value, bound).map_or(false, Ordering::is_le),
            FilterOp::Lt(bound) => Self::compare(value, bound).map_or(false, Ordering::is_lt),
        }
    }

    fn compare(actual: &Value, bound: &Value) -> Option<Ordering> {
        match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                    return Some(ai.cmp(&bi));
                }
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}
