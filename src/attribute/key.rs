//! Join-key hashing and equality
//!
//! Every hash and equality evaluation receives the `KeySpec` it runs
//! under; there is no ambient "current attribute".

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A join-key tuple, one value per key column
pub type KeyTuple = Vec<Value>;

/// Per-column comparison semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyColumnOps {
    /// Values equal iff their JSON representations are equal
    #[default]
    Exact,
    /// Strings compare ignoring ASCII case
    CaseInsensitive,
    /// Numbers compare by numeric value (`1` equals `1.0`)
    Numeric,
}

impl KeyColumnOps {
    fn eq(&self, a: &Value, b: &Value) -> bool {
        match self {
            KeyColumnOps::Exact => a == b,
            KeyColumnOps::CaseInsensitive => match (a, b) {
                (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
                _ => a == b,
            },
            KeyColumnOps::Numeric => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
        }
    }

    fn hash(&self, value: &Value) -> u32 {
        match self {
            KeyColumnOps::Exact => crc32fast::hash(value.to_string().as_bytes()),
            KeyColumnOps::CaseInsensitive => match value {
                Value::String(s) => crc32fast::hash(s.to_ascii_lowercase().as_bytes()),
                other => crc32fast::hash(other.to_string().as_bytes()),
            },
            KeyColumnOps::Numeric => match value.as_f64() {
                // -0.0 and 0.0 compare equal, so they must hash equal
                Some(n) if n == 0.0 => crc32fast::hash(&0f64.to_le_bytes()),
                Some(n) => crc32fast::hash(&n.to_le_bytes()),
                None => crc32fast::hash(value.to_string().as_bytes()),
            },
        }
    }
}

/// The key columns of an attribute together with their comparison ops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub columns: Vec<String>,
    pub ops: Vec<KeyColumnOps>,
}

impl KeySpec {
    /// Key over `columns`, all compared exactly
    pub fn exact<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let ops = vec![KeyColumnOps::Exact; columns.len()];
        Self { columns, ops }
    }

    /// Override the ops of one column
    pub fn with_ops(mut self, column: &str, ops: KeyColumnOps) -> Self {
        if let Some(pos) = self.columns.iter().position(|c| c == column) {
            self.ops[pos] = ops;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Restrict to the columns present in `available`, keeping key order
    pub fn project(&self, available: &[String]) -> KeySpec {
        let (columns, ops) = self
            .columns
            .iter()
            .zip(&self.ops)
            .filter(|(c, _)| available.contains(c))
            .map(|(c, o)| (c.clone(), *o))
            .unzip();
        KeySpec { columns, ops }
    }

    /// True if every key column appears in `available`
    pub fn is_covered_by(&self, available: &[String]) -> bool {
        self.columns.iter().all(|c| available.contains(c))
    }

    /// Combined hash of a key tuple; null columns contribute nothing
    pub fn hash(&self, key: &[Value]) -> u64 {
        let mut hash: u64 = 0;
        for (value, ops) in key.iter().zip(&self.ops) {
            hash = hash.rotate_left(1);
            if !value.is_null() {
                hash ^= u64::from(ops.hash(value));
            }
        }
        hash
    }

    /// Column-wise equality; null equals null
    pub fn matches(&self, a: &[Value], b: &[Value]) -> bool {
        if a.len() != b.len() || a.len() != self.ops.len() {
            return false;
        }
        a.iter()
            .zip(b)
            .zip(&self.ops)
            .all(|((x, y), ops)| match (x.is_null(), y.is_null()) {
                (true, true) => true,
                (false, false) => ops.eq(x, y),
                _ => false,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_hash_and_match() {
        let spec = KeySpec::exact(["country", "year"]);
        let a = vec![json!("France"), json!(2020)];
        let b = vec![json!("France"), json!(2020)];
        let c = vec![json!("France"), json!(2021)];

        assert_eq!(spec.hash(&a), spec.hash(&b));
        assert!(spec.matches(&a, &b));
        assert!(!spec.matches(&a, &c));
    }

    #[test]
    fn test_case_insensitive_column() {
        let spec = KeySpec::exact(["country"]).with_ops("country", KeyColumnOps::CaseInsensitive);
        let a = vec![json!("France")];
        let b = vec![json!("FRANCE")];
        assert!(spec.matches(&a, &b));
        assert_eq!(spec.hash(&a), spec.hash(&b));
    }

    #[test]
    fn test_numeric_column() {
        let spec = KeySpec::exact(["id"]).with_ops("id", KeyColumnOps::Numeric);
        let a = vec![json!(1)];
        let b = vec![json!(1.0)];
        assert!(spec.matches(&a, &b));
        assert_eq!(spec.hash(&a), spec.hash(&b));

        let exact = KeySpec::exact(["id"]);
        assert!(!exact.matches(&a, &b));
    }

    #[test]
    fn test_nulls() {
        let spec = KeySpec::exact(["a", "b"]);
        let a = vec![json!(null), json!("x")];
        let b = vec![json!(null), json!("x")];
        let c = vec![json!("y"), json!("x")];
        assert!(spec.matches(&a, &b));
        assert!(!spec.matches(&a, &c));
        assert_eq!(spec.hash(&a), spec.hash(&b));
    }

    #[test]
    fn test_column_order_matters_for_hash() {
        let spec = KeySpec::exact(["a", "b"]);
        let ab = vec![json!("x"), json!("y")];
        let ba = vec![json!("y"), json!("x")];
        assert_ne!(spec.hash(&ab), spec.hash(&ba));
    }

    #[test]
    fn test_project_keeps_key_order() {
        let spec = KeySpec::exact(["a", "b", "c"]).with_ops("c", KeyColumnOps::Numeric);
        let available = vec!["c".to_string(), "a".to_string()];
        let projected = spec.project(&available);
        assert_eq!(projected.columns, vec!["a", "c"]);
        assert_eq!(projected.ops, vec![KeyColumnOps::Exact, KeyColumnOps::Numeric]);
        assert!(!spec.is_covered_by(&available));
        assert!(projected.is_covered_by(&available));
    }
}
