//! Predicate structures
//!
//! Simple `column op constant` comparisons, used both as operator quals and
//! as the restrictions sent to the resolver.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Equality: field = value
    Eq(Value),
    /// Inequality: field <> value
    Ne(Value),
    /// Greater than or equal: field >= value
    Gte(Value),
    /// Greater than: field > value
    Gt(Value),
    /// Less than or equal: field <= value
    Lte(Value),
    /// Less than: field < value
    Lt(Value),
}

impl FilterOp {
    /// Returns the operation name for explain output
    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "eq",
            FilterOp::Ne(_) => "ne",
            FilterOp::Gte(_) => "gte",
            FilterOp::Gt(_) => "gt",
            FilterOp::Lte(_) => "lte",
            FilterOp::Lt(_) => "lt",
        }
    }

    /// Operator symbol as the resolver expects it
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "=",
            FilterOp::Ne(_) => "<>",
            FilterOp::Gte(_) => ">=",
            FilterOp::Gt(_) => ">",
            FilterOp::Lte(_) => "<=",
            FilterOp::Lt(_) => "<",
        }
    }

    /// The constant operand
    pub fn operand(&self) -> &Value {
        match self {
            FilterOp::Eq(v)
            | FilterOp::Ne(v)
            | FilterOp::Gte(v)
            | FilterOp::Gt(v)
            | FilterOp::Lte(v)
            | FilterOp::Lt(v) => v,
        }
    }
}

/// A single predicate (field + operation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// Field name
    pub field: String,
    /// Comparison
    pub op: FilterOp,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Eq(value))
    }

    pub fn ne(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Ne(value))
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gte(value))
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Gt(value))
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lte(value))
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self::new(field, FilterOp::Lt(value))
    }

    fn new(field: impl Into<String>, op: FilterOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    /// Render as a resolver restriction, e.g. `"> 100"`
    ///
    /// The column is implied by the attribute the restriction is sent for.
    pub fn restriction_string(&self) -> String {
        let operand = match self.op.operand() {
            Value::Null => "NULL".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        format!("{} {}", self.op.symbol(), operand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_restriction_string_numeric() {
        assert_eq!(Predicate::gt("gdp", json!(100)).restriction_string(), "> 100");
        assert_eq!(Predicate::lte("gdp", json!(2.5)).restriction_string(), "<= 2.5");
    }

    #[test]
    fn test_restriction_string_text_and_null() {
        assert_eq!(
            Predicate::eq("capital", json!("Paris")).restriction_string(),
            "= Paris"
        );
        assert_eq!(
            Predicate::ne("capital", json!(null)).restriction_string(),
            "<> NULL"
        );
    }

    #[test]
    fn test_predicate_serde_shape() {
        let pred: Predicate =
            serde_json::from_value(json!({"field": "gdp", "op": {"gt": 100}})).unwrap();
        assert_eq!(pred, Predicate::gt("gdp", json!(100)));
        assert_eq!(pred.op.op_name(), "gt");
    }
}
