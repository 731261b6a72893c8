//! Row model
//!
//! A field holds either a concrete value or a token referring to a
//! candidate bundle that a later expansion stage turns into a value.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::attribute::{AttributeId, AttributeRegistry};
use crate::cache::CandidateBundle;
use crate::planner::Predicate;

/// Opaque reference to the bundle of one key
#[derive(Debug, Clone)]
pub struct BundleToken {
    pub attribute: AttributeId,
    pub bundle: Rc<CandidateBundle>,
    /// Predicates on this field, checked once a candidate is substituted
    pub deferred: Vec<Predicate>,
}

impl BundleToken {
    pub fn new(attribute: AttributeId, bundle: Rc<CandidateBundle>) -> Self {
        Self {
            attribute,
            bundle,
            deferred: Vec::new(),
        }
    }
}

impl PartialEq for BundleToken {
    fn eq(&self, other: &Self) -> bool {
        self.attribute == other.attribute
            && Rc::ptr_eq(&self.bundle, &other.bundle)
            && self.deferred == other.deferred
    }
}

/// A field value
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Scalar(Value),
    Candidates(BundleToken),
}

impl Datum {
    /// The concrete value, if this is not a token
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Datum::Scalar(v) => Some(v),
            Datum::Candidates(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&BundleToken> {
        match self {
            Datum::Candidates(t) => Some(t),
            Datum::Scalar(_) => None,
        }
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Scalar(value)
    }
}

/// One row flowing through a pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: BTreeMap<String, Datum>,
    /// Candidate index chosen per attribute for this row
    choices: BTreeMap<AttributeId, usize>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object; non-object values yield an empty row
    pub fn from_json(value: &Value) -> Self {
        let mut row = Row::new();
        if let Value::Object(map) = value {
            for (k, v) in map {
                row.set_scalar(k.clone(), v.clone());
            }
        }
        row
    }

    pub fn get(&self, field: &str) -> Option<&Datum> {
        self.fields.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Datum> {
        self.fields.get_mut(field)
    }

    /// Concrete value of `field`; `None` for a missing field or a token
    pub fn scalar(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).and_then(Datum::as_scalar)
    }

    pub fn set(&mut self, field: impl Into<String>, datum: Datum) {
        self.fields.insert(field.into(), datum);
    }

    pub fn set_scalar(&mut self, field: impl Into<String>, value: Value) {
        self.set(field, Datum::Scalar(value));
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set_scalar(field, value);
        self
    }

    /// Record the candidate index used for `attribute`
    pub fn choose(&mut self, attribute: AttributeId, index: usize) {
        self.choices.insert(attribute, index);
    }

    /// Record `index` unless a choice is already present
    pub fn choose_default(&mut self, attribute: AttributeId, index: usize) {
        self.choices.entry(attribute).or_insert(index);
    }

    pub fn choice(&self, attribute: AttributeId) -> Option<usize> {
        self.choices.get(&attribute).copied()
    }

    pub fn choices(&self) -> &BTreeMap<AttributeId, usize> {
        &self.choices
    }

    /// Values for the key columns; missing fields and tokens become null
    pub fn key(&self, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.scalar(c).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Union of both rows' fields and choices; `other` wins on conflicts
    pub fn merge(&self, other: &Row) -> Row {
        let mut merged = self.clone();
        for (k, v) in &other.fields {
            merged.fields.insert(k.clone(), v.clone());
        }
        for (k, v) in &other.choices {
            merged.choices.insert(*k, *v);
        }
        merged
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// JSON rendering; tokens show their candidates, choices go under `_choices`
    pub fn to_json(&self, attributes: &AttributeRegistry) -> Value {
        let mut out = Map::new();
        for (k, v) in &self.fields {
            let rendered = match v {
                Datum::Scalar(v) => v.clone(),
                Datum::Candidates(t) => {
                    serde_json::json!({ "candidates": t.bundle.values() })
                }
            };
            out.insert(k.clone(), rendered);
        }
        if !self.choices.is_empty() {
            let mut choices = Map::new();
            for (id, index) in &self.choices {
                let name = attributes
                    .get(*id)
                    .map(|a| a.keyword.clone())
                    .unwrap_or_else(|| id.to_string());
                choices.insert(name, Value::from(*index as u64));
            }
            out.insert("_choices".to_string(), Value::Object(choices));
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{KeySpec, OpenAttribute};
    use serde_json::json;

    #[test]
    fn test_from_json_and_key() {
        let row = Row::from_json(&json!({"n_name": "FRANCE", "n_region": 3}));
        assert_eq!(row.scalar("n_name"), Some(&json!("FRANCE")));
        assert_eq!(
            row.key(&["n_name".to_string(), "missing".to_string()]),
            vec![json!("FRANCE"), json!(null)]
        );
    }

    #[test]
    fn test_token_is_not_scalar() {
        let bundle = Rc::new(CandidateBundle::resolved(vec![json!("FRANCE")], vec![json!(1)], true));
        let mut row = Row::new();
        row.set(
            "gdp",
            Datum::Candidates(BundleToken::new(AttributeId(0), Rc::clone(&bundle))),
        );
        assert!(row.scalar("gdp").is_none());
        assert!(row.get("gdp").unwrap().as_token().is_some());

        let same = row.clone();
        assert_eq!(row, same);
    }

    #[test]
    fn test_token_equality_is_identity() {
        let a = Rc::new(CandidateBundle::resolved(vec![json!(1)], vec![json!(1)], true));
        let b = Rc::new(CandidateBundle::resolved(vec![json!(1)], vec![json!(1)], true));
        let ta = BundleToken::new(AttributeId(0), Rc::clone(&a));
        let tb = BundleToken::new(AttributeId(0), b);
        assert_eq!(ta, ta.clone());
        assert_ne!(ta, tb);
    }

    #[test]
    fn test_merge_and_choices() {
        let mut left = Row::new().with("a", json!(1));
        left.choose(AttributeId(0), 2);
        let mut right = Row::new().with("b", json!(2));
        right.choose(AttributeId(1), 1);

        let merged = left.merge(&right);
        assert_eq!(merged.scalar("a"), Some(&json!(1)));
        assert_eq!(merged.scalar("b"), Some(&json!(2)));
        assert_eq!(merged.choice(AttributeId(0)), Some(2));
        assert_eq!(merged.choice(AttributeId(1)), Some(1));

        let mut row = merged.clone();
        row.choose_default(AttributeId(0), 0);
        assert_eq!(row.choice(AttributeId(0)), Some(2));
    }

    #[test]
    fn test_to_json_names_choices_by_keyword() {
        let mut registry = AttributeRegistry::new();
        let gdp = registry.insert(OpenAttribute::new("gdp", "gdp", KeySpec::exact(["n"])));
        let mut row = Row::new().with("gdp", json!(20));
        row.choose(gdp, 1);
        assert_eq!(
            row.to_json(&registry),
            json!({"gdp": 20, "_choices": {"gdp": 1}})
        );
    }
}
