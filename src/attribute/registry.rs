//! Attributes of one query, indexed by id

use crate::executor::{ExecutorError, ExecutorResult, Stage};

use super::attribute::{AttributeId, OpenAttribute};

/// Owns every open attribute of a query
#[derive(Debug, Default)]
pub struct AttributeRegistry {
    attributes: Vec<OpenAttribute>,
}

impl AttributeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an attribute; ids ascend in registration order
    pub fn insert(&mut self, mut attribute: OpenAttribute) -> AttributeId {
        let id = AttributeId(self.attributes.len() as u32);
        attribute.set_id(id);
        self.attributes.push(attribute);
        id
    }

    pub fn get(&self, id: AttributeId) -> Option<&OpenAttribute> {
        self.attributes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: AttributeId) -> Option<&mut OpenAttribute> {
        self.attributes.get_mut(id.0 as usize)
    }

    /// Like `get`, but an unknown id is an execution error
    pub fn lookup(&self, id: AttributeId) -> ExecutorResult<&OpenAttribute> {
        self.get(id).ok_or_else(|| unknown(id))
    }

    pub fn lookup_mut(&mut self, id: AttributeId) -> ExecutorResult<&mut OpenAttribute> {
        self.get_mut(id).ok_or_else(|| unknown(id))
    }

    pub fn by_keyword(&self, keyword: &str) -> Option<&OpenAttribute> {
        self.attributes.iter().find(|a| a.keyword == keyword)
    }

    pub fn by_keyword_mut(&mut self, keyword: &str) -> Option<&mut OpenAttribute> {
        self.attributes.iter_mut().find(|a| a.keyword == keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenAttribute> {
        self.attributes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OpenAttribute> {
        self.attributes.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

fn unknown(id: AttributeId) -> ExecutorError {
    ExecutorError::execution_failed(Stage::Join, format!("unknown open attribute id {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::KeySpec;

    #[test]
    fn test_ids_ascend_in_registration_order() {
        let mut registry = AttributeRegistry::new();
        let gdp = registry.insert(OpenAttribute::new("gdp", "gdp", KeySpec::exact(["n"])));
        let pop = registry.insert(OpenAttribute::new("population", "pop", KeySpec::exact(["n"])));

        assert_eq!(gdp, AttributeId(0));
        assert_eq!(pop, AttributeId(1));
        assert!(gdp < pop);
        assert_eq!(registry.get(pop).unwrap().keyword, "population");
        assert_eq!(registry.get(pop).unwrap().id(), pop);
        assert_eq!(registry.by_keyword("gdp").unwrap().id(), gdp);
    }

    #[test]
    fn test_unknown_id_is_error() {
        let registry = AttributeRegistry::new();
        assert!(registry.lookup(AttributeId(7)).is_err());
    }
}
