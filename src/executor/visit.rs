//! Generic traversal over pipelines
//!
//! Works only through `children`/`attribute_binding`; never matches on
//! concrete operator types.

use std::collections::BTreeSet;

use crate::attribute::{AttributeId, AttributeRegistry, Strategy};

use super::context::ExecutionContext;
use super::node::{AttributeBinding, BindingRole, PlanNode};

/// Visit every node, parents before children
pub fn walk<'a>(node: &'a dyn PlanNode, f: &mut dyn FnMut(&'a dyn PlanNode)) {
    f(node);
    for child in node.children() {
        walk(child, f);
    }
}

/// True if `node` or anything below it reacts to `changed`
pub fn is_affected(node: &dyn PlanNode, changed: &BTreeSet<AttributeId>, ctx: &ExecutionContext) -> bool {
    node.reacts_to(changed, ctx) || node.children().into_iter().any(|c| is_affected(c, changed, ctx))
}

/// Attributes bound anywhere in the pipeline
pub fn collect_attributes(node: &dyn PlanNode) -> BTreeSet<AttributeId> {
    bindings(node).into_iter().map(|b| b.attribute).collect()
}

/// Every attribute binding, in pre-order
pub fn bindings(node: &dyn PlanNode) -> Vec<AttributeBinding> {
    let mut out = Vec::new();
    walk(node, &mut |n| {
        if let Some(binding) = n.attribute_binding() {
            out.push(binding);
        }
    });
    out
}

/// The join operator for `attribute`, if the pipeline has one
pub fn find_join(node: &dyn PlanNode, attribute: AttributeId) -> Option<&dyn PlanNode> {
    let target = AttributeBinding {
        attribute,
        role: BindingRole::Join,
    };
    let mut found = None;
    walk(node, &mut |n| {
        if found.is_none() && n.attribute_binding() == Some(target) {
            found = Some(n);
        }
    });
    found
}

/// Columns reaching the join operator for `attribute`
pub fn join_input_columns(node: &dyn PlanNode, attribute: AttributeId) -> Option<Vec<String>> {
    find_join(node, attribute).map(|join| {
        join.children()
            .into_iter()
            .flat_map(|c| c.output_columns())
            .collect()
    })
}

/// Attributes with a join operator in the pipeline
pub fn joined_attributes(node: &dyn PlanNode) -> BTreeSet<AttributeId> {
    bindings(node)
        .into_iter()
        .filter(|b| b.role == BindingRole::Join)
        .map(|b| b.attribute)
        .collect()
}

/// Joined attributes that still produce tokens but have no expansion
/// stage above their join
pub fn unexpanded_joins(node: &dyn PlanNode, attributes: &AttributeRegistry) -> Vec<AttributeId> {
    let mut expanded = BTreeSet::new();
    walk(node, &mut |n| {
        if let Some(binding) = n.attribute_binding() {
            if binding.role == BindingRole::Expansion && find_join(n, binding.attribute).is_some() {
                expanded.insert(binding.attribute);
            }
        }
    });
    joined_attributes(node)
        .into_iter()
        .filter(|id| !expanded.contains(id))
        .filter(|id| attributes.get(*id).map_or(false, |a| a.strategy != Strategy::Direct))
        .collect()
}

/// Cost of the subtree rooted at `node`
pub fn subtree_cost(node: &dyn PlanNode) -> f64 {
    node.own_cost() + node.children().into_iter().map(subtree_cost).sum::<f64>()
}

/// Indented operator tree, one line per node
pub fn render_tree(node: &dyn PlanNode) -> Vec<String> {
    fn go(node: &dyn PlanNode, depth: usize, out: &mut Vec<String>) {
        out.push(format!("{}{}", "  ".repeat(depth), node.describe()));
        for child in node.children() {
            go(child, depth + 1, out);
        }
    }
    let mut out = Vec::new();
    go(node, 0, &mut out);
    out
}
