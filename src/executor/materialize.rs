//! Rewind buffer
//!
//! Stores its input so a later pass can be replayed. A node placed only
//! to make an attribute's rewinds cheap becomes transparent once that
//! attribute runs direct.

use crate::attribute::{AttributeId, Strategy};
use crate::observability::{log_event_with_fields, Event};

use super::context::ExecutionContext;
use super::errors::ExecutorResult;
use super::node::{AttributeBinding, BindingRole, PlanNode, RescanSignal};
use super::row::Row;
use super::visit::is_affected;

pub struct Materialize {
    child: Box<dyn PlanNode>,
    rewind_for: Option<AttributeId>,
    buffer: Vec<Row>,
    complete: bool,
    position: usize,
    elided: bool,
}

impl Materialize {
    pub fn new(child: Box<dyn PlanNode>) -> Self {
        Self {
            child,
            rewind_for: None,
            buffer: Vec::new(),
            complete: false,
            position: 0,
            elided: false,
        }
    }

    /// Tie the node to the attribute whose rewinds it serves
    pub fn rewind_for(mut self, attribute: AttributeId) -> Self {
        self.rewind_for = Some(attribute);
        self
    }

    /// True if the attribute this node serves runs direct
    fn transparent(&mut self, ctx: &ExecutionContext) -> bool {
        let attribute = match self.rewind_for {
            Some(attribute) => attribute,
            None => return false,
        };
        let attr = match ctx.attributes.get(attribute) {
            Some(attr) => attr,
            None => return false,
        };
        if attr.strategy != Strategy::Direct {
            return false;
        }
        if !self.elided {
            self.elided = true;
            self.buffer.clear();
            self.complete = false;
            self.position = 0;
            let attribute = attribute.to_string();
            log_event_with_fields(
                Event::MaterializeElided,
                &[
                    ("query_id", ctx.query_id()),
                    ("attribute", attribute.as_str()),
                    ("keyword", attr.keyword.as_str()),
                ],
            );
        }
        true
    }
}

impl PlanNode for Materialize {
    fn describe(&self) -> String {
        match self.rewind_for {
            Some(id) if self.elided => format!("Materialize(rewind for {}, elided)", id),
            Some(id) => format!("Materialize(rewind for {})", id),
            None => "Materialize".to_string(),
        }
    }

    fn output_columns(&self) -> Vec<String> {
        self.child.output_columns()
    }

    fn children(&self) -> Vec<&dyn PlanNode> {
        vec![self.child.as_ref()]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn PlanNode> {
        let child: &mut dyn PlanNode = self.child.as_mut();
        vec![child]
    }

    fn attribute_binding(&self) -> Option<AttributeBinding> {
        self.rewind_for.map(|attribute| AttributeBinding {
            attribute,
            role: BindingRole::Rewind,
        })
    }

    fn own_cost(&self) -> f64 {
        0.0
    }

    fn open(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        self.buffer.clear();
        self.complete = false;
        self.position = 0;
        self.child.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> ExecutorResult<Option<Row>> {
        if self.transparent(ctx) {
            return self.child.next(ctx);
        }
        if self.position < self.buffer.len() {
            let row = self.buffer[self.position].clone();
            self.position += 1;
            ctx.metrics.increment_rows_replayed();
            return Ok(Some(row));
        }
        if self.complete {
            return Ok(None);
        }
        match self.child.next(ctx)? {
            Some(row) => {
                self.buffer.push(row.clone());
                self.position = self.buffer.len();
                Ok(Some(row))
            }
            None => {
                self.complete = true;
                Ok(None)
            }
        }
    }

    fn rescan(&mut self, signal: &RescanSignal, ctx: &mut ExecutionContext) -> ExecutorResult<()> {
        let recompute = self.transparent(ctx)
            || match signal {
                RescanSignal::FullReset => true,
                RescanSignal::TargetedReset(changed) => {
                    !self.complete || is_affected(self.child.as_ref(), changed, ctx)
                }
            };
        if recompute {
            self.buffer.clear();
            self.complete = false;
            self.position = 0;
            self.child.rescan(signal, ctx)
        } else {
            self.position = 0;
            Ok(())
        }
    }

    fn close(&mut self) {
        self.buffer.clear();
        self.complete = false;
        self.position = 0;
        self.child.close();
    }
}
