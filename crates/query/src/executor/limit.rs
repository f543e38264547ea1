//! TOP operator.

use super::{Operator, TupleIterator};
use crate::compiler::CompiledScalar;
use crate::context::{ExecutionContext, NodeId};
use braid_core::{Error, Result, Tuple, Value};
use std::rc::Rc;

/// Stops after `count` tuples. The count is evaluated once per open; null
/// means no limit.
pub struct TopOperator {
    id: NodeId,
    input: Rc<dyn Operator>,
    count: CompiledScalar,
}

impl TopOperator {
    pub fn new(id: NodeId, input: Rc<dyn Operator>, count: CompiledScalar) -> Self {
        Self { id, input, count }
    }
}

struct TopIterator {
    input: Box<dyn TupleIterator>,
    remaining: Option<usize>,
}

impl TupleIterator for TopIterator {
    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        match &mut self.remaining {
            Some(0) => Ok(None),
            Some(n) => {
                let tuple = self.input.next(ctx)?;
                if tuple.is_some() {
                    *n -= 1;
                }
                Ok(tuple)
            }
            None => self.input.next(ctx),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

impl Operator for TopOperator {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let remaining = match self.count.evaluate(&Tuple::default(), ctx)? {
            Value::Null => None,
            v => Some(
                v.as_i64()
                    .ok_or_else(|| Error::type_mismatch(self.count.text(), "TOP expects an integer"))?
                    .max(0) as usize,
            ),
        };
        Ok(Box::new(TopIterator {
            input: self.input.open(ctx)?,
            remaining,
        }))
    }

    fn describe(&self) -> String {
        format!("Top {}", self.count.text())
    }

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        vec![self.input.clone()]
    }
}
