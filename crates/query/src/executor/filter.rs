//! Filter operator.

use super::{Operator, TupleIterator};
use crate::compiler::CompiledPredicate;
use crate::context::{ExecutionContext, NodeId};
use braid_core::{Result, Tuple};
use std::rc::Rc;

/// Passes through tuples for which every predicate is true.
pub struct FilterOperator {
    id: NodeId,
    input: Rc<dyn Operator>,
    predicates: Rc<[CompiledPredicate]>,
}

impl FilterOperator {
    pub fn new(id: NodeId, input: Rc<dyn Operator>, predicates: Vec<CompiledPredicate>) -> Self {
        Self {
            id,
            input,
            predicates: predicates.into(),
        }
    }
}

struct FilterIterator {
    input: Box<dyn TupleIterator>,
    predicates: Rc<[CompiledPredicate]>,
}

impl TupleIterator for FilterIterator {
    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        'input: while let Some(tuple) = self.input.next(ctx)? {
            for predicate in self.predicates.iter() {
                if !predicate.test(&tuple, ctx)? {
                    continue 'input;
                }
            }
            return Ok(Some(tuple));
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }
}

impl Operator for FilterOperator {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        Ok(Box::new(FilterIterator {
            input: self.input.open(ctx)?,
            predicates: self.predicates.clone(),
        }))
    }

    fn describe(&self) -> String {
        let predicates: Vec<&str> = self.predicates.iter().map(|p| p.text()).collect();
        format!("Filter {}", predicates.join(" AND "))
    }

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        vec![self.input.clone()]
    }
}
