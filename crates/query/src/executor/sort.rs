//! Sort operator.

use super::{materialize, Operator, SharedIterator, TupleIterator};
use crate::compiler::{sort_tuples, CompiledSortItem};
use crate::context::{ExecutionContext, NodeId};
use braid_core::Result;
use std::rc::Rc;

/// Materializes its input and emits it ordered by the sort items.
///
/// The sort is stable, so ties keep input order.
pub struct SortOperator {
    id: NodeId,
    input: Rc<dyn Operator>,
    items: Vec<CompiledSortItem>,
}

impl SortOperator {
    pub fn new(id: NodeId, input: Rc<dyn Operator>, items: Vec<CompiledSortItem>) -> Self {
        Self { id, input, items }
    }
}

impl Operator for SortOperator {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let tuples = materialize(self.input.open(ctx)?, ctx)?;
        let sorted = sort_tuples(&self.items, tuples, ctx)?;
        Ok(SharedIterator::boxed(sorted))
    }

    fn describe(&self) -> String {
        let keys: Vec<String> = self
            .items
            .iter()
            .map(|i| format!("{} {:?}", i.key.text(), i.order).to_uppercase())
            .collect();
        format!("Sort {}", keys.join(", "))
    }

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        vec![self.input.clone()]
    }
}
