//! Table source operators.

use super::{Operator, SharedIterator, TupleIterator};
use crate::alias::{AliasId, TableAliasTree};
use crate::context::{ExecutionContext, NodeId};
use braid_core::{Result, Tuple};
use std::rc::Rc;
use tracing::trace;

/// Wraps the operator a catalog built for one table source.
///
/// Counts opens and rows per node and writes the columns of the first row
/// back to the alias tree.
pub struct TableSourceOperator {
    inner: Rc<dyn Operator>,
    tree: Rc<TableAliasTree>,
    alias: AliasId,
}

impl TableSourceOperator {
    pub fn new(inner: Rc<dyn Operator>, tree: Rc<TableAliasTree>, alias: AliasId) -> Self {
        Self { inner, tree, alias }
    }
}

struct TableSourceIterator {
    inner: Box<dyn TupleIterator>,
    tree: Rc<TableAliasTree>,
    alias: AliasId,
    node: NodeId,
    discovered: bool,
}

impl TupleIterator for TableSourceIterator {
    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        let tuple = self.inner.next(ctx)?;
        if let Some(tuple) = &tuple {
            if !self.discovered {
                self.discovered = true;
                if let Some(row) = tuple.row(self.alias) {
                    self.tree.set_discovered(self.alias, row.columns().clone());
                }
            }
            ctx.statement.node_mut(self.node).rows += 1;
        }
        Ok(tuple)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl Operator for TableSourceOperator {
    fn node_id(&self) -> NodeId {
        self.inner.node_id()
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let node = self.node_id();
        let data = ctx.statement.node_mut(node);
        data.executions += 1;
        trace!(node, alias = self.tree.get(self.alias).name(), executions = data.executions, "open table source");
        let inner = self.inner.open(ctx)?;
        Ok(Box::new(TableSourceIterator {
            inner,
            tree: self.tree.clone(),
            alias: self.alias,
            node,
            discovered: self.tree.get(self.alias).discovered_columns().is_some(),
        }))
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        self.inner.children()
    }
}

/// Produces one empty tuple, for SELECT without FROM.
pub struct SingleRowOperator {
    id: NodeId,
    width: usize,
}

impl SingleRowOperator {
    pub fn new(id: NodeId, width: usize) -> Self {
        Self { id, width }
    }
}

impl Operator for SingleRowOperator {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, _ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        Ok(SharedIterator::boxed(vec![Tuple::new(self.width)]))
    }

    fn describe(&self) -> String {
        "SingleRow".to_string()
    }
}
