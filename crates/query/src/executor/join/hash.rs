//! Hash join.

use super::JoinCore;
use crate::compiler::HashKey;
use crate::context::{ExecutionContext, NodeId};
use crate::executor::{materialize, Operator, TupleIterator};
use braid_core::{Error, Result, Tuple};
use hashbrown::HashMap;
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

/// Builds a hash table over the inner side once per open, then probes it
/// with each outer tuple.
///
/// Only valid when the join has an equality check and the inner side does
/// not read the outer tuple. Inner tuples with a null key are dropped from
/// the table since they can never match.
pub struct HashJoin {
    id: NodeId,
    outer: Rc<dyn Operator>,
    inner: Rc<dyn Operator>,
    core: Rc<JoinCore>,
}

impl HashJoin {
    pub fn new(id: NodeId, outer: Rc<dyn Operator>, inner: Rc<dyn Operator>, core: JoinCore) -> Result<Self> {
        if core.keys.is_none() || core.correlated {
            return Err(Error::invalid_operation(
                "hash join needs equality keys and an uncorrelated inner side",
            ));
        }
        Ok(Self {
            id,
            outer,
            inner,
            core: Rc::new(core),
        })
    }

    fn build(&self, ctx: &mut ExecutionContext) -> Result<HashMap<HashKey, Vec<Tuple>>> {
        let mut table: HashMap<HashKey, Vec<Tuple>> = HashMap::new();
        let Some(keys) = &self.core.keys else {
            return Ok(table);
        };
        for tuple in materialize(self.inner.open(ctx)?, ctx)? {
            let key = keys.inner.key(&tuple, ctx)?;
            if !key.has_null() {
                table.entry(key).or_default().push(tuple);
            }
        }
        trace!(node = self.id, buckets = table.len(), "hash table built");
        Ok(table)
    }
}

struct HashJoinIterator {
    outer: Box<dyn TupleIterator>,
    table: HashMap<HashKey, Vec<Tuple>>,
    core: Rc<JoinCore>,
    pending: VecDeque<Tuple>,
}

impl HashJoinIterator {
    fn probe(&mut self, outer: Tuple, ctx: &mut ExecutionContext) -> Result<()> {
        let key = self.core.outer_key(&outer, ctx)?;
        let candidates = key
            .as_ref()
            .filter(|k| !k.has_null())
            .and_then(|k| self.table.get(k))
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut matches = Vec::new();
        for candidate in candidates {
            // the bucket already guarantees key equality
            if let Some(joined) = self.core.accept(None, &outer, candidate, ctx)? {
                matches.push(if self.core.populate { candidate.clone() } else { joined });
            }
        }

        if self.core.populate {
            if !matches.is_empty() || self.core.outer_join {
                self.pending.push_back(self.core.populated(&outer, matches));
            }
        } else if matches.is_empty() {
            if self.core.outer_join {
                self.pending.push_back(outer);
            }
        } else {
            self.pending.extend(matches);
        }
        Ok(())
    }
}

impl TupleIterator for HashJoinIterator {
    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        loop {
            if let Some(tuple) = self.pending.pop_front() {
                return Ok(Some(tuple));
            }
            match self.outer.next(ctx)? {
                Some(outer) => self.probe(outer, ctx)?,
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.pending.clear();
        self.outer.close()
    }
}

impl Operator for HashJoin {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let table = self.build(ctx)?;
        Ok(Box::new(HashJoinIterator {
            outer: self.outer.open(ctx)?,
            table,
            core: self.core.clone(),
            pending: VecDeque::new(),
        }))
    }

    fn describe(&self) -> String {
        self.core.describe("HashJoin")
    }

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        vec![self.outer.clone(), self.inner.clone()]
    }
}
