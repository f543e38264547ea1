//! Caching decorator for re-scanned inner sides.

use super::{materialize, Operator, SharedIterator, TupleIterator};
use crate::compiler::CompositeHash;
use crate::context::{ExecutionContext, NodeId};
use braid_core::{Result, Tuple};
use std::rc::Rc;
use tracing::trace;

/// Memoizes the tuples of its input per distinct key.
///
/// The key is evaluated against the outer tuple in scope when the operator
/// opens; an empty key caches the input once. Entries live in the statement
/// context, so they are dropped when the statement ends. A failed
/// materialization caches nothing.
pub struct CachingOperator {
    id: NodeId,
    input: Rc<dyn Operator>,
    key: CompositeHash,
}

impl CachingOperator {
    pub fn new(id: NodeId, input: Rc<dyn Operator>, key: CompositeHash) -> Self {
        Self { id, input, key }
    }
}

impl Operator for CachingOperator {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let outer = ctx.statement.outer().cloned().unwrap_or_default();
        let key = self.key.key(&outer, ctx)?;
        ctx.statement.node_mut(self.id).executions += 1;

        if let Some(tuples) = ctx.statement.cached(self.id, &key) {
            ctx.statement.node_mut(self.id).cache_hits += 1;
            trace!(node = self.id, hash = key.hash_code(), rows = tuples.len(), "cache hit");
            return Ok(Box::new(SharedIterator::new(tuples)));
        }

        trace!(node = self.id, hash = key.hash_code(), "cache miss");
        let tuples: Rc<[Tuple]> = materialize(self.input.open(ctx)?, ctx)?.into();
        ctx.statement.store(self.id, key, tuples.clone());
        Ok(Box::new(SharedIterator::new(tuples)))
    }

    fn describe(&self) -> String {
        if self.key.is_empty() {
            "Cache (once)".to_string()
        } else {
            format!("Cache [{}]", self.key.describe())
        }
    }

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        vec![self.input.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompiledScalar;
    use crate::executor::operator::testing::*;
    use braid_core::{DataType, Value};
    use proptest::prelude::*;

    fn outer_key() -> CompositeHash {
        CompositeHash::new(vec![CompiledScalar::new("o.v", DataType::Int32, |t, _| {
            Ok(t.value(1, "v").cloned().unwrap_or(Value::Null))
        })])
    }

    #[test]
    fn test_cache_once() {
        let input = Rc::new(FixedOperator::new(1, tuples(3, 2, &[1, 2])));
        let op = CachingOperator::new(2, input.clone(), CompositeHash::new(vec![]));
        let mut ctx = ctx();
        for _ in 0..3 {
            assert_eq!(drain(&op, &mut ctx).unwrap().len(), 2);
        }
        assert_eq!(input.opens.get(), 1);
        assert_eq!(ctx.statement.node(2).map(|n| n.cache_hits), Some(2));

        ctx.begin_statement();
        drain(&op, &mut ctx).unwrap();
        assert_eq!(input.opens.get(), 2);
    }

    #[test]
    fn test_failed_input_not_cached() {
        let mut input = FixedOperator::new(1, tuples(3, 2, &[1]));
        input.fail_close = true;
        let input = Rc::new(input);
        let op = CachingOperator::new(2, input.clone(), CompositeHash::new(vec![]));
        let mut ctx = ctx();
        assert!(drain(&op, &mut ctx).is_err());
        assert!(drain(&op, &mut ctx).is_err());
        assert_eq!(input.opens.get(), 2);
    }

    proptest! {
        #[test]
        fn prop_input_opened_once_per_distinct_key(keys in prop::collection::vec(0i32..6, 1..40)) {
            let input = Rc::new(FixedOperator::new(1, tuples(3, 2, &[7])));
            let op = CachingOperator::new(2, input.clone(), outer_key());
            let mut ctx = ctx();
            for key in tuples(3, 1, &keys) {
                ctx.statement.push_outer(&key);
                let rows = drain(&op, &mut ctx).unwrap();
                ctx.statement.pop_outer();
                prop_assert_eq!(rows.len(), 1);
            }
            let mut distinct = keys.clone();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(input.opens.get(), distinct.len());
            prop_assert_eq!(input.closes.get(), distinct.len());
        }
    }
}
