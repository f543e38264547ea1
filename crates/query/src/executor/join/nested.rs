//! Nested-loop join.

use super::{with_outer, JoinCore};
use crate::compiler::HashKey;
use crate::context::{ExecutionContext, NodeId};
use crate::executor::{close_all, finish, Operator, TupleIterator};
use braid_core::{Result, Tuple};
use std::rc::Rc;

/// Reopens the inner side for every outer tuple.
///
/// When the inner side is correlated the outer tuple is in scope for every
/// inner open and pull. Wrap the inner side in a caching operator to avoid
/// repeated scans.
pub struct NestedLoopJoin {
    id: NodeId,
    outer: Rc<dyn Operator>,
    inner: Rc<dyn Operator>,
    core: Rc<JoinCore>,
}

impl NestedLoopJoin {
    pub fn new(id: NodeId, outer: Rc<dyn Operator>, inner: Rc<dyn Operator>, core: JoinCore) -> Self {
        Self {
            id,
            outer,
            inner,
            core: Rc::new(core),
        }
    }
}

struct Current {
    tuple: Tuple,
    key: Option<HashKey>,
    inner: Box<dyn TupleIterator>,
    matched: bool,
}

struct NestedLoopIterator {
    outer: Box<dyn TupleIterator>,
    inner_op: Rc<dyn Operator>,
    core: Rc<JoinCore>,
    current: Option<Current>,
}

impl NestedLoopIterator {
    fn scope<'a>(&self, tuple: &'a Tuple) -> Option<&'a Tuple> {
        self.core.correlated.then_some(tuple)
    }

    /// Collects every matching inner tuple for a populating join.
    fn members(&self, outer: &Tuple, key: Option<&HashKey>, ctx: &mut ExecutionContext) -> Result<Vec<Tuple>> {
        let scope = self.scope(outer);
        let mut inner = with_outer(ctx, scope, |ctx| self.inner_op.open(ctx))?;
        let mut members = Vec::new();
        let drained = loop {
            match with_outer(ctx, scope, |ctx| inner.next(ctx)) {
                Ok(Some(candidate)) => match self.core.accept(key, outer, &candidate, ctx) {
                    Ok(Some(_)) => members.push(candidate),
                    Ok(None) => {}
                    Err(e) => break Err(e),
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        finish(drained, inner.close()).map(|_| members)
    }
}

impl TupleIterator for NestedLoopIterator {
    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        loop {
            let Some(current) = self.current.as_mut() else {
                let Some(tuple) = self.outer.next(ctx)? else {
                    return Ok(None);
                };
                let key = self.core.outer_key(&tuple, ctx)?;
                let can_match = !key.as_ref().is_some_and(HashKey::has_null);

                if self.core.populate {
                    let members = if can_match {
                        self.members(&tuple, key.as_ref(), ctx)?
                    } else {
                        Vec::new()
                    };
                    if members.is_empty() && !self.core.outer_join {
                        continue;
                    }
                    return Ok(Some(self.core.populated(&tuple, members)));
                }
                if !can_match {
                    if self.core.outer_join {
                        return Ok(Some(tuple));
                    }
                    continue;
                }

                let scope = self.scope(&tuple);
                let inner_op = &self.inner_op;
                let inner = with_outer(ctx, scope, |ctx| inner_op.open(ctx))?;
                self.current = Some(Current {
                    tuple,
                    key,
                    inner,
                    matched: false,
                });
                continue;
            };

            let scope = self.core.correlated.then_some(&current.tuple);
            let inner = &mut current.inner;
            match with_outer(ctx, scope, |ctx| inner.next(ctx))? {
                Some(candidate) => {
                    if let Some(joined) = self.core.accept(current.key.as_ref(), &current.tuple, &candidate, ctx)? {
                        current.matched = true;
                        return Ok(Some(joined));
                    }
                }
                None => {
                    if let Some(mut done) = self.current.take() {
                        done.inner.close()?;
                        if !done.matched && self.core.outer_join {
                            return Ok(Some(done.tuple));
                        }
                    }
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let mut iterators = vec![&mut self.outer];
        if let Some(current) = self.current.as_mut() {
            iterators.push(&mut current.inner);
        }
        let result = close_all(iterators);
        self.current = None;
        result
    }
}

impl Operator for NestedLoopJoin {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        Ok(Box::new(NestedLoopIterator {
            outer: self.outer.open(ctx)?,
            inner_op: self.inner.clone(),
            core: self.core.clone(),
            current: None,
        }))
    }

    fn describe(&self) -> String {
        self.core.describe("NestedLoopJoin")
    }

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        vec![self.outer.clone(), self.inner.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompiledPredicate, CompiledScalar, CompositeHash};
    use crate::executor::join::JoinKeys;
    use crate::executor::operator::testing::*;
    use braid_core::{DataType, Error, Value};

    fn column(alias: usize) -> CompiledScalar {
        CompiledScalar::new(format!("{}.v", alias), DataType::Int32, move |t, _| {
            Ok(t.value(alias, "v").cloned().unwrap_or(Value::Null))
        })
    }

    fn keyed(core: &mut JoinCore) {
        core.keys = Some(JoinKeys {
            outer: CompositeHash::new(vec![column(1)]),
            inner: CompositeHash::new(vec![column(2)]),
        });
    }

    fn pairs(rows: &[Tuple]) -> Vec<(Option<Value>, Option<Value>)> {
        rows.iter()
            .map(|t| (t.value(1, "v").cloned(), t.value(2, "v").cloned()))
            .collect()
    }

    #[test]
    fn test_inner_join_with_keys() {
        let outer = Rc::new(FixedOperator::new(1, tuples(3, 1, &[1, 2, 3])));
        let inner = Rc::new(FixedOperator::new(2, tuples(3, 2, &[2, 3, 3, 4])));
        let mut core = JoinCore::new(2);
        keyed(&mut core);
        let join = NestedLoopJoin::new(3, outer.clone(), inner.clone(), core);
        let mut ctx = ctx();
        let rows = drain(&join, &mut ctx).unwrap();
        assert_eq!(
            pairs(&rows),
            vec![
                (Some(Value::Int32(2)), Some(Value::Int32(2))),
                (Some(Value::Int32(3)), Some(Value::Int32(3))),
                (Some(Value::Int32(3)), Some(Value::Int32(3))),
            ]
        );
        assert_eq!(inner.opens.get(), 3);
        assert_eq!(inner.closes.get(), 3);
        assert_eq!(outer.closes.get(), 1);
    }

    #[test]
    fn test_left_join_keeps_unmatched() {
        let outer = Rc::new(FixedOperator::new(1, tuples(3, 1, &[1, 2])));
        let inner = Rc::new(FixedOperator::new(2, tuples(3, 2, &[2])));
        let mut core = JoinCore::new(2);
        core.outer_join = true;
        keyed(&mut core);
        let join = NestedLoopJoin::new(3, outer, inner, core);
        let rows = drain(&join, &mut ctx()).unwrap();
        assert_eq!(
            pairs(&rows),
            vec![(Some(Value::Int32(1)), None), (Some(Value::Int32(2)), Some(Value::Int32(2)))]
        );
    }

    #[test]
    fn test_residual_condition() {
        let outer = Rc::new(FixedOperator::new(1, tuples(3, 1, &[1, 5])));
        let inner = Rc::new(FixedOperator::new(2, tuples(3, 2, &[2, 6])));
        let mut core = JoinCore::new(2);
        let (o, i) = (column(1), column(2));
        core.condition = Some(CompiledPredicate::new(CompiledScalar::new(
            "1.v < 2.v",
            DataType::Boolean,
            move |t, ctx| Ok(Value::Boolean(o.evaluate(t, ctx)? < i.evaluate(t, ctx)?)),
        )));
        let join = NestedLoopJoin::new(3, outer, inner, core);
        assert_eq!(drain(&join, &mut ctx()).unwrap().len(), 3);
    }

    #[test]
    fn test_populate_groups_matches() {
        let outer = Rc::new(FixedOperator::new(1, tuples(3, 1, &[1, 2, 3])));
        let inner = Rc::new(FixedOperator::new(2, tuples(3, 2, &[1, 1, 3])));
        let mut core = JoinCore::new(2);
        core.populate = true;
        keyed(&mut core);
        let join = NestedLoopJoin::new(3, outer, inner, core);
        let rows = drain(&join, &mut ctx()).unwrap();
        let sizes: Vec<_> = rows.iter().map(|t| t.populated(2).map_or(0, |m| m.len())).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    /// Yields one row at slot 2 copying `v` from the outer tuple in scope.
    struct EchoOuter;

    impl Operator for EchoOuter {
        fn node_id(&self) -> NodeId {
            2
        }

        fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
            let v = ctx.statement.outer().and_then(|o| o.value(1, "v")).and_then(|v| v.as_i64());
            let rows = v.map(|v| tuples(3, 2, &[v as i32 * 10])).unwrap_or_default();
            Ok(crate::executor::SharedIterator::boxed(rows))
        }

        fn describe(&self) -> String {
            "EchoOuter".to_string()
        }
    }

    #[test]
    fn test_correlated_inner_sees_outer() {
        let outer = Rc::new(FixedOperator::new(1, tuples(3, 1, &[1, 2])));
        let mut core = JoinCore::new(2);
        core.correlated = true;
        let join = NestedLoopJoin::new(3, outer, Rc::new(EchoOuter), core);
        let mut ctx = ctx();
        let rows = drain(&join, &mut ctx).unwrap();
        assert_eq!(
            pairs(&rows),
            vec![
                (Some(Value::Int32(1)), Some(Value::Int32(10))),
                (Some(Value::Int32(2)), Some(Value::Int32(20))),
            ]
        );
        assert!(ctx.statement.outer().is_none());
    }

    #[test]
    fn test_close_reports_inner_failure() {
        let outer = Rc::new(FixedOperator::new(1, tuples(3, 1, &[1, 2])));
        let mut inner = FixedOperator::new(2, tuples(3, 2, &[1, 2]));
        inner.fail_close = true;
        let inner = Rc::new(inner);
        let join = NestedLoopJoin::new(3, outer.clone(), inner.clone(), JoinCore::new(2));
        let mut ctx = ctx();
        let mut iter = join.open(&mut ctx).unwrap();
        assert!(iter.next(&mut ctx).unwrap().is_some());
        let err = iter.close().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation { .. }));
        assert_eq!(outer.closes.get(), 1);
        assert_eq!(inner.closes.get(), 1);
    }
}
