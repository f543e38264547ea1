//! GROUP BY operator.

use super::{materialize, Operator, SharedIterator, TupleIterator};
use crate::compiler::{CompositeHash, HashKey};
use crate::context::{ExecutionContext, NodeId};
use braid_core::{Result, Tuple};
use hashbrown::HashMap;
use std::rc::Rc;

/// Groups its input by a composite key.
///
/// Emits one grouped tuple per distinct key, in order of first appearance.
/// Null keys group together. With no keys the whole input forms one group,
/// and an empty input produces nothing.
pub struct GroupOperator {
    id: NodeId,
    input: Rc<dyn Operator>,
    keys: CompositeHash,
    width: usize,
}

impl GroupOperator {
    pub fn new(id: NodeId, input: Rc<dyn Operator>, keys: CompositeHash, width: usize) -> Self {
        Self { id, input, keys, width }
    }
}

impl Operator for GroupOperator {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let tuples = materialize(self.input.open(ctx)?, ctx)?;
        let mut slots: HashMap<HashKey, usize> = HashMap::new();
        let mut groups: Vec<Vec<Tuple>> = Vec::new();
        for tuple in tuples {
            let key = self.keys.key(&tuple, ctx)?;
            let slot = *slots.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(tuple);
        }
        let grouped = groups
            .into_iter()
            .map(|members| Tuple::grouped(self.width, members))
            .collect();
        Ok(SharedIterator::boxed(grouped))
    }

    fn describe(&self) -> String {
        format!("Group [{}]", self.keys.describe())
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

    #[test]
    fn test_groups_in_first_seen_order() {
        let input = Rc::new(FixedOperator::new(1, tuples(2, 1, &[3, 1, 3, 2, 1, 3])));
        let key = CompiledScalar::new("v", DataType::Int32, |t, _| Ok(t.value(1, "v").cloned().unwrap_or(Value::Null)));
        let op = GroupOperator::new(2, input, CompositeHash::new(vec![key]), 2);
        let mut ctx = ctx();
        let groups = drain(&op, &mut ctx).unwrap();
        let summary: Vec<(Option<Value>, usize)> = groups
            .iter()
            .map(|g| (g.value(1, "v").cloned(), g.group().map_or(0, |m| m.len())))
            .collect();
        assert_eq!(
            summary,
            vec![
                (Some(Value::Int32(3)), 3),
                (Some(Value::Int32(1)), 2),
                (Some(Value::Int32(2)), 1)
            ]
        );
    }

    #[test]
    fn test_no_keys_single_group() {
        let mut ctx = ctx();
        let input = Rc::new(FixedOperator::new(1, tuples(2, 1, &[1, 2])));
        let op = GroupOperator::new(2, input, CompositeHash::new(vec![]), 2);
        assert_eq!(drain(&op, &mut ctx).unwrap().len(), 1);
        let empty = Rc::new(FixedOperator::new(3, vec![]));
        let op = GroupOperator::new(4, empty, CompositeHash::new(vec![]), 2);
        assert!(drain(&op, &mut ctx).unwrap().is_empty());
    }
}
