//! JOIN and APPLY operators.
//!
//! Both strategies share [`JoinCore`]: the inner alias, whether unmatched
//! outer tuples survive, whether matches are grouped under the outer tuple
//! (populating joins), the equality check and the residual condition.

mod hash;
mod nested;

pub use hash::HashJoin;
pub use nested::NestedLoopJoin;

use crate::alias::AliasId;
use crate::compiler::{CompiledPredicate, CompositeHash, HashKey};
use crate::context::ExecutionContext;
use braid_core::{Result, Slot, Tuple};

/// Equality check of a join: outer key expressions paired with inner key
/// expressions, in the same order.
#[derive(Clone)]
pub struct JoinKeys {
    pub outer: CompositeHash,
    pub inner: CompositeHash,
}

/// Join configuration shared by every strategy.
#[derive(Clone)]
pub struct JoinCore {
    /// Slot the inner side writes to.
    pub inner_alias: AliasId,
    /// Keep outer tuples without a match (LEFT JOIN, OUTER APPLY).
    pub outer_join: bool,
    /// Group the matches under the outer tuple instead of emitting one
    /// tuple per pair.
    pub populate: bool,
    /// The inner side reads the outer tuple, so it must see it in scope.
    pub correlated: bool,
    pub keys: Option<JoinKeys>,
    pub condition: Option<CompiledPredicate>,
}

impl JoinCore {
    pub fn new(inner_alias: AliasId) -> Self {
        Self {
            inner_alias,
            outer_join: false,
            populate: false,
            correlated: false,
            keys: None,
            condition: None,
        }
    }

    /// Key of the outer tuple. `Ok(None)` when the join has no equality
    /// check; a key holding a null can never match.
    pub(crate) fn outer_key(&self, outer: &Tuple, ctx: &mut ExecutionContext) -> Result<Option<HashKey>> {
        match &self.keys {
            Some(keys) => keys.outer.key(outer, ctx).map(Some),
            None => Ok(None),
        }
    }

    /// Tests one pair and returns the joined tuple when it matches.
    pub(crate) fn accept(
        &self,
        outer_key: Option<&HashKey>,
        outer: &Tuple,
        inner: &Tuple,
        ctx: &mut ExecutionContext,
    ) -> Result<Option<Tuple>> {
        if let (Some(keys), Some(outer_key)) = (&self.keys, outer_key) {
            let inner_key = keys.inner.key(inner, ctx)?;
            if inner_key.has_null() || inner_key != *outer_key {
                return Ok(None);
            }
        }
        let joined = outer.merge(inner);
        if let Some(condition) = &self.condition {
            if !condition.test(&joined, ctx)? {
                return Ok(None);
            }
        }
        Ok(Some(joined))
    }

    /// The outer tuple with `members` grouped at the inner alias.
    pub(crate) fn populated(&self, outer: &Tuple, members: Vec<Tuple>) -> Tuple {
        let mut tuple = outer.clone();
        tuple.set_slot(self.inner_alias, Slot::Populated(members.into()));
        tuple
    }

    pub(crate) fn describe(&self, strategy: &str) -> String {
        let mut text = String::from(strategy);
        if self.outer_join {
            text.push_str(" outer");
        }
        if self.populate {
            text.push_str(" populate");
        }
        if self.correlated {
            text.push_str(" correlated");
        }
        if let Some(keys) = &self.keys {
            text.push_str(&format!(" on [{}] = [{}]", keys.outer.describe(), keys.inner.describe()));
        }
        if let Some(condition) = &self.condition {
            text.push_str(&format!(" where {}", condition.text()));
        }
        text
    }
}

/// Runs `f` with `outer` pushed as the outer tuple in scope.
pub(crate) fn with_outer<T>(
    ctx: &mut ExecutionContext,
    outer: Option<&Tuple>,
    f: impl FnOnce(&mut ExecutionContext) -> Result<T>,
) -> Result<T> {
    match outer {
        Some(tuple) => {
            ctx.statement.push_outer(tuple);
            let result = f(ctx);
            ctx.statement.pop_outer();
            result
        }
        None => f(ctx),
    }
}
