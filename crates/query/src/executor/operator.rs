//! Operator and iterator protocol.

use crate::context::{ExecutionContext, NodeId};
use braid_core::{Error, Result, Tuple};
use std::rc::Rc;
use tracing::debug;

/// A physical plan node.
///
/// Operators are immutable once built and may be opened any number of
/// times; all per-execution state lives in the returned iterator or in the
/// execution context.
pub trait Operator {
    /// Stable id for diagnostics and per-node state.
    fn node_id(&self) -> NodeId;

    /// Starts producing tuples.
    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>>;

    /// One-line description used by [`explain`].
    fn describe(&self) -> String;

    fn children(&self) -> Vec<Rc<dyn Operator>> {
        Vec::new()
    }
}

/// Pull iterator over tuples.
///
/// `close` must be called exactly once, whether iteration finished, failed
/// or was abandoned.
pub trait TupleIterator {
    fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Option<Tuple>>;

    fn close(&mut self) -> Result<()>;
}

/// Iterator over tuples that are already in memory.
pub struct SharedIterator {
    tuples: Rc<[Tuple]>,
    position: usize,
}

impl SharedIterator {
    pub fn new(tuples: Rc<[Tuple]>) -> Self {
        Self { tuples, position: 0 }
    }

    pub fn boxed(tuples: Vec<Tuple>) -> Box<dyn TupleIterator> {
        Box::new(Self::new(tuples.into()))
    }
}

impl TupleIterator for SharedIterator {
    fn next(&mut self, _ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        let tuple = self.tuples.get(self.position).cloned();
        self.position += 1;
        Ok(tuple)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// `has_next`/`next` view over a [`TupleIterator`] that guarantees a single
/// close.
pub struct Cursor {
    inner: Box<dyn TupleIterator>,
    peeked: Option<Tuple>,
    closed: bool,
}

impl Cursor {
    pub fn new(inner: Box<dyn TupleIterator>) -> Self {
        Self {
            inner,
            peeked: None,
            closed: false,
        }
    }

    pub fn open(operator: &dyn Operator, ctx: &mut ExecutionContext) -> Result<Self> {
        Ok(Self::new(operator.open(ctx)?))
    }

    pub fn has_next(&mut self, ctx: &mut ExecutionContext) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        if self.peeked.is_none() {
            self.peeked = self.inner.next(ctx)?;
        }
        Ok(self.peeked.is_some())
    }

    pub fn next(&mut self, ctx: &mut ExecutionContext) -> Result<Tuple> {
        if self.has_next(ctx)? {
            if let Some(tuple) = self.peeked.take() {
                return Ok(tuple);
            }
        }
        Err(Error::invalid_operation("next called on an exhausted cursor"))
    }

    /// Closes the underlying iterator. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.peeked = None;
        self.inner.close()
    }
}

/// Closes every iterator even when some fail, then reports all failures.
pub(crate) fn close_all<'a>(iterators: impl IntoIterator<Item = &'a mut Box<dyn TupleIterator>>) -> Result<()> {
    let errors: Vec<Error> = iterators.into_iter().filter_map(|i| i.close().err()).collect();
    if !errors.is_empty() {
        debug!(failures = errors.len(), "close cascade collected failures");
    }
    Error::from_close_errors(errors)
}

/// Drains `iterator` into a vector and closes it. An iteration error wins
/// over a close error.
pub(crate) fn materialize(mut iterator: Box<dyn TupleIterator>, ctx: &mut ExecutionContext) -> Result<Vec<Tuple>> {
    let mut out = Vec::new();
    let drained = loop {
        match iterator.next(ctx) {
            Ok(Some(tuple)) => out.push(tuple),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    finish(drained, iterator.close()).map(|_| out)
}

/// Combines a primary result with the result of closing.
pub(crate) fn finish<T>(primary: Result<T>, close: Result<()>) -> Result<T> {
    match (primary, close) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close)) => {
            tracing::warn!(error = %close, "close failed after an earlier error");
            Err(e)
        }
    }
}

/// Renders an operator tree, one node per line.
pub fn explain(operator: &dyn Operator) -> String {
    fn walk(op: &dyn Operator, depth: usize, out: &mut String) {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!("#{} {}\n", op.node_id(), op.describe()));
        for child in op.children() {
            walk(child.as_ref(), depth + 1, out);
        }
    }
    let mut out = String::new();
    walk(operator, 0, &mut out);
    out
}
