//! Per-execution state.
//!
//! An [`ExecutionContext`] lives for a whole batch: it owns the session and
//! the variables set by `SET @name = ...`. Its [`StatementContext`] holds what
//! only makes sense while one statement runs (outer tuples in scope, lambda
//! bindings, per-node counters and caches) and is cleared between
//! statements.

use crate::ast::LambdaId;
use crate::compiler::HashKey;
use braid_core::{Error, Result, Tuple, Value};
use hashbrown::HashMap;
use std::rc::Rc;

/// Stable id of an operator node within one compiled query.
pub type NodeId = usize;

/// Connection properties and credentials, looked up by catalog alias.
#[derive(Clone, Debug, Default)]
pub struct Session {
    properties: HashMap<(String, String), Value>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property for `catalog_alias`. Names are ASCII case-insensitive.
    pub fn set_property(&mut self, catalog_alias: &str, key: &str, value: impl Into<Value>) {
        self.properties.insert(
            (catalog_alias.to_ascii_lowercase(), key.to_ascii_lowercase()),
            value.into(),
        );
    }

    pub fn with_property(mut self, catalog_alias: &str, key: &str, value: impl Into<Value>) -> Self {
        self.set_property(catalog_alias, key, value);
        self
    }

    /// Returns the property, or None when it was never set.
    pub fn property(&self, catalog_alias: &str, key: &str) -> Option<&Value> {
        self.properties
            .get(&(catalog_alias.to_ascii_lowercase(), key.to_ascii_lowercase()))
    }
}

/// What a lambda parameter is currently bound to.
#[derive(Clone, Debug, PartialEq)]
pub enum LambdaValue {
    /// One member of a populated alias.
    Tuple(Tuple),
    /// One element of an array.
    Value(Value),
}

/// Counters kept per operator node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeData {
    /// Times the node was opened.
    pub executions: u64,
    /// Tuples the node produced.
    pub rows: u64,
    /// Opens answered from a cache.
    pub cache_hits: u64,
}

/// State scoped to one statement.
#[derive(Debug, Default)]
pub struct StatementContext {
    outer: Vec<Tuple>,
    lambdas: HashMap<LambdaId, LambdaValue>,
    nodes: HashMap<NodeId, NodeData>,
    caches: HashMap<NodeId, HashMap<HashKey, Rc<[Tuple]>>>,
}

impl StatementContext {
    /// The outer tuple visible to correlated expressions.
    pub fn outer(&self) -> Option<&Tuple> {
        self.outer.last()
    }

    /// Brings `tuple` into scope on top of the current outer tuple.
    pub fn push_outer(&mut self, tuple: &Tuple) {
        let merged = match self.outer.last() {
            Some(current) => current.merge(tuple),
            None => tuple.clone(),
        };
        self.outer.push(merged);
    }

    pub fn pop_outer(&mut self) {
        self.outer.pop();
    }

    pub fn lambda(&self, id: LambdaId) -> Option<&LambdaValue> {
        self.lambdas.get(&id)
    }

    /// Binds a lambda parameter, returning the previous binding.
    pub fn bind_lambda(&mut self, id: LambdaId, value: LambdaValue) -> Option<LambdaValue> {
        self.lambdas.insert(id, value)
    }

    /// Restores a binding returned by [`StatementContext::bind_lambda`].
    pub fn restore_lambda(&mut self, id: LambdaId, previous: Option<LambdaValue>) {
        match previous {
            Some(value) => self.lambdas.insert(id, value),
            None => self.lambdas.remove(&id),
        };
    }

    /// Counters for `node`, if it ran.
    pub fn node(&self, node: NodeId) -> Option<&NodeData> {
        self.nodes.get(&node)
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> &mut NodeData {
        self.nodes.entry(node).or_default()
    }

    pub(crate) fn cached(&self, node: NodeId, key: &HashKey) -> Option<Rc<[Tuple]>> {
        self.caches.get(&node).and_then(|c| c.get(key)).cloned()
    }

    pub(crate) fn store(&mut self, node: NodeId, key: HashKey, tuples: Rc<[Tuple]>) {
        self.caches.entry(node).or_default().insert(key, tuples);
    }

    /// Drops everything statement-scoped.
    pub fn clear(&mut self) {
        self.outer.clear();
        self.lambdas.clear();
        self.nodes.clear();
        self.caches.clear();
    }
}

/// Batch-scoped execution state.
pub struct ExecutionContext {
    session: Rc<Session>,
    variables: HashMap<String, Value>,
    abort: Option<Box<dyn Fn() -> bool>>,
    pub statement: StatementContext,
}

impl ExecutionContext {
    pub fn new(session: Rc<Session>) -> Self {
        Self {
            session,
            variables: HashMap::new(),
            abort: None,
            statement: StatementContext::default(),
        }
    }

    /// Installs a predicate polled between rows; returning true stops the
    /// statement with [`Error::Aborted`].
    pub fn with_abort(mut self, abort: impl Fn() -> bool + 'static) -> Self {
        self.abort = Some(Box::new(abort));
        self
    }

    pub fn session(&self) -> &Rc<Session> {
        &self.session
    }

    /// Replaces the session, e.g. after the caller supplied credentials.
    pub fn set_session(&mut self, session: Rc<Session>) {
        self.session = session;
    }

    /// Reads a variable. A leading `@` is ignored and names are ASCII
    /// case-insensitive.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(&variable_key(name))
    }

    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(variable_key(name), value);
    }

    pub fn check_abort(&self) -> Result<()> {
        match &self.abort {
            Some(abort) if abort() => Err(Error::Aborted),
            _ => Ok(()),
        }
    }

    /// Resets statement state before the next statement of a batch.
    pub fn begin_statement(&mut self) {
        self.statement.clear();
    }
}

fn variable_key(name: &str) -> String {
    name.trim_start_matches('@').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::Row;

    #[test]
    fn test_session_properties() {
        let session = Session::new().with_property("Db", "User", "sa");
        assert_eq!(session.property("db", "user"), Some(&Value::String("sa".into())));
        assert!(session.property("db", "password").is_none());
    }

    #[test]
    fn test_variables_survive_statements() {
        let mut ctx = ExecutionContext::new(Rc::new(Session::new()));
        ctx.set_variable("@Limit", Value::Int32(3));
        ctx.statement.node_mut(1).executions += 1;
        ctx.begin_statement();
        assert_eq!(ctx.variable("limit"), Some(&Value::Int32(3)));
        assert!(ctx.statement.node(1).is_none());
    }

    #[test]
    fn test_outer_stack_merges() {
        let mut ctx = StatementContext::default();
        let row = |v: i32| Rc::new(Row::new(Row::columns_of(&["v"]), vec![Value::Int32(v)]));
        ctx.push_outer(&Tuple::single(3, 1, row(1)));
        ctx.push_outer(&Tuple::single(3, 2, row(2)));
        let outer = ctx.outer().cloned().unwrap();
        assert_eq!(outer.value(1, "v"), Some(&Value::Int32(1)));
        assert_eq!(outer.value(2, "v"), Some(&Value::Int32(2)));
        ctx.pop_outer();
        assert!(ctx.outer().is_some_and(|t| t.row(2).is_none()));
    }

    #[test]
    fn test_lambda_restore() {
        let mut ctx = StatementContext::default();
        let previous = ctx.bind_lambda(0, LambdaValue::Value(Value::Int32(1)));
        assert!(previous.is_none());
        let previous = ctx.bind_lambda(0, LambdaValue::Value(Value::Int32(2)));
        ctx.restore_lambda(0, previous);
        assert_eq!(ctx.lambda(0), Some(&LambdaValue::Value(Value::Int32(1))));
    }

    #[test]
    fn test_abort() {
        let ctx = ExecutionContext::new(Rc::new(Session::new())).with_abort(|| true);
        assert!(matches!(ctx.check_abort(), Err(Error::Aborted)));
    }
}
