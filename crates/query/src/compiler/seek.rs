//! Seek keys: the values an index lookup is driven by.

use super::{CompiledScalar, HashKey};
use crate::context::ExecutionContext;
use braid_core::{Error, Result, Row, Tuple, Value};
use std::rc::Rc;

/// Evaluated key for one index lookup, in index column order.
#[derive(Clone, Debug, PartialEq)]
pub struct SeekKey {
    columns: Rc<[String]>,
    values: Vec<Value>,
}

impl SeekKey {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The value for `column`, ASCII case-insensitive.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    /// True when every key column of `row` equals the key value.
    pub fn matches(&self, row: &Row) -> bool {
        self.columns
            .iter()
            .zip(&self.values)
            .all(|(c, v)| row.get_by_name(c).is_some_and(|r| r.sql_eq(v)))
    }

    pub fn hash_key(&self) -> HashKey {
        HashKey::new(self.values.clone())
    }
}

/// Builds seek keys from expressions over the outer tuple.
///
/// Keys must be total: a null component fails with
/// [`Error::NullSeekKey`] instead of matching nothing.
#[derive(Clone, Debug)]
pub struct SeekKeyFactory {
    alias: Rc<str>,
    columns: Rc<[String]>,
    items: Vec<CompiledScalar>,
}

impl SeekKeyFactory {
    pub fn new(alias: &str, columns: Vec<String>, items: Vec<CompiledScalar>) -> Self {
        Self {
            alias: alias.into(),
            columns: columns.into(),
            items,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Evaluates the key against `tuple`.
    pub fn key(&self, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<SeekKey> {
        let mut values = Vec::with_capacity(self.items.len());
        for item in &self.items {
            let value = item.evaluate(tuple, ctx)?;
            if value.is_null() {
                return Err(Error::null_seek_key(self.alias.as_ref(), item.text()));
            }
            values.push(value);
        }
        Ok(SeekKey {
            columns: self.columns.clone(),
            values,
        })
    }

    /// Evaluates the key against the outer tuple in scope.
    pub fn key_for_outer(&self, ctx: &mut ExecutionContext) -> Result<SeekKey> {
        let outer = ctx.statement.outer().cloned().unwrap_or_default();
        self.key(&outer, ctx)
    }

    pub fn describe(&self) -> String {
        self.columns
            .iter()
            .zip(&self.items)
            .map(|(c, i)| format!("{} = {}", c, i.text()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
