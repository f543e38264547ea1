//! Drives a compiled query into a writer or a temporary table.

use super::{finish, Cursor, Operator};
use crate::compiler::{HashKey, OutputWriter, ProjectionWriter};
use crate::context::ExecutionContext;
use braid_core::{Result, Tuple, Value};
use hashbrown::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Identifies a materialized result: a cache name, a key within it and an
/// optional time to live.
#[derive(Clone, Debug, PartialEq)]
pub struct TemporaryTableKey {
    pub name: String,
    pub key: Value,
    pub ttl: Option<Duration>,
}

impl TemporaryTableKey {
    pub fn new(name: &str, key: impl Into<Value>) -> Self {
        Self {
            name: name.to_string(),
            key: key.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Receives materialized query results.
pub trait TemporaryTableSink {
    fn store(
        &mut self,
        key: &TemporaryTableKey,
        columns: Vec<String>,
        rows: &mut dyn Iterator<Item = (Tuple, Vec<Value>)>,
    ) -> Result<()>;
}

/// A stored temporary table.
#[derive(Clone, Debug)]
pub struct TemporaryTable {
    pub columns: Vec<String>,
    pub rows: Vec<(Tuple, Vec<Value>)>,
    expires: Option<Instant>,
}

impl TemporaryTable {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|e| now >= e)
    }
}

/// [`TemporaryTableSink`] that keeps tables in memory.
#[derive(Debug, Default)]
pub struct InMemoryTemporaryTables {
    tables: HashMap<(String, HashKey), TemporaryTable>,
}

impl InMemoryTemporaryTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a table. Expired tables are dropped and read as missing.
    pub fn get(&mut self, name: &str, key: &Value) -> Option<&TemporaryTable> {
        let map_key = (name.to_ascii_lowercase(), HashKey::new(vec![key.clone()]));
        if self.tables.get(&map_key).is_some_and(|t| t.is_expired(Instant::now())) {
            self.tables.remove(&map_key);
        }
        self.tables.get(&map_key)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TemporaryTableSink for InMemoryTemporaryTables {
    fn store(
        &mut self,
        key: &TemporaryTableKey,
        columns: Vec<String>,
        rows: &mut dyn Iterator<Item = (Tuple, Vec<Value>)>,
    ) -> Result<()> {
        let table = TemporaryTable {
            columns,
            rows: rows.collect(),
            expires: key.ttl.map(|ttl| Instant::now() + ttl),
        };
        self.tables
            .insert((key.name.to_ascii_lowercase(), HashKey::new(vec![key.key.clone()])), table);
        Ok(())
    }
}

/// Runs an operator tree and shapes its tuples with a projection.
pub struct QueryRunner {
    operator: Rc<dyn Operator>,
    projection: Rc<ProjectionWriter>,
}

impl QueryRunner {
    pub fn new(operator: Rc<dyn Operator>, projection: Rc<ProjectionWriter>) -> Self {
        Self { operator, projection }
    }

    /// Writes one result set and returns the number of rows written.
    ///
    /// Column names are reported after the first row was pulled, so `*`
    /// expands to the columns the sources actually produced. The abort
    /// predicate is polled before every row.
    pub fn run(&self, ctx: &mut ExecutionContext, writer: &mut dyn OutputWriter) -> Result<u64> {
        ctx.check_abort()?;
        let mut cursor = Cursor::open(self.operator.as_ref(), ctx)?;
        let written = self.write_rows(&mut cursor, ctx, writer);
        let written = finish(written, cursor.close())?;
        debug!(rows = written, "result set written");
        Ok(written)
    }

    fn write_rows(&self, cursor: &mut Cursor, ctx: &mut ExecutionContext, writer: &mut dyn OutputWriter) -> Result<u64> {
        let mut written = 0;
        let first = cursor.has_next(ctx)?;
        writer.start_result_set(&self.projection.columns())?;
        if first {
            loop {
                ctx.check_abort()?;
                if !cursor.has_next(ctx)? {
                    break;
                }
                let tuple = cursor.next(ctx)?;
                self.projection.write(&tuple, ctx, writer)?;
                written += 1;
            }
        }
        writer.end_result_set()?;
        Ok(written)
    }

    /// Evaluates every row and hands the `(tuple, values)` pairs to `sink`.
    pub fn materialize(
        &self,
        ctx: &mut ExecutionContext,
        sink: &mut dyn TemporaryTableSink,
        key: &TemporaryTableKey,
    ) -> Result<usize> {
        let mut cursor = Cursor::open(self.operator.as_ref(), ctx)?;
        let rows = self.collect_rows(&mut cursor, ctx);
        let rows = finish(rows, cursor.close())?;
        let count = rows.len();
        sink.store(key, self.projection.columns(), &mut rows.into_iter())?;
        debug!(table = %key.name, rows = count, "temporary table stored");
        Ok(count)
    }

    fn collect_rows(&self, cursor: &mut Cursor, ctx: &mut ExecutionContext) -> Result<Vec<(Tuple, Vec<Value>)>> {
        let mut rows = Vec::new();
        loop {
            ctx.check_abort()?;
            if !cursor.has_next(ctx)? {
                return Ok(rows);
            }
            let tuple = cursor.next(ctx)?;
            let values = self.projection.values(&tuple, ctx)?;
            rows.push((tuple, values));
        }
    }
}
