//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use braid_core::{Result, Value};
use braid_query::{MemoryCatalog, MemoryTable, OutputWriter};
use serde_json::{json, Map, Value as Json};

/// One result set as the writer saw it.
#[derive(Debug, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Json>,
}

/// Rebuilds the writer calls into JSON values and checks their nesting.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    pub result_sets: Vec<ResultSet>,
    stack: Vec<(Json, Option<String>)>,
    pending: Option<String>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of the last result set.
    pub fn rows(&self) -> &[Json] {
        self.result_sets.last().map(|r| r.rows.as_slice()).unwrap_or_default()
    }

    pub fn columns(&self) -> &[String] {
        self.result_sets.last().map(|r| r.columns.as_slice()).unwrap_or_default()
    }

    /// Values of `field` across the rows of the last result set.
    pub fn field(&self, field: &str) -> Vec<Json> {
        self.rows().iter().map(|r| r[field].clone()).collect()
    }

    fn emit(&mut self, value: Json, name: Option<String>) {
        match self.stack.last_mut() {
            Some((Json::Object(map), _)) => {
                let name = name.expect("value inside an object without a field name");
                map.insert(name, value);
            }
            Some((Json::Array(items), _)) => items.push(value),
            Some(_) => unreachable!("only containers are stacked"),
            None => self
                .result_sets
                .last_mut()
                .expect("row written outside a result set")
                .rows
                .push(value),
        }
    }

    fn open(&mut self, container: Json) {
        let name = self.pending.take();
        self.stack.push((container, name));
    }

    fn close(&mut self, object: bool) {
        let (value, name) = self.stack.pop().expect("unbalanced end");
        assert_eq!(value.is_object(), object, "end does not match start");
        self.emit(value, name);
    }
}

pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => json!(b),
        Value::Int32(v) => json!(v),
        Value::Int64(v) => json!(v),
        Value::Float64(v) => json!(v),
        Value::String(s) => json!(s),
        Value::DateTime(v) => json!(v),
        Value::Bytes(b) => json!(b),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Tuples(members) => json!(members.len()),
    }
}

impl OutputWriter for RecordingWriter {
    fn start_result_set(&mut self, columns: &[String]) -> Result<()> {
        assert!(self.stack.is_empty());
        self.result_sets.push(ResultSet {
            columns: columns.to_vec(),
            rows: Vec::new(),
        });
        Ok(())
    }

    fn end_result_set(&mut self) -> Result<()> {
        assert!(self.stack.is_empty(), "result set ended inside a row");
        Ok(())
    }

    fn start_object(&mut self) -> Result<()> {
        self.open(Json::Object(Map::new()));
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.close(true);
        Ok(())
    }

    fn start_array(&mut self) -> Result<()> {
        self.open(Json::Array(Vec::new()));
        Ok(())
    }

    fn end_array(&mut self) -> Result<()> {
        self.close(false);
        Ok(())
    }

    fn write_field_name(&mut self, name: &str) -> Result<()> {
        assert!(self.pending.is_none(), "two field names in a row");
        self.pending = Some(name.to_string());
        Ok(())
    }

    fn write_value(&mut self, value: &Value) -> Result<()> {
        let name = self.pending.take();
        self.emit(to_json(value), name);
        Ok(())
    }
}

/// `users(id, name, age, dept_id)` and `depts(id, title)`, with an index on
/// `depts.id`.
pub fn company() -> MemoryCatalog {
    let users = MemoryTable::new("users", &["id", "name", "age", "dept_id"])
        .with_row(vec![1.into(), "ann".into(), 34.into(), 10.into()])
        .with_row(vec![2.into(), "bob".into(), 27.into(), 20.into()])
        .with_row(vec![3.into(), "cy".into(), 41.into(), 10.into()])
        .with_row(vec![4.into(), "dee".into(), 30.into(), Value::Null])
        .with_row(vec![5.into(), "eve".into(), 25.into(), 30.into()]);
    let depts = MemoryTable::new("depts", &["id", "title"])
        .with_row(vec![10.into(), "eng".into()])
        .with_row(vec![20.into(), "ops".into()])
        .with_row(vec![40.into(), "hr".into()])
        .with_index(&["id"]);
    MemoryCatalog::new("company").with_table(users).with_table(depts)
}

/// Same data without indices, for plain nested-loop plans.
pub fn company_unindexed() -> MemoryCatalog {
    let users = MemoryTable::new("users", &["id", "name", "age", "dept_id"])
        .with_row(vec![1.into(), "ann".into(), 34.into(), 10.into()])
        .with_row(vec![2.into(), "bob".into(), 27.into(), 20.into()])
        .with_row(vec![3.into(), "cy".into(), 41.into(), 10.into()])
        .with_row(vec![4.into(), "dee".into(), 30.into(), Value::Null])
        .with_row(vec![5.into(), "eve".into(), 25.into(), 30.into()]);
    let depts = MemoryTable::new("depts", &["id", "title"])
        .with_row(vec![10.into(), "eng".into()])
        .with_row(vec![20.into(), "ops".into()])
        .with_row(vec![40.into(), "hr".into()]);
    MemoryCatalog::new("company").with_table(users).with_table(depts)
}
