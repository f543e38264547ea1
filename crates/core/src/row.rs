//! Row structure for braid.
//!
//! A `Row` is what a catalog produces: a shared, ordered list of column names
//! plus the values for one record. Rows from the same scan share one column
//! list.

use crate::value::Value;
use std::rc::Rc;

/// Ordered column names shared by all rows of one source.
pub type Columns = Rc<[String]>;

/// A single record produced by a catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    columns: Columns,
    values: Vec<Value>,
}

impl Row {
    /// Creates a new row. `values` is padded with nulls or truncated to the
    /// column count.
    pub fn new(columns: Columns, mut values: Vec<Value>) -> Self {
        values.resize(columns.len(), Value::Null);
        Self { columns, values }
    }

    /// Builds a shared column list from string slices.
    pub fn columns_of<S: AsRef<str>>(names: &[S]) -> Columns {
        names.iter().map(|s| s.as_ref().to_string()).collect()
    }

    /// Returns the column names.
    #[inline]
    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    /// Returns a reference to the values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Gets a value at the given column index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the ordinal of a column, compared ASCII case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Gets a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.column_index(name).and_then(|i| self.values.get(i))
    }

    /// Returns the number of values in this row.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}
