//! `sys.*` introspection tables.
//!
//! - `sys.tables`: catalog, name
//! - `sys.columns`: catalog, table, name, ordinal
//! - `sys.functions`: catalog, name, kind, description

use super::{Catalog, ScanRequest, ScanResponse, TableInfo, TableSourceRef};
use crate::compiler::FunctionRegistry;
use crate::context::{ExecutionContext, NodeId};
use crate::executor::{Operator, SharedIterator, TupleIterator};
use braid_core::{Error, Result, Row, Tuple, Value};
use std::rc::Rc;

/// Schema name reserved for introspection tables.
pub(crate) const SYSTEM_SCHEMA: &str = "sys";

/// Answers `sys.*` tables from a snapshot of the registered catalogs.
pub(crate) struct SystemCatalog {
    catalogs: Vec<(String, Rc<dyn Catalog>)>,
    functions: FunctionRegistry,
}

impl SystemCatalog {
    pub(crate) fn new(catalogs: Vec<(String, Rc<dyn Catalog>)>, functions: FunctionRegistry) -> Self {
        Self { catalogs, functions }
    }

    fn tables_rows(&self) -> Vec<Row> {
        let columns = Row::columns_of(&["catalog", "name"]);
        let mut rows = Vec::new();
        for (alias, catalog) in &self.catalogs {
            for table in catalog.tables() {
                rows.push(Row::new(columns.clone(), vec![alias.as_str().into(), table.name.into()]));
            }
        }
        rows
    }

    fn columns_rows(&self) -> Vec<Row> {
        let columns = Row::columns_of(&["catalog", "table", "name", "ordinal"]);
        let mut rows = Vec::new();
        for (alias, catalog) in &self.catalogs {
            for TableInfo { name, columns: table_columns } in catalog.tables() {
                for (ordinal, column) in table_columns.into_iter().enumerate() {
                    rows.push(Row::new(
                        columns.clone(),
                        vec![
                            alias.as_str().into(),
                            name.as_str().into(),
                            column.into(),
                            Value::Int32(ordinal as i32),
                        ],
                    ));
                }
            }
        }
        rows
    }

    fn functions_rows(&self) -> Vec<Row> {
        let columns = Row::columns_of(&["catalog", "name", "kind", "description"]);
        self.functions
            .list()
            .into_iter()
            .map(|(catalog, name, kind, description)| {
                Row::new(
                    columns.clone(),
                    vec![catalog.map_or(Value::Null, Value::from), name.into(), kind.into(), description.into()],
                )
            })
            .collect()
    }
}

impl Catalog for SystemCatalog {
    fn name(&self) -> &str {
        SYSTEM_SCHEMA
    }

    fn build_scan(&self, request: ScanRequest) -> Result<ScanResponse> {
        let table = request.source.table.last().unwrap_or_default().to_ascii_lowercase();
        let rows = match table.as_str() {
            "tables" => self.tables_rows(),
            "columns" => self.columns_rows(),
            "functions" => self.functions_rows(),
            _ => return Err(Error::missing_operator(SYSTEM_SCHEMA, request.source.table.to_string())),
        };
        if let Some(option) = request.options.first() {
            return Err(Error::unsupported_option(SYSTEM_SCHEMA, option.name.as_str()));
        }
        let operator = RowsScan {
            source: request.source.clone(),
            rows: rows.into_iter().map(Rc::new).collect(),
        };
        Ok(ScanResponse::unconsumed(Rc::new(operator), request))
    }
}

struct RowsScan {
    source: TableSourceRef,
    rows: Vec<Rc<Row>>,
}

impl Operator for RowsScan {
    fn node_id(&self) -> NodeId {
        self.source.node_id
    }

    fn open(&self, _ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let tuples = self
            .rows
            .iter()
            .map(|row| Tuple::single(self.source.width, self.source.alias_id, row.clone()))
            .collect();
        Ok(SharedIterator::boxed(tuples))
    }

    fn describe(&self) -> String {
        format!("SystemScan {} as {}", self.source.table, self.source.alias)
    }
}
