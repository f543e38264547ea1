//! In-memory reference catalog.

use super::{
    Catalog, Index, ScanRequest, ScanResponse, SeekRequest, TableInfo, TableSourceRef,
};
use crate::alias::{AliasId, AliasKind};
use crate::ast::QualifiedName;
use crate::compiler::{sort_tuples, CompiledPredicate, CompiledScalar, CompiledSortItem, SeekKeyFactory};
use crate::context::{ExecutionContext, NodeId};
use crate::executor::{Operator, SharedIterator, TupleIterator};
use braid_core::{Columns, Error, Result, Row, Tuple, Value};
use hashbrown::HashMap;
use std::cell::Cell;
use std::rc::Rc;

/// A table held in memory.
#[derive(Clone, Debug)]
pub struct MemoryTable {
    name: String,
    columns: Columns,
    rows: Vec<Rc<Row>>,
    indices: Vec<Vec<String>>,
}

impl MemoryTable {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: Row::columns_of(columns),
            rows: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn push(&mut self, values: Vec<Value>) {
        self.rows.push(Rc::new(Row::new(self.columns.clone(), values)));
    }

    pub fn with_row(mut self, values: Vec<Value>) -> Self {
        self.push(values);
        self
    }

    /// Declares an index over `columns`, in key order.
    pub fn with_index(mut self, columns: &[&str]) -> Self {
        self.indices.push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Catalog over [`MemoryTable`]s.
///
/// Consumes predicates of the form `column <op> value` and sort items over
/// plain columns. Provides the `range(start, end)` table function.
pub struct MemoryCatalog {
    name: String,
    tables: HashMap<String, Rc<MemoryTable>>,
    required_property: Option<String>,
    push_predicates: bool,
    push_sort_items: bool,
    opens: Rc<Cell<usize>>,
}

impl MemoryCatalog {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: HashMap::new(),
            required_property: None,
            push_predicates: true,
            push_sort_items: true,
            opens: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_table(mut self, table: MemoryTable) -> Self {
        self.tables.insert(table.name.to_ascii_lowercase(), Rc::new(table));
        self
    }

    /// Requires the session to hold `key` for this catalog's alias before
    /// any operator opens.
    pub fn with_required_property(mut self, key: &str) -> Self {
        self.required_property = Some(key.to_string());
        self
    }

    pub fn with_predicate_pushdown(mut self, enabled: bool) -> Self {
        self.push_predicates = enabled;
        self
    }

    pub fn with_sort_pushdown(mut self, enabled: bool) -> Self {
        self.push_sort_items = enabled;
        self
    }

    /// Number of scans and seeks opened so far.
    pub fn opens(&self) -> usize {
        self.opens.get()
    }

    fn table(&self, name: &QualifiedName) -> Result<Rc<MemoryTable>> {
        let key = name.last().unwrap_or_default().to_ascii_lowercase();
        self.tables
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::missing_operator(&self.name, name.to_string()))
    }

    fn build(&self, mut request: ScanRequest, seek: Option<SeekKeyFactory>) -> Result<ScanResponse> {
        let mut max_rows = None;
        for option in std::mem::take(&mut request.options) {
            if option.name.eq_ignore_ascii_case("max_rows") {
                max_rows = Some(option.value);
            } else {
                return Err(Error::unsupported_option(&self.name, option.name));
            }
        }

        if request.source.kind == AliasKind::Function {
            return self.build_function(request);
        }
        let table = self.table(&request.source.table)?;

        let (consumed, remaining_predicates): (Vec<_>, Vec<_>) = std::mem::take(&mut request.predicates)
            .into_iter()
            .partition(|p| self.push_predicates && p.comparison.is_some());
        let sortable = self.push_sort_items && request.sort_items.iter().all(|s| s.column.is_some());
        let (sort, remaining_sort_items) = if sortable {
            (std::mem::take(&mut request.sort_items), Vec::new())
        } else {
            (Vec::new(), std::mem::take(&mut request.sort_items))
        };

        let operator = MemoryScan {
            source: request.source,
            catalog: self.name.clone(),
            table,
            predicates: consumed.into_iter().map(|p| p.predicate).collect(),
            sort: sort.into_iter().map(|s| s.item).collect(),
            max_rows,
            seek,
            required_property: self.required_property.clone(),
            opens: self.opens.clone(),
        };
        Ok(ScanResponse {
            operator: Rc::new(operator),
            remaining_predicates,
            remaining_sort_items,
        })
    }

    fn build_function(&self, request: ScanRequest) -> Result<ScanResponse> {
        let name = request.source.table.to_string();
        if !name.eq_ignore_ascii_case("range") {
            return Err(Error::missing_operator(&self.name, name));
        }
        let [start, end] = <[CompiledScalar; 2]>::try_from(request.arguments.clone())
            .map_err(|args| Error::invalid_arguments("range", format!("expected 2 arguments, got {}", args.len())))?;
        let operator = RangeScan {
            source: request.source.clone(),
            start,
            end,
            columns: Row::columns_of(&["Value"]),
        };
        Ok(ScanResponse::unconsumed(Rc::new(operator), request))
    }
}

impl Catalog for MemoryCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_indices(&self, table: &QualifiedName) -> Vec<Index> {
        match self.table(table) {
            Ok(t) => t
                .indices
                .iter()
                .map(|columns| {
                    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                    Index::fixed(table.clone(), &columns)
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn build_scan(&self, request: ScanRequest) -> Result<ScanResponse> {
        self.build(request, None)
    }

    fn build_seek(&self, request: SeekRequest) -> Result<ScanResponse> {
        self.build(request.scan, Some(request.seek_key))
    }

    fn tables(&self) -> Vec<TableInfo> {
        let mut tables: Vec<TableInfo> = self
            .tables
            .values()
            .map(|t| TableInfo {
                name: t.name.clone(),
                columns: t.columns.to_vec(),
            })
            .collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }
}

struct MemoryScan {
    source: TableSourceRef,
    catalog: String,
    table: Rc<MemoryTable>,
    predicates: Vec<CompiledPredicate>,
    sort: Vec<CompiledSortItem>,
    max_rows: Option<CompiledScalar>,
    seek: Option<SeekKeyFactory>,
    required_property: Option<String>,
    opens: Rc<Cell<usize>>,
}

impl MemoryScan {
    fn check_credentials(&self, ctx: &ExecutionContext) -> Result<()> {
        match &self.required_property {
            Some(key) if ctx.session().property(&self.source.catalog_alias, key).is_none() => {
                Err(Error::MissingCredentials {
                    catalog: self.catalog.clone(),
                    alias: self.source.catalog_alias.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn limit(&self, ctx: &mut ExecutionContext) -> Result<Option<usize>> {
        let Some(max_rows) = &self.max_rows else {
            return Ok(None);
        };
        match max_rows.evaluate(&Tuple::default(), ctx)? {
            Value::Null => Ok(None),
            v => v
                .as_i64()
                .map(|n| Some(n.max(0) as usize))
                .ok_or_else(|| Error::type_mismatch(max_rows.text(), "max_rows expects an integer")),
        }
    }
}

impl Operator for MemoryScan {
    fn node_id(&self) -> NodeId {
        self.source.node_id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        self.opens.set(self.opens.get() + 1);
        self.check_credentials(ctx)?;
        let key = match &self.seek {
            Some(factory) => Some(factory.key_for_outer(ctx)?),
            None => None,
        };

        let (width, alias) = (self.source.width, self.source.alias_id);
        let mut tuples = Vec::new();
        'rows: for row in &self.table.rows {
            if key.as_ref().is_some_and(|k| !k.matches(row)) {
                continue;
            }
            let tuple = Tuple::single(width, alias, row.clone());
            for predicate in &self.predicates {
                if !predicate.test(&tuple, ctx)? {
                    continue 'rows;
                }
            }
            tuples.push(tuple);
        }
        if !self.sort.is_empty() {
            tuples = sort_tuples(&self.sort, tuples, ctx)?;
        }
        if let Some(limit) = self.limit(ctx)? {
            tuples.truncate(limit);
        }
        Ok(SharedIterator::boxed(tuples))
    }

    fn describe(&self) -> String {
        let mut text = match &self.seek {
            Some(factory) => format!("MemorySeek {} as {} [{}]", self.table.name, self.source.alias, factory.describe()),
            None => format!("MemoryScan {} as {}", self.table.name, self.source.alias),
        };
        if !self.predicates.is_empty() {
            let predicates: Vec<&str> = self.predicates.iter().map(|p| p.text()).collect();
            text.push_str(&format!(" where {}", predicates.join(" AND ")));
        }
        if !self.sort.is_empty() {
            let keys: Vec<&str> = self.sort.iter().map(|s| s.key.text()).collect();
            text.push_str(&format!(" order by {}", keys.join(", ")));
        }
        text
    }
}

struct RangeScan {
    source: TableSourceRef,
    start: CompiledScalar,
    end: CompiledScalar,
    columns: Columns,
}

struct RangeIterator {
    next: i64,
    end: i64,
    columns: Columns,
    alias: AliasId,
    width: usize,
}

impl TupleIterator for RangeIterator {
    fn next(&mut self, _ctx: &mut ExecutionContext) -> Result<Option<Tuple>> {
        if self.next >= self.end {
            return Ok(None);
        }
        let row = Row::new(self.columns.clone(), vec![Value::Int64(self.next)]);
        self.next += 1;
        Ok(Some(Tuple::single(self.width, self.alias, Rc::new(row))))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Operator for RangeScan {
    fn node_id(&self) -> NodeId {
        self.source.node_id
    }

    fn open(&self, ctx: &mut ExecutionContext) -> Result<Box<dyn TupleIterator>> {
        let outer = ctx.statement.outer().cloned().unwrap_or_default();
        let bound = |scalar: &CompiledScalar, ctx: &mut ExecutionContext| -> Result<i64> {
            scalar
                .evaluate(&outer, ctx)?
                .as_i64()
                .ok_or_else(|| Error::invalid_arguments("range", format!("{} is not an integer", scalar.text())))
        };
        let start = bound(&self.start, ctx)?;
        let end = bound(&self.end, ctx)?;
        Ok(Box::new(RangeIterator {
            next: start,
            end,
            columns: self.columns.clone(),
            alias: self.source.alias_id,
            width: self.source.width,
        }))
    }

    fn describe(&self) -> String {
        format!("Range({}, {}) as {}", self.start.text(), self.end.text(), self.source.alias)
    }
}
