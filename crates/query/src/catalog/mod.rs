//! Catalog contract.
//!
//! A catalog owns data sources. During planning the builder asks it which
//! indices a table has and offers it predicates and sort items; the catalog
//! returns an operator plus whatever it chose not to enforce. Anything
//! returned stays the builder's responsibility.

mod memory;
mod system;

pub use memory::{MemoryCatalog, MemoryTable};
pub(crate) use system::{SystemCatalog, SYSTEM_SCHEMA};

use crate::alias::{AliasId, AliasKind, ColumnSet};
use crate::ast::{ComparisonOp, QualifiedName};
use crate::compiler::{CompiledPredicate, CompiledScalar, CompiledSortItem, ScalarFunction, SeekKeyFactory};
use crate::context::NodeId;
use crate::executor::Operator;
use braid_core::{Error, Result};
use hashbrown::HashMap;
use std::rc::Rc;

/// Key columns of an index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexColumns {
    /// These columns, in key order.
    Fixed(Vec<String>),
    /// Any column can be used as a key; the columns are not known up front.
    Wildcard,
}

/// A seekable key reported by a catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Index {
    pub table: QualifiedName,
    pub columns: IndexColumns,
    /// Preferred number of keys per lookup.
    pub batch_size: Option<usize>,
}

impl Index {
    pub fn fixed(table: QualifiedName, columns: &[&str]) -> Self {
        Self {
            table,
            columns: IndexColumns::Fixed(columns.iter().map(|c| c.to_string()).collect()),
            batch_size: None,
        }
    }

    pub fn wildcard(table: QualifiedName) -> Self {
        Self {
            table,
            columns: IndexColumns::Wildcard,
            batch_size: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// The table source a request is for.
#[derive(Clone, Debug)]
pub struct TableSourceRef {
    /// Alias the catalog is registered under.
    pub catalog_alias: String,
    pub table: QualifiedName,
    pub alias: String,
    pub alias_id: AliasId,
    pub kind: AliasKind,
    /// Number of slots in the tuples this source produces.
    pub width: usize,
    /// Node id the catalog operator must report.
    pub node_id: NodeId,
}

/// `column <op> value` form of a predicate, when it has one.
#[derive(Clone, Debug)]
pub struct ColumnComparison {
    pub column: String,
    pub op: ComparisonOp,
    pub value: CompiledScalar,
}

/// A predicate offered to a catalog.
#[derive(Clone, Debug)]
pub struct PushdownPredicate {
    pub predicate: CompiledPredicate,
    pub comparison: Option<ColumnComparison>,
}

/// A sort item offered to a catalog.
#[derive(Clone, Debug)]
pub struct PushdownSortItem {
    pub item: CompiledSortItem,
    /// Column name when the sort key is a plain column of the source.
    pub column: Option<String>,
}

/// A compiled `WITH (name = value)` option, evaluated when the operator opens.
#[derive(Clone, Debug)]
pub struct TableOptionValue {
    pub name: String,
    pub value: CompiledScalar,
}

/// Request to build a scan.
#[derive(Clone, Debug)]
pub struct ScanRequest {
    pub source: TableSourceRef,
    pub columns: ColumnSet,
    pub predicates: Vec<PushdownPredicate>,
    pub sort_items: Vec<PushdownSortItem>,
    pub options: Vec<TableOptionValue>,
    /// Arguments of a table function.
    pub arguments: Vec<CompiledScalar>,
}

/// Request to build an index seek.
#[derive(Clone, Debug)]
pub struct SeekRequest {
    pub scan: ScanRequest,
    pub index: Index,
    pub seek_key: SeekKeyFactory,
}

/// What a catalog built, and what it left to the caller.
pub struct ScanResponse {
    pub operator: Rc<dyn Operator>,
    pub remaining_predicates: Vec<PushdownPredicate>,
    pub remaining_sort_items: Vec<PushdownSortItem>,
}

impl ScanResponse {
    /// A response that consumed nothing.
    pub fn unconsumed(operator: Rc<dyn Operator>, request: ScanRequest) -> Self {
        Self {
            operator,
            remaining_predicates: request.predicates,
            remaining_sort_items: request.sort_items,
        }
    }
}

/// Table listed by `sys.tables` and `sys.columns`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<String>,
}

/// A data source provider.
pub trait Catalog {
    fn name(&self) -> &str;

    /// Indices available for `table`.
    fn list_indices(&self, _table: &QualifiedName) -> Vec<Index> {
        Vec::new()
    }

    fn build_scan(&self, request: ScanRequest) -> Result<ScanResponse>;

    /// Builds an index lookup. Only called with an index from
    /// [`Catalog::list_indices`].
    fn build_seek(&self, request: SeekRequest) -> Result<ScanResponse> {
        Err(Error::missing_operator(self.name(), request.scan.source.table.to_string()))
    }

    /// Tables this catalog can list.
    fn tables(&self) -> Vec<TableInfo> {
        Vec::new()
    }

    /// Scalar functions callable as `alias#name(...)`.
    fn functions(&self) -> Vec<Rc<dyn ScalarFunction>> {
        Vec::new()
    }
}

/// Catalogs by alias, with an optional default.
#[derive(Clone, Default)]
pub struct CatalogRegistry {
    catalogs: HashMap<String, (String, Rc<dyn Catalog>)>,
    order: Vec<String>,
    default: Option<String>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `catalog` under `alias`, replacing any previous one.
    pub fn register(&mut self, alias: &str, catalog: Rc<dyn Catalog>) {
        let key = alias.to_ascii_lowercase();
        if !self.catalogs.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.catalogs.insert(key, (alias.to_string(), catalog));
    }

    pub fn set_default(&mut self, alias: Option<&str>) {
        self.default = alias.map(str::to_ascii_lowercase);
    }

    /// Finds the catalog for `alias`, falling back to the default.
    pub fn resolve(&self, alias: Option<&str>) -> Result<(String, Rc<dyn Catalog>)> {
        let key = alias
            .map(str::to_ascii_lowercase)
            .or_else(|| self.default.clone());
        key.as_ref()
            .and_then(|k| self.catalogs.get(k))
            .map(|(alias, catalog)| (alias.clone(), catalog.clone()))
            .ok_or_else(|| Error::catalog_not_found(alias.or(self.default.as_deref()).unwrap_or("<default>")))
    }

    /// Registered catalogs in registration order.
    pub fn entries(&self) -> Vec<(String, Rc<dyn Catalog>)> {
        self.order
            .iter()
            .filter_map(|k| self.catalogs.get(k))
            .map(|(alias, catalog)| (alias.clone(), catalog.clone()))
            .collect()
    }
}
