//! Table-alias hierarchy.
//!
//! Every FROM item gets one [`TableAlias`] node. Nodes live in an arena and
//! refer to each other by [`AliasId`], which doubles as the node's tuple slot.
//! Id 0 is the unnamed root. The tree is built once per query and is
//! immutable afterwards, except for each alias's discovered column list which
//! a scan writes exactly once.

use crate::ast::QualifiedName;
use braid_core::{Columns, Error, Result};
use std::cell::OnceCell;

/// Arena index of an alias, equal to its tuple ordinal.
pub type AliasId = usize;

/// Kind of node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AliasKind {
    Root,
    Table,
    Function,
}

/// Columns an alias must provide.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnSet {
    /// Exactly these columns are referenced.
    Known(Vec<String>),
    /// Columns cannot be determined up front; fetch everything.
    Wildcard,
}

impl Default for ColumnSet {
    fn default() -> Self {
        ColumnSet::Known(Vec::new())
    }
}

impl ColumnSet {
    /// Adds a column, ignoring duplicates (ASCII case-insensitive).
    pub fn insert(&mut self, column: &str) {
        if let ColumnSet::Known(columns) = self {
            if !columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                columns.push(column.to_string());
            }
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ColumnSet::Wildcard)
    }

    pub fn contains(&self, column: &str) -> bool {
        match self {
            ColumnSet::Known(columns) => columns.iter().any(|c| c.eq_ignore_ascii_case(column)),
            ColumnSet::Wildcard => true,
        }
    }
}

/// One node of the alias tree.
#[derive(Debug)]
pub struct TableAlias {
    id: AliasId,
    name: String,
    table: QualifiedName,
    catalog_alias: Option<String>,
    kind: AliasKind,
    parent: Option<AliasId>,
    children: Vec<AliasId>,
    discovered: OnceCell<Columns>,
}

impl TableAlias {
    #[inline]
    pub fn id(&self) -> AliasId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &QualifiedName {
        &self.table
    }

    pub fn catalog_alias(&self) -> Option<&str> {
        self.catalog_alias.as_deref()
    }

    #[inline]
    pub fn kind(&self) -> AliasKind {
        self.kind
    }

    #[inline]
    pub fn parent(&self) -> Option<AliasId> {
        self.parent
    }

    pub fn children(&self) -> &[AliasId] {
        &self.children
    }

    /// Alias name comparison, ASCII case-insensitive. The root never matches.
    pub fn name_matches(&self, name: &str) -> bool {
        self.kind != AliasKind::Root && self.name.eq_ignore_ascii_case(name)
    }

    /// Columns reported by the first row the alias's scan produced.
    pub fn discovered_columns(&self) -> Option<&Columns> {
        self.discovered.get()
    }
}

/// The alias arena.
#[derive(Debug)]
pub struct TableAliasTree {
    aliases: Vec<TableAlias>,
}

impl TableAliasTree {
    /// Id of the root node.
    pub const ROOT: AliasId = 0;

    /// Starts a new tree containing only the root.
    pub fn builder() -> TableAliasTreeBuilder {
        TableAliasTreeBuilder::new()
    }

    /// Number of nodes, which is also the tuple width.
    #[inline]
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.aliases.len() <= 1
    }

    /// Returns the node for `id`.
    ///
    /// Ids come from this tree. An unknown id is a programming error: debug
    /// builds panic, release builds fall back to the root. Use
    /// [`TableAliasTree::try_get`] for ids of uncertain origin.
    pub fn get(&self, id: AliasId) -> &TableAlias {
        debug_assert!(id < self.aliases.len(), "alias id {} out of range ({} nodes)", id, self.aliases.len());
        self.aliases.get(id).unwrap_or(&self.aliases[Self::ROOT])
    }

    /// Returns the node for `id`, or None when this tree has no such node.
    pub fn try_get(&self, id: AliasId) -> Option<&TableAlias> {
        self.aliases.get(id)
    }

    /// All non-root aliases in id order.
    pub fn aliases(&self) -> impl Iterator<Item = &TableAlias> {
        self.aliases.iter().skip(1)
    }

    /// Child of `id` named `name`.
    pub fn find_child(&self, id: AliasId, name: &str) -> Option<AliasId> {
        self.get(id)
            .children
            .iter()
            .copied()
            .find(|c| self.get(*c).name_matches(name))
    }

    /// Ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: AliasId) -> impl Iterator<Item = AliasId> + '_ {
        std::iter::successors(self.get(id).parent, move |p| self.get(*p).parent)
    }

    /// `id` and every node below it.
    pub fn subtree(&self, id: AliasId) -> Vec<AliasId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            out.extend(self.get(out[i]).children.iter().copied());
            i += 1;
        }
        out
    }

    /// Descendants of `id` (excluding `id`) named `name`.
    pub fn descendants_named(&self, id: AliasId, name: &str) -> Vec<AliasId> {
        self.subtree(id)
            .into_iter()
            .skip(1)
            .filter(|d| self.get(*d).name_matches(name))
            .collect()
    }

    /// Finds an alias by name anywhere in the tree.
    pub fn by_name(&self, name: &str) -> Option<AliasId> {
        self.aliases().find(|a| a.name_matches(name)).map(|a| a.id)
    }

    /// Records the columns of the first row produced for `id`. Later calls
    /// are ignored; returns true if this call set them.
    pub fn set_discovered(&self, id: AliasId, columns: Columns) -> bool {
        match self.try_get(id) {
            Some(alias) => alias.discovered.set(columns).is_ok(),
            None => false,
        }
    }
}

/// Builds a [`TableAliasTree`], rejecting duplicate names.
#[derive(Debug)]
pub struct TableAliasTreeBuilder {
    aliases: Vec<TableAlias>,
}

impl Default for TableAliasTreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableAliasTreeBuilder {
    pub fn new() -> Self {
        Self {
            aliases: vec![TableAlias {
                id: TableAliasTree::ROOT,
                name: String::new(),
                table: QualifiedName::new(Vec::new()),
                catalog_alias: None,
                kind: AliasKind::Root,
                parent: None,
                children: Vec::new(),
                discovered: OnceCell::new(),
            }],
        }
    }

    /// Adds an alias under `parent`.
    ///
    /// Fails with `DuplicateAlias` when the name is already used by a sibling
    /// or by any node on the path from the root to `parent`.
    pub fn add(
        &mut self,
        parent: AliasId,
        name: &str,
        table: QualifiedName,
        catalog_alias: Option<&str>,
        kind: AliasKind,
    ) -> Result<AliasId> {
        if parent >= self.aliases.len() {
            return Err(Error::unknown_alias(name));
        }
        let sibling_clash = self.aliases[parent]
            .children
            .iter()
            .any(|c| self.aliases[*c].name_matches(name));
        let mut path_clash = false;
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            path_clash |= self.aliases[id].name_matches(name);
            cursor = self.aliases[id].parent;
        }
        if sibling_clash || path_clash {
            return Err(Error::duplicate_alias(name));
        }

        let id = self.aliases.len();
        self.aliases.push(TableAlias {
            id,
            name: name.to_string(),
            table,
            catalog_alias: catalog_alias.map(str::to_string),
            kind,
            parent: Some(parent),
            children: Vec::new(),
            discovered: OnceCell::new(),
        });
        self.aliases[parent].children.push(id);
        Ok(id)
    }

    pub fn build(self) -> TableAliasTree {
        TableAliasTree {
            aliases: self.aliases,
        }
    }
}
