//! Qualified-name resolution against the alias tree.
//!
//! A reference like `a.b.col` is resolved by walking the tree from a scope
//! alias: a part equal to the current alias's own name is consumed once, a
//! part naming a child descends into it. The first part that matches neither
//! is the column, anything after it is a path into the column's value.
//!
//! For the first part only, when nothing matches at the scope the walk
//! retries from each ancestor (outer references), then from a unique
//! descendant. A walk that ends at the root is attributed to the root's only
//! child when there is exactly one.

use crate::alias::{AliasId, ColumnSet, TableAliasTree};
use crate::ast::{Expression, LambdaId, QualifiedReference};
use hashbrown::HashMap;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Lambda parameter id to the alias it iterates.
pub type LambdaBindings = HashMap<LambdaId, AliasId>;

/// Outcome of resolving one reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedReference {
    /// Owning alias, None when the reference cannot be attributed.
    pub alias: Option<AliasId>,
    /// Column name, None when the reference denotes the alias itself.
    pub column: Option<String>,
    /// Parts after the column.
    pub path: Vec<String>,
    /// Lambda parameter this reference reads from, if any.
    pub lambda_id: Option<LambdaId>,
}

impl ResolvedReference {
    /// True when the reference names an alias rather than a column.
    pub fn is_alias(&self) -> bool {
        self.alias.is_some() && self.column.is_none()
    }

    /// True when the reference is a bare `alias.column` with no path.
    pub fn is_column(&self) -> bool {
        self.alias.is_some() && self.column.is_some() && self.path.is_empty()
    }
}

/// Aliases referenced anywhere inside an expression.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AliasRefs {
    pub aliases: BTreeSet<AliasId>,
    /// Some reference could not be attributed to an alias.
    pub unresolved: bool,
}

impl AliasRefs {
    /// The single alias referenced, if exactly one and nothing unresolved.
    pub fn single(&self) -> Option<AliasId> {
        if self.unresolved || self.aliases.len() != 1 {
            return None;
        }
        self.aliases.iter().next().copied()
    }

    /// No aliases and nothing unresolved.
    pub fn is_empty(&self) -> bool {
        !self.unresolved && self.aliases.is_empty()
    }
}

/// Resolves references and records which columns each alias must provide.
#[derive(Debug)]
pub struct QualifiedNameResolver {
    tree: Rc<TableAliasTree>,
    columns: HashMap<AliasId, ColumnSet>,
}

impl QualifiedNameResolver {
    pub fn new(tree: Rc<TableAliasTree>) -> Self {
        Self {
            tree,
            columns: HashMap::new(),
        }
    }

    pub fn tree(&self) -> &Rc<TableAliasTree> {
        &self.tree
    }

    /// Resolves `reference` from `scope`. Lambda-bound references start from
    /// the alias bound to their lambda id and drop their first part.
    pub fn resolve(
        &self,
        scope: AliasId,
        reference: &QualifiedReference,
        bindings: &LambdaBindings,
    ) -> ResolvedReference {
        let parts = reference.name.parts();
        match reference.lambda_id {
            Some(id) => match bindings.get(&id) {
                Some(&bound) => {
                    let rest = parts.get(1..).unwrap_or(&[]);
                    let (alias, consumed) = self.walk(bound, rest, true);
                    self.finish(alias, rest, consumed, Some(id))
                }
                None => ResolvedReference {
                    alias: None,
                    column: None,
                    path: parts.iter().skip(1).cloned().collect(),
                    lambda_id: Some(id),
                },
            },
            None => {
                let (alias, consumed) = self.walk(scope, parts, false);
                self.finish(alias, parts, consumed, None)
            }
        }
    }

    /// Resolves a plain dotted name from `scope`.
    pub fn resolve_name(&self, scope: AliasId, parts: &[String]) -> ResolvedReference {
        let (alias, consumed) = self.walk(scope, parts, false);
        self.finish(alias, parts, consumed, None)
    }

    fn walk(&self, start: AliasId, parts: &[String], start_consumed: bool) -> (AliasId, usize) {
        let tree = &self.tree;
        let mut current = start;
        let mut self_consumed = start_consumed;
        let mut index = 0;

        while let Some(part) = parts.get(index) {
            if !self_consumed && tree.get(current).name_matches(part) {
                self_consumed = true;
                index += 1;
                continue;
            }
            if let Some(child) = tree.find_child(current, part) {
                current = child;
                self_consumed = true;
                index += 1;
                continue;
            }
            if index == 0 && !start_consumed {
                if let Some(found) = self.fallback(current, part) {
                    current = found;
                    self_consumed = true;
                    index += 1;
                    continue;
                }
            }
            break;
        }
        (current, index)
    }

    fn fallback(&self, scope: AliasId, part: &str) -> Option<AliasId> {
        let tree = &self.tree;
        for ancestor in tree.ancestors(scope) {
            if tree.get(ancestor).name_matches(part) {
                return Some(ancestor);
            }
            if let Some(child) = tree.find_child(ancestor, part) {
                return Some(child);
            }
        }
        match tree.descendants_named(scope, part).as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    fn finish(
        &self,
        alias: AliasId,
        parts: &[String],
        consumed: usize,
        lambda_id: Option<LambdaId>,
    ) -> ResolvedReference {
        let column = parts.get(consumed).cloned();
        let path = parts.iter().skip(consumed + 1).cloned().collect();
        let alias = if alias == TableAliasTree::ROOT {
            match self.tree.get(TableAliasTree::ROOT).children() {
                [only] if column.is_some() => Some(*only),
                _ => None,
            }
        } else {
            Some(alias)
        };
        ResolvedReference {
            alias,
            column,
            path,
            lambda_id,
        }
    }

    /// Returns the alias `expr` denotes when it is a bare alias reference.
    pub fn lambda_target(
        &self,
        scope: AliasId,
        expr: &Expression,
        bindings: &LambdaBindings,
    ) -> Option<AliasId> {
        let reference = expr.as_reference()?;
        let resolved = self.resolve(scope, reference, bindings);
        if resolved.is_alias() {
            resolved.alias
        } else {
            None
        }
    }

    /// Calls `f` for every reference in `expr`, installing lambda bindings
    /// for function calls with lambda arguments while their bodies are
    /// visited.
    pub fn for_each_reference(
        &self,
        scope: AliasId,
        expr: &Expression,
        bindings: &mut LambdaBindings,
        f: &mut dyn FnMut(&ResolvedReference),
    ) {
        match expr {
            Expression::Reference(reference) => f(&self.resolve(scope, reference, bindings)),
            Expression::FunctionCall { args, .. }
                if args.iter().any(|a| matches!(a, Expression::Lambda { .. })) =>
            {
                let target = args
                    .iter()
                    .find(|a| !matches!(a, Expression::Lambda { .. }))
                    .and_then(|a| self.lambda_target(scope, a, bindings));
                for arg in args {
                    match arg {
                        Expression::Lambda {
                            lambda_ids, body, ..
                        } => {
                            let saved = bind(bindings, lambda_ids, target);
                            self.for_each_reference(scope, body, bindings, f);
                            unbind(bindings, saved);
                        }
                        other => self.for_each_reference(scope, other, bindings, f),
                    }
                }
            }
            other => {
                for child in other.children() {
                    self.for_each_reference(scope, child, bindings, f);
                }
            }
        }
    }

    /// Collects the aliases referenced anywhere in `expr`.
    pub fn aliases_of(&self, scope: AliasId, expr: &Expression) -> AliasRefs {
        let mut refs = AliasRefs::default();
        let mut bindings = LambdaBindings::new();
        self.for_each_reference(scope, expr, &mut bindings, &mut |r| match r.alias {
            Some(alias) => {
                refs.aliases.insert(alias);
            }
            // unbound lambda parameters read a value, not a column
            None if r.lambda_id.is_some() => {}
            None => refs.unresolved = true,
        });
        refs
    }

    /// Resolves every reference in `expr` and records the columns used.
    pub fn visit_expression(&mut self, scope: AliasId, expr: &Expression) {
        let mut resolved = Vec::new();
        let mut bindings = LambdaBindings::new();
        self.for_each_reference(scope, expr, &mut bindings, &mut |r| resolved.push(r.clone()));
        for r in &resolved {
            self.record(r);
        }
    }

    /// Records a `*` or `alias.*` select item.
    pub fn visit_asterisk(&mut self, scope: AliasId, alias: Option<&str>) {
        match alias {
            Some(name) => {
                let resolved = self.resolve_name(scope, &[name.to_string()]);
                match resolved.alias {
                    Some(alias) => self.mark_wildcard(alias),
                    None => self.mark_all_wildcard(),
                }
            }
            None => {
                for id in self.tree.subtree(scope) {
                    self.mark_wildcard(id);
                }
            }
        }
    }

    /// Records one resolved reference.
    pub fn record(&mut self, resolved: &ResolvedReference) {
        match (resolved.alias, &resolved.column) {
            (Some(alias), Some(column)) => self.columns.entry(alias).or_default().insert(column),
            (Some(alias), None) => self.mark_wildcard(alias),
            (None, _) if resolved.lambda_id.is_some() => {}
            (None, _) => self.mark_all_wildcard(),
        }
    }

    pub fn mark_wildcard(&mut self, alias: AliasId) {
        if alias != TableAliasTree::ROOT {
            self.columns.insert(alias, ColumnSet::Wildcard);
        }
    }

    fn mark_all_wildcard(&mut self) {
        let ids: Vec<AliasId> = self.tree.aliases().map(|a| a.id()).collect();
        for id in ids {
            self.mark_wildcard(id);
        }
    }

    /// Columns recorded so far for `alias`.
    pub fn columns(&self, alias: AliasId) -> ColumnSet {
        self.columns.get(&alias).cloned().unwrap_or_default()
    }
}

/// Binds each id to `target`, returning the previous bindings.
pub(crate) fn bind(
    bindings: &mut LambdaBindings,
    ids: &[LambdaId],
    target: Option<AliasId>,
) -> Vec<(LambdaId, Option<AliasId>)> {
    let Some(target) = target else {
        return Vec::new();
    };
    ids.iter().map(|id| (*id, bindings.insert(*id, target))).collect()
}

/// Restores bindings saved by [`bind`].
pub(crate) fn unbind(bindings: &mut LambdaBindings, saved: Vec<(LambdaId, Option<AliasId>)>) {
    for (id, previous) in saved {
        match previous {
            Some(alias) => bindings.insert(id, alias),
            None => bindings.remove(&id),
        };
    }
}
