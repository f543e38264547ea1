//! Predicate analysis.
//!
//! A predicate is split at its top-level AND boundaries into items. Each item
//! records which aliases its sides reference, so the builder can push
//! single-alias items into table sources, use equality items between two
//! aliases as join keys, and keep the rest as a residual filter.

use crate::alias::AliasId;
use crate::ast::{ComparisonOp, Expression, LogicalOp};
use crate::resolver::{AliasRefs, QualifiedNameResolver};
use std::collections::BTreeSet;

/// One side of an analyzed item.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzeSide {
    /// Aliases referenced anywhere in the side.
    pub refs: AliasRefs,
    /// Column name when the side is a plain `column` or `alias.column`.
    pub column: Option<String>,
    pub expression: Expression,
}

impl AnalyzeSide {
    fn new(resolver: &QualifiedNameResolver, scope: AliasId, expression: Expression) -> Self {
        let refs = resolver.aliases_of(scope, &expression);
        let column = expression
            .as_reference()
            .filter(|r| r.lambda_id.is_none() && r.name.len() <= 2)
            .map(|r| resolver.resolve_name(scope, r.name.parts()))
            .filter(|r| r.is_column() && refs.single() == r.alias)
            .and_then(|r| r.column);
        Self {
            refs,
            column,
            expression,
        }
    }

    /// The single alias of this side.
    pub fn alias(&self) -> Option<AliasId> {
        self.refs.single()
    }
}

/// An atomic conjunct of a predicate.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalyzeItem {
    /// The conjunct as written.
    pub predicate: Expression,
    /// Left side of an equality, or the whole conjunct otherwise.
    pub left: AnalyzeSide,
    /// Right side of an equality.
    pub right: Option<AnalyzeSide>,
    /// Comparison operator when the conjunct is a comparison.
    pub op: Option<ComparisonOp>,
}

impl AnalyzeItem {
    fn new(resolver: &QualifiedNameResolver, scope: AliasId, predicate: Expression) -> Self {
        match predicate.unwrap_nested() {
            Expression::Comparison { op, left, right } => {
                let op = *op;
                let left = AnalyzeSide::new(resolver, scope, (**left).clone());
                let right = AnalyzeSide::new(resolver, scope, (**right).clone());
                Self {
                    predicate,
                    left,
                    right: Some(right),
                    op: Some(op),
                }
            }
            _ => Self {
                left: AnalyzeSide::new(resolver, scope, predicate.clone()),
                predicate,
                right: None,
                op: None,
            },
        }
    }

    /// Every alias referenced by the item.
    pub fn refs(&self) -> AliasRefs {
        let mut refs = self.left.refs.clone();
        if let Some(right) = &self.right {
            refs.aliases.extend(right.refs.aliases.iter().copied());
            refs.unresolved |= right.refs.unresolved;
        }
        refs
    }

    /// True when every reference belongs to `alias`.
    pub fn is_single_alias(&self, alias: AliasId) -> bool {
        self.refs().single() == Some(alias)
    }

    /// True when the item references no alias at all.
    pub fn is_aliasless(&self) -> bool {
        self.refs().is_empty()
    }

    /// True when the item is an equality with exactly one side on `alias`
    /// and the other side on different aliases only.
    pub fn is_equi(&self, alias: AliasId) -> bool {
        self.equi_sides(alias).is_some()
    }

    fn equi_sides(&self, alias: AliasId) -> Option<(&AnalyzeSide, &AnalyzeSide)> {
        if self.op != Some(ComparisonOp::Eq) {
            return None;
        }
        let right = self.right.as_ref()?;
        let other_side = |side: &AnalyzeSide| {
            !side.refs.unresolved && !side.refs.aliases.is_empty() && !side.refs.aliases.contains(&alias)
        };
        if self.left.alias() == Some(alias) && other_side(right) {
            Some((&self.left, right))
        } else if right.alias() == Some(alias) && other_side(&self.left) {
            Some((right, &self.left))
        } else {
            None
        }
    }

    /// Splits the item into `column <op> value` when one side is a bare
    /// column of `alias` and the other side references no alias.
    pub fn column_comparison(&self, alias: AliasId) -> Option<(String, ComparisonOp, Expression)> {
        let op = self.op?;
        let right = self.right.as_ref()?;
        if self.left.alias() == Some(alias) && right.refs.is_empty() {
            let column = self.left.column.clone()?;
            Some((column, op, right.expression.clone()))
        } else if right.alias() == Some(alias) && self.left.refs.is_empty() {
            let column = right.column.clone()?;
            Some((column, op.flip(), self.left.expression.clone()))
        } else {
            None
        }
    }
}

/// An equality between an inner alias and other (outer) aliases.
#[derive(Clone, Debug, PartialEq)]
pub struct EquiItem {
    /// Side on the inner alias.
    pub inner: AnalyzeSide,
    /// Side on the other aliases.
    pub outer: AnalyzeSide,
    pub predicate: Expression,
}

/// Result of analyzing a predicate.
///
/// Extraction methods remove the items they return and rebuild
/// [`AnalyzeResult::predicate`] from what remains, so each item is handed
/// out at most once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalyzeResult {
    predicate: Option<Expression>,
    items: Vec<AnalyzeItem>,
}

impl AnalyzeResult {
    /// Analyzes `predicate` within `scope`.
    pub fn analyze(
        resolver: &QualifiedNameResolver,
        scope: AliasId,
        predicate: Option<&Expression>,
    ) -> Self {
        let Some(predicate) = predicate else {
            return Self::default();
        };
        let mut conjuncts = Vec::new();
        flatten_and(predicate, &mut conjuncts);
        let items = conjuncts
            .into_iter()
            .map(|c| AnalyzeItem::new(resolver, scope, c))
            .collect();
        Self {
            predicate: Some(predicate.clone()),
            items,
        }
    }

    /// The remaining predicate, None when every item was extracted.
    pub fn predicate(&self) -> Option<&Expression> {
        self.predicate.as_ref()
    }

    pub fn into_predicate(self) -> Option<Expression> {
        self.predicate
    }

    pub fn items(&self) -> &[AnalyzeItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Aliases referenced by the remaining items.
    pub fn aliases(&self) -> BTreeSet<AliasId> {
        self.items.iter().flat_map(|i| i.refs().aliases).collect()
    }

    /// Adds the items of `other`.
    pub fn merge(&mut self, other: AnalyzeResult) {
        if other.items.is_empty() {
            return;
        }
        self.items.extend(other.items);
        self.rebuild();
    }

    /// Removes and returns items referencing only `alias` (and, when
    /// `include_aliasless`, items referencing no alias).
    pub fn extract_pushdown_items(&mut self, alias: AliasId, include_aliasless: bool) -> Vec<AnalyzeItem> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|i| i.is_single_alias(alias) || (include_aliasless && i.is_aliasless()));
        self.items = kept;
        if !taken.is_empty() {
            self.rebuild();
        }
        taken
    }

    /// Same as [`AnalyzeResult::extract_pushdown_items`], ANDed into one
    /// expression.
    pub fn extract_pushdown_predicate(&mut self, alias: AliasId, include_aliasless: bool) -> Option<Expression> {
        let items = self.extract_pushdown_items(alias, include_aliasless);
        Expression::and_all(items.into_iter().map(|i| i.predicate))
    }

    /// Equality items joining `alias` with other aliases. Sides are
    /// normalized so `inner` is always the `alias` side.
    pub fn get_equi_items(&self, alias: AliasId) -> Vec<EquiItem> {
        self.items
            .iter()
            .filter_map(|i| {
                i.equi_sides(alias).map(|(inner, outer)| EquiItem {
                    inner: inner.clone(),
                    outer: outer.clone(),
                    predicate: i.predicate.clone(),
                })
            })
            .collect()
    }

    /// Removes and returns the equality items joining `alias` with aliases
    /// in `outer_aliases`.
    pub fn extract_equi_items(&mut self, alias: AliasId, outer_aliases: &BTreeSet<AliasId>) -> Vec<EquiItem> {
        let mut equi = Vec::new();
        let mut kept = Vec::new();
        for item in std::mem::take(&mut self.items) {
            match item.equi_sides(alias) {
                Some((inner, outer)) if outer.refs.aliases.is_subset(outer_aliases) => {
                    equi.push(EquiItem {
                        inner: inner.clone(),
                        outer: outer.clone(),
                        predicate: item.predicate.clone(),
                    });
                }
                _ => kept.push(item),
            }
        }
        self.items = kept;
        if !equi.is_empty() {
            self.rebuild();
        }
        equi
    }

    /// Removes and returns items whose aliases all lie in `available`.
    pub fn extract_covered(&mut self, available: &BTreeSet<AliasId>) -> Option<Expression> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|i| {
                let refs = i.refs();
                !refs.unresolved && refs.aliases.is_subset(available)
            });
        self.items = kept;
        if !taken.is_empty() {
            self.rebuild();
        }
        Expression::and_all(taken.into_iter().map(|i| i.predicate))
    }

    fn rebuild(&mut self) {
        self.predicate = Expression::and_all(self.items.iter().map(|i| i.predicate.clone()));
    }
}

fn flatten_and(expr: &Expression, out: &mut Vec<Expression>) {
    match expr.unwrap_nested() {
        Expression::Logical {
            op: LogicalOp::And,
            left,
            right,
        } => {
            flatten_and(left, out);
            flatten_and(right, out);
        }
        _ => out.push(expr.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::{AliasKind, TableAliasTree};
    use std::rc::Rc;

    // a = 1, b = 2
    fn resolver() -> QualifiedNameResolver {
        let mut b = TableAliasTree::builder();
        b.add(0, "a", "t".into(), None, AliasKind::Table).unwrap();
        b.add(0, "b", "u".into(), None, AliasKind::Table).unwrap();
        QualifiedNameResolver::new(Rc::new(b.build()))
    }

    fn col(s: &str) -> Expression {
        Expression::col(s)
    }

    fn lit(v: i32) -> Expression {
        Expression::lit(v)
    }

    #[test]
    fn test_extract_pushdown() {
        let r = resolver();
        let p = Expression::and_all(vec![
            Expression::eq(col("a.x"), lit(1)),
            Expression::eq(col("b.y"), lit(2)),
            Expression::gt(col("a.z"), lit(0)),
        ]);
        let mut result = AnalyzeResult::analyze(&r, 0, p.as_ref());
        assert_eq!(result.items().len(), 3);

        let pushed = result.extract_pushdown_predicate(1, false);
        assert_eq!(pushed.map(|e| e.to_string()), Some("a.x = 1 AND a.z > 0".to_string()));
        assert_eq!(result.predicate().map(|e| e.to_string()), Some("b.y = 2".to_string()));

        // one-shot
        assert!(result.extract_pushdown_predicate(1, false).is_none());
        let pushed = result.extract_pushdown_predicate(2, false);
        assert!(pushed.is_some());
        assert!(result.predicate().is_none());
    }

    #[test]
    fn test_or_is_opaque() {
        let r = resolver();
        let p = Expression::or(Expression::eq(col("a.x"), lit(1)), Expression::eq(col("b.y"), lit(2)));
        let mut result = AnalyzeResult::analyze(&r, 0, Some(&p));
        assert_eq!(result.items().len(), 1);
        assert!(result.extract_pushdown_items(1, false).is_empty());
        assert!(result.get_equi_items(1).is_empty());
    }

    #[test]
    fn test_nested_and_is_flattened() {
        let r = resolver();
        let p = Expression::and(
            Expression::nested(Expression::and(Expression::eq(col("a.x"), lit(1)), Expression::eq(col("a.y"), lit(2)))),
            Expression::eq(col("b.y"), lit(3)),
        );
        let result = AnalyzeResult::analyze(&r, 0, Some(&p));
        assert_eq!(result.items().len(), 3);
    }

    #[test]
    fn test_aliasless_items() {
        let r = resolver();
        let p = Expression::and(Expression::eq(Expression::var("v"), lit(1)), Expression::eq(col("b.y"), lit(2)));
        let mut result = AnalyzeResult::analyze(&r, 0, Some(&p));
        assert!(result.extract_pushdown_items(1, false).is_empty());
        assert_eq!(result.extract_pushdown_items(1, true).len(), 1);
    }

    #[test]
    fn test_equi_symmetry() {
        let r = resolver();
        for p in [
            Expression::eq(col("a.id"), col("b.id")),
            Expression::eq(col("b.id"), col("a.id")),
        ] {
            let result = AnalyzeResult::analyze(&r, 0, Some(&p));
            let equi = result.get_equi_items(2);
            assert_eq!(equi.len(), 1);
            assert_eq!(equi[0].outer.alias(), Some(1));
            assert_eq!(equi[0].inner.alias(), Some(2));
            assert_eq!(equi[0].inner.column.as_deref(), Some("id"));
        }
    }

    #[test]
    fn test_same_alias_equality_is_not_equi() {
        let r = resolver();
        let p = Expression::eq(col("a.x"), col("a.y"));
        let mut result = AnalyzeResult::analyze(&r, 0, Some(&p));
        assert!(result.get_equi_items(1).is_empty());
        assert_eq!(result.extract_pushdown_items(1, false).len(), 1);
    }

    #[test]
    fn test_expression_side_is_equi() {
        let r = resolver();
        let p = Expression::eq(Expression::add(col("a.x"), lit(1)), col("b.id"));
        let mut result = AnalyzeResult::analyze(&r, 0, Some(&p));
        let equi = result.get_equi_items(2);
        assert_eq!(equi.len(), 1);
        assert_eq!(equi[0].outer.column, None);
        assert_eq!(equi[0].outer.expression.to_string(), "a.x + 1");

        let outer: BTreeSet<AliasId> = [1].into_iter().collect();
        assert_eq!(result.extract_equi_items(2, &outer).len(), 1);
        assert!(result.predicate().is_none());
    }

    #[test]
    fn test_column_comparison() {
        let r = resolver();
        let p = Expression::lt(lit(5), col("a.x"));
        let result = AnalyzeResult::analyze(&r, 0, Some(&p));
        let (column, op, value) = result.items()[0].column_comparison(1).unwrap();
        assert_eq!(column, "x");
        assert_eq!(op, ComparisonOp::Gt);
        assert_eq!(value, lit(5));
    }

    #[test]
    fn test_unresolved_reference_stays_residual() {
        let r = resolver();
        let p = Expression::eq(col("mystery"), lit(1));
        let mut result = AnalyzeResult::analyze(&r, 0, Some(&p));
        assert!(result.extract_pushdown_items(1, true).is_empty());
        assert!(result.predicate().is_some());
    }
}
