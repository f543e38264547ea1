//! Index selection for join inner sides.

use crate::analyzer::EquiItem;
use crate::ast::Expression;
use crate::catalog::{Index, IndexColumns};

/// An index whose key is covered by equality items.
#[derive(Clone, Debug)]
pub(crate) struct IndexChoice {
    pub index: Index,
    /// Key columns in index order.
    pub columns: Vec<String>,
    /// Outer-side expression for each key column.
    pub key: Vec<Expression>,
    /// Positions of the equality items the key uses.
    pub used: Vec<usize>,
}

/// Picks the index with the most key columns covered by `equi`, ties going
/// to the index declared first.
///
/// A fixed index qualifies only when every key column is matched by an item
/// whose inner side is that bare column. A wildcard index takes every item
/// with a bare inner column, in item order.
pub(crate) fn choose_index(indices: Vec<Index>, equi: &[EquiItem]) -> Option<IndexChoice> {
    let mut best: Option<IndexChoice> = None;
    for index in indices {
        let Some(choice) = cover(index, equi) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| choice.columns.len() > b.columns.len()) {
            best = Some(choice);
        }
    }
    best
}

fn cover(index: Index, equi: &[EquiItem]) -> Option<IndexChoice> {
    let mut columns = Vec::new();
    let mut key = Vec::new();
    let mut used = Vec::new();
    match &index.columns {
        IndexColumns::Fixed(key_columns) => {
            if key_columns.is_empty() {
                return None;
            }
            for column in key_columns {
                let position = equi.iter().position(|item| {
                    item.inner
                        .column
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(column))
                })?;
                columns.push(column.clone());
                key.push(equi[position].outer.expression.clone());
                used.push(position);
            }
        }
        IndexColumns::Wildcard => {
            for (position, item) in equi.iter().enumerate() {
                if let Some(column) = &item.inner.column {
                    if columns.iter().any(|c: &String| c.eq_ignore_ascii_case(column)) {
                        continue;
                    }
                    columns.push(column.clone());
                    key.push(item.outer.expression.clone());
                    used.push(position);
                }
            }
            if columns.is_empty() {
                return None;
            }
        }
    }
    Some(IndexChoice {
        index,
        columns,
        key,
        used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::{AliasKind, TableAliasTree};
    use crate::analyzer::AnalyzeResult;
    use crate::ast::{Expression as E, QualifiedName};
    use crate::resolver::QualifiedNameResolver;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    fn equi(predicate: E) -> Vec<EquiItem> {
        let mut b = TableAliasTree::builder();
        b.add(0, "a", "t".into(), None, AliasKind::Table).unwrap();
        let inner = b.add(0, "b", "u".into(), None, AliasKind::Table).unwrap();
        let resolver = QualifiedNameResolver::new(Rc::new(b.build()));
        let mut pool = AnalyzeResult::analyze(&resolver, 0, Some(&predicate));
        pool.extract_equi_items(inner, &BTreeSet::from([1]))
    }

    fn table() -> QualifiedName {
        "u".into()
    }

    #[test]
    fn test_most_covered_wins() {
        let items = equi(E::and(
            E::eq(E::col("b.x"), E::col("a.x")),
            E::eq(E::col("b.y"), E::col("a.y")),
        ));
        let indices = vec![
            Index::fixed(table(), &["x"]),
            Index::fixed(table(), &["x", "y"]),
            Index::fixed(table(), &["y", "x"]),
        ];
        let choice = choose_index(indices, &items).unwrap();
        assert_eq!(choice.columns, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(choice.key, vec![E::col("a.x"), E::col("a.y")]);
    }

    #[test]
    fn test_partial_cover_rejected() {
        let items = equi(E::eq(E::col("b.x"), E::col("a.x")));
        assert!(choose_index(vec![Index::fixed(table(), &["x", "z"])], &items).is_none());
        let choice = choose_index(vec![Index::wildcard(table())], &items).unwrap();
        assert_eq!(choice.used, vec![0]);
    }
}
