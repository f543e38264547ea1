//! Property tests for predicate analysis: extraction hands every conjunct
//! out exactly once and sorts it into the right bucket.

use braid_query::alias::{AliasKind, TableAliasTree};
use braid_query::analyzer::AnalyzeResult;
use braid_query::ast::Expression as E;
use braid_query::resolver::QualifiedNameResolver;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::rc::Rc;

#[derive(Clone, Copy, Debug)]
enum Conjunct {
    OnA(i32),
    OnB(i32),
    Join,
    Constant(i32),
    Either(i32),
}

impl Conjunct {
    fn expression(self) -> E {
        match self {
            Conjunct::OnA(v) => E::gt(E::col("a.x"), E::lit(v)),
            Conjunct::OnB(v) => E::eq(E::lit(v), E::col("b.y")),
            Conjunct::Join => E::eq(E::col("b.y"), E::col("a.x")),
            Conjunct::Constant(v) => E::lt(E::lit(v), E::lit(10i32)),
            Conjunct::Either(v) => E::or(E::eq(E::col("a.x"), E::lit(v)), E::eq(E::col("b.y"), E::lit(v))),
        }
    }
}

fn conjunct() -> impl Strategy<Value = Conjunct> {
    prop_oneof![
        any::<i32>().prop_map(Conjunct::OnA),
        any::<i32>().prop_map(Conjunct::OnB),
        Just(Conjunct::Join),
        (0i32..20).prop_map(Conjunct::Constant),
        any::<i32>().prop_map(Conjunct::Either),
    ]
}

fn resolver() -> QualifiedNameResolver {
    let mut b = TableAliasTree::builder();
    b.add(0, "a", "t".into(), None, AliasKind::Table).unwrap();
    b.add(0, "b", "u".into(), None, AliasKind::Table).unwrap();
    QualifiedNameResolver::new(Rc::new(b.build()))
}

proptest! {
    #[test]
    fn prop_every_conjunct_extracted_once(conjuncts in prop::collection::vec(conjunct(), 1..12)) {
        let resolver = resolver();
        let predicate = E::and_all(conjuncts.iter().map(|c| c.expression())).unwrap();
        let mut pool = AnalyzeResult::analyze(&resolver, 0, Some(&predicate));
        prop_assert_eq!(pool.items().len(), conjuncts.len());

        let on_a = pool.extract_pushdown_items(1, true);
        let on_b = pool.extract_pushdown_items(2, false);
        let equi = pool.extract_equi_items(2, &BTreeSet::from([1]));
        let rest = pool.extract_covered(&BTreeSet::from([1, 2]));

        let count = |f: fn(&Conjunct) -> bool| conjuncts.iter().filter(|c| f(c)).count();
        prop_assert_eq!(on_a.len(), count(|c| matches!(c, Conjunct::OnA(_) | Conjunct::Constant(_))));
        prop_assert_eq!(on_b.len(), count(|c| matches!(c, Conjunct::OnB(_))));
        prop_assert_eq!(equi.len(), count(|c| matches!(c, Conjunct::Join)));
        prop_assert_eq!(rest.is_some(), count(|c| matches!(c, Conjunct::Either(_))) > 0);

        for item in &equi {
            prop_assert_eq!(item.inner.column.as_deref(), Some("y"));
            prop_assert_eq!(&item.outer.expression, &E::col("a.x"));
        }
        prop_assert!(pool.is_empty());
        prop_assert!(pool.predicate().is_none());
    }

    #[test]
    fn prop_extraction_keeps_predicate_in_sync(conjuncts in prop::collection::vec(conjunct(), 1..12)) {
        let resolver = resolver();
        let predicate = E::and_all(conjuncts.iter().map(|c| c.expression())).unwrap();
        let mut pool = AnalyzeResult::analyze(&resolver, 0, Some(&predicate));
        pool.extract_pushdown_items(1, false);

        let rebuilt = AnalyzeResult::analyze(&resolver, 0, pool.predicate());
        prop_assert_eq!(rebuilt.items().len(), pool.items().len());
        prop_assert!(pool.items().iter().all(|i| !i.is_single_alias(1)));
    }
}
