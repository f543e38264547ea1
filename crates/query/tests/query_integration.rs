//! End-to-end tests: build queries, compile them against in-memory catalogs
//! and check the rows a writer receives.

mod support;

use braid_core::{Error, Value};
use braid_query::ast::{Expression as E, Join, Select, SelectItem, SortItem, Statement, TableSource};
use braid_query::executor::{InMemoryTemporaryTables, TemporaryTableKey};
use braid_query::{Engine, EngineConfig, ExecutionContext, MemoryCatalog, MemoryTable, Session};
use serde_json::json;
use std::rc::Rc;
use std::time::Duration;
use support::{company, company_unindexed, RecordingWriter};

fn engine_with(config: EngineConfig, catalog: MemoryCatalog) -> (Engine, Rc<MemoryCatalog>) {
    let catalog = Rc::new(catalog);
    let mut engine = Engine::new(config.with_default_catalog("company"));
    engine.register_catalog("company", catalog.clone());
    (engine, catalog)
}

fn engine() -> (Engine, Rc<MemoryCatalog>) {
    engine_with(EngineConfig::default(), company())
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new(Rc::new(Session::new()))
}

fn users_with_dept(join: fn(TableSource, E) -> Join) -> Select {
    Select::new(vec![
        SelectItem::expr(E::col("u.name")),
        SelectItem::expr(E::col("d.title")),
    ])
    .from(TableSource::table("users").alias("u"))
    .join(join(TableSource::table("depts").alias("d"), E::eq(E::col("d.id"), E::col("u.dept_id"))))
    .order_by(vec![SortItem::asc(E::col("u.id"))])
}

#[test]
fn test_filter_and_order() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("name"))])
        .from(TableSource::table("users"))
        .filter(E::gt(E::col("age"), E::lit(30i32)))
        .order_by(vec![SortItem::desc(E::col("name"))]);
    let mut writer = RecordingWriter::new();
    let rows = engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(rows, 2);
    assert_eq!(writer.columns(), ["name".to_string()]);
    assert_eq!(writer.field("name"), vec![json!("cy"), json!("ann")]);
}

#[test]
fn test_single_row_without_from() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::named(E::add(E::lit(1i32), E::lit(2i32)), "three")]);
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.rows(), [json!({"three": 3})]);
}

#[test]
fn test_inner_join_seeks_once_per_key() {
    let (engine, catalog) = engine();
    let query = engine.compile(&users_with_dept(Join::inner)).unwrap();
    let plan = query.explain();
    assert!(plan.contains("MemorySeek depts"), "{}", plan);
    assert!(plan.contains("Cache"), "{}", plan);

    let mut writer = RecordingWriter::new();
    query.run(&mut ctx(), &mut writer).unwrap();
    assert_eq!(
        writer.rows(),
        [
            json!({"name": "ann", "title": "eng"}),
            json!({"name": "bob", "title": "ops"}),
            json!({"name": "cy", "title": "eng"}),
        ]
    );
    // one users scan, then one seek per distinct non-null dept_id (10, 20, 30)
    assert_eq!(catalog.opens(), 4);
}

#[test]
fn test_left_join_keeps_unmatched() {
    let (engine, _) = engine();
    let mut writer = RecordingWriter::new();
    engine
        .execute(&users_with_dept(Join::left), &mut ctx(), &mut writer)
        .unwrap();
    assert_eq!(
        writer.field("title"),
        vec![json!("eng"), json!("ops"), json!("eng"), json!(null), json!(null)]
    );
}

#[test]
fn test_strategies_agree() {
    let engines = [
        engine().0,
        engine_with(EngineConfig::default(), company_unindexed()).0,
        engine_with(EngineConfig::default().with_hash_join(true), company_unindexed()).0,
        engine_with(
            EngineConfig::default().with_cache_inner(false).with_push_sort_items(false),
            company_unindexed(),
        )
        .0,
    ];
    assert!(engines[2].compile(&users_with_dept(Join::inner)).unwrap().explain().contains("HashJoin"));

    for join in [Join::inner as fn(TableSource, E) -> Join, Join::left] {
        let results: Vec<Vec<serde_json::Value>> = engines
            .iter()
            .map(|engine| {
                let mut writer = RecordingWriter::new();
                engine.execute(&users_with_dept(join), &mut ctx(), &mut writer).unwrap();
                writer.rows().to_vec()
            })
            .collect();
        assert!(results.windows(2).all(|w| w[0] == w[1]), "{:?}", results);
    }
}

#[test]
fn test_where_on_inner_alias() {
    let (engine, _) = engine();
    let select = users_with_dept(Join::inner).filter(E::eq(E::col("d.title"), E::lit("eng")));
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.field("name"), vec![json!("ann"), json!("cy")]);
}

#[test]
fn test_populate_with_nested_array() {
    let (engine, _) = engine();
    let select = Select::new(vec![
        SelectItem::expr(E::col("d.title")),
        SelectItem::array("names", Some(E::col("u")), vec![SelectItem::expr(E::col("u.name"))]),
    ])
    .from(TableSource::table("depts").alias("d"))
    .join(Join::inner(TableSource::table("users").alias("u"), E::eq(E::col("u.dept_id"), E::col("d.id"))).populate())
    .order_by(vec![SortItem::asc(E::col("d.id"))]);
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(
        writer.rows(),
        [
            json!({"title": "eng", "names": ["ann", "cy"]}),
            json!({"title": "ops", "names": ["bob"]}),
        ]
    );
}

#[test]
fn test_populate_left_keeps_empty_groups() {
    let (engine, _) = engine();
    let select = Select::new(vec![
        SelectItem::expr(E::col("d.title")),
        SelectItem::named(E::call("count", vec![E::col("u")]), "staff"),
    ])
    .from(TableSource::table("depts").alias("d"))
    .join(Join::left(TableSource::table("users").alias("u"), E::eq(E::col("u.dept_id"), E::col("d.id"))).populate())
    .order_by(vec![SortItem::asc(E::col("d.id"))]);
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.field("title"), vec![json!("eng"), json!("ops"), json!("hr")]);
    assert_eq!(writer.field("staff"), vec![json!(2), json!(1), json!(0)]);
}

#[test]
fn test_cross_apply_range() {
    let (engine, _) = engine();
    let select = Select::new(vec![
        SelectItem::expr(E::col("u.name")),
        SelectItem::expr(E::col("r.Value")),
    ])
    .from(TableSource::table("users").alias("u"))
    .join(Join::cross_apply(TableSource::function("range", vec![E::lit(1i32), E::col("u.id")]).alias("r")))
    .filter(E::le(E::col("u.id"), E::lit(3i32)));
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(
        writer.rows(),
        [
            json!({"name": "bob", "Value": 1}),
            json!({"name": "cy", "Value": 1}),
            json!({"name": "cy", "Value": 2}),
        ]
    );
}

#[test]
fn test_outer_apply_keeps_outer() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("u.name")), SelectItem::expr(E::col("r.Value"))])
        .from(TableSource::table("users").alias("u"))
        .join(Join::outer_apply(TableSource::function("range", vec![E::lit(1i32), E::col("u.id")]).alias("r")))
        .filter(E::le(E::col("u.id"), E::lit(2i32)));
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(
        writer.rows(),
        [json!({"name": "ann", "Value": null}), json!({"name": "bob", "Value": 1})]
    );
}

#[test]
fn test_group_by_count() {
    let (engine, _) = engine();
    let select = Select::new(vec![
        SelectItem::expr(E::col("dept_id")),
        SelectItem::named(E::call("count", vec![]), "n"),
    ])
    .from(TableSource::table("users"))
    .filter(E::is_not_null(E::col("dept_id")))
    .group_by(vec![E::col("dept_id")])
    .order_by(vec![SortItem::asc(E::col("dept_id"))]);
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(
        writer.rows(),
        [
            json!({"dept_id": 10, "n": 2}),
            json!({"dept_id": 20, "n": 1}),
            json!({"dept_id": 30, "n": 1}),
        ]
    );
}

#[test]
fn test_top() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("id"))])
        .from(TableSource::table("users"))
        .order_by(vec![SortItem::desc(E::col("age"))])
        .top(E::lit(2i32));
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.field("id"), vec![json!(3), json!(1)]);
}

#[test]
fn test_asterisk_columns_after_first_row() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::asterisk(None)])
        .from(TableSource::table("depts"))
        .filter(E::eq(E::col("id"), E::lit(20i32)));
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.columns(), ["id".to_string(), "title".to_string()]);
    assert_eq!(writer.rows(), [json!({"id": 20, "title": "ops"})]);
}

#[test]
fn test_columns_final_after_discovery() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::asterisk(None)]).from(TableSource::table("depts").alias("d"));
    let query = engine.compile(&select).unwrap();
    assert_eq!(query.columns(), ["d.*".to_string()]);

    query.run(&mut ctx(), &mut RecordingWriter::new()).unwrap();
    assert_eq!(query.columns(), ["id".to_string(), "title".to_string()]);
    query.run(&mut ctx(), &mut RecordingWriter::new()).unwrap();
    assert_eq!(query.columns(), ["id".to_string(), "title".to_string()]);
}

#[test]
fn test_pushdown_round_trip() {
    let mut t = MemoryTable::new("t", &["id"]);
    for id in [4i32, 5, 6] {
        t.push(vec![Value::Int32(id)]);
    }
    let mut u = MemoryTable::new("u", &["id", "flag"]);
    for (id, flag) in [(5i32, true), (5, false), (6, true)] {
        u.push(vec![Value::Int32(id), Value::Boolean(flag)]);
    }
    let (engine, _) = engine_with(EngineConfig::default(), MemoryCatalog::new("company").with_table(t).with_table(u));

    let select = Select::new(vec![
        SelectItem::named(E::col("a.id"), "a_id"),
        SelectItem::named(E::col("b.id"), "b_id"),
        SelectItem::expr(E::col("b.flag")),
    ])
    .from(TableSource::table("t").alias("a"))
    .join(Join::inner(TableSource::table("u").alias("b"), E::eq(E::col("a.id"), E::col("b.id"))))
    .filter(E::and(
        E::eq(E::col("a.id"), E::lit(5i32)),
        E::eq(E::col("b.flag"), E::lit(true)),
    ));
    let query = engine.compile(&select).unwrap();
    let plan = query.explain();
    assert!(plan.contains("MemoryScan t as a where a.id = 5"), "{}", plan);
    assert!(plan.contains("MemoryScan u as b where b.flag = true"), "{}", plan);
    let join = plan.lines().find(|l| l.contains("Join")).unwrap();
    assert!(join.ends_with("on [a.id] = [b.id]"), "{}", plan);
    assert!(!join.contains(" where "), "{}", plan);
    assert!(!plan.contains("Filter"), "{}", plan);

    let mut writer = RecordingWriter::new();
    assert_eq!(query.run(&mut ctx(), &mut writer).unwrap(), 1);
    assert_eq!(writer.rows(), [json!({"a_id": 5, "b_id": 5, "flag": true})]);
}

#[test]
fn test_sys_tables() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("name"))])
        .from(TableSource::table("sys.tables"))
        .filter(E::eq(E::col("catalog"), E::lit("company")))
        .order_by(vec![SortItem::asc(E::col("name"))]);
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.field("name"), vec![json!("depts"), json!("users")]);

    let select = Select::new(vec![SelectItem::expr(E::col("name"))])
        .from(TableSource::table("sys.columns"))
        .filter(E::eq(E::col("table"), E::lit("depts")))
        .order_by(vec![SortItem::asc(E::col("ordinal"))]);
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.field("name"), vec![json!("id"), json!("title")]);
}

#[test]
fn test_sys_functions_lists_builtins() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("kind"))])
        .from(TableSource::table("sys.functions"))
        .filter(E::eq(E::col("name"), E::lit("count")));
    let mut writer = RecordingWriter::new();
    engine.execute(&select, &mut ctx(), &mut writer).unwrap();
    assert_eq!(writer.field("kind"), vec![json!("aggregate")]);
}

#[test]
fn test_batch_variables() {
    let (engine, _) = engine();
    let statements = vec![
        Statement::SetVariable {
            name: "@min_age".into(),
            value: E::lit(30i32),
        },
        Statement::Select(
            Select::new(vec![SelectItem::expr(E::col("name"))])
                .from(TableSource::table("users"))
                .filter(E::gt(E::col("age"), E::var("@min_age")))
                .order_by(vec![SortItem::asc(E::col("name"))]),
        ),
        Statement::Select(Select::new(vec![SelectItem::named(E::var("@min_age"), "min")])),
    ];
    let mut writer = RecordingWriter::new();
    let counts = engine.execute_batch(&statements, &mut ctx(), &mut writer).unwrap();
    assert_eq!(counts, vec![2, 1]);
    assert_eq!(writer.result_sets.len(), 2);
    assert_eq!(writer.result_sets[0].rows, vec![json!({"name": "ann"}), json!({"name": "cy"})]);
    assert_eq!(writer.result_sets[1].rows, vec![json!({"min": 30})]);
}

#[test]
fn test_missing_credentials_then_retry() {
    let (engine, _) = engine_with(EngineConfig::default(), company().with_required_property("token"));
    let select = Select::new(vec![SelectItem::expr(E::col("name"))]).from(TableSource::table("users"));
    let query = engine.compile(&select).unwrap();

    let mut ctx = ctx();
    let err = query.run(&mut ctx, &mut RecordingWriter::new()).err().unwrap();
    assert!(err.is_retryable());
    assert!(matches!(&err, Error::MissingCredentials { alias, .. } if alias == "company"));

    ctx.set_session(Rc::new(Session::new().with_property("company", "token", "s3cret")));
    let mut writer = RecordingWriter::new();
    assert_eq!(query.run(&mut ctx, &mut writer).unwrap(), 5);
}

#[test]
fn test_compile_errors() {
    let (engine, catalog) = engine();

    let duplicate = Select::new(vec![SelectItem::asterisk(None)])
        .from(TableSource::table("users").alias("x"))
        .join(Join::inner(TableSource::table("depts").alias("X"), E::lit(true)));
    assert!(matches!(engine.compile(&duplicate), Err(Error::DuplicateAlias { .. })));

    let unknown_catalog = Select::new(vec![SelectItem::asterisk(None)])
        .from(TableSource::table("users").catalog("elsewhere"));
    assert!(matches!(engine.compile(&unknown_catalog), Err(Error::CatalogNotFound { .. })));

    let unknown_table = Select::new(vec![SelectItem::asterisk(None)]).from(TableSource::table("orders"));
    assert!(matches!(engine.compile(&unknown_table), Err(Error::MissingOperatorFactory { .. })));

    let bad_option = Select::new(vec![SelectItem::asterisk(None)])
        .from(TableSource::table("users").option("fetch_size", E::lit(10i32)));
    let err = engine.compile(&bad_option).err().unwrap();
    assert!(matches!(err, Error::UnsupportedOption { .. }));
    assert!(!err.is_retryable());

    let unknown_function = Select::new(vec![SelectItem::expr(E::call("nope", vec![]))]);
    assert!(matches!(engine.compile(&unknown_function), Err(Error::UnknownFunction { .. })));

    // nothing ran
    assert_eq!(catalog.opens(), 0);
}

#[test]
fn test_table_option_limits_rows() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("id"))])
        .from(TableSource::table("users").option("max_rows", E::lit(2i32)));
    let mut writer = RecordingWriter::new();
    assert_eq!(engine.execute(&select, &mut ctx(), &mut writer).unwrap(), 2);
}

#[test]
fn test_abort() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("id"))]).from(TableSource::table("users"));
    let mut ctx = ctx().with_abort(|| true);
    let mut writer = RecordingWriter::new();
    let err = engine.execute(&select, &mut ctx, &mut writer).err().unwrap();
    assert!(matches!(err, Error::Aborted));
    assert!(writer.result_sets.is_empty());
}

#[test]
fn test_temporary_table() {
    let (engine, _) = engine();
    let select = Select::new(vec![SelectItem::expr(E::col("title"))])
        .from(TableSource::table("depts"))
        .order_by(vec![SortItem::asc(E::col("id"))]);
    let query = engine.compile(&select).unwrap();
    let mut tables = InMemoryTemporaryTables::new();

    let key = TemporaryTableKey::new("Titles", 1i32);
    let stored = query.runner().materialize(&mut ctx(), &mut tables, &key).unwrap();
    assert_eq!(stored, 3);
    let table = tables.get("titles", &Value::Int32(1)).unwrap();
    assert_eq!(table.columns, vec!["title".to_string()]);
    assert_eq!(table.rows[2].1, vec![Value::from("hr")]);

    let expired = TemporaryTableKey::new("stale", 1i32).with_ttl(Duration::ZERO);
    query.runner().materialize(&mut ctx(), &mut tables, &expired).unwrap();
    assert!(tables.get("stale", &Value::Int32(1)).is_none());
    assert_eq!(tables.len(), 1);
}
