//! Operator builder.
//!
//! Turns a [`Select`] into an operator tree in one pass:
//!
//! 1. Build the alias tree. The FROM source and every non-populating join
//!    hang off the root; populating joins hang off the FROM source.
//! 2. Resolve every expression once so each alias knows which columns it
//!    must provide.
//! 3. Analyze WHERE into a predicate pool. Each table source takes the items
//!    it may enforce and offers them to its catalog; whatever the catalog
//!    hands back is wrapped in an explicit filter.
//! 4. Pick a join strategy per join: index seek when a catalog index is
//!    covered by the join's equality items, hash join for uncorrelated equi
//!    joins when enabled, nested loop otherwise.
//! 5. Add the remaining WHERE filter, GROUP BY, ORDER BY and TOP.

use super::index::{choose_index, IndexChoice};
use crate::alias::{AliasId, AliasKind, TableAliasTree, TableAliasTreeBuilder};
use crate::analyzer::{AnalyzeItem, AnalyzeResult};
use crate::ast::{Expression, Join, QualifiedName, Select, SelectItem, SortItem, TableSource};
use crate::catalog::{
    Catalog, CatalogRegistry, ColumnComparison, PushdownPredicate, PushdownSortItem, ScanRequest,
    SeekRequest, SystemCatalog, TableOptionValue, TableSourceRef, SYSTEM_SCHEMA,
};
use crate::compiler::{
    CompiledSortItem, ExpressionCompiler, FunctionRegistry, OutputWriter, ProjectionWriter,
    SeekKeyFactory,
};
use crate::config::EngineConfig;
use crate::context::{ExecutionContext, NodeId};
use crate::executor::{
    explain, CachingOperator, FilterOperator, GroupOperator, HashJoin, JoinCore, JoinKeys,
    NestedLoopJoin, Operator, QueryRunner, SingleRowOperator, SortOperator, TableSourceOperator,
    TopOperator,
};
use crate::resolver::{LambdaBindings, QualifiedNameResolver};
use braid_core::{Error, Result};
use std::collections::BTreeSet;
use std::rc::Rc;
use tracing::debug;

const ROOT: AliasId = TableAliasTree::ROOT;

/// A query ready to run. Reusable across executions on the same thread.
pub struct CompiledQuery {
    operator: Rc<dyn Operator>,
    projection: Rc<ProjectionWriter>,
    tree: Rc<TableAliasTree>,
}

impl CompiledQuery {
    pub fn operator(&self) -> &Rc<dyn Operator> {
        &self.operator
    }

    pub fn projection(&self) -> &Rc<ProjectionWriter> {
        &self.projection
    }

    pub fn tree(&self) -> &Rc<TableAliasTree> {
        &self.tree
    }

    /// Output column names as currently known.
    ///
    /// Named items are fixed at compile time. A `*` item reads `alias.*`
    /// until its table source yields a first row; after that it lists the
    /// discovered columns and stays final for every later run.
    pub fn columns(&self) -> Vec<String> {
        self.projection.columns()
    }

    /// The operator tree, one node per line.
    pub fn explain(&self) -> String {
        explain(self.operator.as_ref())
    }

    pub fn runner(&self) -> QueryRunner {
        QueryRunner::new(self.operator.clone(), self.projection.clone())
    }

    /// Runs the query into `writer`, returning the number of rows written.
    /// Caches and node counters of a previous run are dropped first.
    pub fn run(&self, ctx: &mut ExecutionContext, writer: &mut dyn OutputWriter) -> Result<u64> {
        ctx.begin_statement();
        self.runner().run(ctx, writer)
    }
}

/// Alias ids of the FROM source and of each join, in declaration order.
struct SourceIds {
    first: AliasId,
    joins: Vec<AliasId>,
}

/// What one table source step produced.
struct SourcePlan {
    operator: Rc<dyn Operator>,
    /// The catalog consumed every sort item offered.
    sorted: bool,
}

/// Builds operator trees against a set of catalogs.
pub struct OperatorBuilder<'a> {
    catalogs: &'a CatalogRegistry,
    functions: &'a FunctionRegistry,
    config: &'a EngineConfig,
    next_id: NodeId,
}

impl<'a> OperatorBuilder<'a> {
    pub fn new(catalogs: &'a CatalogRegistry, functions: &'a FunctionRegistry, config: &'a EngineConfig) -> Self {
        Self {
            catalogs,
            functions,
            config,
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Compiles `select`. Fails before any row is read when an alias is
    /// duplicated, a catalog is missing, or a catalog cannot build a source.
    pub fn build(&mut self, select: &Select) -> Result<CompiledQuery> {
        let (tree, ids) = build_tree(select)?;
        let tree = Rc::new(tree);
        let mut resolver = QualifiedNameResolver::new(tree.clone());
        visit_select(&mut resolver, select);
        let mut compiler = ExpressionCompiler::new(&resolver, self.functions);
        let mut pool = AnalyzeResult::analyze(&resolver, ROOT, select.where_clause.as_ref());

        let (mut operator, sorted) = match (&select.from, ids) {
            (Some(from), Some(ids)) => {
                let sort_items: &[SortItem] = if self.sort_pushable(select, ids.first, &resolver) {
                    select.order_by.as_slice()
                } else {
                    &[]
                };
                let items = pool.extract_pushdown_items(ids.first, true);
                let catalog = self.catalog_for(&from.source)?;
                let plan = self.table_source(
                    &from.source,
                    ids.first,
                    items,
                    sort_items,
                    None,
                    catalog,
                    &resolver,
                    &mut compiler,
                )?;
                let mut operator = plan.operator;
                let mut available = BTreeSet::from([ids.first]);
                for (join, inner) in from.joins.iter().zip(ids.joins) {
                    operator = self.join(operator, join, inner, &available, &mut pool, &resolver, &mut compiler)?;
                    available.insert(inner);
                }
                (operator, plan.sorted)
            }
            _ => (
                Rc::new(SingleRowOperator::new(self.next_id(), tree.len())) as Rc<dyn Operator>,
                false,
            ),
        };

        if let Some(predicate) = pool.into_predicate() {
            let predicate = compiler.compile_predicate(&predicate)?;
            operator = Rc::new(FilterOperator::new(self.next_id(), operator, vec![predicate]));
        }
        if !select.group_by.is_empty() {
            let keys = compiler.compile_hash(&select.group_by)?;
            operator = Rc::new(GroupOperator::new(self.next_id(), operator, keys, tree.len()));
        }
        if !select.order_by.is_empty() && !sorted {
            let items = compiler.compile_sort_items(&select.order_by)?;
            operator = Rc::new(SortOperator::new(self.next_id(), operator, items));
        }
        if let Some(top) = &select.top {
            let count = compiler.compile(top)?;
            operator = Rc::new(TopOperator::new(self.next_id(), operator, count));
        }
        let projection = compiler.compile_projection(&select.items)?;
        debug!(nodes = self.next_id, aliases = tree.len() - 1, "query compiled");

        Ok(CompiledQuery {
            operator,
            projection: Rc::new(projection),
            tree,
        })
    }

    /// ORDER BY can go to the first source when nothing between it and the
    /// sort reorders tuples and every sort key belongs to that source.
    fn sort_pushable(&self, select: &Select, first: AliasId, resolver: &QualifiedNameResolver) -> bool {
        if !self.config.push_sort_items || !select.group_by.is_empty() || select.order_by.is_empty() {
            return false;
        }
        resolver.tree().len() == 2
            || select
                .order_by
                .iter()
                .all(|item| resolver.aliases_of(ROOT, &item.expression).single() == Some(first))
    }

    fn catalog_for(&self, source: &TableSource) -> Result<(String, Rc<dyn Catalog>)> {
        if let TableSource::Table {
            catalog: None, name, ..
        } = source
        {
            if name.len() > 1 && name.part_matches(0, SYSTEM_SCHEMA) {
                let system = SystemCatalog::new(self.catalogs.entries(), self.functions.clone());
                return Ok((SYSTEM_SCHEMA.to_string(), Rc::new(system)));
            }
        }
        let alias = source.catalog_alias().or(self.config.default_catalog.as_deref());
        self.catalogs.resolve(alias)
    }

    #[allow(clippy::too_many_arguments)]
    fn table_source(
        &mut self,
        source: &TableSource,
        alias: AliasId,
        items: Vec<AnalyzeItem>,
        sort_items: &[SortItem],
        seek: Option<(IndexChoice, SeekKeyFactory)>,
        (catalog_alias, catalog): (String, Rc<dyn Catalog>),
        resolver: &QualifiedNameResolver,
        compiler: &mut ExpressionCompiler<'_>,
    ) -> Result<SourcePlan> {
        let tree = resolver.tree();
        let node = tree.get(alias);

        let mut predicates = Vec::with_capacity(items.len());
        for item in &items {
            let comparison = match item.column_comparison(alias) {
                Some((column, op, value)) => Some(ColumnComparison {
                    column,
                    op,
                    value: compiler.compile(&value)?,
                }),
                None => None,
            };
            predicates.push(PushdownPredicate {
                predicate: compiler.compile_predicate(&item.predicate)?,
                comparison,
            });
        }
        let mut sort = Vec::with_capacity(sort_items.len());
        for item in sort_items {
            sort.push(PushdownSortItem {
                item: CompiledSortItem {
                    key: compiler.compile(&item.expression)?,
                    order: item.order,
                    null_order: item.null_order,
                },
                column: sort_column(resolver, alias, &item.expression),
            });
        }
        let mut options = Vec::new();
        for option in source.options() {
            options.push(TableOptionValue {
                name: option.name.clone(),
                value: compiler.compile(&option.value)?,
            });
        }
        let arguments = match source {
            TableSource::Function { args, .. } => args.iter().map(|a| compiler.compile(a)).collect::<Result<Vec<_>>>()?,
            TableSource::Table { .. } => Vec::new(),
        };

        let request = ScanRequest {
            source: TableSourceRef {
                catalog_alias,
                table: node.table().clone(),
                alias: node.name().to_string(),
                alias_id: alias,
                kind: node.kind(),
                width: tree.len(),
                node_id: self.next_id(),
            },
            columns: resolver.columns(alias),
            predicates,
            sort_items: sort,
            options,
            arguments,
        };
        let offered = (request.predicates.len(), request.sort_items.len());
        let response = match seek {
            Some((choice, seek_key)) => {
                let mut index = choice.index;
                index.batch_size.get_or_insert(self.config.default_batch_size);
                catalog.build_seek(SeekRequest {
                    scan: request,
                    index,
                    seek_key,
                })?
            }
            None => catalog.build_scan(request)?,
        };
        debug!(
            alias = node.name(),
            catalog = catalog.name(),
            predicates = offered.0,
            predicates_left = response.remaining_predicates.len(),
            sort_items = offered.1,
            sort_items_left = response.remaining_sort_items.len(),
            "table source negotiated"
        );

        let sorted = offered.1 > 0 && response.remaining_sort_items.is_empty();
        let mut operator: Rc<dyn Operator> = Rc::new(TableSourceOperator::new(response.operator, tree.clone(), alias));
        if !response.remaining_predicates.is_empty() {
            let remaining = response.remaining_predicates.into_iter().map(|p| p.predicate).collect();
            operator = Rc::new(FilterOperator::new(self.next_id(), operator, remaining));
        }
        Ok(SourcePlan { operator, sorted })
    }

    #[allow(clippy::too_many_arguments)]
    fn join(
        &mut self,
        outer: Rc<dyn Operator>,
        join: &Join,
        inner: AliasId,
        available: &BTreeSet<AliasId>,
        pool: &mut AnalyzeResult,
        resolver: &QualifiedNameResolver,
        compiler: &mut ExpressionCompiler<'_>,
    ) -> Result<Rc<dyn Operator>> {
        let tree = resolver.tree();
        let name = tree.get(inner).name().to_string();
        let mut condition = AnalyzeResult::analyze(resolver, ROOT, join.condition());

        // WHERE items only move into joins that cannot change which outer
        // tuples survive
        let shares_where = !join.is_outer() && !join.populate;
        let mut items = condition.extract_pushdown_items(inner, false);
        let mut equi = condition.extract_equi_items(inner, available);
        if shares_where {
            items.extend(pool.extract_pushdown_items(inner, false));
            equi.extend(pool.extract_equi_items(inner, available));
        }

        let correlated_by = correlated_expressions(resolver, &join.source, inner);
        let catalog = self.catalog_for(&join.source)?;
        let choice = match &join.source {
            TableSource::Table { .. } if !equi.is_empty() => {
                choose_index(catalog.1.list_indices(tree.get(inner).table()), &equi)
            }
            _ => None,
        };

        let mut cache_key = correlated_by.clone();
        let seek = match choice {
            Some(choice) => {
                debug!(alias = %name, columns = ?choice.columns, items = ?choice.used, "index seek");
                // the equality items stay as join keys so a null outer key
                // skips the seek instead of failing it
                let factory = compiler.compile_seek_key(&name, choice.columns.clone(), &choice.key)?;
                cache_key.extend(choice.key.iter().cloned());
                Some((choice, factory))
            }
            None => None,
        };
        let correlated = seek.is_some() || !correlated_by.is_empty();
        let hash = seek.is_none() && !equi.is_empty() && !correlated && self.config.hash_join;

        let plan = self.table_source(&join.source, inner, items, &[], seek, catalog, resolver, compiler)?;
        let mut inner_op = plan.operator;
        let cached = self.config.cache_inner && !hash;
        if cached {
            let key = compiler.compile_hash(&cache_key)?;
            inner_op = Rc::new(CachingOperator::new(self.next_id(), inner_op, key));
        }

        let mut residual: Vec<Expression> = condition.into_predicate().into_iter().collect();
        if shares_where {
            let mut covered = available.clone();
            covered.insert(inner);
            residual.extend(pool.extract_covered(&covered));
        }

        let mut core = JoinCore::new(inner);
        core.outer_join = join.is_outer();
        core.populate = join.populate;
        core.correlated = correlated;
        if !equi.is_empty() {
            let outer_keys: Vec<Expression> = equi.iter().map(|e| e.outer.expression.clone()).collect();
            let inner_keys: Vec<Expression> = equi.iter().map(|e| e.inner.expression.clone()).collect();
            core.keys = Some(JoinKeys {
                outer: compiler.compile_hash(&outer_keys)?,
                inner: compiler.compile_hash(&inner_keys)?,
            });
        }
        if let Some(predicate) = Expression::and_all(residual) {
            core.condition = Some(compiler.compile_predicate(&predicate)?);
        }

        debug!(
            alias = %name,
            strategy = if hash { "hash" } else { "nested_loop" },
            equi = equi.len(),
            correlated,
            cached,
            "join planned"
        );
        let id = self.next_id();
        if hash {
            Ok(Rc::new(HashJoin::new(id, outer, inner_op, core)?))
        } else {
            Ok(Rc::new(NestedLoopJoin::new(id, outer, inner_op, core)))
        }
    }
}

fn build_tree(select: &Select) -> Result<(TableAliasTree, Option<SourceIds>)> {
    let mut builder = TableAliasTree::builder();
    let Some(from) = &select.from else {
        return Ok((builder.build(), None));
    };
    let mut names: Vec<String> = Vec::new();
    let first = add_source(&mut builder, &mut names, ROOT, &from.source)?;
    let mut joins = Vec::with_capacity(from.joins.len());
    for join in &from.joins {
        let parent = if join.populate { first } else { ROOT };
        joins.push(add_source(&mut builder, &mut names, parent, &join.source)?);
    }
    Ok((builder.build(), Some(SourceIds { first, joins })))
}

/// Adds a source to the tree. Alias names must be unique across the whole
/// query, not just along one path.
fn add_source(
    builder: &mut TableAliasTreeBuilder,
    names: &mut Vec<String>,
    parent: AliasId,
    source: &TableSource,
) -> Result<AliasId> {
    let name = source.alias_name();
    if names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
        return Err(Error::duplicate_alias(name));
    }
    let (table, kind) = match source {
        TableSource::Table { name, .. } => (name.clone(), AliasKind::Table),
        TableSource::Function { name, .. } => (QualifiedName::new(vec![name.clone()]), AliasKind::Function),
    };
    let id = builder.add(parent, &name, table, source.catalog_alias(), kind)?;
    names.push(name);
    Ok(id)
}

/// Resolves every expression of `select` so the resolver records the
/// columns each alias must provide.
fn visit_select(resolver: &mut QualifiedNameResolver, select: &Select) {
    visit_items(resolver, ROOT, &select.items);
    let mut expressions: Vec<&Expression> = Vec::new();
    expressions.extend(select.where_clause.as_ref());
    expressions.extend(select.group_by.iter());
    expressions.extend(select.order_by.iter().map(|s| &s.expression));
    expressions.extend(select.top.as_ref());
    if let Some(from) = &select.from {
        let sources = std::iter::once(&from.source).chain(from.joins.iter().map(|j| &j.source));
        for source in sources {
            expressions.extend(source.options().iter().map(|o| &o.value));
            if let TableSource::Function { args, .. } = source {
                expressions.extend(args.iter());
            }
        }
        expressions.extend(from.joins.iter().filter_map(|j| j.condition()));
    }
    for expr in expressions {
        resolver.visit_expression(ROOT, expr);
    }
}

fn visit_items(resolver: &mut QualifiedNameResolver, scope: AliasId, items: &[SelectItem]) {
    for item in items {
        match item {
            SelectItem::Expression { expression, .. } => resolver.visit_expression(scope, expression),
            SelectItem::Asterisk { alias } => resolver.visit_asterisk(scope, alias.as_deref()),
            SelectItem::Nested {
                from,
                items,
                where_clause,
                order_by,
                ..
            } => {
                let target = from
                    .as_ref()
                    .and_then(|f| resolver.lambda_target(scope, f, &LambdaBindings::new()));
                let child = match (from, target) {
                    (_, Some(target)) => target,
                    (Some(f), None) => {
                        resolver.visit_expression(scope, f);
                        scope
                    }
                    (None, None) => scope,
                };
                visit_items(resolver, child, items);
                if let Some(predicate) = where_clause {
                    resolver.visit_expression(child, predicate);
                }
                for sort in order_by {
                    resolver.visit_expression(child, &sort.expression);
                }
            }
        }
    }
}

/// Arguments and options of `source` that read aliases other than `inner`.
fn correlated_expressions(resolver: &QualifiedNameResolver, source: &TableSource, inner: AliasId) -> Vec<Expression> {
    let args: &[Expression] = match source {
        TableSource::Function { args, .. } => args,
        TableSource::Table { .. } => &[],
    };
    args.iter()
        .chain(source.options().iter().map(|o| &o.value))
        .filter(|expr| {
            let refs = resolver.aliases_of(ROOT, expr);
            refs.unresolved || refs.aliases.iter().any(|a| *a != inner)
        })
        .cloned()
        .collect()
}

/// Bare column of `alias` a sort key reads, if that is all it does.
fn sort_column(resolver: &QualifiedNameResolver, alias: AliasId, expr: &Expression) -> Option<String> {
    let reference = expr.unwrap_nested().as_reference()?;
    if reference.lambda_id.is_some() {
        return None;
    }
    let resolved = resolver.resolve_name(ROOT, reference.name.parts());
    if resolved.is_column() && resolved.alias == Some(alias) {
        resolved.column
    } else {
        None
    }
}
