//! Expression compiler.
//!
//! Expressions are compiled once per query into trees of `Rc` closures.
//! References are resolved against the alias tree at compile time, so
//! evaluation only indexes into tuples.

mod eval;
mod functions;
mod hash;
mod projection;
mod seek;

pub use functions::{AggregateFunction, FunctionKind, FunctionRegistry, LambdaFunction, ScalarFunction};
pub use hash::{hash_values, CompositeHash, HashKey};
pub use projection::{OutputWriter, ProjectionWriter};
pub use seek::{SeekKey, SeekKeyFactory};

use crate::alias::{AliasId, TableAliasTree};
use crate::ast::{Expression, LogicalOp, NullOrder, QualifiedReference, SortItem, SortOrder};
use crate::context::{ExecutionContext, LambdaValue};
use crate::resolver::{bind, unbind, LambdaBindings, QualifiedNameResolver, ResolvedReference};
use braid_core::{Columns, DataType, Error, Result, Row, Slot, Tuple, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

type EvalFn = dyn Fn(&Tuple, &mut ExecutionContext) -> Result<Value>;

/// A compiled scalar expression.
#[derive(Clone)]
pub struct CompiledScalar {
    eval: Rc<EvalFn>,
    text: Rc<str>,
    data_type: DataType,
}

impl CompiledScalar {
    pub fn new(
        text: impl Into<Rc<str>>,
        data_type: DataType,
        eval: impl Fn(&Tuple, &mut ExecutionContext) -> Result<Value> + 'static,
    ) -> Self {
        Self {
            eval: Rc::new(eval),
            text: text.into(),
            data_type,
        }
    }

    /// A scalar that always yields `value`.
    pub fn constant(value: Value) -> Self {
        let text = Expression::Literal(value.clone()).to_string();
        let data_type = value.data_type().unwrap_or_default();
        Self::new(text, data_type, move |_, _| Ok(value.clone()))
    }

    #[inline]
    pub fn evaluate(&self, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<Value> {
        (self.eval)(tuple, ctx)
    }

    /// Source text of the expression.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

impl fmt::Debug for CompiledScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompiledScalar({})", self.text)
    }
}

/// A compiled boolean expression. Null counts as false.
#[derive(Clone, Debug)]
pub struct CompiledPredicate {
    scalar: CompiledScalar,
}

impl CompiledPredicate {
    pub fn new(scalar: CompiledScalar) -> Self {
        Self { scalar }
    }

    pub fn test(&self, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<bool> {
        let value = self.scalar.evaluate(tuple, ctx)?;
        Ok(eval::truth(&value, self.scalar.text())?.unwrap_or(false))
    }

    pub fn text(&self) -> &str {
        self.scalar.text()
    }
}

/// A compiled ORDER BY item.
#[derive(Clone, Debug)]
pub struct CompiledSortItem {
    pub key: CompiledScalar,
    pub order: SortOrder,
    pub null_order: NullOrder,
}

impl CompiledSortItem {
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let nulls_first = match self.null_order {
            NullOrder::First => true,
            NullOrder::Last => false,
            NullOrder::Default => self.order == SortOrder::Asc,
        };
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) if nulls_first => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if nulls_first => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match self.order {
                SortOrder::Asc => a.cmp(b),
                SortOrder::Desc => b.cmp(a),
            },
        }
    }
}

/// Stable sort of `tuples` by `items`.
pub fn sort_tuples(
    items: &[CompiledSortItem],
    tuples: Vec<Tuple>,
    ctx: &mut ExecutionContext,
) -> Result<Vec<Tuple>> {
    let mut keyed = Vec::with_capacity(tuples.len());
    for tuple in tuples {
        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            keys.push(item.key.evaluate(&tuple, ctx)?);
        }
        keyed.push((keys, tuple));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        items
            .iter()
            .zip(a.iter().zip(b.iter()))
            .map(|(item, (x, y))| item.compare(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(keyed.into_iter().map(|(_, t)| t).collect())
}

/// Compiles expressions within one alias scope.
pub struct ExpressionCompiler<'a> {
    resolver: &'a QualifiedNameResolver,
    functions: &'a FunctionRegistry,
    scope: AliasId,
    bindings: LambdaBindings,
}

impl<'a> ExpressionCompiler<'a> {
    pub fn new(resolver: &'a QualifiedNameResolver, functions: &'a FunctionRegistry) -> Self {
        Self {
            resolver,
            functions,
            scope: TableAliasTree::ROOT,
            bindings: LambdaBindings::new(),
        }
    }

    /// Sets the alias scope references resolve from.
    pub fn with_scope(mut self, scope: AliasId) -> Self {
        self.scope = scope;
        self
    }

    pub fn tree(&self) -> &Rc<TableAliasTree> {
        self.resolver.tree()
    }

    /// Compiles a scalar expression.
    pub fn compile(&mut self, expr: &Expression) -> Result<CompiledScalar> {
        let text = expr.to_string();
        let data_type = expr.data_type();
        match expr {
            Expression::Literal(value) => Ok(CompiledScalar::constant(value.clone())),
            Expression::Variable(name) => {
                let name = name.clone();
                Ok(CompiledScalar::new(text, data_type, move |_, ctx| {
                    Ok(ctx.variable(&name).cloned().unwrap_or(Value::Null))
                }))
            }
            Expression::Reference(reference) => Ok(self.compile_reference(reference, text)),
            Expression::Comparison { op, left, right } => {
                let (op, left, right) = (*op, self.compile(left)?, self.compile(right)?);
                Ok(CompiledScalar::new(text.clone(), data_type, move |t, ctx| {
                    let l = left.evaluate(t, ctx)?;
                    let r = right.evaluate(t, ctx)?;
                    eval::compare(op, &l, &r, &text)
                }))
            }
            Expression::Logical { op, left, right } => {
                let (op, left, right) = (*op, self.compile(left)?, self.compile(right)?);
                Ok(CompiledScalar::new(text.clone(), data_type, move |t, ctx| {
                    let l = eval::truth(&left.evaluate(t, ctx)?, &text)?;
                    // short circuit
                    match (op, l) {
                        (LogicalOp::And, Some(false)) => return Ok(Value::Boolean(false)),
                        (LogicalOp::Or, Some(true)) => return Ok(Value::Boolean(true)),
                        _ => {}
                    }
                    let r = eval::truth(&right.evaluate(t, ctx)?, &text)?;
                    Ok(eval::from_truth(match op {
                        LogicalOp::And => eval::and3(l, r),
                        LogicalOp::Or => eval::or3(l, r),
                    }))
                }))
            }
            Expression::Not(inner) => {
                let inner = self.compile(inner)?;
                Ok(CompiledScalar::new(text.clone(), data_type, move |t, ctx| {
                    let v = eval::truth(&inner.evaluate(t, ctx)?, &text)?;
                    Ok(eval::from_truth(v.map(|b| !b)))
                }))
            }
            Expression::Arithmetic { op, left, right } => {
                let (op, left, right) = (*op, self.compile(left)?, self.compile(right)?);
                Ok(CompiledScalar::new(text.clone(), data_type, move |t, ctx| {
                    let l = left.evaluate(t, ctx)?;
                    let r = right.evaluate(t, ctx)?;
                    eval::arithmetic(op, &l, &r, &text)
                }))
            }
            Expression::Negate(inner) => {
                let inner = self.compile(inner)?;
                Ok(CompiledScalar::new(text.clone(), data_type, move |t, ctx| {
                    eval::negate(&inner.evaluate(t, ctx)?, &text)
                }))
            }
            Expression::In {
                expr,
                list,
                negated,
            } => {
                let negated = *negated;
                let expr = self.compile(expr)?;
                let list = list
                    .iter()
                    .map(|e| self.compile(e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(CompiledScalar::new(text, data_type, move |t, ctx| {
                    let value = expr.evaluate(t, ctx)?;
                    let mut values = Vec::with_capacity(list.len());
                    for item in &list {
                        values.push(item.evaluate(t, ctx)?);
                    }
                    let found = eval::in_list(&value, &values);
                    Ok(eval::from_truth(if negated { found.map(|b| !b) } else { found }))
                }))
            }
            Expression::Like {
                expr,
                pattern,
                negated,
            } => {
                let negated = *negated;
                let (expr, pattern) = (self.compile(expr)?, self.compile(pattern)?);
                Ok(CompiledScalar::new(text.clone(), data_type, move |t, ctx| {
                    let value = expr.evaluate(t, ctx)?;
                    let pattern = pattern.evaluate(t, ctx)?;
                    let matched = eval::like(&value, &pattern, &text)?;
                    Ok(eval::from_truth(if negated { matched.map(|b| !b) } else { matched }))
                }))
            }
            Expression::IsNull { expr, negated } => {
                let negated = *negated;
                let expr = self.compile(expr)?;
                Ok(CompiledScalar::new(text, data_type, move |t, ctx| {
                    let is_null = expr.evaluate(t, ctx)?.is_null();
                    Ok(Value::Boolean(is_null != negated))
                }))
            }
            Expression::Nested(inner) => self.compile(inner),
            Expression::FunctionCall {
                catalog,
                name,
                args,
            } => self.compile_function(catalog.as_deref(), name, args, text),
            Expression::Lambda { .. } => Err(Error::invalid_arguments(
                text,
                "lambda expressions are only valid as function arguments",
            )),
        }
    }

    /// Compiles a boolean expression.
    pub fn compile_predicate(&mut self, expr: &Expression) -> Result<CompiledPredicate> {
        Ok(CompiledPredicate::new(self.compile(expr)?))
    }

    /// Compiles a composite hash over `exprs`, in order.
    pub fn compile_hash(&mut self, exprs: &[Expression]) -> Result<CompositeHash> {
        let items = exprs.iter().map(|e| self.compile(e)).collect::<Result<Vec<_>>>()?;
        Ok(CompositeHash::new(items))
    }

    /// Compiles a seek key factory for `alias` over `exprs`, in index column
    /// order.
    pub fn compile_seek_key(
        &mut self,
        alias: &str,
        columns: Vec<String>,
        exprs: &[Expression],
    ) -> Result<SeekKeyFactory> {
        let items = exprs.iter().map(|e| self.compile(e)).collect::<Result<Vec<_>>>()?;
        Ok(SeekKeyFactory::new(alias, columns, items))
    }

    /// Compiles ORDER BY items.
    pub fn compile_sort_items(&mut self, items: &[SortItem]) -> Result<Vec<CompiledSortItem>> {
        items
            .iter()
            .map(|item| {
                Ok(CompiledSortItem {
                    key: self.compile(&item.expression)?,
                    order: item.order,
                    null_order: item.null_order,
                })
            })
            .collect()
    }

    fn compile_reference(&self, reference: &QualifiedReference, text: String) -> CompiledScalar {
        let resolved = self.resolver.resolve(self.scope, reference, &self.bindings);
        let width = self.resolver.tree().len();
        let ResolvedReference {
            alias,
            column,
            path,
            lambda_id,
        } = resolved;

        if let Some(id) = lambda_id {
            return CompiledScalar::new(text, DataType::Any, move |_, ctx| {
                match ctx.statement.lambda(id).cloned() {
                    Some(LambdaValue::Tuple(bound)) => {
                        Ok(read(&bound, None, alias, column.as_deref(), &path, width))
                    }
                    Some(LambdaValue::Value(value)) if column.is_none() && alias.is_none() => {
                        Ok(apply_path(value, &path))
                    }
                    _ => Ok(Value::Null),
                }
            });
        }

        match (alias, column) {
            (Some(alias), Some(column)) => {
                // (columns of the last row seen, index of the column in them)
                let cache: RefCell<Option<(Columns, Option<usize>)>> = RefCell::new(None);
                CompiledScalar::new(text, DataType::Any, move |tuple, ctx| {
                    let outer = ctx.statement.outer();
                    let row = tuple.row(alias).or_else(|| outer.and_then(|o| o.row(alias)));
                    let value = match row {
                        Some(row) => cached_lookup(&cache, row, &column),
                        None => Value::Null,
                    };
                    Ok(apply_path(value, &path))
                })
            }
            (alias, column) => CompiledScalar::new(text, DataType::Any, move |tuple, ctx| {
                Ok(read(tuple, ctx.statement.outer(), alias, column.as_deref(), &path, width))
            }),
        }
    }

    fn compile_function(
        &mut self,
        catalog: Option<&str>,
        name: &str,
        args: &[Expression],
        text: String,
    ) -> Result<CompiledScalar> {
        let kind = self
            .functions
            .lookup(catalog, name)
            .ok_or_else(|| Error::unknown_function(name))?;
        match kind {
            FunctionKind::Scalar(function) => {
                let (min, max) = function.arity();
                if args.len() < min || max.is_some_and(|m| args.len() > m) {
                    return Err(Error::invalid_arguments(
                        name,
                        format!("expected {} argument(s), got {}", arity_text(min, max), args.len()),
                    ));
                }
                let compiled = args.iter().map(|a| self.compile(a)).collect::<Result<Vec<_>>>()?;
                let arg_types: Vec<DataType> = compiled.iter().map(|c| c.data_type()).collect();
                let data_type = function.data_type(&arg_types);
                Ok(CompiledScalar::new(text, data_type, move |t, ctx| {
                    let mut values = Vec::with_capacity(compiled.len());
                    for arg in &compiled {
                        values.push(arg.evaluate(t, ctx)?);
                    }
                    function.evaluate(&values)
                }))
            }
            FunctionKind::Lambda(function) => self.compile_lambda_function(function, name, args, text),
            FunctionKind::Aggregate(function) => {
                if args.len() > 1 {
                    return Err(Error::invalid_arguments(name, "expected at most one argument"));
                }
                let arg = args.first().map(|a| self.compile(a)).transpose()?;
                Ok(functions::compile_aggregate(function, arg, text))
            }
        }
    }

    fn compile_lambda_function(
        &mut self,
        function: LambdaFunction,
        name: &str,
        args: &[Expression],
        text: String,
    ) -> Result<CompiledScalar> {
        let (source, lambda_ids, body) = match args {
            [source, Expression::Lambda {
                lambda_ids, body, ..
            }] if lambda_ids.len() == 1 => (source, lambda_ids, body),
            _ => {
                return Err(Error::invalid_arguments(
                    name,
                    "expected a source and a single-parameter lambda",
                ))
            }
        };
        let lambda_id = lambda_ids[0];
        let source_compiled = self.compile(source)?;
        let target = self.resolver.lambda_target(self.scope, source, &self.bindings);
        let saved = bind(&mut self.bindings, lambda_ids, target);
        let body = self.compile(body);
        unbind(&mut self.bindings, saved);
        Ok(functions::compile_lambda(function, source_compiled, lambda_id, body?, text))
    }
}

fn arity_text(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{}..{}", min, max),
        None => format!("at least {}", min),
    }
}

fn cached_lookup(cache: &RefCell<Option<(Columns, Option<usize>)>>, row: &Row, column: &str) -> Value {
    let mut cache = cache.borrow_mut();
    let index = match cache.as_ref() {
        Some((columns, index)) if Rc::ptr_eq(columns, row.columns()) => *index,
        _ => {
            let index = row.column_index(column);
            *cache = Some((row.columns().clone(), index));
            index
        }
    };
    index.and_then(|i| row.get(i)).cloned().unwrap_or(Value::Null)
}

/// Reads a resolved reference from `tuple`, falling back to `outer`.
fn read(
    tuple: &Tuple,
    outer: Option<&Tuple>,
    alias: Option<AliasId>,
    column: Option<&str>,
    path: &[String],
    width: usize,
) -> Value {
    let value = match (alias, column) {
        (Some(alias), Some(column)) => tuple
            .value(alias, column)
            .or_else(|| outer.and_then(|o| o.value(alias, column)))
            .cloned(),
        (Some(alias), None) => {
            alias_rows(tuple, alias, width).or_else(|| outer.and_then(|o| alias_rows(o, alias, width)))
        }
        (None, Some(column)) => tuple
            .find_column(column)
            .or_else(|| outer.and_then(|o| o.find_column(column)))
            .cloned(),
        (None, None) => None,
    };
    apply_path(value.unwrap_or(Value::Null), path)
}

/// The rows of an alias as a `Tuples` value.
fn alias_rows(tuple: &Tuple, alias: AliasId, width: usize) -> Option<Value> {
    match tuple.slot(alias) {
        Slot::Populated(members) => Some(Value::Tuples(members.clone())),
        Slot::Row(row) => Some(Value::Tuples(Rc::from(vec![Tuple::single(width, alias, row.clone())]))),
        Slot::Empty => None,
    }
}

/// Follows numeric path parts into arrays. Anything else yields null.
fn apply_path(value: Value, path: &[String]) -> Value {
    path.iter().fold(value, |current, part| match (current, part.parse::<usize>()) {
        (Value::Array(items), Ok(index)) => items.into_iter().nth(index).unwrap_or(Value::Null),
        _ => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasKind;
    use crate::context::Session;

    fn setup() -> (QualifiedNameResolver, FunctionRegistry) {
        let mut b = TableAliasTree::builder();
        b.add(0, "a", "t".into(), None, AliasKind::Table).unwrap();
        b.add(0, "b", "u".into(), None, AliasKind::Table).unwrap();
        (QualifiedNameResolver::new(Rc::new(b.build())), FunctionRegistry::with_builtins())
    }

    fn tuple() -> Tuple {
        let a = Row::new(Row::columns_of(&["id", "name", "flag"]), vec![
            Value::Int32(5),
            Value::String("x".into()),
            Value::Null,
        ]);
        let b = Row::new(Row::columns_of(&["id", "type"]), vec![Value::Int64(5), Value::Null]);
        Tuple::single(3, 1, Rc::new(a)).merge(&Tuple::single(3, 2, Rc::new(b)))
    }

    fn eval(expr: Expression) -> Result<Value> {
        let (resolver, functions) = setup();
        let mut compiler = ExpressionCompiler::new(&resolver, &functions);
        let compiled = compiler.compile(&expr)?;
        let mut ctx = ExecutionContext::new(Rc::new(Session::default()));
        compiled.evaluate(&tuple(), &mut ctx)
    }

    #[test]
    fn test_references() {
        assert_eq!(eval(Expression::col("a.id")).unwrap(), Value::Int32(5));
        assert_eq!(eval(Expression::col("b.ID")).unwrap(), Value::Int64(5));
        assert_eq!(eval(Expression::col("a.missing")).unwrap(), Value::Null);
        assert_eq!(eval(Expression::col("name")).unwrap(), Value::String("x".into()));
    }

    #[test]
    fn test_three_valued_logic() {
        let null_flag = || Expression::col("a.flag");
        let and_false = Expression::and(null_flag(), Expression::lit(false));
        assert_eq!(eval(and_false).unwrap(), Value::Boolean(false));
        let or_true = Expression::or(null_flag(), Expression::lit(true));
        assert_eq!(eval(or_true).unwrap(), Value::Boolean(true));
        assert!(eval(Expression::and(null_flag(), Expression::lit(true))).unwrap().is_null());
        assert!(eval(Expression::or(null_flag(), Expression::lit(false))).unwrap().is_null());
        assert!(eval(Expression::not(null_flag())).unwrap().is_null());
    }

    #[test]
    fn test_predicate_null_is_false() {
        let (resolver, functions) = setup();
        let mut compiler = ExpressionCompiler::new(&resolver, &functions);
        let p = compiler
            .compile_predicate(&Expression::eq(Expression::col("b.type"), Expression::lit(1i32)))
            .unwrap();
        let mut ctx = ExecutionContext::new(Rc::new(Session::default()));
        assert!(!p.test(&tuple(), &mut ctx).unwrap());
    }

    #[test]
    fn test_comparison_across_aliases() {
        let e = Expression::eq(Expression::col("a.id"), Expression::col("b.id"));
        assert_eq!(eval(e).unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_type_mismatch_surfaces() {
        let e = Expression::gt(Expression::col("a.name"), Expression::lit(1i32));
        assert!(matches!(eval(e), Err(Error::TypeMismatch { .. })));
        let e = Expression::and(Expression::lit(1i32), Expression::lit(true));
        assert!(matches!(eval(e), Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_in_like_is_null() {
        let e = Expression::in_list(Expression::col("a.id"), vec![Expression::lit(1i32), Expression::lit(5i64)]);
        assert_eq!(eval(e).unwrap(), Value::Boolean(true));
        let e = Expression::not_like(Expression::col("a.name"), "y%");
        assert_eq!(eval(e).unwrap(), Value::Boolean(true));
        let e = Expression::is_not_null(Expression::col("b.type"));
        assert_eq!(eval(e).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_variables() {
        let (resolver, functions) = setup();
        let mut compiler = ExpressionCompiler::new(&resolver, &functions);
        let compiled = compiler
            .compile(&Expression::add(Expression::var("x"), Expression::lit(1i32)))
            .unwrap();
        let mut ctx = ExecutionContext::new(Rc::new(Session::default()));
        assert!(compiled.evaluate(&tuple(), &mut ctx).unwrap().is_null());
        ctx.set_variable("X", Value::Int32(41));
        assert_eq!(compiled.evaluate(&tuple(), &mut ctx).unwrap(), Value::Int32(42));
    }

    #[test]
    fn test_unknown_function() {
        let err = eval(Expression::call("nope", vec![])).unwrap_err();
        assert!(matches!(err, Error::UnknownFunction { .. }));
        let err = eval(Expression::call("lower", vec![])).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[test]
    fn test_bare_lambda_rejected() {
        let err = eval(Expression::lambda("x", 0, Expression::lit(1i32))).unwrap_err();
        assert!(matches!(err, Error::InvalidArguments { .. }));
    }

    #[test]
    fn test_sort_tuples() {
        let (resolver, functions) = setup();
        let mut compiler = ExpressionCompiler::new(&resolver, &functions);
        let items = compiler
            .compile_sort_items(&[SortItem::desc(Expression::col("a.id"))])
            .unwrap();
        let columns = Row::columns_of(&["id"]);
        let make = |v: Value| Tuple::single(3, 1, Rc::new(Row::new(columns.clone(), vec![v])));
        let tuples = vec![make(Value::Int32(1)), make(Value::Null), make(Value::Int32(3))];
        let mut ctx = ExecutionContext::new(Rc::new(Session::default()));
        let sorted = sort_tuples(&items, tuples, &mut ctx).unwrap();
        let ids: Vec<Value> = sorted.iter().map(|t| t.value(1, "id").cloned().unwrap()).collect();
        assert_eq!(ids, vec![Value::Int32(3), Value::Int32(1), Value::Null]);
    }

    #[test]
    fn test_seek_key_rejects_null() {
        let (resolver, functions) = setup();
        let mut compiler = ExpressionCompiler::new(&resolver, &functions);
        let factory = compiler
            .compile_seek_key(
                "a",
                vec!["id".into(), "flag".into()],
                &[Expression::col("a.id"), Expression::col("a.flag")],
            )
            .unwrap();
        let mut ctx = ExecutionContext::new(Rc::new(Session::default()));
        let err = factory.key(&tuple(), &mut ctx).err().unwrap();
        assert!(matches!(err, Error::NullSeekKey { .. }));

        let factory = compiler
            .compile_seek_key("a", vec!["id".into()], &[Expression::col("a.id")])
            .unwrap();
        let key = factory.key(&tuple(), &mut ctx).unwrap();
        assert_eq!(key.get("ID"), Some(&Value::Int32(5)));
    }
}
