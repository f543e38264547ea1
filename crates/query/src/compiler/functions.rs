//! Function registry and built-in functions.

use super::CompiledScalar;
use crate::ast::LambdaId;
use crate::context::LambdaValue;
use braid_core::{DataType, Error, Result, Tuple, Value};
use hashbrown::HashMap;
use std::rc::Rc;

/// A scalar function evaluated over already-evaluated arguments.
pub trait ScalarFunction {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Minimum and optional maximum argument count.
    fn arity(&self) -> (usize, Option<usize>);

    fn data_type(&self, _args: &[DataType]) -> DataType {
        DataType::Any
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value>;
}

/// Functions taking a source and a lambda.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LambdaFunction {
    /// Keeps the elements the lambda returns true for.
    Filter,
    /// Maps every element through the lambda.
    Map,
    /// True if the lambda returns true for any element.
    Any,
    /// True if the lambda returns true for every element.
    All,
}

/// Aggregates over group members or populated rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

/// A registered function.
#[derive(Clone)]
pub enum FunctionKind {
    Scalar(Rc<dyn ScalarFunction>),
    Lambda(LambdaFunction),
    Aggregate(AggregateFunction),
}

impl FunctionKind {
    /// Kind label shown by `sys.functions`.
    pub fn label(&self) -> &'static str {
        match self {
            FunctionKind::Scalar(_) => "scalar",
            FunctionKind::Lambda(_) => "lambda",
            FunctionKind::Aggregate(_) => "aggregate",
        }
    }
}

/// Functions available to the compiler, keyed by optional catalog alias and
/// name. Lookups ignore ASCII case.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<(Option<String>, String), FunctionKind>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for f in builtin_scalars() {
            registry.register(None, f);
        }
        for (name, f) in [
            ("filter", LambdaFunction::Filter),
            ("map", LambdaFunction::Map),
            ("any", LambdaFunction::Any),
            ("all", LambdaFunction::All),
        ] {
            registry.insert(None, name, FunctionKind::Lambda(f));
        }
        for (name, f) in [
            ("count", AggregateFunction::Count),
            ("sum", AggregateFunction::Sum),
            ("min", AggregateFunction::Min),
            ("max", AggregateFunction::Max),
            ("avg", AggregateFunction::Avg),
        ] {
            registry.insert(None, name, FunctionKind::Aggregate(f));
        }
        registry
    }

    /// Registers a scalar function, optionally scoped to a catalog alias.
    pub fn register(&mut self, catalog: Option<&str>, function: Rc<dyn ScalarFunction>) {
        let name = function.name().to_string();
        self.insert(catalog, &name, FunctionKind::Scalar(function));
    }

    fn insert(&mut self, catalog: Option<&str>, name: &str, kind: FunctionKind) {
        let key = (catalog.map(|c| c.to_ascii_lowercase()), name.to_ascii_lowercase());
        self.functions.insert(key, kind);
    }

    /// Looks up `name`. Catalog-qualified calls only see that catalog's
    /// functions.
    pub fn lookup(&self, catalog: Option<&str>, name: &str) -> Option<FunctionKind> {
        let key = (catalog.map(|c| c.to_ascii_lowercase()), name.to_ascii_lowercase());
        self.functions.get(&key).cloned()
    }

    /// (catalog, name, kind label, description), sorted by catalog and name.
    pub fn list(&self) -> Vec<(Option<String>, String, &'static str, String)> {
        let mut out: Vec<_> = self
            .functions
            .iter()
            .map(|((catalog, name), kind)| {
                let description = match kind {
                    FunctionKind::Scalar(f) => f.description().to_string(),
                    _ => String::new(),
                };
                (catalog.clone(), name.clone(), kind.label(), description)
            })
            .collect();
        out.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        out
    }
}

/// Scalar function backed by a plain fn pointer.
struct Builtin {
    name: &'static str,
    description: &'static str,
    min: usize,
    max: Option<usize>,
    result: Option<DataType>,
    eval: fn(&[Value]) -> Result<Value>,
}

impl ScalarFunction for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn arity(&self) -> (usize, Option<usize>) {
        (self.min, self.max)
    }

    fn data_type(&self, args: &[DataType]) -> DataType {
        match self.result {
            Some(t) => t,
            None => args.first().copied().unwrap_or_default(),
        }
    }

    fn evaluate(&self, args: &[Value]) -> Result<Value> {
        (self.eval)(args)
    }
}

fn builtin_scalars() -> Vec<Rc<dyn ScalarFunction>> {
    vec![
        Rc::new(Builtin {
            name: "isnull",
            description: "Returns the first argument unless it is null, else the second",
            min: 2,
            max: Some(2),
            result: None,
            eval: |args| Ok(if args[0].is_null() { args[1].clone() } else { args[0].clone() }),
        }),
        Rc::new(Builtin {
            name: "coalesce",
            description: "Returns the first non-null argument",
            min: 1,
            max: None,
            result: None,
            eval: |args| Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        }),
        Rc::new(Builtin {
            name: "concat",
            description: "Concatenates arguments as strings; nulls are skipped",
            min: 1,
            max: None,
            result: Some(DataType::String),
            eval: |args| {
                let mut out = String::new();
                for arg in args.iter().filter(|v| !v.is_null()) {
                    out.push_str(&arg.to_string());
                }
                Ok(Value::String(out))
            },
        }),
        Rc::new(Builtin {
            name: "lower",
            description: "Lower-cases a string",
            min: 1,
            max: Some(1),
            result: Some(DataType::String),
            eval: |args| map_string("lower", &args[0], |s| s.to_lowercase()),
        }),
        Rc::new(Builtin {
            name: "upper",
            description: "Upper-cases a string",
            min: 1,
            max: Some(1),
            result: Some(DataType::String),
            eval: |args| map_string("upper", &args[0], |s| s.to_uppercase()),
        }),
        Rc::new(Builtin {
            name: "len",
            description: "Length of a string, array or populated alias",
            min: 1,
            max: Some(1),
            result: Some(DataType::Int64),
            eval: |args| match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::String(s) => Ok(Value::Int64(s.chars().count() as i64)),
                Value::Array(a) => Ok(Value::Int64(a.len() as i64)),
                Value::Tuples(t) => Ok(Value::Int64(t.len() as i64)),
                Value::Bytes(b) => Ok(Value::Int64(b.len() as i64)),
                other => Err(Error::invalid_arguments("len", format!("unsupported value {}", other))),
            },
        }),
        Rc::new(Builtin {
            name: "abs",
            description: "Absolute value",
            min: 1,
            max: Some(1),
            result: None,
            eval: |args| match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Int32(v) => Ok(v.checked_abs().map(Value::Int32).unwrap_or(Value::Int64((*v as i64).abs()))),
                Value::Int64(v) => v
                    .checked_abs()
                    .map(Value::Int64)
                    .ok_or_else(|| Error::invalid_arguments("abs", "integer overflow")),
                Value::Float64(v) => Ok(Value::Float64(v.abs())),
                other => Err(Error::invalid_arguments("abs", format!("unsupported value {}", other))),
            },
        }),
    ]
}

fn map_string(name: &str, value: &Value, f: impl Fn(&str) -> String) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(f(s))),
        other => Err(Error::invalid_arguments(name, format!("expected string, got {}", other))),
    }
}

enum Elements {
    Tuples(Rc<[Tuple]>),
    Values(Vec<Value>),
}

/// Builds the closure for a lambda function.
pub(super) fn compile_lambda(
    function: LambdaFunction,
    source: CompiledScalar,
    lambda_id: LambdaId,
    body: CompiledScalar,
    text: String,
) -> CompiledScalar {
    let data_type = match function {
        LambdaFunction::Any | LambdaFunction::All => DataType::Boolean,
        LambdaFunction::Map => DataType::Array,
        LambdaFunction::Filter => source.data_type(),
    };
    CompiledScalar::new(text.clone(), data_type, move |tuple, ctx| {
        let elements = match source.evaluate(tuple, ctx)? {
            Value::Null => return Ok(Value::Null),
            Value::Tuples(t) => Elements::Tuples(t),
            Value::Array(v) => Elements::Values(v),
            other => {
                return Err(Error::type_mismatch(
                    text.as_str(),
                    format!("cannot iterate {}", other),
                ))
            }
        };
        let bound: Vec<LambdaValue> = match &elements {
            Elements::Tuples(t) => t.iter().cloned().map(LambdaValue::Tuple).collect(),
            Elements::Values(v) => v.iter().cloned().map(LambdaValue::Value).collect(),
        };

        let mut results = Vec::with_capacity(bound.len());
        for value in bound {
            let previous = ctx.statement.bind_lambda(lambda_id, value);
            let result = body.evaluate(tuple, ctx);
            ctx.statement.restore_lambda(lambda_id, previous);
            results.push(result?);
        }

        let is_true = |v: &Value| matches!(v, Value::Boolean(true));
        Ok(match function {
            LambdaFunction::Map => Value::Array(results),
            LambdaFunction::Any => Value::Boolean(results.iter().any(is_true)),
            LambdaFunction::All => Value::Boolean(results.iter().all(is_true)),
            LambdaFunction::Filter => match elements {
                Elements::Tuples(t) => Value::Tuples(
                    t.iter()
                        .zip(&results)
                        .filter(|(_, r)| is_true(r))
                        .map(|(t, _)| t.clone())
                        .collect(),
                ),
                Elements::Values(v) => Value::Array(
                    v.into_iter()
                        .zip(&results)
                        .filter(|(_, r)| is_true(r))
                        .map(|(v, _)| v)
                        .collect(),
                ),
            },
        })
    })
}

/// Builds the closure for an aggregate.
///
/// With group members the argument is evaluated once per member. Without a
/// group the argument is evaluated once and an array or populated value is
/// aggregated element-wise.
pub(super) fn compile_aggregate(
    function: AggregateFunction,
    arg: Option<CompiledScalar>,
    text: String,
) -> CompiledScalar {
    let data_type = match function {
        AggregateFunction::Count => DataType::Int64,
        AggregateFunction::Avg => DataType::Float64,
        _ => arg.as_ref().map(|a| a.data_type()).unwrap_or_default(),
    };
    CompiledScalar::new(text.clone(), data_type, move |tuple, ctx| {
        let values: Vec<Value> = match (tuple.group(), &arg) {
            (Some(members), Some(arg)) => {
                let mut values = Vec::with_capacity(members.len());
                for member in members.iter() {
                    values.push(arg.evaluate(member, ctx)?);
                }
                values
            }
            (Some(members), None) => vec![Value::Boolean(true); members.len()],
            (None, Some(arg)) => match arg.evaluate(tuple, ctx)? {
                Value::Array(items) => items,
                Value::Tuples(t) => vec![Value::Boolean(true); t.len()],
                Value::Null => Vec::new(),
                single => vec![single],
            },
            (None, None) => vec![Value::Boolean(true)],
        };
        aggregate(function, values, &text)
    })
}

fn aggregate(function: AggregateFunction, values: Vec<Value>, text: &str) -> Result<Value> {
    let present: Vec<Value> = values.into_iter().filter(|v| !v.is_null()).collect();
    match function {
        AggregateFunction::Count => Ok(Value::Int64(present.len() as i64)),
        AggregateFunction::Min | AggregateFunction::Max => {
            let mut best: Option<Value> = None;
            for v in present {
                let replace = match &best {
                    None => true,
                    Some(b) => {
                        let ord = v.sql_cmp(b).ok_or_else(|| {
                            Error::type_mismatch(text, format!("cannot compare {} with {}", v, b))
                        })?;
                        if function == AggregateFunction::Min {
                            ord.is_lt()
                        } else {
                            ord.is_gt()
                        }
                    }
                };
                if replace {
                    best = Some(v);
                }
            }
            Ok(best.unwrap_or(Value::Null))
        }
        AggregateFunction::Sum | AggregateFunction::Avg => {
            if present.is_empty() {
                return Ok(Value::Null);
            }
            let count = present.len();
            let all_ints = present.iter().all(|v| v.as_i64().is_some());
            let mut int_sum: i64 = 0;
            let mut float_sum = 0.0;
            for v in &present {
                let f = v.as_f64().ok_or_else(|| {
                    Error::type_mismatch(text, format!("cannot sum non-numeric value {}", v))
                })?;
                float_sum += f;
                if all_ints {
                    int_sum = int_sum
                        .checked_add(v.as_i64().unwrap_or_default())
                        .ok_or_else(|| Error::type_mismatch(text, "integer overflow"))?;
                }
            }
            Ok(match function {
                AggregateFunction::Avg => Value::Float64(float_sum / count as f64),
                _ if all_ints => Value::Int64(int_sum),
                _ => Value::Float64(float_sum),
            })
        }
    }
}
