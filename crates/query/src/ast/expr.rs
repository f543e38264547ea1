//! Expression AST definitions.

use super::name::QualifiedName;
use braid_core::{DataType, Value};
use std::fmt;

/// Identifier of a lambda parameter, assigned by the parser.
pub type LambdaId = usize;

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// The operator that holds when the operands are swapped.
    pub fn flip(self) -> Self {
        match self {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Le => ComparisonOp::Ge,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Ge => ComparisonOp::Le,
            op => op,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

/// Logical binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

/// Arithmetic binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
        }
    }
}

/// A dotted reference, optionally bound to a lambda parameter.
///
/// When `lambda_id` is set the first part of `name` is the parameter name and
/// never a column.
#[derive(Clone, Debug, PartialEq)]
pub struct QualifiedReference {
    pub name: QualifiedName,
    pub lambda_id: Option<LambdaId>,
}

/// Expression AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    /// Literal value (null, bool, int, decimal, string).
    Literal(Value),
    /// Session variable, `@name`.
    Variable(String),
    /// Qualified column or alias reference.
    Reference(QualifiedReference),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not(Box<Expression>),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Negate(Box<Expression>),
    In {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    Like {
        expr: Box<Expression>,
        pattern: Box<Expression>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
    /// Parenthesized expression.
    Nested(Box<Expression>),
    FunctionCall {
        catalog: Option<String>,
        name: String,
        args: Vec<Expression>,
    },
    /// `x -> body` or `(x, y) -> body`.
    Lambda {
        parameters: Vec<String>,
        lambda_ids: Vec<LambdaId>,
        body: Box<Expression>,
    },
}

impl Expression {
    /// Creates a literal expression.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    /// Creates a NULL literal.
    pub fn null() -> Self {
        Expression::Literal(Value::Null)
    }

    /// Creates a reference from a dotted name.
    pub fn col(dotted: &str) -> Self {
        Expression::Reference(QualifiedReference {
            name: QualifiedName::parse(dotted),
            lambda_id: None,
        })
    }

    /// Creates a reference to a lambda parameter. The first part of `dotted`
    /// is the parameter name.
    pub fn lambda_ref(lambda_id: LambdaId, dotted: &str) -> Self {
        Expression::Reference(QualifiedReference {
            name: QualifiedName::parse(dotted),
            lambda_id: Some(lambda_id),
        })
    }

    /// Creates a variable reference.
    pub fn var(name: &str) -> Self {
        Expression::Variable(name.to_string())
    }

    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates an equality expression.
    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Eq, left, right)
    }

    /// Creates a not-equal expression.
    pub fn ne(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Ne, left, right)
    }

    /// Creates a less-than expression.
    pub fn lt(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Lt, left, right)
    }

    /// Creates a less-than-or-equal expression.
    pub fn le(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Le, left, right)
    }

    /// Creates a greater-than expression.
    pub fn gt(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Gt, left, right)
    }

    /// Creates a greater-than-or-equal expression.
    pub fn ge(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Ge, left, right)
    }

    /// Creates an AND expression.
    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::Logical {
            op: LogicalOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates an OR expression.
    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Logical {
            op: LogicalOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates a NOT expression.
    pub fn not(expr: Expression) -> Self {
        Expression::Not(Box::new(expr))
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(left: Expression, right: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Add, left, right)
    }

    pub fn sub(left: Expression, right: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Sub, left, right)
    }

    pub fn mul(left: Expression, right: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Mul, left, right)
    }

    pub fn div(left: Expression, right: Expression) -> Self {
        Self::arithmetic(ArithmeticOp::Div, left, right)
    }

    pub fn negate(expr: Expression) -> Self {
        Expression::Negate(Box::new(expr))
    }

    /// Creates an IN expression.
    pub fn in_list(expr: Expression, list: Vec<Expression>) -> Self {
        Expression::In {
            expr: Box::new(expr),
            list,
            negated: false,
        }
    }

    /// Creates a NOT IN expression.
    pub fn not_in_list(expr: Expression, list: Vec<Expression>) -> Self {
        Expression::In {
            expr: Box::new(expr),
            list,
            negated: true,
        }
    }

    /// Creates a LIKE expression.
    pub fn like(expr: Expression, pattern: &str) -> Self {
        Expression::Like {
            expr: Box::new(expr),
            pattern: Box::new(Expression::lit(pattern)),
            negated: false,
        }
    }

    /// Creates a NOT LIKE expression.
    pub fn not_like(expr: Expression, pattern: &str) -> Self {
        Expression::Like {
            expr: Box::new(expr),
            pattern: Box::new(Expression::lit(pattern)),
            negated: true,
        }
    }

    /// Creates an IS NULL expression.
    pub fn is_null(expr: Expression) -> Self {
        Expression::IsNull {
            expr: Box::new(expr),
            negated: false,
        }
    }

    /// Creates an IS NOT NULL expression.
    pub fn is_not_null(expr: Expression) -> Self {
        Expression::IsNull {
            expr: Box::new(expr),
            negated: true,
        }
    }

    /// Wraps in parentheses.
    pub fn nested(expr: Expression) -> Self {
        Expression::Nested(Box::new(expr))
    }

    /// Creates an unqualified function call.
    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            catalog: None,
            name: name.to_string(),
            args,
        }
    }

    /// Creates a single-parameter lambda.
    pub fn lambda(parameter: &str, lambda_id: LambdaId, body: Expression) -> Self {
        Expression::Lambda {
            parameters: vec![parameter.to_string()],
            lambda_ids: vec![lambda_id],
            body: Box::new(body),
        }
    }

    /// ANDs all expressions together, left to right. Returns None for an
    /// empty input.
    pub fn and_all(items: impl IntoIterator<Item = Expression>) -> Option<Expression> {
        items.into_iter().reduce(Expression::and)
    }

    /// Returns the expression with any parentheses stripped.
    pub fn unwrap_nested(&self) -> &Expression {
        match self {
            Expression::Nested(inner) => inner.unwrap_nested(),
            e => e,
        }
    }

    /// Returns true for `AND` (possibly parenthesized).
    pub fn is_and(&self) -> bool {
        matches!(
            self.unwrap_nested(),
            Expression::Logical {
                op: LogicalOp::And,
                ..
            }
        )
    }

    /// Returns the reference if this is a plain qualified reference.
    pub fn as_reference(&self) -> Option<&QualifiedReference> {
        match self.unwrap_nested() {
            Expression::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the direct children.
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Literal(_) | Expression::Variable(_) | Expression::Reference(_) => vec![],
            Expression::Comparison { left, right, .. }
            | Expression::Logical { left, right, .. }
            | Expression::Arithmetic { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Not(e) | Expression::Negate(e) | Expression::Nested(e) => vec![e.as_ref()],
            Expression::In { expr, list, .. } => {
                let mut children = vec![expr.as_ref()];
                children.extend(list.iter());
                children
            }
            Expression::Like { expr, pattern, .. } => vec![expr.as_ref(), pattern.as_ref()],
            Expression::IsNull { expr, .. } => vec![expr.as_ref()],
            Expression::FunctionCall { args, .. } => args.iter().collect(),
            Expression::Lambda { body, .. } => vec![body.as_ref()],
        }
    }

    /// Visits this expression and all descendants in pre-order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expression)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }

    /// Returns true if the expression contains no references or variables,
    /// so it evaluates to the same value everywhere.
    pub fn is_constant(&self) -> bool {
        let mut constant = true;
        self.walk(&mut |e| {
            if matches!(
                e,
                Expression::Reference(_) | Expression::Variable(_) | Expression::FunctionCall { .. }
            ) {
                constant = false;
            }
        });
        constant
    }

    /// Returns the static result type of this expression.
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Literal(v) => v.data_type().unwrap_or_default(),
            Expression::Variable(_) | Expression::Reference(_) => DataType::Any,
            Expression::Comparison { .. }
            | Expression::Logical { .. }
            | Expression::Not(_)
            | Expression::In { .. }
            | Expression::Like { .. }
            | Expression::IsNull { .. } => DataType::Boolean,
            Expression::Arithmetic { left, right, .. } => left.data_type().widen(right.data_type()),
            Expression::Negate(e) | Expression::Nested(e) => e.data_type(),
            Expression::FunctionCall { .. } | Expression::Lambda { .. } => DataType::Any,
        }
    }

    /// Returns true if the expression may evaluate to NULL.
    pub fn is_nullable(&self) -> bool {
        match self {
            Expression::Literal(v) => v.is_null(),
            Expression::IsNull { .. } => false,
            Expression::Variable(_)
            | Expression::Reference(_)
            | Expression::FunctionCall { .. }
            | Expression::Lambda { .. } => true,
            Expression::Arithmetic { op, left, right } => {
                matches!(op, ArithmeticOp::Div | ArithmeticOp::Mod)
                    || left.is_nullable()
                    || right.is_nullable()
            }
            Expression::Comparison { left, right, .. }
            | Expression::Logical { left, right, .. } => left.is_nullable() || right.is_nullable(),
            Expression::Like { expr, pattern, .. } => expr.is_nullable() || pattern.is_nullable(),
            Expression::In { expr, list, .. } => {
                expr.is_nullable() || list.iter().any(Expression::is_nullable)
            }
            Expression::Not(e) | Expression::Negate(e) | Expression::Nested(e) => e.is_nullable(),
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        v => write!(f, "{}", v),
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(v) => write_literal(f, v),
            Expression::Variable(name) => write!(f, "@{}", name),
            Expression::Reference(r) => write!(f, "{}", r.name),
            Expression::Comparison { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Expression::Logical { op, left, right } => {
                let keyword = match op {
                    LogicalOp::And => "AND",
                    LogicalOp::Or => "OR",
                };
                write!(f, "{} {} {}", left, keyword, right)
            }
            Expression::Not(e) => write!(f, "NOT {}", e),
            Expression::Arithmetic { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Expression::Negate(e) => write!(f, "-{}", e),
            Expression::In { expr, list, negated } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                write_list(f, list)?;
                write!(f, ")")
            }
            Expression::Like {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "{} {}LIKE {}",
                expr,
                if *negated { "NOT " } else { "" },
                pattern
            ),
            Expression::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expression::Nested(e) => write!(f, "({})", e),
            Expression::FunctionCall {
                catalog,
                name,
                args,
            } => {
                if let Some(catalog) = catalog {
                    write!(f, "{}#", catalog)?;
                }
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expression::Lambda {
                parameters, body, ..
            } => {
                if parameters.len() == 1 {
                    write!(f, "{} -> {}", parameters[0], body)
                } else {
                    write!(f, "({}) -> {}", parameters.join(", "), body)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_and_display() {
        let e = Expression::and(
            Expression::eq(Expression::col("a.x"), Expression::lit(1i32)),
            Expression::gt(Expression::col("a.z"), Expression::lit("k")),
        );
        assert_eq!(e.to_string(), "a.x = 1 AND a.z > 'k'");
        assert!(e.is_and());

        let call = Expression::call(
            "filter",
            vec![
                Expression::col("b"),
                Expression::lambda("x", 0, Expression::gt(Expression::lambda_ref(0, "x.v"), Expression::lit(2i32))),
            ],
        );
        assert_eq!(call.to_string(), "filter(b, x -> x.v > 2)");
    }

    #[test]
    fn test_and_all() {
        assert!(Expression::and_all(Vec::new()).is_none());
        let e = Expression::and_all(vec![
            Expression::col("a"),
            Expression::col("b"),
            Expression::col("c"),
        ]);
        assert_eq!(e.map(|e| e.to_string()), Some("a AND b AND c".to_string()));
    }

    #[test]
    fn test_data_type() {
        let sum = Expression::add(Expression::lit(1i32), Expression::lit(2i64));
        assert_eq!(sum.data_type(), DataType::Int64);
        assert_eq!(Expression::is_null(Expression::col("a")).data_type(), DataType::Boolean);
        assert_eq!(Expression::col("a.b").data_type(), DataType::Any);
    }

    #[test]
    fn test_nullability() {
        assert!(!Expression::lit(1i32).is_nullable());
        assert!(Expression::null().is_nullable());
        assert!(!Expression::is_null(Expression::col("a")).is_nullable());
        assert!(Expression::div(Expression::lit(1i32), Expression::lit(2i32)).is_nullable());
        assert!(Expression::eq(Expression::col("a"), Expression::lit(1i32)).is_nullable());
    }

    #[test]
    fn test_unwrap_nested() {
        let e = Expression::nested(Expression::nested(Expression::col("a.b")));
        assert!(e.as_reference().is_some());
        assert!(Expression::nested(Expression::and(Expression::col("a"), Expression::col("b"))).is_and());
    }

    #[test]
    fn test_is_constant() {
        assert!(Expression::add(Expression::lit(1i32), Expression::lit(2i32)).is_constant());
        assert!(!Expression::add(Expression::col("a"), Expression::lit(2i32)).is_constant());
        assert!(!Expression::var("x").is_constant());
    }

    #[test]
    fn test_flip() {
        assert_eq!(ComparisonOp::Lt.flip(), ComparisonOp::Gt);
        assert_eq!(ComparisonOp::Eq.flip(), ComparisonOp::Eq);
    }
}
