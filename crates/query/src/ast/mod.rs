//! AST consumed by the engine: expressions, qualified names and statements.

mod expr;
mod name;
mod statement;

pub use expr::{ArithmeticOp, ComparisonOp, Expression, LambdaId, LogicalOp, QualifiedReference};
pub use name::QualifiedName;
pub use statement::{
    ApplyType, Join, JoinKind, JoinType, NestedShape, NullOrder, Select, SelectItem, SortItem,
    SortOrder, Statement, TableOption, TableSource, TableSourceJoined,
};
