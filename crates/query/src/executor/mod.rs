//! Execution runtime.
//!
//! Operators form an immutable tree built once per query. Opening an
//! operator yields a pull iterator; all per-run state lives in the iterators
//! and in the [`ExecutionContext`](crate::context::ExecutionContext).

mod cache;
mod filter;
mod group;
pub mod join;
mod limit;
pub(crate) mod operator;
mod runner;
mod scan;
mod sort;

pub use cache::CachingOperator;
pub use filter::FilterOperator;
pub use group::GroupOperator;
pub use join::{HashJoin, JoinCore, JoinKeys, NestedLoopJoin};
pub use limit::TopOperator;
pub use operator::{explain, Cursor, Operator, SharedIterator, TupleIterator};
pub use runner::{InMemoryTemporaryTables, QueryRunner, TemporaryTable, TemporaryTableKey, TemporaryTableSink};
pub use scan::{SingleRowOperator, TableSourceOperator};
pub use sort::SortOperator;

pub(crate) use operator::{close_all, finish, materialize};
