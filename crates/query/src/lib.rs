//! Braid Query - compiles parsed queries into operator trees and runs them
//! over pluggable catalogs.
//!
//! This crate provides:
//!
//! - `ast`: Expressions, qualified names and SELECT statements
//! - `alias`: The table alias tree a query's sources form
//! - `resolver`: Qualified-name resolution against the alias tree
//! - `analyzer`: Predicate splitting for pushdown and join keys
//! - `catalog`: The catalog contract, plus in-memory and `sys` catalogs
//! - `compiler`: Expression compilation, functions and projections
//! - `executor`: Pull-based operators (scan, filter, join, cache, sort, top)
//! - `planner`: The operator builder and the `Engine` facade
//! - `context`: Session, variables and per-statement state
//!
//! # Example
//!
//! ```ignore
//! use braid_query::ast::{Expression, Select, SelectItem, TableSource};
//! use braid_query::{Engine, EngineConfig, ExecutionContext, Session};
//!
//! let mut engine = Engine::new(EngineConfig::default().with_default_catalog("mem"));
//! engine.register_catalog("mem", Rc::new(catalog));
//!
//! let select = Select::new(vec![SelectItem::expr(Expression::col("name"))])
//!     .from(TableSource::table("users"))
//!     .filter(Expression::gt(Expression::col("age"), Expression::lit(30i32)));
//! let mut ctx = ExecutionContext::new(Rc::new(Session::new()));
//! engine.execute(&select, &mut ctx, &mut writer)?;
//! ```

pub mod alias;
pub mod analyzer;
pub mod ast;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod context;
pub mod executor;
pub mod planner;
pub mod resolver;

pub use catalog::{Catalog, CatalogRegistry, MemoryCatalog, MemoryTable};
pub use compiler::{FunctionRegistry, OutputWriter};
pub use config::EngineConfig;
pub use context::{ExecutionContext, Session};
pub use planner::{CompiledQuery, Engine};
