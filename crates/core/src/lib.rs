//! Braid Core - values, rows and errors shared by the braid query engine.
//!
//! This crate provides the foundational types:
//!
//! - `DataType`: Static types reported by expressions
//! - `Value`: Runtime values produced by catalogs and expressions
//! - `Row`: A record produced by a catalog, with shared column names
//! - `Tuple`: One slot per table alias, the unit operators exchange
//! - `Error`: The engine's error taxonomy
//!
//! # Example
//!
//! ```rust
//! use braid_core::{Row, Tuple, Value};
//! use std::rc::Rc;
//!
//! let columns = Row::columns_of(&["id", "name"]);
//! let row = Row::new(columns, vec![Value::Int64(1), Value::String("Alice".into())]);
//!
//! let tuple = Tuple::single(2, 1, Rc::new(row));
//! assert_eq!(tuple.value(1, "name"), Some(&Value::String("Alice".into())));
//! assert!(tuple.row(0).is_none());
//! ```

mod error;
pub mod pattern_match;
mod row;
mod tuple;
mod types;
mod value;

pub use error::{Error, ErrorKind, Result};
pub use row::{Columns, Row};
pub use tuple::{Slot, Tuple};
pub use types::DataType;
pub use value::Value;
