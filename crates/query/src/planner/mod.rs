//! Query planning: alias tree construction, predicate placement and join
//! strategy selection.

mod builder;
mod engine;
mod index;

pub use builder::{CompiledQuery, OperatorBuilder};
pub use engine::Engine;
