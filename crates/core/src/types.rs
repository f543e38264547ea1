//! Data type definitions for braid.
//!
//! Expressions report a static `DataType`; catalogs that cannot know their
//! column types up front report `Any`.

/// Static type of a value or expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    /// Type unknown until runtime.
    #[default]
    Any,
    /// Boolean type (true/false)
    Boolean,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit floating point number (decimal literals)
    Float64,
    /// UTF-8 string
    String,
    /// Date and time stored as Unix timestamp (milliseconds)
    DateTime,
    /// Binary data
    Bytes,
    /// Array of values
    Array,
    /// Rows of a populated alias
    Tuples,
}

impl DataType {
    /// Returns whether this type takes part in arithmetic.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }

    /// Returns the result type of an arithmetic operation between two types.
    ///
    /// Integers widen to `Int64` when mixed, anything combined with `Float64`
    /// yields `Float64`. Non-numeric or unknown operands yield `Any`.
    pub fn widen(self, other: DataType) -> DataType {
        match (self, other) {
            (DataType::Int32, DataType::Int32) => DataType::Int32,
            (DataType::Int32 | DataType::Int64, DataType::Int32 | DataType::Int64) => {
                DataType::Int64
            }
            (DataType::Float64, t) | (t, DataType::Float64) if t.is_numeric() => DataType::Float64,
            (DataType::String, DataType::String) => DataType::String,
            _ => DataType::Any,
        }
    }
}
