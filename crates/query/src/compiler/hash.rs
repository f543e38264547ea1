//! Composite hashing of value lists.
//!
//! Join keys and cache keys hash an ordered list of values. The hash is
//! seeded, order-sensitive, and treats null as a fixed sentinel rather than
//! skipping it. Numerics are normalized so values that compare equal under
//! SQL coercion (`1`, `1i64`, `1.0`) hash equally.

use super::CompiledScalar;
use crate::context::ExecutionContext;
use braid_core::{Result, Tuple, Value};
use std::hash::{Hash, Hasher};

/// Simple FNV-1a hasher.
pub(crate) struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub(crate) fn new() -> Self {
        Self {
            state: Self::FNV_OFFSET,
        }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= *byte as u64;
            self.state = self.state.wrapping_mul(Self::FNV_PRIME);
        }
    }
}

const NULL_SENTINEL: u64 = 0x9e37_79b9_7f4a_7c15;

/// Feeds one value into `hasher` with numeric normalization.
pub(crate) fn hash_value<H: Hasher>(value: &Value, hasher: &mut H) {
    match value {
        Value::Null => hasher.write_u64(NULL_SENTINEL),
        Value::Boolean(b) => {
            hasher.write_u8(1);
            b.hash(hasher);
        }
        Value::Int32(_) | Value::Int64(_) | Value::DateTime(_) => {
            hasher.write_u8(2);
            let v = match value {
                Value::Int32(i) => *i as i64,
                Value::Int64(i) | Value::DateTime(i) => *i,
                _ => 0,
            };
            hasher.write_i64(v);
        }
        Value::Float64(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                hasher.write_u8(2);
                hasher.write_i64(*f as i64);
            } else {
                hasher.write_u8(3);
                hasher.write_u64(f.to_bits());
            }
        }
        Value::String(s) => {
            hasher.write_u8(4);
            hasher.write(s.as_bytes());
            hasher.write_u8(0xff);
        }
        Value::Bytes(b) => {
            hasher.write_u8(5);
            hasher.write_usize(b.len());
            hasher.write(b);
        }
        Value::Array(items) => {
            hasher.write_u8(6);
            hasher.write_usize(items.len());
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Tuples(t) => {
            hasher.write_u8(7);
            hasher.write_usize(t.len());
        }
    }
}

/// Hashes an ordered list of values.
pub fn hash_values(values: &[Value]) -> u64 {
    let mut hasher = FnvHasher::new();
    for value in values {
        hash_value(value, &mut hasher);
    }
    hasher.finish()
}

/// Equality used for keys: null equals null, everything else by SQL
/// comparison.
fn key_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Tuples(x), Value::Tuples(y)) => x == y,
        _ => a.sql_eq(b),
    }
}

/// A hashed list of values usable as a map key.
#[derive(Clone, Debug)]
pub struct HashKey {
    values: Vec<Value>,
    hash: u64,
}

impl HashKey {
    pub fn new(values: Vec<Value>) -> Self {
        let hash = hash_values(&values);
        Self { values, hash }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// True if any component is null.
    pub fn has_null(&self) -> bool {
        self.values.iter().any(Value::is_null)
    }

    pub fn hash_code(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.values.len() == other.values.len()
            && self.values.iter().zip(&other.values).all(|(a, b)| key_eq(a, b))
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Compiled hash function over an ordered expression list.
#[derive(Clone)]
pub struct CompositeHash {
    items: Vec<CompiledScalar>,
}

impl CompositeHash {
    pub fn new(items: Vec<CompiledScalar>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Evaluates every item against `tuple`.
    pub fn key(&self, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<HashKey> {
        let mut values = Vec::with_capacity(self.items.len());
        for item in &self.items {
            values.push(item.evaluate(tuple, ctx)?);
        }
        Ok(HashKey::new(values))
    }

    /// Evaluates and hashes without keeping the values.
    pub fn hash(&self, tuple: &Tuple, ctx: &mut ExecutionContext) -> Result<u64> {
        let mut hasher = FnvHasher::new();
        for item in &self.items {
            hash_value(&item.evaluate(tuple, ctx)?, &mut hasher);
        }
        Ok(hasher.finish())
    }

    /// Item texts, for plan descriptions.
    pub fn describe(&self) -> String {
        self.items
            .iter()
            .map(|i| i.text().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
