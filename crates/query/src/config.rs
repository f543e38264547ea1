//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Knobs the operator builder consults.
///
/// Deserializes from any serde format; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Catalog alias used for table sources without a catalog qualifier.
    pub default_catalog: Option<String>,
    /// Use a hash join for uncorrelated equi joins. Off by default, in which
    /// case the inner side is re-opened per outer tuple (and cached).
    pub hash_join: bool,
    /// Wrap re-scanned inner join sides in a caching operator.
    pub cache_inner: bool,
    /// Offer ORDER BY items to the first table source.
    pub push_sort_items: bool,
    /// Batch size used when an index reports none.
    pub default_batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_catalog: None,
            hash_join: false,
            cache_inner: true,
            push_sort_items: true,
            default_batch_size: 500,
        }
    }
}

impl EngineConfig {
    pub fn with_default_catalog(mut self, alias: &str) -> Self {
        self.default_catalog = Some(alias.to_string());
        self
    }

    pub fn with_hash_join(mut self, enabled: bool) -> Self {
        self.hash_join = enabled;
        self
    }

    pub fn with_cache_inner(mut self, enabled: bool) -> Self {
        self.cache_inner = enabled;
        self
    }

    pub fn with_push_sort_items(mut self, enabled: bool) -> Self {
        self.push_sort_items = enabled;
        self
    }
}
