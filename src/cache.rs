//! Read-through cache of compiled queries.
//!
//! Keys are the BLAKE3 digest of the bincode encoding of every compile input:
//! the dataset, the filter and membership parts of the definition, the
//! membership table, the dialect and the row cap. Two requests share an entry
//! only if they would compile to the same query.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use crate::config::{MembershipTable, PreviewConfig};
use crate::types::{
    BoolOp, CompiledQuery, Condition, ConditionGroup, Dataset, Dialect, RowCap,
    SegmentDefinition, SegmentRef,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Entries held before the cache is cleared wholesale.
pub const DEFAULT_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while deriving a cache key.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode cache key: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Name and description never reach the SQL and are left out of the key.
#[derive(Serialize)]
struct KeyParts<'a> {
    dataset: &'a Dataset,
    root_operator: BoolOp,
    conditions: &'a [Condition],
    condition_groups: &'a [ConditionGroup],
    inclusions: &'a [SegmentRef],
    exclusions: &'a [SegmentRef],
    membership: &'a MembershipTable,
    dialect: Dialect,
    cap: RowCap,
}

/// Digest identifying one compilation.
pub type CacheKey = [u8; 32];

/// Compute the cache key for a compilation.
///
/// # Errors
///
/// Returns [`CacheError::Encode`] if the inputs cannot be bincode-encoded.
pub fn cache_key(
    dataset: &Dataset,
    definition: &SegmentDefinition,
    config: &PreviewConfig,
    cap: RowCap,
) -> Result<CacheKey, CacheError> {
    let parts = KeyParts {
        dataset,
        root_operator: definition.root_operator,
        conditions: &definition.conditions,
        condition_groups: &definition.condition_groups,
        inclusions: definition.inclusions(),
        exclusions: definition.exclusions(),
        membership: &config.membership,
        dialect: config.dialect,
        cap,
    };
    let bytes = bincode::serde::encode_to_vec(&parts, bincode::config::standard())?;
    Ok(*blake3::hash(&bytes).as_bytes())
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// Bounded map from [`CacheKey`] to [`CompiledQuery`].
#[derive(Debug)]
pub struct QueryCache {
    entries: HashMap<CacheKey, CompiledQuery>,
    capacity: usize,
    hits: u64,
    misses: u64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl QueryCache {
    /// A cache holding at most `capacity` entries. A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            hits: 0,
            misses: 0,
        }
    }

    /// Return the cached query for these inputs, compiling it on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the key cannot be computed.
    pub fn get_or_compile(
        &mut self,
        dataset: &Dataset,
        definition: &SegmentDefinition,
        config: &PreviewConfig,
        cap: RowCap,
    ) -> Result<CompiledQuery, CacheError> {
        let key = cache_key(dataset, definition, config, cap)?;
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            trace!(hits = self.hits, "query cache hit");
            return Ok(hit.clone());
        }

        self.misses += 1;
        let query = crate::compile_query(dataset, definition, config, cap);
        if self.entries.len() >= self.capacity {
            trace!(capacity = self.capacity, "query cache full; clearing");
            self.entries.clear();
        }
        self.entries.insert(key, query.clone());
        Ok(query)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
