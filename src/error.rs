use thiserror::Error;

use crate::parse::ParseError;

/// Unified error type covering parsing, I/O and the query cache.
///
/// Returned by convenience methods like
/// [`SegmentDefinition::from_dsl()`](crate::SegmentDefinition::from_dsl) and
/// [`SegmentDefinition::from_file()`](crate::SegmentDefinition::from_file).
#[derive(Debug, Error)]
pub enum SegqueryError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "query-cache")]
    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),
}
