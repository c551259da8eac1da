use std::time::Duration;

use thiserror::Error;

/// Failure reported by the external query execution service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("network error: {0}")]
    Network(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("execution rejected: {0}")]
    Rejected(String),
}

/// Why a preview ended in the failed state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("no dataset selected")]
    NoDataset,

    #[error("unknown dataset '{name}'")]
    UnknownDataset { name: String },

    #[error("preview timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("preview task aborted unexpectedly")]
    Aborted,
}

/// Failure reported by the external persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("segment name must not be empty")]
    EmptyName,

    #[error("save failed: {0}")]
    Backend(String),
}
