//! Cancellable, bounded previews of a segment definition.
//!
//! A [`PreviewSession`] compiles the working definition, dispatches the
//! compiled query to an external [`QueryExecutor`] and publishes the outcome
//! as a [`PreviewState`]. Only the latest request can ever commit: issuing a
//! new request aborts the previous one, and every commit is checked against
//! the request sequence number before it is applied.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::config::PreviewConfig;
use crate::types::{
    CompiledQuery, Dataset, ExecutionError, PreviewError, PreviewRows, Row, RowCap,
    SegmentDefinition,
};

/// External service that runs compiled queries.
#[async_trait]
pub trait QueryExecutor: Send + Sync + 'static {
    /// Execute `query` with its bound parameters and return at most
    /// `query.limit` rows.
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, ExecutionError>;
}

/// Read-only dataset metadata.
pub trait DatasetProvider: Send + Sync + 'static {
    fn dataset(&self, name: &str) -> Option<Dataset>;
}

impl DatasetProvider for Vec<Dataset> {
    fn dataset(&self, name: &str) -> Option<Dataset> {
        self.iter().find(|d| d.name == name).cloned()
    }
}

impl DatasetProvider for HashMap<String, Dataset> {
    fn dataset(&self, name: &str) -> Option<Dataset> {
        self.get(name).cloned()
    }
}

/// Observable state of a preview session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PreviewState {
    #[default]
    Idle,
    Loading {
        request: u64,
        query: CompiledQuery,
    },
    Loaded {
        request: u64,
        rows: PreviewRows,
    },
    /// The query ran and matched no rows.
    Empty {
        request: u64,
    },
    Failed {
        request: u64,
        error: PreviewError,
    },
    Cancelled {
        request: u64,
    },
}

impl PreviewState {
    /// The request this state belongs to, if any.
    #[must_use]
    pub fn request(&self) -> Option<u64> {
        match self {
            PreviewState::Idle => None,
            PreviewState::Loading { request, .. }
            | PreviewState::Loaded { request, .. }
            | PreviewState::Empty { request }
            | PreviewState::Failed { request, .. }
            | PreviewState::Cancelled { request } => Some(*request),
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, PreviewState::Loading { .. })
    }
}

/// Runs previews of segment definitions against an execution service.
///
/// Requests must be issued from within a Tokio runtime.
pub struct PreviewSession {
    executor: Arc<dyn QueryExecutor>,
    datasets: Arc<dyn DatasetProvider>,
    config: PreviewConfig,
    sequence: AtomicU64,
    state: Arc<watch::Sender<PreviewState>>,
    in_flight: Mutex<Option<AbortHandle>>,
    last_query: Mutex<Option<CompiledQuery>>,
    #[cfg(feature = "query-cache")]
    cache: Mutex<crate::cache::QueryCache>,
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("config", &self.config)
            .field("sequence", &self.sequence)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl PreviewSession {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        datasets: Arc<dyn DatasetProvider>,
        config: PreviewConfig,
    ) -> Self {
        let (state, _) = watch::channel(PreviewState::Idle);
        Self {
            executor,
            datasets,
            config,
            sequence: AtomicU64::new(0),
            state: Arc::new(state),
            in_flight: Mutex::new(None),
            last_query: Mutex::new(None),
            #[cfg(feature = "query-cache")]
            cache: Mutex::new(crate::cache::QueryCache::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    /// Receive every state transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.state.subscribe()
    }

    /// The query dispatched by the most recent request.
    #[must_use]
    pub fn last_query(&self) -> Option<CompiledQuery> {
        lock(&self.last_query).clone()
    }

    /// The exact query [`request_preview`](Self::request_preview) would dispatch
    /// for `definition`.
    ///
    /// # Errors
    ///
    /// Returns [`PreviewError::NoDataset`] or [`PreviewError::UnknownDataset`]
    /// if the definition's dataset cannot be resolved.
    pub fn copy_query(&self, definition: &SegmentDefinition) -> Result<CompiledQuery, PreviewError> {
        self.prepare(definition, RowCap::Preview)
    }

    /// The query used to materialize the full segment at save time. Its cap
    /// is always above the preview cap.
    ///
    /// # Errors
    ///
    /// Same as [`copy_query`](Self::copy_query).
    pub fn materialize_query(
        &self,
        definition: &SegmentDefinition,
    ) -> Result<CompiledQuery, PreviewError> {
        let cap = RowCap::Materialize(self.config.effective_materialize_limit());
        self.prepare(definition, cap)
    }

    /// Start a preview of `definition`, superseding any request in flight.
    /// Returns the request's sequence number.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn request_preview(&self, definition: &SegmentDefinition) -> u64 {
        let request = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.supersede();

        let query = match self.prepare(definition, RowCap::Preview) {
            Ok(query) => query,
            Err(error) => {
                warn!(request, %error, "preview could not be prepared");
                self.state
                    .send_replace(PreviewState::Failed { request, error });
                return request;
            }
        };

        *lock(&self.last_query) = Some(query.clone());
        self.state.send_replace(PreviewState::Loading {
            request,
            query: query.clone(),
        });
        debug!(request, params = query.params.len(), "dispatching preview");

        let executor = Arc::clone(&self.executor);
        let dispatched = query.clone();
        let execution = tokio::spawn(async move { executor.execute(&dispatched).await });
        *lock(&self.in_flight) = Some(execution.abort_handle());

        let state = Arc::clone(&self.state);
        let timeout = self.config.timeout;
        tokio::spawn(async move {
            let abort = execution.abort_handle();
            let next = match tokio::time::timeout(timeout, execution).await {
                Err(_) => {
                    abort.abort();
                    warn!(request, ?timeout, "preview timed out");
                    PreviewState::Failed {
                        request,
                        error: PreviewError::Timeout { after: timeout },
                    }
                }
                Ok(Err(join)) if join.is_cancelled() => return,
                Ok(Err(join)) => {
                    warn!(request, error = %join, "preview task failed");
                    PreviewState::Failed {
                        request,
                        error: PreviewError::Aborted,
                    }
                }
                Ok(Ok(Err(error))) => {
                    warn!(request, %error, "preview execution failed");
                    PreviewState::Failed {
                        request,
                        error: error.into(),
                    }
                }
                Ok(Ok(Ok(rows))) => loaded(request, rows, query.limit),
            };
            commit(&state, request, next);
        });

        request
    }

    /// Abort the request in flight, if any.
    pub fn cancel(&self) {
        self.supersede();
    }

    /// Wait until the current request leaves the loading state.
    pub async fn wait(&self) -> PreviewState {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(|s| !s.is_loading()).await.map(|s| (*s).clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Abort the in-flight task and mark its request cancelled.
    fn supersede(&self) {
        if let Some(handle) = lock(&self.in_flight).take() {
            handle.abort();
        }
        self.state.send_if_modified(|current| match current {
            PreviewState::Loading { request, .. } => {
                debug!(request = *request, "preview superseded");
                *current = PreviewState::Cancelled { request: *request };
                true
            }
            _ => false,
        });
    }

    fn prepare(
        &self,
        definition: &SegmentDefinition,
        cap: RowCap,
    ) -> Result<CompiledQuery, PreviewError> {
        let name = definition
            .selected_dataset
            .as_deref()
            .ok_or(PreviewError::NoDataset)?;
        let dataset = self
            .datasets
            .dataset(name)
            .ok_or_else(|| PreviewError::UnknownDataset {
                name: name.to_owned(),
            })?;
        Ok(self.compile_cached(&dataset, definition, cap))
    }

    #[cfg(not(feature = "query-cache"))]
    fn compile_cached(
        &self,
        dataset: &Dataset,
        definition: &SegmentDefinition,
        cap: RowCap,
    ) -> CompiledQuery {
        crate::compile_query(dataset, definition, &self.config, cap)
    }

    #[cfg(feature = "query-cache")]
    fn compile_cached(
        &self,
        dataset: &Dataset,
        definition: &SegmentDefinition,
        cap: RowCap,
    ) -> CompiledQuery {
        let mut cache = lock(&self.cache);
        match cache.get_or_compile(dataset, definition, &self.config, cap) {
            Ok(query) => query,
            Err(error) => {
                warn!(%error, "query cache unavailable; compiling directly");
                crate::compile_query(dataset, definition, &self.config, cap)
            }
        }
    }
}

impl Drop for PreviewSession {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.in_flight).take() {
            handle.abort();
        }
    }
}

fn loaded(request: u64, mut rows: Vec<Row>, limit: u32) -> PreviewState {
    let cap = usize::try_from(limit).unwrap_or(usize::MAX);
    if rows.len() > cap {
        warn!(request, returned = rows.len(), limit, "executor ignored row cap; truncating");
        rows.truncate(cap);
    }
    if rows.is_empty() {
        debug!(request, "preview matched no rows");
        return PreviewState::Empty { request };
    }
    debug!(request, rows = rows.len(), "preview loaded");
    PreviewState::Loaded {
        request,
        rows: PreviewRows::new(rows),
    }
}

/// Apply `next` only if `request` is still the one loading.
fn commit(state: &watch::Sender<PreviewState>, request: u64, next: PreviewState) {
    let applied = state.send_if_modified(|current| match current {
        PreviewState::Loading { request: live, .. } if *live == request => {
            *current = next;
            true
        }
        _ => false,
    });
    if !applied {
        debug!(request, "discarding stale preview result");
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
