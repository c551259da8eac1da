use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use segquery::{
    field, CompiledQuery, Dataset, ExecutionError, PreviewConfig, PreviewError, PreviewSession,
    PreviewState, QueryExecutor, Row, SegmentDefinition, SqlValue,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Reply = Result<Vec<Row>, ExecutionError>;

/// Replays scripted replies after their own delay and records every query it
/// receives. Replies registered for a city are matched by the query's first
/// bound parameter; the rest are handed out in order.
#[derive(Default)]
struct ScriptedExecutor {
    script: Mutex<VecDeque<(Duration, Reply)>>,
    by_city: Mutex<HashMap<String, (Duration, Reply)>>,
    received: Mutex<Vec<CompiledQuery>>,
}

impl ScriptedExecutor {
    fn new(script: impl IntoIterator<Item = (u64, Reply)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|(ms, reply)| (Duration::from_millis(ms), reply))
                    .collect(),
            ),
            ..Self::default()
        })
    }

    fn by_city(script: impl IntoIterator<Item = (&'static str, u64, Reply)>) -> Arc<Self> {
        Arc::new(Self {
            by_city: Mutex::new(
                script
                    .into_iter()
                    .map(|(city, ms, reply)| (city.to_owned(), (Duration::from_millis(ms), reply)))
                    .collect(),
            ),
            ..Self::default()
        })
    }

    fn idle() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn received(&self) -> Vec<CompiledQuery> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for ScriptedExecutor {
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, ExecutionError> {
        self.received.lock().unwrap().push(query.clone());
        let keyed = match query.params.first() {
            Some(SqlValue::Text(city)) => self.by_city.lock().unwrap().remove(city),
            _ => None,
        };
        let next = keyed.or_else(|| self.script.lock().unwrap().pop_front());
        let (delay, reply) = next.unwrap_or((Duration::ZERO, Ok(Vec::new())));
        tokio::time::sleep(delay).await;
        reply
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn named(city: &str) -> Row {
    row(json!({ "customer_id": 1, "city": city }))
}

fn session(executor: Arc<ScriptedExecutor>, config: PreviewConfig) -> PreviewSession {
    init_tracing();
    PreviewSession::new(executor, Arc::new(vec![Dataset::new("customers")]), config)
}

fn definition(city: &str) -> SegmentDefinition {
    let mut def = SegmentDefinition::new("s");
    def.select_dataset("customers");
    def.add_condition(field("city").equals(city));
    def
}

fn loaded_city(state: &PreviewState) -> Option<String> {
    match state {
        PreviewState::Loaded { rows, .. } => rows.rendered().first().map(|r| r[1].clone()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Last request wins
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn slow_superseded_request_never_commits() {
    let exec = ScriptedExecutor::new([
        (500, Ok(vec![named("Hanoi")])),
        (50, Ok(vec![named("Hue")])),
    ]);
    let s = session(exec.clone(), PreviewConfig::default());

    let first = s.request_preview(&definition("Hanoi"));
    tokio::task::yield_now().await;
    let second = s.request_preview(&definition("Hue"));
    assert!(second > first);

    let settled = s.wait().await;
    assert_eq!(settled.request(), Some(second));
    assert_eq!(loaded_city(&settled).as_deref(), Some("Hue"));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(s.state(), settled);
}

#[tokio::test(start_paused = true)]
async fn fast_first_request_is_still_superseded() {
    let exec = ScriptedExecutor::by_city([
        ("Hanoi", 10, Ok(vec![named("Hanoi")])),
        ("Hue", 300, Ok(vec![named("Hue")])),
    ]);
    let s = session(exec.clone(), PreviewConfig::default());

    s.request_preview(&definition("Hanoi"));
    tokio::task::yield_now().await;
    let second = s.request_preview(&definition("Hue"));
    tokio::task::yield_now().await;
    assert_eq!(exec.received().len(), 2);

    // The first reply would have landed at 10 ms.
    tokio::time::sleep(Duration::from_millis(50)).await;
    match s.state() {
        PreviewState::Loading { request, .. } => assert_eq!(request, second),
        other => panic!("expected Loading, got {other:?}"),
    }

    let settled = s.wait().await;
    assert_eq!(settled.request(), Some(second));
    assert_eq!(loaded_city(&settled).as_deref(), Some("Hue"));
}

#[tokio::test(start_paused = true)]
async fn late_failure_of_superseded_request_is_dropped() {
    let exec = ScriptedExecutor::by_city([
        ("Hanoi", 500, Err(ExecutionError::Network("connection reset".into()))),
        ("Hue", 50, Ok(vec![named("Hue")])),
    ]);
    let s = session(exec.clone(), PreviewConfig::default());

    s.request_preview(&definition("Hanoi"));
    tokio::task::yield_now().await;
    let second = s.request_preview(&definition("Hue"));

    let settled = s.wait().await;
    assert_eq!(settled.request(), Some(second));
    assert_eq!(loaded_city(&settled).as_deref(), Some("Hue"));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(s.state(), settled);
    assert_eq!(exec.received().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn superseded_request_never_times_out_over_newer() {
    let config = PreviewConfig::default().with_timeout(Duration::from_secs(2));
    let exec = ScriptedExecutor::by_city([
        ("Hanoi", 60_000, Ok(vec![named("Hanoi")])),
        ("Hue", 60_000, Ok(vec![named("Hue")])),
    ]);
    let s = session(exec, config);

    s.request_preview(&definition("Hanoi"));
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    let second = s.request_preview(&definition("Hue"));

    // The first request's deadline passes at 2 s.
    tokio::time::sleep(Duration::from_secs(1)).await;
    match s.state() {
        PreviewState::Loading { request, .. } => assert_eq!(request, second),
        other => panic!("expected Loading, got {other:?}"),
    }

    assert_eq!(
        s.wait().await,
        PreviewState::Failed {
            request: second,
            error: PreviewError::Timeout {
                after: Duration::from_secs(2)
            },
        }
    );
}

#[tokio::test(start_paused = true)]
async fn new_request_clears_previous_results() {
    let exec = ScriptedExecutor::new([
        (0, Ok(vec![named("Hanoi")])),
        (100, Ok(vec![named("Hue")])),
    ]);
    let s = session(exec, PreviewConfig::default());

    s.request_preview(&definition("Hanoi"));
    assert!(matches!(s.wait().await, PreviewState::Loaded { .. }));

    let id = s.request_preview(&definition("Hue"));
    match s.state() {
        PreviewState::Loading { request, .. } => assert_eq!(request, id),
        other => panic!("expected Loading, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn empty_result() {
    let s = session(ScriptedExecutor::new([(5, Ok(vec![]))]), PreviewConfig::default());
    let id = s.request_preview(&definition("Nowhere"));
    assert_eq!(s.wait().await, PreviewState::Empty { request: id });
}

#[tokio::test(start_paused = true)]
async fn execution_failure() {
    let s = session(
        ScriptedExecutor::new([(5, Err(ExecutionError::Query("relation does not exist".into())))]),
        PreviewConfig::default(),
    );
    let id = s.request_preview(&definition("Hanoi"));
    match s.wait().await {
        PreviewState::Failed { request, error } => {
            assert_eq!(request, id);
            assert_eq!(
                error,
                PreviewError::Execution(ExecutionError::Query("relation does not exist".into()))
            );
            assert_eq!(error.to_string(), "query failed: relation does not exist");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn timeout_fails_the_preview() {
    let config = PreviewConfig::default().with_timeout(Duration::from_secs(2));
    let s = session(
        ScriptedExecutor::new([(60_000, Ok(vec![named("Hanoi")]))]),
        config,
    );
    let id = s.request_preview(&definition("Hanoi"));
    assert_eq!(
        s.wait().await,
        PreviewState::Failed {
            request: id,
            error: PreviewError::Timeout {
                after: Duration::from_secs(2)
            },
        }
    );
}

#[tokio::test(start_paused = true)]
async fn no_dataset_fails_without_dispatch() {
    let exec = ScriptedExecutor::idle();
    let s = session(exec.clone(), PreviewConfig::default());
    let mut def = definition("Hanoi");
    def.selected_dataset = None;

    let id = s.request_preview(&def);
    assert_eq!(
        s.wait().await,
        PreviewState::Failed {
            request: id,
            error: PreviewError::NoDataset
        }
    );
    assert!(exec.received().is_empty());
    assert_eq!(s.last_query(), None);
}

#[tokio::test(start_paused = true)]
async fn cancel_marks_request_cancelled() {
    let exec = ScriptedExecutor::new([(1_000, Ok(vec![named("Hanoi")]))]);
    let s = session(exec, PreviewConfig::default());

    let id = s.request_preview(&definition("Hanoi"));
    s.cancel();
    assert_eq!(s.state(), PreviewState::Cancelled { request: id });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(s.state(), PreviewState::Cancelled { request: id });
}

#[tokio::test(start_paused = true)]
async fn cancel_when_idle_is_noop() {
    let s = session(ScriptedExecutor::idle(), PreviewConfig::default());
    s.cancel();
    assert_eq!(s.state(), PreviewState::Idle);
}

// ---------------------------------------------------------------------------
// Copy query
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn copied_query_is_the_dispatched_query() {
    let exec = ScriptedExecutor::new([(0, Ok(vec![named("Hanoi")]))]);
    let s = session(exec.clone(), PreviewConfig::default());
    let def = definition("O'Brien");

    let copied = s.copy_query(&def).unwrap();
    s.request_preview(&def);
    s.wait().await;

    assert_eq!(exec.received(), vec![copied.clone()]);
    assert_eq!(s.last_query(), Some(copied.clone()));
    assert_eq!(
        copied.to_inline_sql(),
        "SELECT * FROM customers WHERE city = 'O''Brien' LIMIT 100"
    );
}

// ---------------------------------------------------------------------------
// Row rendering
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn rows_render_for_display() {
    let exec = ScriptedExecutor::new([(
        0,
        Ok(vec![
            row(json!({ "id": 1, "vip": true, "email": null })),
            row(json!({ "id": 2, "vip": false, "tags": ["a", "b"] })),
        ]),
    )]);
    let s = session(exec, PreviewConfig::default());
    s.request_preview(&definition("Hanoi"));

    match s.wait().await {
        PreviewState::Loaded { rows, .. } => {
            assert_eq!(rows.columns(), ["id", "vip", "email", "tags"]);
            assert_eq!(
                rows.rendered(),
                vec![
                    vec!["1", "Yes", "-", "-"],
                    vec!["2", "No", "-", r#"["a","b"]"#],
                ]
            );
        }
        other => panic!("expected Loaded, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn oversized_results_are_truncated() {
    let rows = (0..250).map(|i| row(json!({ "id": i }))).collect();
    let s = session(ScriptedExecutor::new([(0, Ok(rows))]), PreviewConfig::default());
    s.request_preview(&definition("Hanoi"));
    match s.wait().await {
        PreviewState::Loaded { rows, .. } => assert_eq!(rows.len(), 100),
        other => panic!("expected Loaded, got {other:?}"),
    }
}
