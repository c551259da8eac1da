use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use segquery::{
    field, CompiledQuery, Dataset, ExecutionError, PreviewConfig, PreviewSession, PreviewState,
    QueryExecutor, Row, SegmentDefinition,
};

/// Pretends to be a warehouse: answers every query with two rows after a delay.
struct SlowWarehouse;

#[async_trait]
impl QueryExecutor for SlowWarehouse {
    async fn execute(&self, query: &CompiledQuery) -> Result<Vec<Row>, ExecutionError> {
        println!("executing: {query}  {:?}", query.params);
        tokio::time::sleep(Duration::from_millis(200)).await;
        let rows = [
            json!({ "customer_id": 1, "city": "Hanoi", "vip": true }),
            json!({ "customer_id": 2, "city": "Hanoi", "vip": false, "email": null }),
        ];
        Ok(rows
            .into_iter()
            .filter_map(|r| match r {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }
}

#[tokio::main]
async fn main() {
    let session = PreviewSession::new(
        Arc::new(SlowWarehouse),
        Arc::new(vec![Dataset::new("customers")]),
        PreviewConfig::default().with_timeout(Duration::from_secs(5)),
    );

    let mut def = SegmentDefinition::new("Hanoi");
    def.select_dataset("customers");
    def.add_condition(field("city").equals("Hue"));

    // Superseded before it can finish.
    session.request_preview(&def);

    def.update_condition(0, field("city").equals("Hanoi"));
    session.request_preview(&def);

    match session.wait().await {
        PreviewState::Loaded { request, rows } => {
            println!("request {request}: {} rows", rows.len());
            println!("{}", rows.columns().join(" | "));
            for cells in rows.rendered() {
                println!("{}", cells.join(" | "));
            }
        }
        other => println!("preview ended as {other:?}"),
    }
}
