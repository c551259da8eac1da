use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One result row: column name to value, in the column order returned by
/// the execution service.
pub type Row = serde_json::Map<String, JsonValue>;

/// Placeholder shown for missing and null cells.
pub const EMPTY_CELL: &str = "-";

/// Render a single cell for display.
///
/// Nulls render as `-`, booleans as `Yes`/`No`, arrays and objects as their
/// JSON text, and everything else as its plain string form.
#[must_use]
pub fn render_cell(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => EMPTY_CELL.to_owned(),
        Some(JsonValue::Bool(true)) => "Yes".to_owned(),
        Some(JsonValue::Bool(false)) => "No".to_owned(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(composite @ (JsonValue::Array(_) | JsonValue::Object(_))) => {
            serde_json::to_string(composite).unwrap_or_else(|_| format!("{composite:?}"))
        }
    }
}

/// A bounded set of preview rows plus the table header derived from them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PreviewRows {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl PreviewRows {
    /// Columns are taken from the rows themselves, in first-seen order.
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every row rendered cell by cell, aligned with [`columns`](Self::columns).
    #[must_use]
    pub fn rendered(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| render_cell(row.get(c)))
                    .collect()
            })
            .collect()
    }
}
