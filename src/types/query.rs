use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::plan::SqlValue;

/// Placeholder style used for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// `$1`, `$2`, ...
    #[default]
    Postgres,
    /// `?` for every parameter.
    Positional,
}

impl Dialect {
    /// Placeholder for the parameter at 1-based `index`.
    #[must_use]
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Positional => "?".to_owned(),
        }
    }
}

/// A rendered query ready for the execution service.
///
/// `sql` only ever contains placeholders for user-supplied values; the values
/// travel separately in `params`. `inline_sql` is the same statement with the
/// values written as escaped literals, for display and clipboard export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub limit: u32,
    pub(crate) inline_sql: String,
    /// Byte range of the WHERE predicate within `inline_sql`.
    pub(crate) predicate_span: Range<usize>,
}

impl CompiledQuery {
    /// The statement with parameters inlined as escaped literals.
    #[must_use]
    pub fn to_inline_sql(&self) -> &str {
        &self.inline_sql
    }

    /// The WHERE clause of the inlined statement.
    #[must_use]
    pub fn inline_predicate(&self) -> &str {
        self.inline_sql
            .get(self.predicate_span.clone())
            .unwrap_or_default()
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
