use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum rows returned by a preview. Fixed; not configurable.
pub const PREVIEW_LIMIT: u32 = 100;

/// Default cap for the save-time materialization path.
pub const MATERIALIZE_LIMIT: u32 = 100_000;

/// Row cap attached to every compiled query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowCap {
    Preview,
    Materialize(u32),
}

impl RowCap {
    #[must_use]
    pub fn rows(self) -> u32 {
        match self {
            RowCap::Preview => PREVIEW_LIMIT,
            RowCap::Materialize(n) => n.max(PREVIEW_LIMIT + 1),
        }
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    /// Decimal literal `[+-]?digits[.digits]` that neither `i64` nor `f64`
    /// holds exactly. Kept as typed and bound as a numeric.
    Numeric(String),
    Text(String),
}

impl SqlValue {
    /// Parse `raw` as a number, degrading to text when it is not one.
    ///
    /// The result never differs from what was typed: integers that overflow
    /// `i64` and decimals that `f64` would round stay [`SqlValue::Numeric`].
    #[must_use]
    pub fn number(raw: &str) -> SqlValue {
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return SqlValue::Int(i);
        }
        let decimal = is_decimal(trimmed);
        match trimmed.parse::<f64>() {
            Ok(f) if decimal && f.to_string() == trimmed => SqlValue::Float(f),
            _ if decimal => SqlValue::Numeric(trimmed.to_owned()),
            Ok(f) if f.is_finite() => SqlValue::Float(f),
            _ => SqlValue::Text(raw.to_owned()),
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlValue::Int(_) | SqlValue::Float(_) | SqlValue::Numeric(_)
        )
    }
}

/// `[+-]?digits[.digits]`
fn is_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (whole, frac) = match unsigned.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (unsigned, None),
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(whole) && frac.map_or(true, digits)
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_owned())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

/// Literal form, as it would appear inlined in SQL text.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Numeric(v) => f.write_str(v),
            SqlValue::Text(v) => write!(f, "'{}'", v.replace('\'', "''")),
        }
    }
}

/// Comparison operators that survive into the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Lt,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Neq => write!(f, "!="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Lt => write!(f, "<"),
        }
    }
}

/// Where the materialized members of another segment can be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MembershipLookup {
    pub table: String,
    pub segment_column: String,
    pub key_column: String,
    pub segment_id: String,
}

/// Structured predicate tree. Values never appear in SQL text directly;
/// the renderer turns them into placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Matches every row.
    True,
    Compare {
        column: String,
        op: CompareOp,
        value: SqlValue,
    },
    Like {
        column: String,
        pattern: String,
        negated: bool,
    },
    Between {
        column: String,
        low: SqlValue,
        high: SqlValue,
    },
    IsNull {
        column: String,
        negated: bool,
    },
    Member {
        key: String,
        lookup: MembershipLookup,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Join `parts` with AND, collapsing the trivial cases.
    /// An empty list places no constraint and yields [`Predicate::True`].
    #[must_use]
    pub fn all(mut parts: Vec<Predicate>) -> Predicate {
        parts.retain(|p| !p.is_true());
        Self::collapse(parts, Predicate::And)
    }

    /// Join `parts` with OR, collapsing the trivial cases.
    /// An empty list places no constraint and yields [`Predicate::True`].
    #[must_use]
    pub fn any(parts: Vec<Predicate>) -> Predicate {
        if parts.iter().any(Predicate::is_true) {
            return Predicate::True;
        }
        Self::collapse(parts, Predicate::Or)
    }

    fn collapse(mut parts: Vec<Predicate>, make: fn(Vec<Predicate>) -> Predicate) -> Predicate {
        match parts.len() {
            0 => Predicate::True,
            1 => parts.remove(0),
            _ => make(parts),
        }
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        matches!(self, Predicate::True)
    }

    /// Whether rendering this node inside another boolean node needs parentheses.
    #[must_use]
    pub fn is_compound(&self) -> bool {
        matches!(self, Predicate::And(_) | Predicate::Or(_))
    }
}

/// Table a query reads from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
}

/// Dialect-independent compiled form of a segment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub table: TableRef,
    pub predicate: Predicate,
    pub limit: u32,
}
