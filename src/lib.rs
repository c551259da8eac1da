//! Compile segment definitions into bounded, parameterized SQL and preview
//! them against an external query service.
//!
//! ```
//! use segquery::{compile_query, Dataset, PreviewConfig, RowCap, SegmentDefinition};
//!
//! let def = SegmentDefinition::from_dsl(r#"
//!     segment "Young Hanoi" {
//!         dataset customers
//!         where city = "Hanoi"
//!         where age between 18 and 25
//!         exclude "seg2" "Churned"
//!     }
//! "#).unwrap();
//!
//! let customers = Dataset::new("customers").attribute("age", segquery::AttributeType::Number);
//! let q = compile_query(&customers, &def, &PreviewConfig::default(), RowCap::Preview);
//! assert_eq!(
//!     q.to_inline_sql(),
//!     "SELECT * FROM customers WHERE city = 'Hanoi' AND age BETWEEN 18 AND 25 \
//!      AND customer_id NOT IN (SELECT customer_id FROM segment_members WHERE segment_id = 'seg2') \
//!      LIMIT 100"
//! );
//! ```

#[cfg(feature = "query-cache")]
pub mod cache;
mod compile;
mod config;
mod error;
pub mod parse;
mod preview;
mod render;
mod types;

pub use compile::{compile, compile_query};
pub use config::{MembershipTable, PreviewConfig};
pub use error::SegqueryError;
pub use parse::ParseError;
pub use preview::{DatasetProvider, PreviewSession, PreviewState, QueryExecutor};
pub use render::render;
pub use types::{
    AddOutcome, Attribute, AttributeType, BoolOp, Checkpoint, CompareOp, CompiledQuery,
    Condition, ConditionGroup, DEFAULT_KEY_COLUMN, DEFAULT_SCHEMA, Dataset, Dialect,
    EMPTY_CELL, ExecutionError, FieldCondition, MATERIALIZE_LIMIT, MembershipLookup,
    MembershipMode, Memberships, Node, Operator, PREVIEW_LIMIT, Predicate, PreviewError,
    PreviewRows, QueryPlan, RevertManager, Row, RowCap, SegmentCatalog, SegmentDefinition,
    SegmentRef, SegmentSelector, SegmentStore, SqlValue, StoreError, TableRef, field,
    render_cell, type_of,
};

#[cfg(feature = "query-cache")]
pub use cache::{CacheError, QueryCache};
