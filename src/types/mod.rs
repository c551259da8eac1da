mod attribute;
mod checkpoint;
mod condition;
mod definition;
mod error;
mod group;
mod membership;
mod plan;
mod query;
mod row;

pub use attribute::{
    Attribute, AttributeType, DEFAULT_KEY_COLUMN, DEFAULT_SCHEMA, Dataset, type_of,
};
pub use checkpoint::{Checkpoint, RevertManager, SegmentStore};
pub use condition::{Condition, FieldCondition, Operator, field};
pub use definition::SegmentDefinition;
pub use error::{ExecutionError, PreviewError, StoreError};
pub use group::{BoolOp, ConditionGroup, Node};
pub use membership::{
    AddOutcome, MembershipMode, Memberships, SegmentCatalog, SegmentRef, SegmentSelector,
};
pub use plan::{
    CompareOp, MATERIALIZE_LIMIT, MembershipLookup, PREVIEW_LIMIT, Predicate, QueryPlan, RowCap,
    SqlValue, TableRef,
};
pub use query::{CompiledQuery, Dialect};
pub use row::{EMPTY_CELL, PreviewRows, Row, render_cell};
