use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::types::{Dialect, MATERIALIZE_LIMIT, PREVIEW_LIMIT};

/// Where materialized segment membership is stored.
///
/// Inclusion and exclusion predicates test the dataset's key column against
/// `SELECT key_column FROM table WHERE segment_column = <id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipTable {
    pub table: String,
    pub segment_column: String,
    pub key_column: String,
}

impl Default for MembershipTable {
    fn default() -> Self {
        Self {
            table: "segment_members".to_owned(),
            segment_column: "segment_id".to_owned(),
            key_column: "customer_id".to_owned(),
        }
    }
}

/// Settings for compiling and previewing segment definitions.
///
/// ```
/// use segquery::PreviewConfig;
///
/// let config: PreviewConfig = serde_json::from_str(r#"{"timeout_ms": 5000}"#).unwrap();
/// assert_eq!(config.timeout.as_secs(), 5);
/// assert_eq!(config.membership.table, "segment_members");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Bounded wait for the execution service before a preview fails.
    #[serde(
        rename = "timeout_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub timeout: Duration,
    pub dialect: Dialect,
    pub membership: MembershipTable,
    /// Row cap for the save-time materialization path.
    pub materialize_limit: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            dialect: Dialect::default(),
            membership: MembershipTable::default(),
            materialize_limit: MATERIALIZE_LIMIT,
        }
    }
}

impl PreviewConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn with_membership(mut self, membership: MembershipTable) -> Self {
        self.membership = membership;
        self
    }

    /// The materialization cap, forced above the preview cap.
    #[must_use]
    pub fn effective_materialize_limit(&self) -> u32 {
        if self.materialize_limit <= PREVIEW_LIMIT {
            warn!(
                configured = self.materialize_limit,
                preview = PREVIEW_LIMIT,
                "materialize_limit must exceed the preview cap; clamping"
            );
            return PREVIEW_LIMIT + 1;
        }
        self.materialize_limit
    }
}

#[allow(clippy::cast_possible_truncation)]
fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn deserialize_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    u64::deserialize(d).map(Duration::from_millis)
}
