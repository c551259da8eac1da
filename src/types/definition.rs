use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::group::{BoolOp, ConditionGroup};
use super::membership::{AddOutcome, Memberships, SegmentRef};

/// The working definition edited by the segment builder.
///
/// A definition is plain data: it is mutated in place by user actions and
/// consumed read-only by [`compile`](crate::compile()). Nothing here persists
/// anything.
///
/// # Example
///
/// ```
/// use segquery::{field, BoolOp, ConditionGroup, SegmentDefinition};
///
/// let mut def = SegmentDefinition::new("Young Hanoi");
/// def.select_dataset("customers");
/// def.add_condition(field("city").equals("Hanoi"));
/// def.add_group(
///     ConditionGroup::any()
///         .with(field("age").between("18", "25"))
///         .with(field("tier").equals("gold")),
/// );
/// assert_eq!(def.root_operator, BoolOp::And);
/// assert_eq!(def.active_condition_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub selected_dataset: Option<String>,
    #[serde(default)]
    pub root_operator: BoolOp,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub condition_groups: Vec<ConditionGroup>,
    #[serde(flatten)]
    pub memberships: Memberships,
}

impl SegmentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a DSL string into a definition.
    ///
    /// # Errors
    ///
    /// Returns [`SegqueryError`](crate::SegqueryError) on parse failure.
    pub fn from_dsl(input: &str) -> Result<Self, crate::SegqueryError> {
        Ok(crate::parse::parse(input)?)
    }

    /// Read a DSL file and parse it into a definition.
    ///
    /// # Errors
    ///
    /// Returns [`SegqueryError`](crate::SegqueryError) on I/O or parse failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::SegqueryError> {
        let input = std::fs::read_to_string(path)?;
        Self::from_dsl(&input)
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn select_dataset(&mut self, dataset: impl Into<String>) {
        self.selected_dataset = Some(dataset.into());
    }

    pub fn set_root_operator(&mut self, op: BoolOp) {
        self.root_operator = op;
    }

    /// Append a condition, returning its index.
    pub fn add_condition(&mut self, condition: Condition) -> usize {
        self.conditions.push(condition);
        self.conditions.len() - 1
    }

    /// Replace the condition at `index`. Returns `false` if out of range.
    pub fn update_condition(&mut self, index: usize, condition: Condition) -> bool {
        match self.conditions.get_mut(index) {
            Some(slot) => {
                *slot = condition;
                true
            }
            None => false,
        }
    }

    pub fn remove_condition(&mut self, index: usize) -> Option<Condition> {
        (index < self.conditions.len()).then(|| self.conditions.remove(index))
    }

    /// Append a group, returning its index.
    pub fn add_group(&mut self, group: ConditionGroup) -> usize {
        self.condition_groups.push(group);
        self.condition_groups.len() - 1
    }

    pub fn group_mut(&mut self, index: usize) -> Option<&mut ConditionGroup> {
        self.condition_groups.get_mut(index)
    }

    pub fn remove_group(&mut self, index: usize) -> Option<ConditionGroup> {
        (index < self.condition_groups.len()).then(|| self.condition_groups.remove(index))
    }

    pub fn add_inclusion(&mut self, segment: SegmentRef) -> AddOutcome {
        self.memberships.add_inclusion(segment)
    }

    pub fn add_exclusion(&mut self, segment: SegmentRef) -> AddOutcome {
        self.memberships.add_exclusion(segment)
    }

    pub fn remove_inclusion(&mut self, id: &str) -> bool {
        self.memberships.remove_inclusion(id)
    }

    pub fn remove_exclusion(&mut self, id: &str) -> bool {
        self.memberships.remove_exclusion(id)
    }

    #[must_use]
    pub fn inclusions(&self) -> &[SegmentRef] {
        self.memberships.inclusions()
    }

    #[must_use]
    pub fn exclusions(&self) -> &[SegmentRef] {
        self.memberships.exclusions()
    }

    /// Number of top-level conditions that would contribute a clause.
    #[must_use]
    pub fn active_condition_count(&self) -> usize {
        self.conditions.iter().filter(|c| c.is_active()).count()
    }

    /// Whether compiling this definition would yield the match-all predicate.
    #[must_use]
    pub fn matches_everything(&self) -> bool {
        self.active_condition_count() == 0
            && !self.condition_groups.iter().any(ConditionGroup::has_active)
            && self.memberships.is_empty()
            && self.condition_groups.iter().all(|g| g.memberships().is_empty())
    }
}
