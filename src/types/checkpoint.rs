use async_trait::async_trait;
use tracing::debug;

use super::condition::Condition;
use super::definition::SegmentDefinition;
use super::error::StoreError;
use super::group::{BoolOp, ConditionGroup};
use super::membership::Memberships;

/// Independent copy of the revertible parts of a definition.
///
/// Memberships and the selected dataset are not part of the restore point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Checkpoint {
    pub name: String,
    pub description: String,
    pub root_operator: BoolOp,
    pub conditions: Vec<Condition>,
    pub condition_groups: Vec<ConditionGroup>,
}

impl Checkpoint {
    #[must_use]
    pub fn capture(definition: &SegmentDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            description: definition.description.clone(),
            root_operator: definition.root_operator,
            conditions: definition.conditions.clone(),
            condition_groups: definition.condition_groups.clone(),
        }
    }

    /// Overwrite the revertible fields of `definition` with copies of this checkpoint.
    pub fn restore_into(&self, definition: &mut SegmentDefinition) {
        definition.name.clone_from(&self.name);
        definition.description.clone_from(&self.description);
        definition.root_operator = self.root_operator;
        definition.conditions.clone_from(&self.conditions);
        definition.condition_groups.clone_from(&self.condition_groups);
    }

    /// Whether `definition` still matches this checkpoint.
    #[must_use]
    pub fn matches(&self, definition: &SegmentDefinition) -> bool {
        self.name == definition.name
            && self.description == definition.description
            && self.root_operator == definition.root_operator
            && self.conditions == definition.conditions
            && self.condition_groups == definition.condition_groups
    }
}

/// Persistence collaborator used when a definition is saved.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Persist `definition` and return the record as stored.
    async fn save(&self, definition: &SegmentDefinition) -> Result<SegmentDefinition, StoreError>;
}

/// Tracks the restore point and dirty flag for a definition being edited.
///
/// ```
/// use segquery::{field, RevertManager, SegmentDefinition};
///
/// let mut def = SegmentDefinition::new("Hanoi");
/// let mut revert = RevertManager::new(&def);
///
/// def.add_condition(field("city").equals("Hanoi"));
/// assert!(revert.is_dirty(&def));
///
/// revert.discard(&mut def);
/// assert!(def.conditions.is_empty());
/// assert!(!revert.is_dirty(&def));
/// ```
#[derive(Debug, Clone)]
pub struct RevertManager {
    checkpoint: Checkpoint,
    /// Membership sets as of the last checkpoint or discard. Compared for
    /// dirtiness only; discard never restores them.
    memberships: Memberships,
    dirty: bool,
    description_visible: bool,
}

impl RevertManager {
    /// Start tracking `definition`, taking the load-time checkpoint.
    #[must_use]
    pub fn new(definition: &SegmentDefinition) -> Self {
        Self {
            checkpoint: Checkpoint::capture(definition),
            memberships: definition.memberships.clone(),
            dirty: false,
            description_visible: !definition.description.is_empty(),
        }
    }

    /// Take a new restore point and clear the dirty flag.
    pub fn checkpoint(&mut self, definition: &SegmentDefinition) {
        self.checkpoint = Checkpoint::capture(definition);
        self.memberships.clone_from(&definition.memberships);
        self.dirty = false;
    }

    #[must_use]
    pub fn current_checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Force the dirty flag on, even if `definition` later returns to the
    /// checkpointed state.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether `definition` has changed since the last checkpoint, through
    /// any mutator, or [`mark_dirty`](Self::mark_dirty) was called.
    #[must_use]
    pub fn is_dirty(&self, definition: &SegmentDefinition) -> bool {
        self.dirty
            || !self.checkpoint.matches(definition)
            || self.memberships != definition.memberships
    }

    /// Apply a mutation to `definition` and mark it dirty.
    pub fn edit<R>(
        &mut self,
        definition: &mut SegmentDefinition,
        f: impl FnOnce(&mut SegmentDefinition) -> R,
    ) -> R {
        let out = f(definition);
        self.mark_dirty();
        out
    }

    /// Revert `definition` to the last checkpoint and clear the dirty flag.
    /// Hides the description field when the checkpointed description is empty.
    pub fn discard(&mut self, definition: &mut SegmentDefinition) {
        self.checkpoint.restore_into(definition);
        self.memberships.clone_from(&definition.memberships);
        self.dirty = false;
        if self.checkpoint.description.is_empty() {
            self.description_visible = false;
        }
        debug!(name = %definition.name, "discarded edits");
    }

    #[must_use]
    pub fn description_visible(&self) -> bool {
        self.description_visible
    }

    pub fn show_description(&mut self) {
        self.description_visible = true;
    }

    /// Hand `definition` to `store` and checkpoint the returned record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the definition has no name or the store
    /// rejects it. The checkpoint and dirty flag are untouched on failure.
    pub async fn save<S: SegmentStore + ?Sized>(
        &mut self,
        store: &S,
        definition: &mut SegmentDefinition,
    ) -> Result<(), StoreError> {
        if definition.name.trim().is_empty() {
            return Err(StoreError::EmptyName);
        }
        let saved = store.save(definition).await?;
        *definition = saved;
        self.checkpoint(definition);
        debug!(name = %definition.name, "checkpointed saved segment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::condition::field;

    #[test]
    fn discard_restores_checkpoint() {
        let mut def = SegmentDefinition::new("Original");
        def.set_description("desc");
        def.add_condition(field("city").equals("Hanoi"));
        let mut mgr = RevertManager::new(&def);

        mgr.edit(&mut def, |d| {
            d.rename("Changed");
            d.set_root_operator(BoolOp::Or);
            d.conditions.clear();
            d.add_group(ConditionGroup::any().with(field("age").greater_than("30")));
        });
        assert!(mgr.is_dirty(&def));

        mgr.discard(&mut def);
        assert!(!mgr.is_dirty(&def));
        assert_eq!(def.name, "Original");
        assert_eq!(def.root_operator, BoolOp::And);
        assert_eq!(def.conditions, vec![field("city").equals("Hanoi")]);
        assert!(def.condition_groups.is_empty());
        assert!(mgr.current_checkpoint().matches(&def));
    }

    #[test]
    fn later_edits_do_not_touch_checkpoint() {
        let mut def = SegmentDefinition::new("s");
        def.add_condition(field("city").equals("Hanoi"));
        let mut mgr = RevertManager::new(&def);
        mgr.discard(&mut def);

        def.conditions[0].value = Some("Hue".to_owned());
        assert_eq!(
            mgr.current_checkpoint().conditions[0].value.as_deref(),
            Some("Hanoi")
        );
    }

    #[test]
    fn memberships_survive_discard() {
        let mut def = SegmentDefinition::new("s");
        let mut mgr = RevertManager::new(&def);
        let _ = def.add_inclusion(crate::SegmentRef::new("seg1", "Loyal", 1));
        assert!(mgr.is_dirty(&def));
        mgr.discard(&mut def);
        assert_eq!(def.inclusions().len(), 1);
        assert!(!mgr.is_dirty(&def));
    }

    #[test]
    fn direct_mutators_make_definition_dirty() {
        let mut def = SegmentDefinition::new("s");
        let mgr = RevertManager::new(&def);
        assert!(!mgr.is_dirty(&def));

        def.add_condition(field("city").equals("Hanoi"));
        assert!(mgr.is_dirty(&def));
        def.remove_condition(0);
        assert!(!mgr.is_dirty(&def));

        def.set_root_operator(BoolOp::Or);
        assert!(mgr.is_dirty(&def));
    }

    #[test]
    fn mark_dirty_sticks_until_checkpoint() {
        let def = SegmentDefinition::new("s");
        let mut mgr = RevertManager::new(&def);
        mgr.mark_dirty();
        assert!(mgr.is_dirty(&def));
        mgr.checkpoint(&def);
        assert!(!mgr.is_dirty(&def));
    }

    #[test]
    fn discard_hides_empty_description() {
        let mut def = SegmentDefinition::new("s");
        let mut mgr = RevertManager::new(&def);
        assert!(!mgr.description_visible());
        mgr.show_description();
        mgr.edit(&mut def, |d| d.set_description("typed"));
        mgr.discard(&mut def);
        assert!(def.description.is_empty());
        assert!(!mgr.description_visible());
    }

    #[test]
    fn discard_keeps_nonempty_description_visible() {
        let mut def = SegmentDefinition::new("s");
        def.set_description("kept");
        let mut mgr = RevertManager::new(&def);
        assert!(mgr.description_visible());
        mgr.discard(&mut def);
        assert!(mgr.description_visible());
    }

    #[test]
    fn checkpoint_clears_dirty() {
        let mut def = SegmentDefinition::new("s");
        let mut mgr = RevertManager::new(&def);
        mgr.edit(&mut def, |d| d.rename("t"));
        mgr.checkpoint(&def);
        assert!(!mgr.is_dirty(&def));
        mgr.discard(&mut def);
        assert_eq!(def.name, "t");
    }
}
