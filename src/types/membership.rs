use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Reference to another previously defined segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

impl SegmentRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>, count: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            count,
        }
    }
}

/// Whether a membership constraint requires or forbids presence in a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipMode {
    Include,
    Exclude,
}

impl fmt::Display for MembershipMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipMode::Include => write!(f, "include"),
            MembershipMode::Exclude => write!(f, "exclude"),
        }
    }
}

/// Result of attaching a segment reference.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum AddOutcome {
    Added,
    /// The id was already in the target set; nothing changed.
    AlreadyPresent { mode: MembershipMode, name: String },
}

impl AddOutcome {
    #[must_use]
    pub fn is_added(&self) -> bool {
        matches!(self, AddOutcome::Added)
    }

    /// Message to show the user, if any.
    #[must_use]
    pub fn notice(&self) -> Option<String> {
        match self {
            AddOutcome::Added => None,
            AddOutcome::AlreadyPresent { .. } => Some(self.to_string()),
        }
    }
}

impl fmt::Display for AddOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddOutcome::Added => write!(f, "added"),
            AddOutcome::AlreadyPresent { mode, name } => {
                let set = match mode {
                    MembershipMode::Include => "inclusions",
                    MembershipMode::Exclude => "exclusions",
                };
                write!(f, "segment '{name}' is already in {set}")
            }
        }
    }
}

/// The inclusion and exclusion sets attached to a definition.
///
/// Each set is ordered by insertion and holds an id at most once. The same id
/// may sit in both sets; the compiler honors both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Memberships {
    #[serde(default)]
    inclusions: Vec<SegmentRef>,
    #[serde(default)]
    exclusions: Vec<SegmentRef>,
}

impl Memberships {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_inclusion(&mut self, segment: SegmentRef) -> AddOutcome {
        Self::push_unique(&mut self.inclusions, segment, MembershipMode::Include)
    }

    pub fn add_exclusion(&mut self, segment: SegmentRef) -> AddOutcome {
        Self::push_unique(&mut self.exclusions, segment, MembershipMode::Exclude)
    }

    /// Attach `segment` to the set selected by `mode`.
    pub fn add(&mut self, segment: SegmentRef, mode: MembershipMode) -> AddOutcome {
        match mode {
            MembershipMode::Include => self.add_inclusion(segment),
            MembershipMode::Exclude => self.add_exclusion(segment),
        }
    }

    /// Returns `true` if an inclusion was removed.
    pub fn remove_inclusion(&mut self, id: &str) -> bool {
        Self::remove(&mut self.inclusions, id)
    }

    /// Returns `true` if an exclusion was removed.
    pub fn remove_exclusion(&mut self, id: &str) -> bool {
        Self::remove(&mut self.exclusions, id)
    }

    #[must_use]
    pub fn inclusions(&self) -> &[SegmentRef] {
        &self.inclusions
    }

    #[must_use]
    pub fn exclusions(&self) -> &[SegmentRef] {
        &self.exclusions
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inclusions.is_empty() && self.exclusions.is_empty()
    }

    /// Inclusions then exclusions, each in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&SegmentRef, MembershipMode)> {
        self.inclusions
            .iter()
            .map(|s| (s, MembershipMode::Include))
            .chain(self.exclusions.iter().map(|s| (s, MembershipMode::Exclude)))
    }

    fn push_unique(
        set: &mut Vec<SegmentRef>,
        segment: SegmentRef,
        mode: MembershipMode,
    ) -> AddOutcome {
        if set.iter().any(|s| s.id == segment.id) {
            debug!(id = %segment.id, %mode, "segment already attached");
            return AddOutcome::AlreadyPresent {
                mode,
                name: segment.name,
            };
        }
        set.push(segment);
        AddOutcome::Added
    }

    fn remove(set: &mut Vec<SegmentRef>, id: &str) -> bool {
        let before = set.len();
        set.retain(|s| s.id != id);
        set.len() != before
    }
}

/// Read-only source of segments the user can pick from.
pub trait SegmentCatalog {
    fn candidates(&self) -> Vec<SegmentRef>;
}

impl SegmentCatalog for Vec<SegmentRef> {
    fn candidates(&self) -> Vec<SegmentRef> {
        self.clone()
    }
}

/// Picker state: which set a selection is routed to.
///
/// The picker holds no state between opens apart from the mode it was
/// opened with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentSelector {
    mode: Option<MembershipMode>,
}

impl SegmentSelector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, mode: MembershipMode) {
        self.mode = Some(mode);
    }

    pub fn close(&mut self) {
        self.mode = None;
    }

    #[must_use]
    pub fn mode(&self) -> Option<MembershipMode> {
        self.mode
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.mode.is_some()
    }

    /// Candidates offered by `catalog` for the current open.
    #[must_use]
    pub fn candidates(&self, catalog: &impl SegmentCatalog) -> Vec<SegmentRef> {
        if self.is_open() {
            catalog.candidates()
        } else {
            Vec::new()
        }
    }

    /// Route a pick to the set chosen at open. Returns `None` if the
    /// selector is closed.
    pub fn select(
        &self,
        segment: SegmentRef,
        memberships: &mut Memberships,
    ) -> Option<AddOutcome> {
        self.mode.map(|mode| memberships.add(segment, mode))
    }
}
