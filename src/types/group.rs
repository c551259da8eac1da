use std::fmt;

use serde::{Deserialize, Serialize};

use super::condition::Condition;
use super::membership::{MembershipMode, SegmentRef};

/// Boolean operator joining sibling clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolOp {
    #[default]
    And,
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "AND"),
            BoolOp::Or => write!(f, "OR"),
        }
    }
}

/// A node of the filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Attribute(Condition),
    Group(ConditionGroup),
    /// Membership test against another segment. It never joins the
    /// enclosing group's expression; the compiler ANDs it onto the root.
    Membership {
        segment: SegmentRef,
        mode: MembershipMode,
    },
}

impl From<Condition> for Node {
    fn from(c: Condition) -> Self {
        Node::Attribute(c)
    }
}

impl From<ConditionGroup> for Node {
    fn from(g: ConditionGroup) -> Self {
        Node::Group(g)
    }
}

/// A nested sub-tree combining its children with its own operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub operator: BoolOp,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ConditionGroup {
    #[must_use]
    pub fn new(operator: BoolOp) -> Self {
        Self {
            operator,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn all() -> Self {
        Self::new(BoolOp::And)
    }

    #[must_use]
    pub fn any() -> Self {
        Self::new(BoolOp::Or)
    }

    #[must_use]
    pub fn with(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    #[must_use]
    pub fn with_membership(mut self, segment: SegmentRef, mode: MembershipMode) -> Self {
        self.children.push(Node::Membership { segment, mode });
        self
    }

    /// Whether any node below this group would contribute a clause to the
    /// group's own boolean expression.
    #[must_use]
    pub fn has_active(&self) -> bool {
        self.children.iter().any(Node::is_active)
    }

    /// Membership nodes anywhere below this group, in document order.
    #[must_use]
    pub fn memberships(&self) -> Vec<(&SegmentRef, MembershipMode)> {
        let mut out = Vec::new();
        self.collect_memberships(&mut out);
        out
    }

    fn collect_memberships<'a>(&'a self, out: &mut Vec<(&'a SegmentRef, MembershipMode)>) {
        for child in &self.children {
            match child {
                Node::Attribute(_) => {}
                Node::Group(g) => g.collect_memberships(out),
                Node::Membership { segment, mode } => out.push((segment, *mode)),
            }
        }
    }
}

impl Node {
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            Node::Attribute(c) => c.is_active(),
            Node::Group(g) => g.has_active(),
            Node::Membership { .. } => false,
        }
    }
}
