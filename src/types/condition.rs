use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison operators a condition can apply to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    GreaterThan,
    LessThan,
    Between,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::Between,
    ];

    /// Null tests are the only operators that need no value.
    #[must_use]
    pub fn requires_value(self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }

    /// The snake_case name used in the DSL and in serialized definitions.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::IsNull => "is_null",
            Operator::IsNotNull => "is_not_null",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::Between => "between",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single attribute comparison in a segment filter.
///
/// Conditions are edited incrementally in the builder, so a condition may be
/// incomplete at any time. Incomplete conditions are *inactive*: the compiler
/// skips them instead of failing. See [`Condition::is_active`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub value2: Option<String>,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            field: field.into(),
            operator,
            value: None,
            value2: None,
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_value2(mut self, value2: impl Into<String>) -> Self {
        self.value2 = Some(value2.into());
        self
    }

    /// Whether this condition contributes a clause to the compiled query.
    ///
    /// Requires a field name, and a non-empty value unless the operator is a
    /// null test. `between` additionally requires `value2`.
    #[must_use]
    pub fn is_active(&self) -> bool {
        if self.field.is_empty() {
            return false;
        }
        if !self.operator.requires_value() {
            return true;
        }
        match self.operator {
            Operator::Between => present(&self.value) && present(&self.value2),
            _ => present(&self.value),
        }
    }

    /// The first operand, if present.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }

    /// The upper bound of a `between`, if present.
    #[must_use]
    pub fn value2(&self) -> Option<&str> {
        self.value2.as_deref().filter(|v| !v.is_empty())
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.operator)?;
        if let Some(v) = &self.value {
            write!(f, " {v:?}")?;
        }
        if self.operator == Operator::Between {
            if let Some(v2) = &self.value2 {
                write!(f, " and {v2:?}")?;
            }
        }
        Ok(())
    }
}

/// Intermediate builder for attribute conditions.
/// Created by [`field()`]; requires an operator method to produce a [`Condition`].
#[derive(Debug, Clone)]
pub struct FieldCondition {
    name: String,
}

impl FieldCondition {
    fn with(self, operator: Operator, value: impl Into<String>) -> Condition {
        Condition::new(self.name, operator).with_value(value)
    }

    #[must_use]
    pub fn equals(self, value: impl Into<String>) -> Condition {
        self.with(Operator::Equals, value)
    }

    #[must_use]
    pub fn not_equals(self, value: impl Into<String>) -> Condition {
        self.with(Operator::NotEquals, value)
    }

    #[must_use]
    pub fn contains(self, value: impl Into<String>) -> Condition {
        self.with(Operator::Contains, value)
    }

    #[must_use]
    pub fn not_contains(self, value: impl Into<String>) -> Condition {
        self.with(Operator::NotContains, value)
    }

    #[must_use]
    pub fn starts_with(self, value: impl Into<String>) -> Condition {
        self.with(Operator::StartsWith, value)
    }

    #[must_use]
    pub fn ends_with(self, value: impl Into<String>) -> Condition {
        self.with(Operator::EndsWith, value)
    }

    #[must_use]
    pub fn greater_than(self, value: impl Into<String>) -> Condition {
        self.with(Operator::GreaterThan, value)
    }

    #[must_use]
    pub fn less_than(self, value: impl Into<String>) -> Condition {
        self.with(Operator::LessThan, value)
    }

    #[must_use]
    pub fn between(self, low: impl Into<String>, high: impl Into<String>) -> Condition {
        self.with(Operator::Between, low).with_value2(high)
    }

    #[must_use]
    pub fn is_null(self) -> Condition {
        Condition::new(self.name, Operator::IsNull)
    }

    #[must_use]
    pub fn is_not_null(self) -> Condition {
        Condition::new(self.name, Operator::IsNotNull)
    }
}

#[must_use]
pub fn field(name: &str) -> FieldCondition {
    FieldCondition {
        name: name.to_owned(),
    }
}
