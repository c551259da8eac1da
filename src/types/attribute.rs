use std::fmt;

use serde::{Deserialize, Serialize};

/// How a condition's value is interpreted when it is bound into a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
}

impl AttributeType {
    /// Numeric attributes bind unquoted number literals; everything else binds text.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, AttributeType::Number)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Text => write!(f, "text"),
            AttributeType::Number => write!(f, "number"),
            AttributeType::Date => write!(f, "date"),
            AttributeType::Boolean => write!(f, "boolean"),
        }
    }
}

/// A column of a dataset, as reported by the dataset metadata provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Look up the declared type of `field`. Unknown fields degrade to
/// [`AttributeType::Text`] rather than failing.
#[must_use]
pub fn type_of(field: &str, attributes: &[Attribute]) -> AttributeType {
    attributes
        .iter()
        .find(|a| a.name == field)
        .map_or(AttributeType::Text, |a| a.ty)
}

/// Schema that needs no qualification in the emitted table name.
pub const DEFAULT_SCHEMA: &str = "public";

/// Key column used for segment membership when a dataset does not name one.
pub const DEFAULT_KEY_COLUMN: &str = "customer_id";

/// A customer dataset the compiler can target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default = "default_key_column")]
    pub key_column: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

fn default_key_column() -> String {
    DEFAULT_KEY_COLUMN.to_owned()
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            key_column: default_key_column(),
            attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    #[must_use]
    pub fn with_key_column(mut self, key_column: impl Into<String>) -> Self {
        self.key_column = key_column.into();
        self
    }

    #[must_use]
    pub fn attribute(mut self, name: &str, ty: AttributeType) -> Self {
        self.attributes.push(Attribute::new(name, ty));
        self
    }

    /// The declared type of `field` in this dataset.
    #[must_use]
    pub fn type_of(&self, field: &str) -> AttributeType {
        type_of(field, &self.attributes)
    }

    /// The schema to qualify the table with, if it is not the default one.
    #[must_use]
    pub fn qualifying_schema(&self) -> Option<&str> {
        self.schema
            .as_deref()
            .filter(|s| !s.is_empty() && *s != DEFAULT_SCHEMA)
    }
}
