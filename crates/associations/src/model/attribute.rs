//! Attribute definitions - column-like metadata owned by a model

use serde::{Deserialize, Serialize};

/// Referential action for ON DELETE / ON UPDATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    /// Raise an error if any references exist
    NoAction,
    /// Same as NO ACTION, checked immediately
    Restrict,
    /// Delete or update referencing rows
    Cascade,
    /// Set referencing columns to NULL
    SetNull,
    /// Set referencing columns to their default values
    SetDefault,
}

impl ReferentialAction {
    /// Get the SQL representation of this action
    pub const fn as_sql(&self) -> &'static str {
        match self {
            ReferentialAction::NoAction => "NO ACTION",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse a referential action from a string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "NO ACTION" | "NOACTION" | "NO_ACTION" => Some(ReferentialAction::NoAction),
            "RESTRICT" => Some(ReferentialAction::Restrict),
            "CASCADE" => Some(ReferentialAction::Cascade),
            "SET NULL" | "SETNULL" | "SET_NULL" => Some(ReferentialAction::SetNull),
            "SET DEFAULT" | "SETDEFAULT" | "SET_DEFAULT" => Some(ReferentialAction::SetDefault),
            _ => None,
        }
    }
}

/// Target of a foreign key: a table and one of its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct References {
    /// Referenced table name
    pub model: String,
    /// Referenced column name
    pub key: String,
}

/// Definition of a single model attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Opaque data type name, interpreted by the schema layer
    pub data_type: String,
    /// Storage column name when it differs from the attribute name
    pub field: Option<String>,
    /// Whether this attribute is part of the primary key
    pub primary_key: bool,
    /// Whether NULL is accepted
    pub allow_null: bool,
    /// Foreign key reference, if any
    pub references: Option<References>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
}

impl AttributeDefinition {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            field: None,
            primary_key: false,
            allow_null: true,
            references: None,
            on_delete: None,
            on_update: None,
        }
    }

    /// Mark as primary key (implies NOT NULL)
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.allow_null = false;
        self
    }

    /// Map this attribute to a differently named storage column
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn allow_null(mut self, allow_null: bool) -> Self {
        self.allow_null = allow_null;
        self
    }

    pub fn with_references(mut self, model: impl Into<String>, key: impl Into<String>) -> Self {
        self.references = Some(References {
            model: model.into(),
            key: key.into(),
        });
        self
    }

    /// Storage column for this attribute, falling back to the attribute name
    pub fn column_name<'a>(&'a self, attribute_name: &'a str) -> &'a str {
        self.field.as_deref().unwrap_or(attribute_name)
    }

    /// Merge synthesized defaults into a user-declared attribute
    ///
    /// Settings the user declared win; only unset reference metadata is filled in.
    pub(crate) fn merge_defaults(&mut self, defaults: AttributeDefinition) {
        if self.field.is_none() {
            self.field = defaults.field;
        }
        if self.references.is_none() {
            self.references = defaults.references;
        }
        if self.on_delete.is_none() {
            self.on_delete = defaults.on_delete;
        }
        if self.on_update.is_none() {
            self.on_update = defaults.on_update;
        }
    }
}
