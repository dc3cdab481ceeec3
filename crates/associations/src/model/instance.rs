//! Model instances - the receiver of generated accessor methods

use serde_json::{Map, Value};

use crate::registry::ModelId;

/// An in-memory row of a model: its model id plus attribute values
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    model: ModelId,
    values: Map<String, Value>,
}

impl ModelInstance {
    pub fn new(model: ModelId) -> Self {
        Self {
            model,
            values: Map::new(),
        }
    }

    /// Build an instance from a JSON object; non-object values yield an empty instance
    pub fn from_value(model: ModelId, value: Value) -> Self {
        let values = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { model, values }
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(attribute.into(), value.into());
        self
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute)
    }

    /// Value of an attribute, treating JSON null as absent
    pub fn get_present(&self, attribute: &str) -> Option<&Value> {
        self.values.get(attribute).filter(|value| !value.is_null())
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(attribute.into(), value.into());
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}
