//! Model metadata - definitions supplied by the application and the
//! registered model they turn into

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::associations::{AccessorOutput, Association, AssociationOptions};
use crate::config::AssociationConfig;
use crate::error::AssociationResult;
use crate::hooks::{AssociateHookPayload, HookEvent, Hooks};
use crate::model::{AttributeDefinition, MethodTable, ModelInstance};
use crate::naming::pluralize;
use crate::registry::ModelId;

/// Definition lifecycle of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    /// Known by name only; metadata not yet supplied
    Declared,
    /// Fully initialized and usable in association declarations
    Defined,
}

/// Everything needed to define a model on a registry
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub(crate) name: String,
    pub(crate) table_name: Option<String>,
    pub(crate) singular: Option<String>,
    pub(crate) plural: Option<String>,
    pub(crate) attributes: IndexMap<String, AttributeDefinition>,
    pub(crate) methods: MethodTable,
    pub(crate) hooks: Hooks,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            singular: None,
            plural: None,
            attributes: IndexMap::new(),
            methods: MethodTable::new(),
            hooks: Hooks::new(),
        }
    }

    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Override the inflected names used for default aliases and accessors
    pub fn names(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        self.singular = Some(singular.into());
        self.plural = Some(plural.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, definition: AttributeDefinition) -> Self {
        self.attributes.insert(name.into(), definition);
        self
    }

    /// Define a user method on the model's instances
    pub fn method<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut ModelInstance, Vec<Value>) -> AssociationResult<AccessorOutput>
            + Send
            + Sync
            + 'static,
    {
        self.methods.define(name, function);
        self
    }

    pub fn hook<F>(mut self, event: HookEvent, hook: F) -> Self
    where
        F: Fn(&AssociateHookPayload<'_>, &mut AssociationOptions) -> AssociationResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.add(event, hook);
        self
    }
}

/// A model registered on a [`crate::ModelRegistry`]
#[derive(Debug)]
pub struct Model {
    id: ModelId,
    name: String,
    singular: String,
    plural: String,
    table_name: String,
    attributes: IndexMap<String, AttributeDefinition>,
    associations: IndexMap<String, Arc<Association>>,
    methods: MethodTable,
    hooks: Hooks,
    state: ModelState,
}

impl Model {
    /// Placeholder for a model known by name only
    pub(crate) fn declared(id: ModelId, name: &str, config: &AssociationConfig) -> Self {
        let mut model = Self::from_definition(id, ModelDefinition::new(name), config);
        model.state = ModelState::Declared;
        model
    }

    pub(crate) fn from_definition(
        id: ModelId,
        definition: ModelDefinition,
        config: &AssociationConfig,
    ) -> Self {
        let singular = definition.singular.unwrap_or_else(|| definition.name.clone());
        let plural = definition.plural.unwrap_or_else(|| pluralize(&definition.name));
        let table_name = definition.table_name.unwrap_or_else(|| {
            if config.pluralize_table_names {
                plural.clone()
            } else {
                definition.name.clone()
            }
        });

        Self {
            id,
            name: definition.name,
            singular,
            plural,
            table_name,
            attributes: definition.attributes,
            associations: IndexMap::new(),
            methods: definition.methods,
            hooks: definition.hooks,
            state: ModelState::Defined,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn singular_name(&self) -> &str {
        &self.singular
    }

    pub fn plural_name(&self) -> &str {
        &self.plural
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn is_defined(&self) -> bool {
        self.state == ModelState::Defined
    }

    pub fn attributes(&self) -> &IndexMap<String, AttributeDefinition> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Primary key attribute names, in declaration order
    pub fn primary_key_attributes(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, definition)| definition.primary_key)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Primary key storage columns, in declaration order
    pub fn primary_key_columns(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|(_, definition)| definition.primary_key)
            .map(|(name, definition)| definition.column_name(name))
            .collect()
    }

    /// Storage column of an attribute, falling back to the given name
    pub fn column_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.attributes
            .get(attribute)
            .map(|definition| definition.column_name(attribute))
            .unwrap_or(attribute)
    }

    pub fn associations(&self) -> &IndexMap<String, Arc<Association>> {
        &self.associations
    }

    pub fn association(&self, alias: &str) -> Option<&Arc<Association>> {
        self.associations.get(alias)
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    pub fn methods_mut(&mut self) -> &mut MethodTable {
        &mut self.methods
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Add an attribute, or fill the unset parts of an existing one
    pub(crate) fn merge_attribute_default(&mut self, name: &str, definition: AttributeDefinition) {
        match self.attributes.get_mut(name) {
            Some(existing) => existing.merge_defaults(definition),
            None => {
                self.attributes.insert(name.to_string(), definition);
            }
        }
    }

    pub(crate) fn insert_association(&mut self, association: Arc<Association>) {
        self.associations
            .insert(association.alias().to_string(), association);
    }
}
