//! Model Registry - explicit owner of all model metadata
//!
//! A registry is created once at application bootstrap and passed by reference
//! into every declaration. Model ids embed the id of the registry that issued
//! them, so ids from another registry (or from before [`ModelRegistry::clear`])
//! are never mistaken for models of this one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::associations::{
    assert_association_unique, check_naming_collision, AccessorOutput, Association,
    AssociationHandle, AssociationId,
};
use crate::config::AssociationConfig;
use crate::error::{AssociationError, AssociationResult};
use crate::model::{Model, ModelDefinition, ModelInstance};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        RegistryId(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle to a model owned by a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId {
    registry: RegistryId,
    index: usize,
}

impl ModelId {
    pub fn registry(&self) -> RegistryId {
        self.registry
    }
}

/// A model given either by name or as an already resolved id
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReference {
    Name(String),
    Model(ModelId),
}

impl From<&str> for ModelReference {
    fn from(name: &str) -> Self {
        ModelReference::Name(name.to_string())
    }
}

impl From<String> for ModelReference {
    fn from(name: String) -> Self {
        ModelReference::Name(name)
    }
}

impl From<ModelId> for ModelReference {
    fn from(id: ModelId) -> Self {
        ModelReference::Model(id)
    }
}

/// Resolve a model reference to a concrete model
///
/// Names that are not defined yet resolve to `None`: declarations may be
/// attempted before every model exists and retried later. Ids are returned
/// unchanged without any lookup.
pub fn get_model(registry: &ModelRegistry, reference: &ModelReference) -> Option<ModelId> {
    match reference {
        ModelReference::Name(name) => {
            if registry.is_defined(name) {
                registry.id_of(name)
            } else {
                None
            }
        }
        ModelReference::Model(id) => Some(*id),
    }
}

/// Store of every model known to an application
#[derive(Debug)]
pub struct ModelRegistry {
    id: RegistryId,
    config: AssociationConfig,
    models: Vec<Model>,
    names: HashMap<String, ModelId>,
    next_association_id: u64,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::with_config(AssociationConfig::default())
    }

    pub fn with_config(config: AssociationConfig) -> Self {
        Self {
            id: RegistryId::next(),
            config,
            models: Vec::new(),
            names: HashMap::new(),
            next_association_id: 1,
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    /// Make a model known by name before its definition is available
    ///
    /// Declaring an already known name returns its existing id.
    pub fn declare(&mut self, name: &str) -> ModelId {
        if let Some(id) = self.names.get(name) {
            return *id;
        }

        let id = ModelId {
            registry: self.id,
            index: self.models.len(),
        };
        self.models.push(Model::declared(id, name, &self.config));
        self.names.insert(name.to_string(), id);
        tracing::debug!("Declared model {}", name);
        id
    }

    /// Define a model, completing a prior declaration of the same name if any
    pub fn define(&mut self, definition: ModelDefinition) -> AssociationResult<ModelId> {
        let name = definition.name.clone();

        let id = match self.names.get(&name) {
            Some(id) => {
                let id = *id;
                if self.models[id.index].is_defined() {
                    return Err(AssociationError::DuplicateModel(name));
                }
                self.models[id.index] = Model::from_definition(id, definition, &self.config);
                id
            }
            None => {
                let id = ModelId {
                    registry: self.id,
                    index: self.models.len(),
                };
                self.models
                    .push(Model::from_definition(id, definition, &self.config));
                self.names.insert(name.clone(), id);
                id
            }
        };

        tracing::debug!(
            "Defined model {} (table: {})",
            name,
            self.models[id.index].table_name()
        );
        Ok(id)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.model_by_name(name).is_some_and(Model::is_defined)
    }

    pub fn id_of(&self, name: &str) -> Option<ModelId> {
        self.names.get(name).copied()
    }

    /// Whether the id was issued by this registry and is still valid
    pub fn contains(&self, id: ModelId) -> bool {
        id.registry == self.id && id.index < self.models.len()
    }

    pub fn model(&self, id: ModelId) -> Option<&Model> {
        if self.contains(id) {
            self.models.get(id.index)
        } else {
            None
        }
    }

    pub fn model_mut(&mut self, id: ModelId) -> Option<&mut Model> {
        if self.contains(id) {
            self.models.get_mut(id.index)
        } else {
            None
        }
    }

    pub fn model_by_name(&self, name: &str) -> Option<&Model> {
        self.id_of(name).and_then(|id| self.model(id))
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Drop every model; ids issued before the call stop resolving
    pub fn clear(&mut self) {
        self.models.clear();
        self.names.clear();
        self.id = RegistryId::next();
        tracing::debug!("Cleared model registry");
    }

    pub(crate) fn require(&self, id: ModelId) -> AssociationResult<&Model> {
        self.model(id)
            .ok_or_else(|| AssociationError::UnknownModel(format!("{:?}", id)))
    }

    pub(crate) fn require_mut(&mut self, id: ModelId) -> AssociationResult<&mut Model> {
        self.model_mut(id)
            .ok_or_else(|| AssociationError::UnknownModel(format!("{:?}", id)))
    }

    pub(crate) fn next_association_id(&mut self) -> AssociationId {
        let id = AssociationId(self.next_association_id);
        self.next_association_id += 1;
        id
    }

    /// Look up the association a handle points at
    pub fn resolve_association(&self, handle: &AssociationHandle) -> Option<&Arc<Association>> {
        self.model(handle.model)?.association(&handle.alias)
    }

    /// Store a constructed association on its source model
    ///
    /// Collision checks run again here, so a registered association always
    /// satisfies the alias invariants of its source model.
    pub fn register_association(
        &mut self,
        association: Association,
    ) -> AssociationResult<Arc<Association>> {
        let source = self.require(association.source())?;
        check_naming_collision(source, association.alias())?;
        assert_association_unique(self, source, association.alias(), None)?;

        let association = Arc::new(association);
        let source_name = source.name().to_string();
        self.require_mut(association.source())?
            .insert_association(Arc::clone(&association));

        tracing::debug!(
            "Registered association {}.{} ({})",
            source_name,
            association.alias(),
            association.association_type()
        );
        Ok(association)
    }

    /// Call an instance method through the model's method table
    pub fn call(
        &self,
        instance: &mut ModelInstance,
        method: &str,
        args: Vec<Value>,
    ) -> AssociationResult<AccessorOutput> {
        let model = self.require(instance.model())?;
        let function = model
            .methods()
            .get(method)
            .cloned()
            .ok_or_else(|| AssociationError::UnknownMethod {
                model: model.name().to_string(),
                method: method.to_string(),
            })?;
        function(instance, args)
    }
}
