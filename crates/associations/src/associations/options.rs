//! Declaration options shared by every association kind

use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use serde_json::Value;

use crate::associations::helpers::remove_undefined;
use crate::model::ReferentialAction;
use crate::registry::{ModelReference, RegistryId};

static REGISTRY_ACCESS_WARNED: AtomicBool = AtomicBool::new(false);

/// Name and column settings of a synthesized foreign key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForeignKeyOptions {
    pub name: Option<String>,
    pub field: Option<String>,
    pub allow_null: Option<bool>,
}

impl ForeignKeyOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn allow_null(mut self, allow_null: bool) -> Self {
        self.allow_null = Some(allow_null);
        self
    }
}

impl From<&str> for ForeignKeyOptions {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for ForeignKeyOptions {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

/// Options accepted by every association declaration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssociationOptions {
    /// Alias (`as`) of the association on its source model
    pub alias: Option<String>,
    pub foreign_key: Option<ForeignKeyOptions>,
    /// Link table key pointing at the target (belongs-to-many only)
    pub other_key: Option<ForeignKeyOptions>,
    pub source_key: Option<String>,
    pub target_key: Option<String>,
    /// Link model (belongs-to-many only)
    pub through: Option<ModelReference>,
    /// Alias of the implicit inverse or paired association
    pub inverse: Option<String>,
    /// Equality conditions applied to reads and values applied on writes
    pub scope: IndexMap<String, Value>,
    pub foreign_key_constraint: Option<bool>,
    pub on_delete: Option<ReferentialAction>,
    pub on_update: Option<ReferentialAction>,
    pub hooks: Option<bool>,
    registry: Option<RegistryId>,
    warn_on_registry_access: bool,
}

impl AssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn foreign_key(mut self, foreign_key: impl Into<ForeignKeyOptions>) -> Self {
        self.foreign_key = Some(foreign_key.into());
        self
    }

    pub fn other_key(mut self, other_key: impl Into<ForeignKeyOptions>) -> Self {
        self.other_key = Some(other_key.into());
        self
    }

    pub fn source_key(mut self, source_key: impl Into<String>) -> Self {
        self.source_key = Some(source_key.into());
        self
    }

    pub fn target_key(mut self, target_key: impl Into<String>) -> Self {
        self.target_key = Some(target_key.into());
        self
    }

    pub fn through(mut self, through: impl Into<ModelReference>) -> Self {
        self.through = Some(through.into());
        self
    }

    pub fn inverse(mut self, alias: impl Into<String>) -> Self {
        self.inverse = Some(alias.into());
        self
    }

    /// Set the scope; entries without a value are dropped
    pub fn scope<K, I>(mut self, entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Option<Value>)>,
    {
        self.scope = remove_undefined(entries.into_iter().map(|(key, value)| (key.into(), value)));
        self
    }

    pub fn foreign_key_constraint(mut self, enabled: bool) -> Self {
        self.foreign_key_constraint = Some(enabled);
        self
    }

    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    pub fn hooks(mut self, enabled: bool) -> Self {
        self.hooks = Some(enabled);
        self
    }

    /// Whether any option asks for a database-level foreign key constraint
    pub fn constraints_requested(&self) -> bool {
        self.foreign_key_constraint == Some(true)
            || self.on_delete.is_some()
            || self.on_update.is_some()
    }

    pub fn hooks_enabled(&self) -> bool {
        self.hooks == Some(true)
    }

    /// Registry the options were normalized for
    #[deprecated(note = "use the registry passed to the declaration instead")]
    pub fn registry(&self) -> Option<RegistryId> {
        if self.warn_on_registry_access && !REGISTRY_ACCESS_WARNED.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "AssociationOptions::registry is deprecated; use the registry the association was declared on"
            );
        }
        self.registry
    }

    /// Copy used by a single declaration: registry attached and hooks defaulted
    pub(crate) fn normalized(
        &self,
        registry: RegistryId,
        hooks_by_default: bool,
        warn_on_registry_access: bool,
    ) -> Self {
        let mut options = self.clone();
        options.registry = Some(registry);
        options.hooks = Some(self.hooks.unwrap_or(hooks_by_default));
        options.warn_on_registry_access = warn_on_registry_access;
        options
    }

    /// Options shared with the implicit association a declaration creates
    pub(crate) fn inherited(&self) -> Self {
        Self {
            foreign_key_constraint: self.foreign_key_constraint,
            on_delete: self.on_delete,
            on_update: self.on_update,
            hooks: self.hooks,
            ..Self::default()
        }
    }
}
