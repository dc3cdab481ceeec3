//! Method table - per-model capability table for instance methods
//!
//! Instance method dispatch is a lookup in this table. Entries are tagged with
//! their origin so generated association accessors never replace a method the
//! user defined.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::associations::AccessorOutput;
use crate::error::AssociationResult;
use crate::model::ModelInstance;

/// Callable stored in a method table
pub type MethodFn =
    Arc<dyn Fn(&mut ModelInstance, Vec<Value>) -> AssociationResult<AccessorOutput> + Send + Sync>;

/// Who installed a method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodOrigin {
    /// Defined by application code
    User,
    /// Installed by an association declaration
    Generated,
}

#[derive(Clone)]
pub struct MethodEntry {
    pub origin: MethodOrigin,
    pub function: MethodFn,
}

#[derive(Clone, Default)]
pub struct MethodTable {
    entries: HashMap<String, MethodEntry>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a user method; it takes precedence over any generated accessor
    pub fn define<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&mut ModelInstance, Vec<Value>) -> AssociationResult<AccessorOutput>
            + Send
            + Sync
            + 'static,
    {
        self.entries.insert(
            name.into(),
            MethodEntry {
                origin: MethodOrigin::User,
                function: Arc::new(function),
            },
        );
    }

    /// Install a generated method unless a user method owns the name
    ///
    /// Returns whether the method was installed.
    pub(crate) fn install(&mut self, name: &str, function: MethodFn) -> bool {
        if self.is_user_defined(name) {
            return false;
        }
        self.entries.insert(
            name.to_string(),
            MethodEntry {
                origin: MethodOrigin::Generated,
                function,
            },
        );
        true
    }

    pub fn get(&self, name: &str) -> Option<&MethodFn> {
        self.entries.get(name).map(|entry| &entry.function)
    }

    pub fn origin(&self, name: &str) -> Option<MethodOrigin> {
        self.entries.get(name).map(|entry| entry.origin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn is_user_defined(&self, name: &str) -> bool {
        self.origin(name) == Some(MethodOrigin::User)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.names().into_iter().map(|name| (name, self.origin(name))))
            .finish()
    }
}
