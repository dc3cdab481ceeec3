//! Associations - typed relationships between registered models
//!
//! - `options`: declaration options and their normalization
//! - `helpers`: collision guard, foreign key synthesis and accessor installation
//! - `define`: the construction pipeline every declaration goes through
//! - `query`: relation query descriptions returned by accessors
//! - `belongs_to`, `has_one`, `has_many`, `belongs_to_many`: the four kinds

pub mod belongs_to;
pub mod belongs_to_many;
pub mod define;
pub mod has_many;
pub mod has_one;
pub mod helpers;
pub mod options;
pub mod query;

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AssociationError, AssociationResult};
use crate::model::ModelInstance;
use crate::naming::{accessor_name, singularize};
use crate::registry::{ModelId, ModelRegistry};

pub use belongs_to::BelongsToKeys;
pub use belongs_to_many::ThroughKeys;
pub use define::ConstructionToken;
pub use has_one::HasKeys;
pub use helpers::{
    add_foreign_key_constraints, assert_association_model_is_defined, assert_association_unique,
    check_naming_collision, mixin_methods, remove_undefined,
};
pub use options::{AssociationOptions, ForeignKeyOptions};
pub use query::{AccessorOutput, Filter, Join, QueryKind, RelationQuery};

/// The four association kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssociationType {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
}

impl AssociationType {
    /// Name of the registry method that declares this kind
    pub fn method_name(&self) -> &'static str {
        match self {
            AssociationType::BelongsTo => "belongs_to",
            AssociationType::HasOne => "has_one",
            AssociationType::HasMany => "has_many",
            AssociationType::BelongsToMany => "belongs_to_many",
        }
    }

    /// Whether the association resolves to at most one record
    pub fn is_single(&self) -> bool {
        matches!(self, AssociationType::BelongsTo | AssociationType::HasOne)
    }
}

impl fmt::Display for AssociationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AssociationType::BelongsTo => "BelongsTo",
            AssociationType::HasOne => "HasOne",
            AssociationType::HasMany => "HasMany",
            AssociationType::BelongsToMany => "BelongsToMany",
        };
        f.write_str(name)
    }
}

/// Registry-unique association identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationId(pub(crate) u64);

/// Non-owning reference to an association: its source model and alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssociationHandle {
    pub model: ModelId,
    pub alias: String,
}

/// Key layout of each association kind
#[derive(Debug, Clone, PartialEq)]
pub enum AssociationKeys {
    BelongsTo(BelongsToKeys),
    HasOne(HasKeys),
    HasMany(HasKeys),
    BelongsToMany(ThroughKeys),
}

impl AssociationKeys {
    pub fn association_type(&self) -> AssociationType {
        match self {
            AssociationKeys::BelongsTo(_) => AssociationType::BelongsTo,
            AssociationKeys::HasOne(_) => AssociationType::HasOne,
            AssociationKeys::HasMany(_) => AssociationType::HasMany,
            AssociationKeys::BelongsToMany(_) => AssociationType::BelongsToMany,
        }
    }
}

/// Everything an association kind computes before constructing the association
#[derive(Debug)]
pub struct AssociationParts {
    pub source: ModelId,
    pub target: ModelId,
    pub source_name: String,
    pub target_name: String,
    pub alias: String,
    pub parent: Option<AssociationHandle>,
    pub accessors: IndexMap<String, String>,
    pub options: AssociationOptions,
    pub keys: AssociationKeys,
}

/// A declared relationship from a source model to a target model
#[derive(Debug)]
pub struct Association {
    id: AssociationId,
    source: ModelId,
    target: ModelId,
    source_name: String,
    target_name: String,
    alias: String,
    root: AssociationHandle,
    parent: Option<AssociationHandle>,
    accessors: IndexMap<String, String>,
    options: AssociationOptions,
    keys: AssociationKeys,
}

impl Association {
    /// Construct an association; only reachable from inside the construction pipeline
    ///
    /// The root is the parent declaration for implicit associations and the
    /// association itself otherwise.
    pub fn new(
        _token: ConstructionToken,
        registry: &mut ModelRegistry,
        parts: AssociationParts,
    ) -> Self {
        let own = AssociationHandle {
            model: parts.source,
            alias: parts.alias.clone(),
        };
        let root = parts.parent.clone().unwrap_or(own);

        Self {
            id: registry.next_association_id(),
            source: parts.source,
            target: parts.target,
            source_name: parts.source_name,
            target_name: parts.target_name,
            alias: parts.alias,
            root,
            parent: parts.parent,
            accessors: parts.accessors,
            options: parts.options,
            keys: parts.keys,
        }
    }

    pub fn id(&self) -> AssociationId {
        self.id
    }

    pub fn association_type(&self) -> AssociationType {
        self.keys.association_type()
    }

    pub fn source(&self) -> ModelId {
        self.source
    }

    pub fn target(&self) -> ModelId {
        self.target
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn handle(&self) -> AssociationHandle {
        AssociationHandle {
            model: self.source,
            alias: self.alias.clone(),
        }
    }

    /// The declaration that first created this alias on the source model
    pub fn root(&self) -> &AssociationHandle {
        &self.root
    }

    /// The association whose construction created this one, if implicit
    pub fn parent(&self) -> Option<&AssociationHandle> {
        self.parent.as_ref()
    }

    /// Whether this association was declared explicitly
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_self_association(&self) -> bool {
        self.source == self.target
    }

    /// Logical operation name to exposed method name
    pub fn accessors(&self) -> &IndexMap<String, String> {
        &self.accessors
    }

    pub fn accessor(&self, name: &str) -> Option<&str> {
        self.accessors.get(name).map(String::as_str)
    }

    pub fn options(&self) -> &AssociationOptions {
        &self.options
    }

    pub fn keys(&self) -> &AssociationKeys {
        &self.keys
    }

    /// Name of the foreign key attribute this association is keyed by
    pub fn foreign_key(&self) -> &str {
        match &self.keys {
            AssociationKeys::BelongsTo(keys) => &keys.foreign_key,
            AssociationKeys::HasOne(keys) | AssociationKeys::HasMany(keys) => &keys.foreign_key,
            AssociationKeys::BelongsToMany(keys) => &keys.foreign_key,
        }
    }

    /// Human readable declaration, e.g. `User.has_many(Post)`
    pub fn describe(&self) -> String {
        format!(
            "{}.{}({})",
            self.source_name,
            self.association_type().method_name(),
            self.target_name
        )
    }

    /// Run a logical accessor operation against an instance of the source model
    pub fn invoke(
        &self,
        selector: &str,
        instance: &mut ModelInstance,
        args: Vec<Value>,
    ) -> AssociationResult<AccessorOutput> {
        match &self.keys {
            AssociationKeys::BelongsTo(keys) => belongs_to::invoke(self, keys, selector, instance, args),
            AssociationKeys::HasOne(keys) => has_one::invoke(self, keys, selector, instance, args),
            AssociationKeys::HasMany(keys) => has_many::invoke(self, keys, selector, instance, args),
            AssociationKeys::BelongsToMany(keys) => {
                belongs_to_many::invoke(self, keys, selector, instance, args)
            }
        }
    }

    pub(crate) fn unknown_method(&self, selector: &str) -> AssociationError {
        AssociationError::UnknownMethod {
            model: self.source_name.clone(),
            method: format!("{} ({})", selector, self.alias),
        }
    }
}

/// Accessor names of single-record kinds
pub(crate) fn single_accessors(alias: &str) -> IndexMap<String, String> {
    ["get", "set", "create"]
        .into_iter()
        .map(|name| (name.to_string(), accessor_name(name, alias)))
        .collect()
}

/// Accessor names of collection kinds
pub(crate) fn collection_accessors(plural: &str, singular: &str) -> IndexMap<String, String> {
    [
        ("get", accessor_name("get", plural)),
        ("set", accessor_name("set", plural)),
        ("addMultiple", accessor_name("add", plural)),
        ("add", accessor_name("add", singular)),
        ("create", accessor_name("create", singular)),
        ("remove", accessor_name("remove", singular)),
        ("removeMultiple", accessor_name("remove", plural)),
        ("hasSingle", accessor_name("has", singular)),
        ("hasAll", accessor_name("has", plural)),
        ("count", accessor_name("count", plural)),
    ]
    .into_iter()
    .map(|(name, exposed)| (name.to_string(), exposed))
    .collect()
}

/// Plural and singular accessor stems of a collection association
///
/// An explicit alias is the plural form; otherwise the target's own names apply.
pub(crate) fn collection_names(
    alias: Option<&str>,
    target_plural: &str,
    target_singular: &str,
) -> (String, String) {
    match alias {
        Some(alias) => (alias.to_string(), singularize(alias)),
        None => (target_plural.to_string(), target_singular.to_string()),
    }
}

/// Logical names shared by has-many and belongs-to-many
pub(crate) const COLLECTION_METHODS: [&str; 10] = [
    "get",
    "count",
    "hasSingle",
    "hasAll",
    "set",
    "add",
    "addMultiple",
    "remove",
    "removeMultiple",
    "create",
];

pub(crate) const COLLECTION_ALIASES: [(&str, &str); 4] = [
    ("hasSingle", "has"),
    ("hasAll", "has"),
    ("addMultiple", "add"),
    ("removeMultiple", "remove"),
];

pub(crate) const SINGLE_METHODS: [&str; 3] = ["get", "set", "create"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_association_type_names() {
        assert_eq!(AssociationType::BelongsTo.method_name(), "belongs_to");
        assert_eq!(AssociationType::BelongsToMany.to_string(), "BelongsToMany");
        assert!(AssociationType::HasOne.is_single());
        assert!(!AssociationType::HasMany.is_single());
    }

    #[test]
    fn test_single_accessor_names() {
        let accessors = single_accessors("User");
        assert_eq!(accessors["get"], "getUser");
        assert_eq!(accessors["set"], "setUser");
        assert_eq!(accessors["create"], "createUser");
    }

    #[test]
    fn test_collection_accessor_names() {
        let (plural, singular) = collection_names(None, "Posts", "Post");
        let accessors = collection_accessors(&plural, &singular);

        assert_eq!(accessors["get"], "getPosts");
        assert_eq!(accessors["addMultiple"], "addPosts");
        assert_eq!(accessors["add"], "addPost");
        assert_eq!(accessors["hasSingle"], "hasPost");
        assert_eq!(accessors["hasAll"], "hasPosts");
        assert_eq!(accessors["count"], "countPosts");
        assert_eq!(accessors["removeMultiple"], "removePosts");
        assert_eq!(accessors.len(), COLLECTION_METHODS.len());
    }

    #[test]
    fn test_collection_names_from_alias() {
        assert_eq!(
            collection_names(Some("Categories"), "Tags", "Tag"),
            ("Categories".to_string(), "Category".to_string())
        );
    }
}
