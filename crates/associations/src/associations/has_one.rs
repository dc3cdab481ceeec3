//! HasOne - the target model holds the foreign key
//!
//! Declaring `User.has_one(Profile)` also declares the inverse
//! `Profile.belongs_to(User)`, which owns the foreign key attribute. The
//! construction here is shared with has-many.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::associations::belongs_to;
use crate::associations::define::{define_association, resolve_target, ConstructionToken};
use crate::associations::helpers::{assert_association_unique, check_naming_collision, mixin_methods};
use crate::associations::query::{key_of, values_arg};
use crate::associations::{
    collection_accessors, collection_names, single_accessors, AccessorOutput, Association,
    AssociationHandle, AssociationKeys, AssociationOptions, AssociationParts, AssociationType,
    RelationQuery, COLLECTION_ALIASES, COLLECTION_METHODS, SINGLE_METHODS,
};
use crate::error::{AssociationError, AssociationResult};
use crate::model::ModelInstance;
use crate::naming::foreign_key_name;
use crate::registry::{ModelId, ModelReference, ModelRegistry};

/// Keys of associations whose target holds the foreign key
#[derive(Debug, Clone, PartialEq)]
pub struct HasKeys {
    /// Foreign key attribute on the target model
    pub foreign_key: String,
    pub foreign_key_column: String,
    /// Attribute of the source model the foreign key stores
    pub source_key: String,
    /// Primary key of the target, used to address existing records
    pub target_key: Option<String>,
    pub target_key_column: Option<String>,
    pub target_table: String,
}

impl HasKeys {
    pub(crate) fn require_target_key(&self, association: &Association) -> AssociationResult<(&str, &str)> {
        match (self.target_key.as_deref(), self.target_key_column.as_deref()) {
            (Some(key), Some(column)) => Ok((key, column)),
            _ => Err(AssociationError::configuration(format!(
                "{} cannot address existing {} records: the target has no primary key",
                association.describe(),
                association.target_name()
            ))),
        }
    }

    /// Update assigning the foreign key, with scope values applied
    pub(crate) fn assign(&self, association: &Association, value: Value) -> RelationQuery {
        let mut values = Map::new();
        values.insert(self.foreign_key_column.clone(), value);
        for (column, value) in &association.options().scope {
            values.insert(column.clone(), value.clone());
        }
        RelationQuery::update(&self.target_table, values)
    }

    /// Update clearing the foreign key
    pub(crate) fn unassign(&self) -> RelationQuery {
        let mut values = Map::new();
        values.insert(self.foreign_key_column.clone(), Value::Null);
        RelationQuery::update(&self.target_table, values)
    }

    /// Insert of a new target record linked to `value`
    pub(crate) fn insert(&self, association: &Association, args: Vec<Value>, value: Value) -> RelationQuery {
        let mut values = values_arg(args);
        for (column, scoped) in &association.options().scope {
            values.insert(column.clone(), scoped.clone());
        }
        values.insert(self.foreign_key_column.clone(), value);
        RelationQuery::insert(&self.target_table, values)
    }
}

impl ModelRegistry {
    /// Declare that one record of `target` holds a foreign key to `source`
    pub fn has_one(
        &mut self,
        source: ModelId,
        target: impl Into<ModelReference>,
        options: AssociationOptions,
    ) -> AssociationResult<Arc<Association>> {
        let target = resolve_target(self, &target.into(), AssociationType::HasOne)?;
        associate(self, AssociationType::HasOne, source, target, &options, None)
    }
}

/// Declare a has-one or has-many association
pub(crate) fn associate(
    registry: &mut ModelRegistry,
    association_type: AssociationType,
    source: ModelId,
    target: ModelId,
    options: &AssociationOptions,
    parent: Option<AssociationHandle>,
) -> AssociationResult<Arc<Association>> {
    define_association(
        registry,
        association_type,
        source,
        target,
        options,
        parent,
        move |registry, options, parent, token| {
            build(registry, association_type, source, target, options, parent, token)
        },
    )
}

fn build(
    registry: &mut ModelRegistry,
    association_type: AssociationType,
    source: ModelId,
    target: ModelId,
    options: AssociationOptions,
    parent: Option<AssociationHandle>,
    token: ConstructionToken,
) -> AssociationResult<Arc<Association>> {
    let convention = registry.config().foreign_key_convention;
    let source_model = registry.require(source)?;
    let target_model = registry.require(target)?;

    let (alias, accessors) = if association_type == AssociationType::HasOne {
        let alias = options
            .alias
            .clone()
            .unwrap_or_else(|| target_model.singular_name().to_string());
        let accessors = single_accessors(&alias);
        (alias, accessors)
    } else {
        let (plural, singular) = collection_names(
            options.alias.as_deref(),
            target_model.plural_name(),
            target_model.singular_name(),
        );
        let accessors = collection_accessors(&plural, &singular);
        (plural, accessors)
    };

    check_naming_collision(source_model, &alias)?;
    if let Some(existing) = assert_association_unique(registry, source_model, &alias, parent.as_ref())? {
        return Ok(existing);
    }

    let source_key = match &options.source_key {
        Some(key) => key.clone(),
        None => source_model
            .primary_key_attributes()
            .first()
            .map(|key| key.to_string())
            .ok_or_else(|| {
                AssociationError::configuration(format!(
                    "{}.{}({}) needs a source key, but {} has no primary key",
                    source_model.name(),
                    association_type.method_name(),
                    target_model.name(),
                    source_model.name()
                ))
            })?,
    };

    let inverse_alias = options
        .inverse
        .clone()
        .unwrap_or_else(|| source_model.singular_name().to_string());
    if source == target && inverse_alias == alias {
        return Err(AssociationError::configuration(format!(
            "{}.{}({}) would register its inverse under its own alias \"{}\"; \
             set the \"inverse\" option to a different alias",
            source_model.name(),
            association_type.method_name(),
            target_model.name(),
            alias
        )));
    }
    let default_foreign_key = foreign_key_name(&[inverse_alias.as_str(), source_key.as_str()], convention);
    let target_key = target_model.primary_key_attributes().first().map(|key| key.to_string());
    let target_key_column = target_key
        .as_deref()
        .map(|key| target_model.column_name(key).to_string());
    let source_name = source_model.name().to_string();
    let target_name = target_model.name().to_string();
    let target_table = target_model.table_name().to_string();

    let handle = AssociationHandle {
        model: source,
        alias: alias.clone(),
    };
    let mut inverse_options = options.inherited().alias(inverse_alias).target_key(source_key.clone());
    inverse_options.foreign_key = options.foreign_key.clone();
    let inverse = belongs_to::associate(registry, target, source, &inverse_options, Some(handle))?;

    let foreign_key = match inverse.keys() {
        AssociationKeys::BelongsTo(keys) => keys.foreign_key.clone(),
        _ => options
            .foreign_key
            .as_ref()
            .and_then(|foreign_key| foreign_key.name.clone())
            .unwrap_or(default_foreign_key),
    };
    let foreign_key_column = registry.require(target)?.column_name(&foreign_key).to_string();

    let keys = HasKeys {
        foreign_key,
        foreign_key_column,
        source_key,
        target_key,
        target_key_column,
        target_table,
    };
    let parts = AssociationParts {
        source,
        target,
        source_name,
        target_name,
        alias,
        parent,
        accessors,
        options,
        keys: if association_type == AssociationType::HasOne {
            AssociationKeys::HasOne(keys)
        } else {
            AssociationKeys::HasMany(keys)
        },
    };
    let association = Association::new(token, registry, parts);
    let association = registry.register_association(association)?;

    let methods = registry.require_mut(source)?.methods_mut();
    if association_type == AssociationType::HasOne {
        mixin_methods(&association, methods, &SINGLE_METHODS, &[]);
    } else {
        mixin_methods(&association, methods, &COLLECTION_METHODS, &COLLECTION_ALIASES);
    }
    Ok(association)
}

pub(crate) fn invoke(
    association: &Association,
    keys: &HasKeys,
    selector: &str,
    instance: &mut ModelInstance,
    args: Vec<Value>,
) -> AssociationResult<AccessorOutput> {
    let source_value = instance.get_present(&keys.source_key).cloned();

    match selector {
        "get" => Ok(match source_value {
            Some(value) => AccessorOutput::Query(
                RelationQuery::find_one(&keys.target_table)
                    .filter_eq(&keys.foreign_key_column, value)
                    .with_scope(&association.options().scope),
            ),
            None => AccessorOutput::Nothing,
        }),
        "set" => {
            let value = source_value.unwrap_or(Value::Null);
            let clear = keys.unassign().filter_eq(&keys.foreign_key_column, value.clone());
            let associated = args.into_iter().next().unwrap_or(Value::Null);
            if associated.is_null() {
                return Ok(AccessorOutput::Query(clear));
            }

            let (key, column) = keys.require_target_key(association)?;
            let assign = keys
                .assign(association, value)
                .filter_eq(column, key_of(&associated, key));
            Ok(AccessorOutput::Queries(vec![clear, assign]))
        }
        "create" => Ok(AccessorOutput::Query(keys.insert(
            association,
            args,
            source_value.unwrap_or(Value::Null),
        ))),
        _ => Err(association.unknown_method(selector)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::associations::{Filter, ForeignKeyOptions, QueryKind};
    use crate::model::{AttributeDefinition, ModelDefinition};
    use serde_json::json;

    fn setup(registry: &mut ModelRegistry) -> (ModelId, ModelId) {
        let user = registry
            .define(ModelDefinition::new("User").attribute("id", AttributeDefinition::new("INTEGER").primary_key()))
            .unwrap();
        let profile = registry
            .define(ModelDefinition::new("Profile").attribute("id", AttributeDefinition::new("INTEGER").primary_key()))
            .unwrap();
        (user, profile)
    }

    #[test]
    fn test_creates_inverse_belongs_to() {
        let mut registry = ModelRegistry::new();
        let (user, profile) = setup(&mut registry);

        let association = registry.has_one(user, "Profile", AssociationOptions::new()).unwrap();
        assert_eq!(association.alias(), "Profile");
        assert_eq!(association.foreign_key(), "userId");
        assert_eq!(association.accessor("get"), Some("getProfile"));

        let inverse = registry.model(profile).unwrap().association("User").unwrap().clone();
        assert_eq!(inverse.association_type(), AssociationType::BelongsTo);
        assert_eq!(inverse.parent(), Some(&association.handle()));
        assert_eq!(inverse.root(), &association.handle());
        assert!(!inverse.is_root());
        assert!(registry.model(profile).unwrap().has_attribute("userId"));
    }

    #[test]
    fn test_inverse_alias_and_foreign_key() {
        let mut registry = ModelRegistry::new();
        let (user, profile) = setup(&mut registry);

        let association = registry
            .has_one(user, "Profile", AssociationOptions::new().inverse("Owner"))
            .unwrap();
        assert_eq!(association.foreign_key(), "ownerId");
        assert!(registry.model(profile).unwrap().association("Owner").is_some());

        let association = registry
            .has_one(user, "Profile", AssociationOptions::new().alias("Avatar").foreign_key("avatarOwnerId").inverse("AvatarOwner"))
            .unwrap();
        assert_eq!(association.foreign_key(), "avatarOwnerId");
    }

    #[test]
    fn test_reuses_existing_inverse() {
        let mut registry = ModelRegistry::new();
        let (user, profile) = setup(&mut registry);

        let explicit = registry
            .belongs_to(profile, "User", AssociationOptions::new().foreign_key("accountId"))
            .unwrap();
        let association = registry.has_one(user, "Profile", AssociationOptions::new()).unwrap();

        assert_eq!(association.foreign_key(), "accountId");
        let inverse = registry.model(profile).unwrap().association("User").unwrap();
        assert!(Arc::ptr_eq(inverse, &explicit));
        assert!(inverse.is_root());
    }

    #[test]
    fn test_accessors() {
        let mut registry = ModelRegistry::new();
        let (user, _profile) = setup(&mut registry);
        registry.has_one(user, "Profile", AssociationOptions::new()).unwrap();

        let mut instance = ModelInstance::new(user);
        assert_eq!(
            registry.call(&mut instance, "getProfile", vec![]).unwrap(),
            AccessorOutput::Nothing
        );

        instance.set("id", 3);
        let output = registry.call(&mut instance, "getProfile", vec![]).unwrap();
        let query = output.as_query().unwrap();
        assert_eq!(query.table, "Profiles");
        assert_eq!(
            query.filters,
            vec![Filter::Eq {
                column: "userId".to_string(),
                value: json!(3)
            }]
        );

        let queries = registry
            .call(&mut instance, "setProfile", vec![json!({"id": 5})])
            .unwrap()
            .into_queries();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].values["userId"], Value::Null);
        assert_eq!(queries[1].values["userId"], json!(3));

        let output = registry
            .call(&mut instance, "createProfile", vec![json!({"bio": "hi"})])
            .unwrap();
        let insert = output.as_query().unwrap();
        assert_eq!(insert.kind, QueryKind::Insert);
        assert_eq!(insert.values["userId"], json!(3));
    }

    #[test]
    fn test_self_reference_needs_distinct_inverse() {
        let mut registry = ModelRegistry::new();
        let (user, _profile) = setup(&mut registry);

        let err = registry.has_one(user, "User", AssociationOptions::new()).unwrap_err();
        assert!(matches!(err, AssociationError::Configuration(ref message) if message.contains("\"inverse\"")));
        assert!(registry.model(user).unwrap().associations().is_empty());
        assert!(!registry.model(user).unwrap().has_attribute("userId"));

        let association = registry
            .has_one(user, "User", AssociationOptions::new().alias("Mentee").inverse("Mentor"))
            .unwrap();
        assert!(association.is_root());
        assert_eq!(association.foreign_key(), "mentorId");

        let inverse = registry.model(user).unwrap().association("Mentor").unwrap();
        assert_eq!(inverse.association_type(), AssociationType::BelongsTo);
        assert!(!inverse.is_root());
        assert!(association.is_self_association());
    }

    #[test]
    fn test_create_uses_foreign_key_column() {
        let mut registry = ModelRegistry::new();
        let (user, _profile) = setup(&mut registry);
        registry
            .has_one(
                user,
                "Profile",
                AssociationOptions::new().foreign_key(ForeignKeyOptions::named("ownerId").with_field("owner_id")),
            )
            .unwrap();

        let mut instance = ModelInstance::new(user);
        instance.set("id", 1);

        let get = registry.call(&mut instance, "getProfile", vec![]).unwrap();
        assert_eq!(
            get.as_query().unwrap().filters,
            vec![Filter::Eq {
                column: "owner_id".to_string(),
                value: json!(1)
            }]
        );

        let create = registry
            .call(&mut instance, "createProfile", vec![json!({"bio": "hi"})])
            .unwrap();
        let values = &create.as_query().unwrap().values;
        assert_eq!(values["owner_id"], json!(1));
        assert!(!values.contains_key("ownerId"));
    }
}
