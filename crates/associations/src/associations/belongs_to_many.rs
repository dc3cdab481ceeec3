//! BelongsToMany - records on both sides are linked through a through model
//!
//! `Project.belongs_to_many(User, through: "ProjectMember")` adds `projectId`
//! and `userId` to the link model and declares the paired
//! `User.belongs_to_many(Project)` on the target.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::associations::define::{define_association, resolve_target, ConstructionToken};
use crate::associations::helpers::{
    add_foreign_key_constraints, assert_association_model_is_defined, assert_association_unique,
    check_naming_collision, mixin_methods,
};
use crate::associations::query::{collect_keys, key_of, values_arg};
use crate::associations::{
    collection_accessors, collection_names, AccessorOutput, Association, AssociationHandle,
    AssociationKeys, AssociationOptions, AssociationParts, AssociationType, ForeignKeyOptions,
    RelationQuery, COLLECTION_ALIASES, COLLECTION_METHODS,
};
use crate::error::{AssociationError, AssociationResult};
use crate::model::{AttributeDefinition, ModelDefinition, ModelInstance};
use crate::naming::foreign_key_name;
use crate::registry::{ModelId, ModelReference, ModelRegistry};

/// Keys of an association stored in a link table
#[derive(Debug, Clone, PartialEq)]
pub struct ThroughKeys {
    pub through: ModelId,
    pub through_table: String,
    /// Link attribute pointing at the source
    pub foreign_key: String,
    pub foreign_key_column: String,
    /// Link attribute pointing at the target
    pub other_key: String,
    pub other_key_column: String,
    pub source_key: String,
    pub target_key: String,
    pub target_key_column: String,
    pub target_table: String,
}

impl ThroughKeys {
    fn link_column(&self, column: &str) -> String {
        format!("{}.{}", self.through_table, column)
    }

    /// Target records joined through the link table, filtered to this source
    fn linked(&self, query: RelationQuery, source_value: Value) -> RelationQuery {
        query
            .join(&self.through_table, &self.target_key_column, &self.other_key_column)
            .filter_eq(&self.link_column(&self.foreign_key_column), source_value)
    }

    fn link_row(&self, source_value: &Value, target_value: Value) -> RelationQuery {
        let mut values = Map::new();
        values.insert(self.foreign_key_column.clone(), source_value.clone());
        values.insert(self.other_key_column.clone(), target_value);
        RelationQuery::insert(&self.through_table, values)
    }
}

impl ModelRegistry {
    /// Declare a many-to-many association through a link model
    pub fn belongs_to_many(
        &mut self,
        source: ModelId,
        target: impl Into<ModelReference>,
        options: AssociationOptions,
    ) -> AssociationResult<Arc<Association>> {
        let target = resolve_target(self, &target.into(), AssociationType::BelongsToMany)?;
        associate(self, source, target, &options, None)
    }
}

pub(crate) fn associate(
    registry: &mut ModelRegistry,
    source: ModelId,
    target: ModelId,
    options: &AssociationOptions,
    parent: Option<AssociationHandle>,
) -> AssociationResult<Arc<Association>> {
    define_association(
        registry,
        AssociationType::BelongsToMany,
        source,
        target,
        options,
        parent,
        move |registry, options, parent, token| build(registry, source, target, options, parent, token),
    )
}

/// Resolve the through model, defining it when only a name is known
fn resolve_through(registry: &mut ModelRegistry, through: &ModelReference) -> AssociationResult<ModelId> {
    match through {
        ModelReference::Model(id) => {
            let model = registry.model(*id).ok_or_else(|| AssociationError::InvalidTarget {
                model: format!("{:?}", id),
                method: AssociationType::BelongsToMany.method_name().to_string(),
            })?;
            assert_association_model_is_defined(model, AssociationType::BelongsToMany.method_name())?;
            Ok(*id)
        }
        ModelReference::Name(name) => match registry.model_by_name(name) {
            Some(model) if model.is_defined() => Ok(model.id()),
            _ => {
                tracing::debug!("Defining through model {}", name);
                registry.define(ModelDefinition::new(name.as_str()).table_name(name.as_str()))
            }
        },
    }
}

fn build(
    registry: &mut ModelRegistry,
    source: ModelId,
    target: ModelId,
    options: AssociationOptions,
    parent: Option<AssociationHandle>,
    token: ConstructionToken,
) -> AssociationResult<Arc<Association>> {
    let convention = registry.config().foreign_key_convention;
    let source_model = registry.require(source)?;
    let target_model = registry.require(target)?;

    let through = options.through.clone().ok_or_else(|| {
        AssociationError::configuration(format!(
            "{}.belongs_to_many({}) requires a \"through\" option",
            source_model.name(),
            target_model.name()
        ))
    })?;

    let (alias, singular) = collection_names(
        options.alias.as_deref(),
        target_model.plural_name(),
        target_model.singular_name(),
    );
    let accessors = collection_accessors(&alias, &singular);

    check_naming_collision(source_model, &alias)?;
    if let Some(existing) = assert_association_unique(registry, source_model, &alias, parent.as_ref())? {
        return Ok(existing);
    }

    let source_key = key_or_primary(&options.source_key, source_model.primary_key_attributes(), source_model.name())?;
    let target_key = key_or_primary(&options.target_key, target_model.primary_key_attributes(), target_model.name())?;
    let source_key_attribute = source_model.attribute(&source_key).cloned().unwrap_or_else(|| AttributeDefinition::new("INTEGER"));
    let target_key_attribute = target_model.attribute(&target_key).cloned().unwrap_or_else(|| AttributeDefinition::new("INTEGER"));
    let source_key_column = source_key_attribute.column_name(&source_key).to_string();
    let target_key_column = target_key_attribute.column_name(&target_key).to_string();

    let foreign_key_options = options.foreign_key.clone().unwrap_or_default();
    let other_key_options = options.other_key.clone().unwrap_or_default();
    let foreign_key = foreign_key_options.name.clone().unwrap_or_else(|| {
        foreign_key_name(&[source_model.singular_name(), source_key.as_str()], convention)
    });
    let other_key = other_key_options.name.clone().unwrap_or_else(|| {
        foreign_key_name(&[target_model.singular_name(), target_key.as_str()], convention)
    });
    if foreign_key == other_key {
        return Err(AssociationError::configuration(format!(
            "{}.belongs_to_many({}) uses \"{}\" as both foreign key and other key; \
             set the foreign_key or other_key option",
            source_model.name(),
            target_model.name(),
            foreign_key
        )));
    }

    let mut foreign_key_attribute = link_attribute(&source_key_attribute, &foreign_key_options);
    add_foreign_key_constraints(&mut foreign_key_attribute, source_model, &options, Some(source_key_column.as_str()));
    let mut other_key_attribute = link_attribute(&target_key_attribute, &other_key_options);
    add_foreign_key_constraints(&mut other_key_attribute, target_model, &options, Some(target_key_column.as_str()));

    let source_name = source_model.name().to_string();
    let target_name = target_model.name().to_string();
    let target_table = target_model.table_name().to_string();
    let pair_alias = options
        .inverse
        .clone()
        .unwrap_or_else(|| source_model.plural_name().to_string());

    let through = resolve_through(registry, &through)?;
    let through_model = registry.require_mut(through)?;
    if through_model.primary_key_attributes().is_empty() {
        foreign_key_attribute = foreign_key_attribute.primary_key();
        other_key_attribute = other_key_attribute.primary_key();
    }
    through_model.merge_attribute_default(&foreign_key, foreign_key_attribute);
    through_model.merge_attribute_default(&other_key, other_key_attribute);
    let foreign_key_column = through_model.column_name(&foreign_key).to_string();
    let other_key_column = through_model.column_name(&other_key).to_string();
    let through_table = through_model.table_name().to_string();

    tracing::debug!(
        "{}.{} links through {} ({}, {})",
        source_name,
        alias,
        through_table,
        foreign_key,
        other_key
    );

    let handle = AssociationHandle {
        model: source,
        alias: alias.clone(),
    };
    let mut pair_options = options.inherited().alias(pair_alias.clone()).inverse(alias.clone());
    pair_options.through = Some(ModelReference::Model(through));
    pair_options.foreign_key = Some(ForeignKeyOptions { name: Some(other_key.clone()), ..other_key_options });
    pair_options.other_key = Some(ForeignKeyOptions { name: Some(foreign_key.clone()), ..foreign_key_options });
    pair_options.source_key = Some(target_key.clone());
    pair_options.target_key = Some(source_key.clone());

    let parts = AssociationParts {
        source,
        target,
        source_name,
        target_name,
        alias,
        parent,
        accessors,
        options,
        keys: AssociationKeys::BelongsToMany(ThroughKeys {
            through,
            through_table,
            foreign_key,
            foreign_key_column,
            other_key,
            other_key_column,
            source_key,
            target_key,
            target_key_column,
            target_table,
        }),
    };
    let association = Association::new(token, registry, parts);
    let association = registry.register_association(association)?;
    mixin_methods(
        &association,
        registry.require_mut(source)?.methods_mut(),
        &COLLECTION_METHODS,
        &COLLECTION_ALIASES,
    );

    let pair_exists = registry.require(target)?.association(&pair_alias).is_some();
    let same_alias_on_self = source == target && pair_alias == association.alias();
    if !pair_exists && !same_alias_on_self {
        associate(registry, target, source, &pair_options, Some(handle))?;
    }

    Ok(association)
}

fn key_or_primary(key: &Option<String>, primary_keys: Vec<&str>, model: &str) -> AssociationResult<String> {
    match key {
        Some(key) => Ok(key.clone()),
        None => primary_keys.first().map(|key| key.to_string()).ok_or_else(|| {
            AssociationError::configuration(format!(
                "belongs_to_many needs a key on {}, but it has no primary key",
                model
            ))
        }),
    }
}

fn link_attribute(referenced: &AttributeDefinition, options: &ForeignKeyOptions) -> AttributeDefinition {
    let mut attribute = AttributeDefinition::new(referenced.data_type.clone())
        .allow_null(options.allow_null.unwrap_or(false));
    attribute.field = options.field.clone();
    attribute
}

pub(crate) fn invoke(
    association: &Association,
    keys: &ThroughKeys,
    selector: &str,
    instance: &mut ModelInstance,
    args: Vec<Value>,
) -> AssociationResult<AccessorOutput> {
    let source_value = instance.get_present(&keys.source_key).cloned();
    let scope = &association.options().scope;

    match selector {
        "get" | "count" | "has" => {
            let Some(value) = source_value else {
                return Ok(AccessorOutput::Nothing);
            };
            let query = match selector {
                "get" => RelationQuery::find_all(&keys.target_table),
                _ => RelationQuery::count(&keys.target_table),
            };
            let mut query = keys.linked(query, value).with_scope(scope);
            if selector == "has" {
                query = query.filter_in(&keys.target_key_column, collect_keys(args, &keys.target_key));
            }
            Ok(AccessorOutput::Query(query))
        }
        "set" => {
            let value = source_value.unwrap_or(Value::Null);
            let mut queries = vec![RelationQuery::delete(&keys.through_table)
                .filter_eq(&keys.foreign_key_column, value.clone())];
            queries.extend(
                collect_keys(args, &keys.target_key)
                    .into_iter()
                    .map(|target| keys.link_row(&value, target)),
            );
            Ok(AccessorOutput::Queries(queries))
        }
        "add" => {
            let value = source_value.unwrap_or(Value::Null);
            Ok(AccessorOutput::Queries(
                collect_keys(args, &keys.target_key)
                    .into_iter()
                    .map(|target| keys.link_row(&value, target))
                    .collect(),
            ))
        }
        "remove" => Ok(AccessorOutput::Query(
            RelationQuery::delete(&keys.through_table)
                .filter_eq(&keys.foreign_key_column, source_value.unwrap_or(Value::Null))
                .filter_in(&keys.other_key_column, collect_keys(args, &keys.target_key)),
        )),
        "create" => {
            let mut values = values_arg(args);
            for (column, scoped) in scope {
                values.insert(column.clone(), scoped.clone());
            }
            let target_value = key_of(&Value::Object(values.clone()), &keys.target_key);
            let value = source_value.unwrap_or(Value::Null);
            Ok(AccessorOutput::Queries(vec![
                RelationQuery::insert(&keys.target_table, values),
                keys.link_row(&value, target_value),
            ]))
        }
        _ => Err(association.unknown_method(selector)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::associations::{Join, QueryKind};
    use crate::model::{ReferentialAction, References};
    use serde_json::json;

    fn setup(registry: &mut ModelRegistry) -> (ModelId, ModelId) {
        let project = registry
            .define(ModelDefinition::new("Project").attribute("id", AttributeDefinition::new("INTEGER").primary_key()))
            .unwrap();
        let user = registry
            .define(ModelDefinition::new("User").attribute("id", AttributeDefinition::new("INTEGER").primary_key()))
            .unwrap();
        (project, user)
    }

    #[test]
    fn test_through_required() {
        let mut registry = ModelRegistry::new();
        let (project, _user) = setup(&mut registry);

        let err = registry
            .belongs_to_many(project, "User", AssociationOptions::new())
            .unwrap_err();
        assert!(matches!(err, AssociationError::Configuration(_)));
    }

    #[test]
    fn test_defines_through_model_and_pair() {
        let mut registry = ModelRegistry::new();
        let (project, user) = setup(&mut registry);

        let association = registry
            .belongs_to_many(project, "User", AssociationOptions::new().through("ProjectMember"))
            .unwrap();
        assert_eq!(association.alias(), "Users");
        assert_eq!(association.foreign_key(), "projectId");

        let through = registry.model_by_name("ProjectMember").unwrap();
        assert_eq!(through.table_name(), "ProjectMember");
        assert_eq!(through.primary_key_attributes(), vec!["projectId", "userId"]);

        let pair = registry.model(user).unwrap().association("Projects").unwrap().clone();
        assert_eq!(pair.association_type(), AssociationType::BelongsToMany);
        assert_eq!(pair.foreign_key(), "userId");
        assert_eq!(pair.root(), &association.handle());
        assert!(registry.model(user).unwrap().methods().contains("addProject"));
    }

    #[test]
    fn test_existing_through_model_keeps_its_primary_key() {
        let mut registry = ModelRegistry::new();
        let (project, _user) = setup(&mut registry);
        registry
            .define(
                ModelDefinition::new("Membership")
                    .attribute("id", AttributeDefinition::new("INTEGER").primary_key()),
            )
            .unwrap();

        registry
            .belongs_to_many(project, "User", AssociationOptions::new().through("Membership"))
            .unwrap();

        let through = registry.model_by_name("Membership").unwrap();
        assert_eq!(through.primary_key_attributes(), vec!["id"]);
        assert_eq!(through.table_name(), "Memberships");
        assert!(through.has_attribute("projectId"));
    }

    #[test]
    fn test_constraints_on_link_attributes() {
        let mut registry = ModelRegistry::new();
        let (project, _user) = setup(&mut registry);

        registry
            .belongs_to_many(
                project,
                "User",
                AssociationOptions::new()
                    .through("ProjectMember")
                    .on_delete(ReferentialAction::Cascade),
            )
            .unwrap();

        let through = registry.model_by_name("ProjectMember").unwrap();
        assert_eq!(
            through.attribute("userId").unwrap().references,
            Some(References {
                model: "Users".to_string(),
                key: "id".to_string()
            })
        );
        assert_eq!(
            through.attribute("projectId").unwrap().on_delete,
            Some(ReferentialAction::Cascade)
        );
    }

    #[test]
    fn test_self_association_needs_distinct_keys() {
        let mut registry = ModelRegistry::new();
        let (_project, user) = setup(&mut registry);

        let err = registry
            .belongs_to_many(user, user, AssociationOptions::new().through("Friendship"))
            .unwrap_err();
        assert!(matches!(err, AssociationError::Configuration(_)));

        let association = registry
            .belongs_to_many(
                user,
                user,
                AssociationOptions::new()
                    .through("Friendship")
                    .alias("Friends")
                    .inverse("Friends")
                    .foreign_key("userId")
                    .other_key("friendId"),
            )
            .unwrap();
        assert!(association.is_self_association());
        assert_eq!(registry.model(user).unwrap().associations().len(), 1);
    }

    #[test]
    fn test_accessors() {
        let mut registry = ModelRegistry::new();
        let (project, _user) = setup(&mut registry);
        registry
            .belongs_to_many(project, "User", AssociationOptions::new().through("ProjectMember"))
            .unwrap();

        let mut instance = ModelInstance::new(project).with("id", 10);

        let get = registry.call(&mut instance, "getUsers", vec![]).unwrap();
        let get = get.as_query().unwrap();
        assert_eq!(get.kind, QueryKind::FindAll);
        assert_eq!(
            get.join,
            Some(Join {
                table: "ProjectMember".to_string(),
                left_column: "id".to_string(),
                right_column: "userId".to_string()
            })
        );

        let add = registry
            .call(&mut instance, "addUsers", vec![json!([{"id": 1}, {"id": 2}])])
            .unwrap()
            .into_queries();
        assert_eq!(add.len(), 2);
        assert_eq!(add[1].values["userId"], json!(2));
        assert_eq!(add[1].values["projectId"], json!(10));

        let set = registry
            .call(&mut instance, "setUsers", vec![json!([3])])
            .unwrap()
            .into_queries();
        assert_eq!(set[0].kind, QueryKind::Delete);
        assert_eq!(set.len(), 2);

        let create = registry
            .call(&mut instance, "createUser", vec![json!({"id": 4})])
            .unwrap()
            .into_queries();
        assert_eq!(create[0].table, "Users");
        assert_eq!(create[1].values["userId"], json!(4));

        let has = registry.call(&mut instance, "hasUser", vec![json!(4)]).unwrap();
        assert_eq!(has.as_query().unwrap().kind, QueryKind::Count);
    }
}
