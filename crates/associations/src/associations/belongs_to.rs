//! BelongsTo - the source model holds the foreign key
//!
//! `Post.belongs_to(User)` adds `userId` to Post and exposes `getUser`,
//! `setUser` and `createUser` on Post instances.

use std::sync::Arc;

use serde_json::Value;

use crate::associations::define::{define_association, resolve_target, ConstructionToken};
use crate::associations::helpers::{
    add_foreign_key_constraints, assert_association_unique, check_naming_collision, mixin_methods,
};
use crate::associations::query::{key_of, values_arg};
use crate::associations::{
    single_accessors, AccessorOutput, Association, AssociationHandle, AssociationKeys,
    AssociationOptions, AssociationParts, AssociationType, RelationQuery, SINGLE_METHODS,
};
use crate::error::{AssociationError, AssociationResult};
use crate::model::{AttributeDefinition, ModelInstance};
use crate::naming::foreign_key_name;
use crate::registry::{ModelId, ModelReference, ModelRegistry};

#[derive(Debug, Clone, PartialEq)]
pub struct BelongsToKeys {
    /// Foreign key attribute on the source model
    pub foreign_key: String,
    pub foreign_key_column: String,
    /// Referenced attribute on the target model
    pub target_key: String,
    pub target_key_column: String,
    pub target_table: String,
}

impl ModelRegistry {
    /// Declare that `source` holds a foreign key to `target`
    pub fn belongs_to(
        &mut self,
        source: ModelId,
        target: impl Into<ModelReference>,
        options: AssociationOptions,
    ) -> AssociationResult<Arc<Association>> {
        let target = resolve_target(self, &target.into(), AssociationType::BelongsTo)?;
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
        AssociationType::BelongsTo,
        source,
        target,
        options,
        parent,
        move |registry, options, parent, token| build(registry, source, target, options, parent, token),
    )
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

    let alias = options
        .alias
        .clone()
        .unwrap_or_else(|| target_model.singular_name().to_string());

    check_naming_collision(source_model, &alias)?;
    if let Some(existing) = assert_association_unique(registry, source_model, &alias, parent.as_ref())? {
        return Ok(existing);
    }

    let target_key = match &options.target_key {
        Some(key) => key.clone(),
        None => target_model
            .primary_key_attributes()
            .first()
            .map(|key| key.to_string())
            .ok_or_else(|| {
                AssociationError::configuration(format!(
                    "{}.belongs_to({}) needs a target key, but {} has no primary key",
                    source_model.name(),
                    target_model.name(),
                    target_model.name()
                ))
            })?,
    };
    let target_key_attribute = target_model.attribute(&target_key).ok_or_else(|| {
        AssociationError::configuration(format!(
            "Unknown target key \"{}\" on model {}",
            target_key,
            target_model.name()
        ))
    })?;
    let target_key_column = target_key_attribute.column_name(&target_key).to_string();

    let foreign_key_options = options.foreign_key.clone().unwrap_or_default();
    let foreign_key = foreign_key_options
        .name
        .clone()
        .unwrap_or_else(|| foreign_key_name(&[alias.as_str(), target_key.as_str()], convention));
    if foreign_key == alias {
        return Err(AssociationError::NamingConflict {
            model: source_model.name().to_string(),
            alias,
        });
    }

    let mut attribute = AttributeDefinition::new(target_key_attribute.data_type.clone())
        .allow_null(foreign_key_options.allow_null.unwrap_or(true));
    attribute.field = foreign_key_options.field;
    add_foreign_key_constraints(
        &mut attribute,
        target_model,
        &options,
        Some(target_key_column.as_str()),
    );

    let source_name = source_model.name().to_string();
    let target_name = target_model.name().to_string();
    let target_table = target_model.table_name().to_string();

    let source_model = registry.require_mut(source)?;
    source_model.merge_attribute_default(&foreign_key, attribute);
    let foreign_key_column = source_model.column_name(&foreign_key).to_string();

    tracing::debug!(
        "{}.{} uses foreign key {} referencing {}.{}",
        source_name,
        alias,
        foreign_key,
        target_table,
        target_key_column
    );

    let parts = AssociationParts {
        source,
        target,
        source_name,
        target_name,
        accessors: single_accessors(&alias),
        alias,
        parent,
        options,
        keys: AssociationKeys::BelongsTo(BelongsToKeys {
            foreign_key,
            foreign_key_column,
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
        &SINGLE_METHODS,
        &[],
    );
    Ok(association)
}

pub(crate) fn invoke(
    association: &Association,
    keys: &BelongsToKeys,
    selector: &str,
    instance: &mut ModelInstance,
    args: Vec<Value>,
) -> AssociationResult<AccessorOutput> {
    match selector {
        "get" => match instance.get_present(&keys.foreign_key) {
            Some(value) => Ok(AccessorOutput::Query(
                RelationQuery::find_one(&keys.target_table)
                    .filter_eq(&keys.target_key_column, value.clone())
                    .with_scope(&association.options().scope),
            )),
            None => Ok(AccessorOutput::Nothing),
        },
        "set" => {
            let associated = args.into_iter().next().unwrap_or(Value::Null);
            instance.set(&keys.foreign_key, key_of(&associated, &keys.target_key));
            Ok(AccessorOutput::Nothing)
        }
        "create" => {
            let mut values = values_arg(args);
            for (column, value) in &association.options().scope {
                values.insert(column.clone(), value.clone());
            }
            if let Some(key) = values.get(&keys.target_key) {
                instance.set(&keys.foreign_key, key.clone());
            }
            Ok(AccessorOutput::Query(RelationQuery::insert(&keys.target_table, values)))
        }
        _ => Err(association.unknown_method(selector)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::associations::QueryKind;
    use crate::config::{AssociationConfig, ForeignKeyConvention};
    use crate::model::{ModelDefinition, ReferentialAction, References};
    use serde_json::json;

    fn setup(registry: &mut ModelRegistry) -> (ModelId, ModelId) {
        let user = registry
            .define(
                ModelDefinition::new("User")
                    .attribute("id", AttributeDefinition::new("INTEGER").primary_key())
                    .attribute("name", AttributeDefinition::new("TEXT")),
            )
            .unwrap();
        let post = registry
            .define(
                ModelDefinition::new("Post")
                    .attribute("id", AttributeDefinition::new("INTEGER").primary_key())
                    .attribute("title", AttributeDefinition::new("TEXT")),
            )
            .unwrap();
        (user, post)
    }

    #[test]
    fn test_defaults() {
        let mut registry = ModelRegistry::new();
        let (user, post) = setup(&mut registry);

        let association = registry.belongs_to(post, "User", AssociationOptions::new()).unwrap();

        assert_eq!(association.alias(), "User");
        assert_eq!(association.foreign_key(), "userId");
        assert_eq!(association.target(), user);
        assert!(association.is_root());
        assert_eq!(association.accessor("get"), Some("getUser"));

        let post_model = registry.model(post).unwrap();
        let attribute = post_model.attribute("userId").unwrap();
        assert_eq!(attribute.data_type, "INTEGER");
        assert!(attribute.allow_null);
        assert!(attribute.references.is_none());
        assert!(post_model.methods().contains("setUser"));
    }

    #[test]
    fn test_constraint_and_alias() {
        let mut registry = ModelRegistry::new();
        let (_user, post) = setup(&mut registry);

        registry
            .belongs_to(
                post,
                "User",
                AssociationOptions::new()
                    .alias("Author")
                    .on_delete(ReferentialAction::Cascade),
            )
            .unwrap();

        let attribute = registry.model(post).unwrap().attribute("authorId").unwrap().clone();
        assert_eq!(
            attribute.references,
            Some(References {
                model: "Users".to_string(),
                key: "id".to_string()
            })
        );
        assert_eq!(attribute.on_delete, Some(ReferentialAction::Cascade));
        assert!(registry.model(post).unwrap().methods().contains("getAuthor"));
    }

    #[test]
    fn test_underscore_convention_and_foreign_key_options() {
        let mut registry = ModelRegistry::with_config(
            AssociationConfig::default().with_foreign_key_convention(ForeignKeyConvention::Underscore),
        );
        let (_user, post) = setup(&mut registry);

        let association = registry.belongs_to(post, "User", AssociationOptions::new()).unwrap();
        assert_eq!(association.foreign_key(), "user_id");

        let association = registry
            .belongs_to(
                post,
                "User",
                AssociationOptions::new().alias("Editor").foreign_key(
                    crate::associations::ForeignKeyOptions::named("editedBy")
                        .with_field("edited_by")
                        .allow_null(false),
                ),
            )
            .unwrap();
        assert_eq!(association.foreign_key(), "editedBy");

        let attribute = registry.model(post).unwrap().attribute("editedBy").unwrap();
        assert_eq!(attribute.field.as_deref(), Some("edited_by"));
        assert!(!attribute.allow_null);
    }

    #[test]
    fn test_user_declared_foreign_key_wins() {
        let mut registry = ModelRegistry::new();
        let (_user, _post) = setup(&mut registry);
        let comment = registry
            .define(
                ModelDefinition::new("Comment")
                    .attribute("userId", AttributeDefinition::new("BIGINT").allow_null(false)),
            )
            .unwrap();

        registry
            .belongs_to(comment, "User", AssociationOptions::new().foreign_key_constraint(true))
            .unwrap();

        let attribute = registry.model(comment).unwrap().attribute("userId").unwrap();
        assert_eq!(attribute.data_type, "BIGINT");
        assert!(!attribute.allow_null);
        assert_eq!(attribute.references.as_ref().unwrap().model, "Users");
    }

    #[test]
    fn test_target_without_primary_key() {
        let mut registry = ModelRegistry::new();
        let (_user, post) = setup(&mut registry);
        registry.define(ModelDefinition::new("Log")).unwrap();

        let err = registry.belongs_to(post, "Log", AssociationOptions::new()).unwrap_err();
        assert!(matches!(err, AssociationError::Configuration(_)));
        assert!(registry.model(post).unwrap().association("Log").is_none());
    }

    #[test]
    fn test_accessors() {
        let mut registry = ModelRegistry::new();
        let (_user, post) = setup(&mut registry);
        registry.belongs_to(post, "User", AssociationOptions::new()).unwrap();

        let mut instance = ModelInstance::new(post);
        assert_eq!(
            registry.call(&mut instance, "getUser", vec![]).unwrap(),
            AccessorOutput::Nothing
        );

        registry
            .call(&mut instance, "setUser", vec![json!({"id": 7, "name": "Ada"})])
            .unwrap();
        assert_eq!(instance.get("userId"), Some(&json!(7)));

        let output = registry.call(&mut instance, "getUser", vec![]).unwrap();
        let query = output.as_query().unwrap();
        assert_eq!(query.kind, QueryKind::FindOne);
        assert_eq!(query.table, "Users");

        registry.call(&mut instance, "setUser", vec![Value::Null]).unwrap();
        assert_eq!(
            registry.call(&mut instance, "getUser", vec![]).unwrap(),
            AccessorOutput::Nothing
        );

        let output = registry
            .call(&mut instance, "createUser", vec![json!({"id": 9, "name": "Grace"})])
            .unwrap();
        assert_eq!(output.as_query().unwrap().kind, QueryKind::Insert);
        assert_eq!(instance.get("userId"), Some(&json!(9)));
    }
}
