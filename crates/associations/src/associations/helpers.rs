//! Integrity helpers used by every association kind
//!
//! Collision checks are pure reads. The foreign key synthesizer only touches
//! the attribute definition it is handed, and the mixin installer only touches
//! the method table.

use std::hash::Hash;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::associations::{Association, AssociationHandle, AssociationOptions};
use crate::error::{AssociationError, AssociationResult};
use crate::model::{AttributeDefinition, MethodFn, MethodTable, Model, ModelInstance, References};
use crate::registry::ModelRegistry;

/// Reject an alias that names an attribute of the source model
pub fn check_naming_collision(source: &Model, alias: &str) -> AssociationResult<()> {
    if source.has_attribute(alias) {
        return Err(AssociationError::NamingConflict {
            model: source.name().to_string(),
            alias: alias.to_string(),
        });
    }
    Ok(())
}

/// Enforce one association per alias on the source model
///
/// A declaration created as a side effect of another association (`parent` is
/// set) reuses whatever is already registered under the alias. The existing
/// association's options are not compared with the new ones.
pub fn assert_association_unique(
    registry: &ModelRegistry,
    source: &Model,
    alias: &str,
    parent: Option<&AssociationHandle>,
) -> AssociationResult<Option<Arc<Association>>> {
    let Some(existing) = source.association(alias) else {
        return Ok(None);
    };

    if parent.is_some() {
        tracing::debug!(
            "Reusing association {}.{} for an implicit declaration",
            source.name(),
            alias
        );
        return Ok(Some(Arc::clone(existing)));
    }

    let message = if existing.is_root() {
        format!(
            "You have defined two associations with the same name \"{alias}\" on the model \"{}\" \
             (the existing one targets \"{}\"). Use another alias using the \"as\" parameter.",
            source.name(),
            existing.target_name()
        )
    } else {
        let origin = registry
            .resolve_association(existing.root())
            .map(|root| root.describe())
            .unwrap_or_else(|| format!("the association \"{}\"", existing.root().alias));
        format!(
            "The association \"{alias}\" on model \"{}\" was created implicitly by {origin}. \
             It cannot be declared again; configure it through the \"inverse\" option of {origin} instead.",
            source.name()
        )
    };

    Err(AssociationError::AssociationConflict {
        model: source.name().to_string(),
        alias: alias.to_string(),
        message,
    })
}

/// Reject models that have not completed their definition
pub fn assert_association_model_is_defined(model: &Model, method: &str) -> AssociationResult<()> {
    if !model.is_defined() {
        return Err(AssociationError::ModelNotDefined {
            model: model.name().to_string(),
            method: method.to_string(),
        });
    }
    Ok(())
}

/// Point a new foreign key attribute at `source`, when constraints were requested
///
/// `key` names the referenced column; without it the first primary key column
/// is used. A key that is one of several primary keys cannot be referenced on
/// its own, so no constraint is added.
pub fn add_foreign_key_constraints(
    new_attribute: &mut AttributeDefinition,
    source: &Model,
    options: &AssociationOptions,
    key: Option<&str>,
) {
    if !options.constraints_requested() {
        return;
    }

    let primary_keys = source.primary_key_columns();
    if primary_keys.len() > 1 && key.is_some_and(|key| primary_keys.contains(&key)) {
        tracing::debug!(
            "Skipping foreign key constraint on {}: {:?} is part of a composite primary key",
            source.name(),
            key
        );
        return;
    }

    let Some(key) = key.or_else(|| primary_keys.first().copied()) else {
        tracing::debug!(
            "Skipping foreign key constraint on {}: no key to reference",
            source.name()
        );
        return;
    };

    new_attribute.references = Some(References {
        model: source.table_name().to_string(),
        key: key.to_string(),
    });
    new_attribute.on_delete = options.on_delete;
    new_attribute.on_update = options.on_update;
}

/// Install the accessors of an association into a model's method table
///
/// Each logical name is exposed under `association.accessors()[name]` and
/// forwards to `association.invoke`, using the alias map entry as selector
/// when there is one. Names the user defined are left alone.
pub fn mixin_methods(
    association: &Arc<Association>,
    methods: &mut MethodTable,
    method_names: &[&str],
    alias_map: &[(&str, &str)],
) {
    for name in method_names {
        let Some(exposed) = association.accessor(name) else {
            continue;
        };

        let selector = alias_map
            .iter()
            .find(|(logical, _)| logical == name)
            .map_or(*name, |(_, target)| *target)
            .to_string();

        let target = Arc::clone(association);
        let function: MethodFn = Arc::new(move |instance: &mut ModelInstance, args: Vec<Value>| {
            target.invoke(&selector, instance, args)
        });

        if !methods.install(exposed, function) {
            tracing::debug!(
                "Keeping user defined method {} on {} instead of the {} accessor",
                exposed,
                association.source_name(),
                association.alias()
            );
        }
    }
}

/// Collect entries, dropping those without a value
pub fn remove_undefined<K, V, I>(entries: I) -> IndexMap<K, V>
where
    K: Hash + Eq,
    I: IntoIterator<Item = (K, Option<V>)>,
{
    entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key, value)))
        .collect()
}
