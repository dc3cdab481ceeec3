//! HasMany - many target records hold a foreign key to the source
//!
//! Construction is shared with has-one; only the alias defaults, the accessor
//! set and the accessor behavior differ.

use std::sync::Arc;

use serde_json::Value;

use crate::associations::define::resolve_target;
use crate::associations::has_one::{self, HasKeys};
use crate::associations::query::collect_keys;
use crate::associations::{AccessorOutput, Association, AssociationOptions, AssociationType, RelationQuery};
use crate::error::AssociationResult;
use crate::model::ModelInstance;
use crate::registry::{ModelId, ModelReference, ModelRegistry};

impl ModelRegistry {
    /// Declare that many records of `target` hold a foreign key to `source`
    pub fn has_many(
        &mut self,
        source: ModelId,
        target: impl Into<ModelReference>,
        options: AssociationOptions,
    ) -> AssociationResult<Arc<Association>> {
        let target = resolve_target(self, &target.into(), AssociationType::HasMany)?;
        has_one::associate(self, AssociationType::HasMany, source, target, &options, None)
    }
}

pub(crate) fn invoke(
    association: &Association,
    keys: &HasKeys,
    selector: &str,
    instance: &mut ModelInstance,
    args: Vec<Value>,
) -> AssociationResult<AccessorOutput> {
    let source_value = instance.get_present(&keys.source_key).cloned();
    let scope = &association.options().scope;

    match selector {
        "get" => Ok(match source_value {
            Some(value) => AccessorOutput::Query(
                RelationQuery::find_all(&keys.target_table)
                    .filter_eq(&keys.foreign_key_column, value)
                    .with_scope(scope),
            ),
            None => AccessorOutput::Nothing,
        }),
        "count" => Ok(match source_value {
            Some(value) => AccessorOutput::Query(
                RelationQuery::count(&keys.target_table)
                    .filter_eq(&keys.foreign_key_column, value)
                    .with_scope(scope),
            ),
            None => AccessorOutput::Nothing,
        }),
        "has" => {
            let (key, column) = keys.require_target_key(association)?;
            let Some(value) = source_value else {
                return Ok(AccessorOutput::Nothing);
            };
            Ok(AccessorOutput::Query(
                RelationQuery::count(&keys.target_table)
                    .filter_eq(&keys.foreign_key_column, value)
                    .filter_in(column, collect_keys(args, key))
                    .with_scope(scope),
            ))
        }
        "set" => {
            let (key, column) = keys.require_target_key(association)?;
            let value = source_value.unwrap_or(Value::Null);
            let targets = collect_keys(args, key);

            let mut queries = vec![keys.unassign().filter_eq(&keys.foreign_key_column, value.clone())];
            if !targets.is_empty() {
                queries.push(keys.assign(association, value).filter_in(column, targets));
            }
            Ok(AccessorOutput::Queries(queries))
        }
        "add" => {
            let (key, column) = keys.require_target_key(association)?;
            let value = source_value.unwrap_or(Value::Null);
            Ok(AccessorOutput::Query(
                keys.assign(association, value)
                    .filter_in(column, collect_keys(args, key)),
            ))
        }
        "remove" => {
            let (key, column) = keys.require_target_key(association)?;
            let value = source_value.unwrap_or(Value::Null);
            Ok(AccessorOutput::Query(
                keys.unassign()
                    .filter_eq(&keys.foreign_key_column, value)
                    .filter_in(column, collect_keys(args, key)),
            ))
        }
        "create" => Ok(AccessorOutput::Query(keys.insert(
            association,
            args,
            source_value.unwrap_or(Value::Null),
        ))),
        _ => Err(association.unknown_method(selector)),
    }
}
