//! Construction pipeline shared by every association declaration

use std::sync::Arc;

use crate::associations::helpers::assert_association_model_is_defined;
use crate::associations::{Association, AssociationHandle, AssociationOptions, AssociationType};
use crate::error::{AssociationError, AssociationResult};
use crate::hooks::{run_associate_hooks, HookEvent};
use crate::registry::{get_model, ModelId, ModelReference, ModelRegistry};

/// Proof that a construction runs inside [`define_association`]
///
/// [`Association::new`] requires one. Only this module creates it, and only
/// the crate's own builders receive it.
#[derive(Debug)]
pub struct ConstructionToken {
    _sealed: (),
}

/// Validate, normalize and construct an association, with hooks around construction
///
/// `build` receives the normalized options and the parent handle and does the
/// kind-specific work.
pub(crate) fn define_association<F>(
    registry: &mut ModelRegistry,
    association_type: AssociationType,
    source: ModelId,
    target: ModelId,
    options: &AssociationOptions,
    parent: Option<AssociationHandle>,
    build: F,
) -> AssociationResult<Arc<Association>>
where
    F: FnOnce(
        &mut ModelRegistry,
        AssociationOptions,
        Option<AssociationHandle>,
        ConstructionToken,
    ) -> AssociationResult<Arc<Association>>,
{
    let method = association_type.method_name();
    let source_model = registry.model(source).ok_or_else(|| AssociationError::InvalidTarget {
        model: format!("{:?}", source),
        method: method.to_string(),
    })?;
    let target_model = registry.model(target).ok_or_else(|| AssociationError::InvalidTarget {
        model: source_model.name().to_string(),
        method: method.to_string(),
    })?;

    assert_association_model_is_defined(source_model, method)?;
    assert_association_model_is_defined(target_model, method)?;

    tracing::debug!(
        "Declaring {}.{}({})",
        source_model.name(),
        method,
        target_model.name()
    );

    let config = registry.config();
    let mut options = options.normalized(
        registry.id(),
        config.hooks_by_default,
        config.warn_on_deprecated_access,
    );
    let hooks = options.hooks_enabled();

    if hooks {
        run_associate_hooks(
            registry,
            HookEvent::BeforeAssociate,
            source,
            target,
            association_type,
            None,
            &mut options,
        )?;
    }

    let association = build(
        registry,
        options.clone(),
        parent,
        ConstructionToken { _sealed: () },
    )?;

    if hooks {
        run_associate_hooks(
            registry,
            HookEvent::AfterAssociate,
            source,
            target,
            association_type,
            Some(&association),
            &mut options,
        )?;
    }

    Ok(association)
}

/// Resolve the target of a public declaration method
///
/// A name that is not defined yet fails with the retriable `ModelNotDefined`.
pub(crate) fn resolve_target(
    registry: &ModelRegistry,
    target: &ModelReference,
    association_type: AssociationType,
) -> AssociationResult<ModelId> {
    get_model(registry, target).ok_or_else(|| AssociationError::ModelNotDefined {
        model: match target {
            ModelReference::Name(name) => name.clone(),
            ModelReference::Model(id) => format!("{:?}", id),
        },
        method: association_type.method_name().to_string(),
    })
}
