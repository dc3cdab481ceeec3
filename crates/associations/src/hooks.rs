//! Association lifecycle hooks
//!
//! Hooks are stored per model and run synchronously: a declaration does not
//! proceed until every hook for the event has returned.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::associations::{Association, AssociationOptions, AssociationType};
use crate::error::{AssociationError, AssociationResult};
use crate::model::Model;
use crate::registry::{ModelId, ModelRegistry};

/// Events fired around an association declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    BeforeAssociate,
    AfterAssociate,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::BeforeAssociate => "beforeAssociate",
            HookEvent::AfterAssociate => "afterAssociate",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an association hook gets to see
pub struct AssociateHookPayload<'a> {
    pub source: &'a Model,
    pub target: &'a Model,
    pub association_type: AssociationType,
    pub registry: &'a ModelRegistry,
    /// Only set for `afterAssociate`
    pub association: Option<&'a Arc<Association>>,
}

pub type AssociateHook = Arc<
    dyn Fn(&AssociateHookPayload<'_>, &mut AssociationOptions) -> AssociationResult<()>
        + Send
        + Sync,
>;

/// Hook storage of a single model
#[derive(Clone, Default)]
pub struct Hooks {
    hooks: HashMap<HookEvent, Vec<AssociateHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, event: HookEvent, hook: F)
    where
        F: Fn(&AssociateHookPayload<'_>, &mut AssociationOptions) -> AssociationResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.entry(event).or_default().push(Arc::new(hook));
    }

    pub fn has_hooks(&self, event: HookEvent) -> bool {
        self.hooks.get(&event).is_some_and(|hooks| !hooks.is_empty())
    }

    pub fn count(&self, event: HookEvent) -> usize {
        self.hooks.get(&event).map_or(0, Vec::len)
    }

    fn snapshot(&self, event: HookEvent) -> Vec<AssociateHook> {
        self.hooks.get(&event).cloned().unwrap_or_default()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_associate", &self.count(HookEvent::BeforeAssociate))
            .field("after_associate", &self.count(HookEvent::AfterAssociate))
            .finish()
    }
}

/// Run the hooks registered on `source` for `event`, in registration order
pub(crate) fn run_associate_hooks(
    registry: &ModelRegistry,
    event: HookEvent,
    source: ModelId,
    target: ModelId,
    association_type: AssociationType,
    association: Option<&Arc<Association>>,
    options: &mut AssociationOptions,
) -> AssociationResult<()> {
    let source_model = registry
        .model(source)
        .ok_or_else(|| AssociationError::UnknownModel(format!("{:?}", source)))?;
    let target_model = registry
        .model(target)
        .ok_or_else(|| AssociationError::UnknownModel(format!("{:?}", target)))?;

    let hooks = source_model.hooks().snapshot(event);
    if hooks.is_empty() {
        return Ok(());
    }

    tracing::debug!(
        "Running {} {} hook(s) for {}.{}({})",
        hooks.len(),
        event,
        source_model.name(),
        association_type.method_name(),
        target_model.name()
    );

    let payload = AssociateHookPayload {
        source: source_model,
        target: target_model,
        association_type,
        registry,
        association,
    };

    for hook in hooks {
        hook(&payload, &mut *options)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_event_names() {
        assert_eq!(HookEvent::BeforeAssociate.to_string(), "beforeAssociate");
        assert_eq!(HookEvent::AfterAssociate.as_str(), "afterAssociate");
    }

    #[test]
    fn test_hook_storage() {
        let mut hooks = Hooks::new();
        assert!(!hooks.has_hooks(HookEvent::BeforeAssociate));

        hooks.add(HookEvent::BeforeAssociate, |_payload, _options| Ok(()));
        hooks.add(HookEvent::BeforeAssociate, |_payload, _options| Ok(()));

        assert!(hooks.has_hooks(HookEvent::BeforeAssociate));
        assert_eq!(hooks.count(HookEvent::BeforeAssociate), 2);
        assert_eq!(hooks.count(HookEvent::AfterAssociate), 0);
        assert!(format!("{:?}", hooks).contains("before_associate: 2"));
    }
}
