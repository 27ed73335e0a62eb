//! Effect trait for implementing action behavior
//!
//! An effect is the code behind an action. It receives an
//! [`EffectContext`] that exposes the target object, the triggering event
//! and a narrow handle on the engine. Attribute writes made through the
//! context go through the engine's update path, so cascading rules see
//! them as ordinary events.

use crate::engine::Engine;
use crate::error::{EffectError, SchedulerError};
use crate::event::StateChangeEvent;
use crate::object::OntologyObject;
use crate::scheduler::Allocation;
use crate::types::ProjectId;
use crate::value::{AttributeValue, Params};

/// Context passed to effect implementations
pub struct EffectContext<'a> {
    engine: &'a Engine,
    action: &'a str,
    target: OntologyObject,
    event: Option<&'a StateChangeEvent>,
}

impl<'a> EffectContext<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        action: &'a str,
        target: OntologyObject,
        event: Option<&'a StateChangeEvent>,
    ) -> Self {
        Self {
            engine,
            action,
            target,
            event,
        }
    }

    /// Snapshot of the target, refreshed after writes made through `set_attribute`
    pub fn target(&self) -> &OntologyObject {
        &self.target
    }

    /// The event whose rule triggered this effect; `None` for direct invocation
    pub fn event(&self) -> Option<&StateChangeEvent> {
        self.event
    }

    /// Name of the action being executed
    pub fn action(&self) -> &str {
        self.action
    }

    pub fn engine(&self) -> &Engine {
        self.engine
    }

    /// Write an attribute on the target
    ///
    /// The write produces an event that is queued behind the one currently
    /// being processed.
    pub fn set_attribute(
        &mut self,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), EffectError> {
        let value = value.into();
        let id = self.target.id.clone();
        self.engine.update_attribute(id.as_str(), attribute, value)?;
        if let Some(fresh) = self.engine.object(id.as_str()) {
            self.target = fresh;
        }
        Ok(())
    }

    /// Write an attribute on some other object
    pub fn set_attribute_on(
        &self,
        object: &str,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> Result<(), EffectError> {
        self.engine.update_attribute(object, attribute, value.into())?;
        Ok(())
    }

    /// Publish a human-readable notification about the target
    pub fn notify(&self, message: impl Into<String>) {
        self.engine.notify(&self.target.id, message.into());
    }

    pub fn request_resource(&self, resource: &str, project: &str) -> Allocation {
        self.engine.request_resource(resource, project)
    }

    pub fn release_resource(&self, resource: &str) -> Result<Option<ProjectId>, SchedulerError> {
        self.engine.release_resource(resource)
    }
}

/// Behavior attached to an action
pub trait Effect: Send + Sync {
    /// Apply the effect to the context's target
    fn apply(&self, ctx: &mut EffectContext<'_>, params: &Params) -> Result<(), EffectError>;

    /// Short kind name for listings
    fn kind(&self) -> &str {
        "custom"
    }
}

/// Effect backed by a closure
pub(crate) struct FnEffect<F>(pub(crate) F);

impl<F> Effect for FnEffect<F>
where
    F: Fn(&mut EffectContext<'_>, &Params) -> Result<(), EffectError> + Send + Sync,
{
    fn apply(&self, ctx: &mut EffectContext<'_>, params: &Params) -> Result<(), EffectError> {
        (self.0)(ctx, params)
    }
}

/// Read a required string parameter
pub fn param_str<'p>(params: &'p Params, name: &str) -> Result<&'p str, EffectError> {
    match params.get(name) {
        Some(AttributeValue::Text(s)) => Ok(s),
        Some(_) => Err(EffectError::InvalidParameter {
            name: name.to_string(),
            expected: "string".to_string(),
        }),
        None => Err(EffectError::MissingParameter(name.to_string())),
    }
}

/// Read an optional string parameter, falling back to `default`
pub fn param_str_or<'p>(params: &'p Params, name: &str, default: &'p str) -> &'p str {
    params
        .get(name)
        .and_then(AttributeValue::as_str)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_helpers() {
        let mut params = Params::new();
        params.insert("platform".to_string(), "rig-A".into());
        params.insert("count".to_string(), 3.into());

        assert_eq!(param_str(&params, "platform").unwrap(), "rig-A");
        assert!(matches!(
            param_str(&params, "count"),
            Err(EffectError::InvalidParameter { .. })
        ));
        assert!(matches!(
            param_str(&params, "absent"),
            Err(EffectError::MissingParameter(_))
        ));
        assert_eq!(param_str_or(&params, "absent", "default"), "default");
        assert_eq!(param_str_or(&params, "count", "default"), "default");
    }
}
