//! Actions and the action registry
//!
//! An action is a named, typed wrapper around an [`Effect`]. Rules refer
//! to actions by name; the registry resolves the name at dispatch time.

mod builtin;
mod effect;

pub use builtin::{BuiltinEffect, ConfiguredEffect};
pub use effect::{param_str, param_str_or, Effect, EffectContext};

use crate::error::{EngineError, Result};
use crate::object::OntologyObject;
use crate::value::{AttributeValue, Params};
use effect::FnEffect;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Target-type constraint meaning "any object type"
pub const ANY_TYPE: &str = "*";

/// Declared type of an action parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Any,
}

impl ParamType {
    pub fn accepts(self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (ParamType::Any, _)
                | (ParamType::String, AttributeValue::Text(_))
                | (ParamType::Number, AttributeValue::Number(_))
                | (ParamType::Boolean, AttributeValue::Bool(_))
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Any => "any",
        }
    }
}

impl FromStr for ParamType {
    type Err = EngineError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(ParamType::String),
            "number" | "int" | "integer" | "float" => Ok(ParamType::Number),
            "boolean" | "bool" => Ok(ParamType::Boolean),
            "any" => Ok(ParamType::Any),
            other => Err(EngineError::InvalidConfiguration(format!(
                "unknown parameter type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A named effect with a target-type constraint and parameter schema
pub struct Action {
    name: String,
    description: String,
    target_type: String,
    parameters: BTreeMap<String, ParamType>,
    effect: Arc<dyn Effect>,
}

impl Action {
    pub fn new(name: impl Into<String>, effect: impl Effect + 'static) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            target_type: ANY_TYPE.to_string(),
            parameters: BTreeMap::new(),
            effect: Arc::new(effect),
        }
    }

    /// Action backed by a closure
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut EffectContext<'_>, &Params) -> std::result::Result<(), crate::error::EffectError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, FnEffect(f))
    }

    /// Built-in action registered under its own name
    pub fn builtin(effect: BuiltinEffect) -> Self {
        Self::new(effect.name(), effect)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn for_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = target_type.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, param_type: ParamType) -> Self {
        self.parameters.insert(name.into(), param_type);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn parameters(&self) -> &BTreeMap<String, ParamType> {
        &self.parameters
    }

    pub fn effect(&self) -> &dyn Effect {
        self.effect.as_ref()
    }

    /// Check the target type and provided parameters before running
    ///
    /// Parameters absent from the schema pass through unchecked; the
    /// permitted-action check is left to the caller because it is
    /// configurable.
    pub fn check(&self, target: &OntologyObject, params: &Params) -> Result<()> {
        if self.target_type != ANY_TYPE && self.target_type != target.object_type {
            return Err(EngineError::TargetTypeMismatch {
                action: self.name.clone(),
                expected: self.target_type.clone(),
                actual: target.object_type.clone(),
            });
        }
        for (name, value) in params {
            if let Some(expected) = self.parameters.get(name) {
                if !expected.accepts(value) {
                    return Err(EngineError::InvalidParameter {
                        action: self.name.clone(),
                        name: name.clone(),
                        expected: expected.to_string(),
                        actual: value.type_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "action name must not be empty".to_string(),
            ));
        }
        if self.target_type.trim().is_empty() {
            return Err(EngineError::InvalidConfiguration(format!(
                "action {} has an empty target type",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("target_type", &self.target_type)
            .field("parameters", &self.parameters)
            .field("effect", &self.effect.kind())
            .finish()
    }
}

/// Read-only view of a registered action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionSummary {
    pub name: String,
    pub description: String,
    pub target_type: String,
    pub parameters: BTreeMap<String, ParamType>,
    pub effect: String,
}

/// Mapping from action name to action
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<Action>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every built-in effect
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut actions = registry.actions.write();
            for builtin in BuiltinEffect::ALL {
                actions.insert(builtin.name().to_string(), Arc::new(Action::builtin(builtin)));
            }
        }
        registry
    }

    /// Register or replace an action. Returns true when replacing.
    pub fn register(&self, action: Action) -> Result<bool> {
        action.validate()?;
        let replaced = self
            .actions
            .write()
            .insert(action.name.clone(), Arc::new(action))
            .is_some();
        Ok(replaced)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Action>> {
        self.actions.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.read().contains_key(name)
    }

    /// Summaries sorted by name
    pub fn summaries(&self) -> Vec<ActionSummary> {
        let mut summaries: Vec<_> = self
            .actions
            .read()
            .values()
            .map(|a| ActionSummary {
                name: a.name.clone(),
                description: a.description.clone(),
                target_type: a.target_type.clone(),
                parameters: a.parameters.clone(),
                effect: a.effect.kind().to_string(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }
}
