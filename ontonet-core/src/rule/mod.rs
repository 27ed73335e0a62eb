//! Decision rules
//!
//! A rule binds a [`Condition`] to an ordered list of [`RuleEffect`]s.
//! Rules are evaluated by the dispatcher in descending priority; rules of
//! equal priority keep their registration order.

mod condition;
mod set;

pub use condition::{AttributeCondition, Condition, Operator};
pub use set::{RuleSet, RuleSummary};

use crate::error::{EngineError, Result};
use crate::event::StateChangeEvent;
use crate::types::{ObjectId, RuleId};
use crate::value::{AttributeValue, Params};
use condition::FnCondition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder that resolves to the event's own object
pub const SOURCE_PLACEHOLDER: &str = "$source";

/// Object an effect is applied to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Target {
    /// The object whose mutation produced the event
    Source,
    /// A literal object id
    Object(ObjectId),
}

impl Target {
    pub fn resolve<'a>(&'a self, event: &'a StateChangeEvent) -> &'a ObjectId {
        match self {
            Target::Source => event.object_id(),
            Target::Object(id) => id,
        }
    }
}

impl From<String> for Target {
    fn from(raw: String) -> Self {
        if raw == SOURCE_PLACEHOLDER {
            Target::Source
        } else {
            Target::Object(ObjectId(raw))
        }
    }
}

impl From<&str> for Target {
    fn from(raw: &str) -> Self {
        Target::from(raw.to_string())
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        match target {
            Target::Source => SOURCE_PLACEHOLDER.to_string(),
            Target::Object(id) => id.0,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Source => write!(f, "{}", SOURCE_PLACEHOLDER),
            Target::Object(id) => write!(f, "{}", id),
        }
    }
}

/// One (action, target, parameters) triple executed when a rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEffect {
    pub action: String,
    pub target: Target,
    #[serde(default)]
    pub params: Params,
}

impl RuleEffect {
    pub fn new(action: impl Into<String>, target: impl Into<Target>) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// A prioritized condition → effects binding
pub struct DecisionRule {
    pub(crate) id: RuleId,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) priority: i32,
    pub(crate) enabled: bool,
    pub(crate) condition: Option<Box<dyn Condition>>,
    pub(crate) effects: Vec<RuleEffect>,
}

impl DecisionRule {
    /// Create an enabled rule with priority 0 and no condition
    pub fn new(id: impl Into<RuleId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            priority: 0,
            enabled: true,
            condition: None,
            effects: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Use a closure as the condition
    pub fn when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&StateChangeEvent) -> bool + Send + Sync + 'static,
    {
        self.condition = Some(Box::new(FnCondition(predicate)));
        self
    }

    pub fn with_condition(mut self, condition: impl Condition + 'static) -> Self {
        self.condition = Some(Box::new(condition));
        self
    }

    pub fn then(mut self, effect: RuleEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn effects(&self) -> &[RuleEffect] {
        &self.effects
    }

    /// Evaluate the condition alone; the enabled flag is the caller's concern
    pub fn matches(&self, event: &StateChangeEvent) -> bool {
        self.condition.as_ref().is_some_and(|c| c.matches(event))
    }

    pub fn describe_condition(&self) -> String {
        self.condition
            .as_ref()
            .map(|c| c.describe())
            .unwrap_or_else(|| "<none>".to_string())
    }

    /// Reject malformed definitions before they reach the rule set
    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(EngineError::InvalidConfiguration(
                "rule id must not be empty".to_string(),
            ));
        }
        if self.condition.is_none() {
            return Err(EngineError::InvalidConfiguration(format!(
                "rule {} has no condition",
                self.id
            )));
        }
        if let Some(effect) = self.effects.iter().find(|e| e.action.trim().is_empty()) {
            return Err(EngineError::InvalidConfiguration(format!(
                "rule {} has an effect without an action (target {})",
                self.id, effect.target
            )));
        }
        if let Some(Target::Object(id)) = self
            .effects
            .iter()
            .map(|e| &e.target)
            .find(|t| matches!(t, Target::Object(id) if id.as_str().trim().is_empty()))
        {
            return Err(EngineError::InvalidConfiguration(format!(
                "rule {} has an effect with an empty target {:?}",
                self.id, id.0
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for DecisionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .field("condition", &self.describe_condition())
            .field("effects", &self.effects)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::OntologyObject;

    #[test]
    fn test_target_placeholder_round_trip() {
        assert_eq!(Target::from("$source"), Target::Source);
        assert_eq!(Target::from("rig-1"), Target::Object(ObjectId::new("rig-1")));
        assert_eq!(String::from(Target::Source), "$source");
    }

    #[test]
    fn test_source_target_resolves_to_event_object() {
        let obj = OntologyObject::new("req_9", "requirement");
        let event = StateChangeEvent::new(&obj, "status", AttributeValue::Null, "open".into());

        assert_eq!(Target::Source.resolve(&event).as_str(), "req_9");
        assert_eq!(Target::from("rig").resolve(&event).as_str(), "rig");
    }

    #[test]
    fn test_rule_without_condition_never_matches() {
        let rule = DecisionRule::new("r", "no condition");
        let obj = OntologyObject::new("o", "t");
        let event = StateChangeEvent::new(&obj, "a", AttributeValue::Null, 1.into());
        assert!(!rule.matches(&event));
        assert!(matches!(rule.validate(), Err(EngineError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_validate_rejects_empty_action() {
        let rule = DecisionRule::new("r", "bad")
            .when(|_| true)
            .then(RuleEffect::new("", Target::Source));
        assert!(rule.validate().is_err());

        let rule = DecisionRule::new("r", "bad target")
            .when(|_| true)
            .then(RuleEffect::new("notify", ""));
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_effect_deserializes_with_placeholder() {
        let effect: RuleEffect = serde_yaml::from_str(
            "action: reserve_platform\ntarget: $source\nparams:\n  platform: rig-A\n",
        )
        .unwrap();
        assert_eq!(effect.target, Target::Source);
        assert_eq!(effect.params.get("platform"), Some(&AttributeValue::from("rig-A")));
    }
}
