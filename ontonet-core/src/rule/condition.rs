//! Rule conditions
//!
//! A condition is a boolean predicate over a [`StateChangeEvent`]. Rules
//! built in code usually pass a closure; rules loaded from a catalog use
//! [`AttributeCondition`].

use crate::event::StateChangeEvent;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Predicate deciding whether a rule fires for an event
pub trait Condition: Send + Sync {
    fn matches(&self, event: &StateChangeEvent) -> bool;

    /// Human-readable form for listings
    fn describe(&self) -> String {
        "custom predicate".to_string()
    }
}

/// Condition backed by a closure
pub(crate) struct FnCondition<F>(pub(crate) F);

impl<F> Condition for FnCondition<F>
where
    F: Fn(&StateChangeEvent) -> bool + Send + Sync,
{
    fn matches(&self, event: &StateChangeEvent) -> bool {
        (self.0)(event)
    }
}

/// Comparison applied to the event's new value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    /// New value differs from the old one; the expected value is ignored
    Changed,
}

impl Operator {
    fn apply(self, actual: &AttributeValue, expected: &AttributeValue) -> bool {
        let ordering = || actual.compare_numeric(expected);
        match self {
            Operator::Equals => actual == expected,
            Operator::NotEquals => actual != expected,
            Operator::GreaterThan => ordering() == Some(Ordering::Greater),
            Operator::LessThan => ordering() == Some(Ordering::Less),
            Operator::GreaterOrEqual => {
                matches!(ordering(), Some(Ordering::Greater | Ordering::Equal))
            }
            Operator::LessOrEqual => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Operator::Changed => true,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::Changed => "changed",
        };
        write!(f, "{}", symbol)
    }
}

/// Declarative condition over object type, attribute name and new value
///
/// Every field is optional; an absent field does not constrain the match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeCondition {
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub value: Option<AttributeValue>,
    #[serde(default)]
    pub operator: Operator,
}

impl AttributeCondition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }

    pub fn on_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn compare(mut self, operator: Operator, value: impl Into<AttributeValue>) -> Self {
        self.operator = operator;
        self.value = Some(value.into());
        self
    }

    pub fn changed(mut self) -> Self {
        self.operator = Operator::Changed;
        self
    }
}

impl Condition for AttributeCondition {
    fn matches(&self, event: &StateChangeEvent) -> bool {
        if self
            .object_type
            .as_deref()
            .is_some_and(|t| t != event.object_type())
        {
            return false;
        }
        if self
            .attribute
            .as_deref()
            .is_some_and(|a| a != event.attribute())
        {
            return false;
        }
        if self.operator == Operator::Changed {
            return event.old_value() != event.new_value();
        }
        match &self.value {
            Some(expected) => self.operator.apply(event.new_value(), expected),
            None => true,
        }
    }

    fn describe(&self) -> String {
        let subject = format!(
            "{}.{}",
            self.object_type.as_deref().unwrap_or("*"),
            self.attribute.as_deref().unwrap_or("*")
        );
        match (&self.value, self.operator) {
            (_, Operator::Changed) => format!("{} changed", subject),
            (Some(value), op) => format!("{} {} {}", subject, op, value),
            (None, _) => subject,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::OntologyObject;

    fn event(object_type: &str, attr: &str, old: AttributeValue, new: AttributeValue) -> StateChangeEvent {
        let obj = OntologyObject::new("o1", object_type);
        StateChangeEvent::new(&obj, attr, old, new)
    }

    #[test]
    fn test_empty_condition_matches_everything() {
        let cond = AttributeCondition::new();
        assert!(cond.matches(&event("defect", "status", AttributeValue::Null, "open".into())));
    }

    #[test]
    fn test_type_and_attribute_filters() {
        let cond = AttributeCondition::new()
            .on_type("requirement")
            .on_attribute("security_level")
            .compare(Operator::Equals, "A");

        assert!(cond.matches(&event("requirement", "security_level", "B".into(), "A".into())));
        assert!(!cond.matches(&event("defect", "security_level", "B".into(), "A".into())));
        assert!(!cond.matches(&event("requirement", "status", "B".into(), "A".into())));
        assert!(!cond.matches(&event("requirement", "security_level", "A".into(), "B".into())));
    }

    #[test]
    fn test_numeric_operators_need_numbers() {
        let cond = AttributeCondition::new().compare(Operator::GreaterThan, 5);
        assert!(cond.matches(&event("t", "n", AttributeValue::Null, 6.into())));
        assert!(!cond.matches(&event("t", "n", AttributeValue::Null, 5.into())));
        assert!(!cond.matches(&event("t", "n", AttributeValue::Null, "6".into())));

        let cond = AttributeCondition::new().compare(Operator::LessOrEqual, 5);
        assert!(cond.matches(&event("t", "n", AttributeValue::Null, 5.into())));
    }

    #[test]
    fn test_changed_operator() {
        let cond = AttributeCondition::new().on_attribute("status").changed();
        assert!(cond.matches(&event("t", "status", "open".into(), "fixed".into())));
        assert!(!cond.matches(&event("t", "status", "open".into(), "open".into())));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let cond: AttributeCondition = serde_yaml::from_str(
            "object_type: defect\nattribute: severity\nvalue: high\noperator: not_equals\n",
        )
        .unwrap();
        assert_eq!(cond.operator, Operator::NotEquals);
        assert_eq!(cond.describe(), "defect.severity != high");
    }
}
