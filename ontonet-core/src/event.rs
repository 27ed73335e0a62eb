//! State change events
//!
//! One event is produced for every attribute write that goes through the
//! store. Events are immutable once built.

use crate::object::OntologyObject;
use crate::types::{EventId, ObjectId};
use crate::value::AttributeValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Immutable record of a single attribute mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChangeEvent {
    id: EventId,
    object_id: ObjectId,
    object_type: String,
    attribute: String,
    old_value: AttributeValue,
    new_value: AttributeValue,
    at: DateTime<Utc>,
}

impl StateChangeEvent {
    /// Build the event for a write that has just been applied to `object`
    pub fn new(
        object: &OntologyObject,
        attribute: impl Into<String>,
        old_value: AttributeValue,
        new_value: AttributeValue,
    ) -> Self {
        Self {
            id: EventId::new(),
            object_id: object.id.clone(),
            object_type: object.object_type.clone(),
            attribute: attribute.into(),
            old_value,
            new_value,
            at: Utc::now(),
        }
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    /// Id of the mutated object
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Type tag of the mutated object at emission time
    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn old_value(&self) -> &AttributeValue {
        &self.old_value
    }

    pub fn new_value(&self) -> &AttributeValue {
        &self.new_value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }
}

impl fmt::Display for StateChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{}: {} -> {}",
            self.id, self.object_id, self.attribute, self.old_value, self.new_value
        )
    }
}
