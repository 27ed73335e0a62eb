//! Ontology objects and links
//!
//! An ontology object is the uniform representation of a development
//! artifact (requirement, defect, code change, test platform). Objects are
//! owned by the [`ObjectStore`](crate::store::ObjectStore); once registered
//! they are only mutated through the engine's attribute update path.

use crate::types::ObjectId;
use crate::value::AttributeValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Typed, directed edge between two objects
///
/// The target is a weak reference by id; it may not resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    /// Relation type, e.g. `fixes` or `implements`
    pub relation: String,
    pub source: ObjectId,
    pub target: ObjectId,
    #[serde(default)]
    pub properties: BTreeMap<String, AttributeValue>,
    pub created_at: DateTime<Utc>,
}

impl Link {
    /// Create a link with a fresh id
    pub fn new(
        relation: impl Into<String>,
        source: impl Into<ObjectId>,
        target: impl Into<ObjectId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            relation: relation.into(),
            source: source.into(),
            target: target.into(),
            properties: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A typed entity with a mutable attribute mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OntologyObject {
    pub id: ObjectId,
    /// Type tag, e.g. `requirement`
    #[serde(rename = "type")]
    pub object_type: String,
    pub name: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Action names this object permits; empty means unrestricted
    pub permitted_actions: BTreeSet<String>,
    /// Outgoing links keyed by link id
    pub links: BTreeMap<String, Link>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OntologyObject {
    pub fn new(id: impl Into<ObjectId>, object_type: impl Into<String>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            name: id.to_string(),
            id,
            object_type: object_type.into(),
            attributes: BTreeMap::new(),
            permitted_actions: BTreeSet::new(),
            links: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_permitted_action(mut self, action: impl Into<String>) -> Self {
        self.permitted_actions.insert(action.into());
        self
    }

    pub fn with_link(mut self, link: Link) -> Self {
        self.add_link(link);
        self
    }

    /// Read an attribute; absent attributes read as `None`
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Whether the object allows the named action to run against it
    pub fn permits(&self, action: &str) -> bool {
        self.permitted_actions.is_empty() || self.permitted_actions.contains(action)
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.insert(link.id.clone(), link);
        self.updated_at = Utc::now();
    }

    pub fn remove_link(&mut self, link_id: &str) -> Option<Link> {
        let removed = self.links.remove(link_id);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Links of the given relation type
    pub fn links_of<'a>(&'a self, relation: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.values().filter(move |l| l.relation == relation)
    }

    /// Write an attribute and return the prior value (`Null` if absent)
    pub(crate) fn set_attribute(&mut self, key: &str, value: AttributeValue) -> AttributeValue {
        self.updated_at = Utc::now();
        self.attributes
            .insert(key.to_string(), value)
            .unwrap_or_default()
    }
}
