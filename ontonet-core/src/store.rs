//! Ontology object store
//!
//! Keyed storage for ontology objects. Registration and lookup are safe to
//! call from several threads; attribute writes are crate-private so that
//! every write is paired with exactly one [`StateChangeEvent`] handed to
//! the dispatcher by the engine.

use crate::error::{EngineError, Result};
use crate::event::StateChangeEvent;
use crate::object::{Link, OntologyObject};
use crate::types::ObjectId;
use crate::value::AttributeValue;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Mapping from object id to ontology object
#[derive(Default)]
pub struct ObjectStore {
    objects: RwLock<HashMap<ObjectId, OntologyObject>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object by id
    ///
    /// Replacement is wholesale: attributes of the previous definition are
    /// not merged into the new one. Returns the replaced object, if any.
    pub fn register(&self, object: OntologyObject) -> Option<OntologyObject> {
        self.objects.write().insert(object.id.clone(), object)
    }

    /// Remove an object. Links pointing at it are left dangling.
    pub fn remove(&self, id: &str) -> Option<OntologyObject> {
        self.objects.write().remove(id)
    }

    /// Snapshot of the object with this id
    pub fn get(&self, id: &str) -> Option<OntologyObject> {
        self.objects.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.read().contains_key(id)
    }

    /// Run a closure against the stored object without cloning it
    pub fn with_object<R>(&self, id: &str, f: impl FnOnce(&OntologyObject) -> R) -> Option<R> {
        self.objects.read().get(id).map(f)
    }

    /// All objects, sorted by id
    pub fn list(&self) -> Vec<OntologyObject> {
        let mut objects: Vec<_> = self.objects.read().values().cloned().collect();
        objects.sort_by(|a, b| a.id.cmp(&b.id));
        objects
    }

    /// Objects reachable from `id` over outgoing links
    ///
    /// Restricts to one relation type when given. Dangling targets are
    /// skipped.
    pub fn linked_objects(&self, id: &str, relation: Option<&str>) -> Vec<OntologyObject> {
        let objects = self.objects.read();
        let Some(source) = objects.get(id) else {
            return Vec::new();
        };

        let mut linked: Vec<_> = source
            .links
            .values()
            .filter(|link| relation.map_or(true, |r| link.relation == r))
            .filter_map(|link| objects.get(link.target.as_str()).cloned())
            .collect();
        linked.sort_by(|a, b| a.id.cmp(&b.id));
        linked
    }

    /// Attach a link to its source object
    pub fn add_link(&self, link: Link) -> Result<()> {
        let mut objects = self.objects.write();
        let source = objects
            .get_mut(link.source.as_str())
            .ok_or_else(|| EngineError::ObjectNotFound(link.source.to_string()))?;
        source.add_link(link);
        Ok(())
    }

    pub fn remove_link(&self, object: &str, link_id: &str) -> Option<Link> {
        self.objects.write().get_mut(object)?.remove_link(link_id)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Apply an attribute write and build its event
    ///
    /// The lock is released before returning so the caller can hand the
    /// event to the dispatcher.
    pub(crate) fn write_attribute(
        &self,
        id: &str,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<StateChangeEvent> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(id)
            .ok_or_else(|| EngineError::ObjectNotFound(id.to_string()))?;

        let old_value = object.set_attribute(attribute, value.clone());
        Ok(StateChangeEvent::new(object, attribute, old_value, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_replaces_without_merging() {
        let store = ObjectStore::new();
        store.register(
            OntologyObject::new("req_1", "requirement")
                .with_attribute("security_level", "B")
                .with_attribute("status", "open"),
        );
        let replaced = store.register(
            OntologyObject::new("req_1", "requirement").with_attribute("security_level", "C"),
        );

        assert!(replaced.is_some());
        let obj = store.get("req_1").unwrap();
        assert_eq!(obj.attribute("security_level"), Some(&AttributeValue::from("C")));
        assert_eq!(obj.attribute("status"), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let store = ObjectStore::new();
        assert!(store.get("ghost").is_none());
        let err = store
            .write_attribute("ghost", "status", "x".into())
            .unwrap_err();
        assert_eq!(err, EngineError::ObjectNotFound("ghost".to_string()));
    }

    #[test]
    fn test_write_attribute_builds_event() {
        let store = ObjectStore::new();
        store.register(OntologyObject::new("d1", "defect").with_attribute("status", "open"));

        let event = store
            .write_attribute("d1", "status", "fixed".into())
            .unwrap();
        assert_eq!(event.old_value(), &AttributeValue::from("open"));
        assert_eq!(event.new_value(), &AttributeValue::from("fixed"));
        assert_eq!(
            store.with_object("d1", |o| o.attribute("status").cloned()),
            Some(Some(AttributeValue::from("fixed")))
        );
    }

    #[test]
    fn test_linked_objects_skip_dangling_targets() {
        let store = ObjectStore::new();
        store.register(OntologyObject::new("defect_1", "defect"));
        store.register(
            OntologyObject::new("change_a", "code_change")
                .with_link(Link::new("fixes", "change_a", "defect_1"))
                .with_link(Link::new("fixes", "change_a", "defect_404"))
                .with_link(Link::new("implements", "change_a", "req_7")),
        );

        let fixed = store.linked_objects("change_a", Some("fixes"));
        assert_eq!(fixed.len(), 1);
        assert_eq!(fixed[0].id.as_str(), "defect_1");
        assert!(store.linked_objects("change_a", Some("implements")).is_empty());
        assert!(store.linked_objects("missing", None).is_empty());
    }

    #[test]
    fn test_list_is_sorted() {
        let store = ObjectStore::new();
        store.register(OntologyObject::new("b", "t"));
        store.register(OntologyObject::new("a", "t"));
        let ids: Vec<_> = store.list().into_iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
