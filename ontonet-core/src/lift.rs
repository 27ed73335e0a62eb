//! Semantic lifting
//!
//! Turns raw records from external tools (version control, trackers) into
//! ontology objects. Each source type has a [`DataMapper`]; the
//! [`SemanticLifter`] dispatches on the source type and registers the
//! resulting objects with an engine.

use crate::engine::Engine;
use crate::error::LiftError;
use crate::object::{Link, OntologyObject};
use crate::types::ObjectId;
use crate::value::AttributeValue;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

static FIXES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Fixes\s+#(\d+)").expect("valid fixes regex"));
static IMPLEMENTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Implements\s+#(\d+)").expect("valid implements regex"));

/// Maps one raw record to ontology objects
pub trait DataMapper: Send + Sync {
    fn map(&self, record: &Value) -> Result<Vec<OntologyObject>, LiftError>;
}

fn required<'a>(record: &'a Value, source_type: &str, field: &str) -> Result<&'a str, LiftError> {
    record
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| LiftError::MissingField {
            source_type: source_type.to_string(),
            field: field.to_string(),
        })
}

fn text_or<'a>(record: &'a Value, field: &str, default: &'a str) -> &'a str {
    record.get(field).and_then(Value::as_str).unwrap_or(default)
}

/// `git_commit` records: commit_id, message, author, files
pub struct GitCommitMapper;

impl DataMapper for GitCommitMapper {
    fn map(&self, record: &Value) -> Result<Vec<OntologyObject>, LiftError> {
        let commit_id = required(record, "git_commit", "commit_id")?;
        let message = text_or(record, "message", "");
        let author = text_or(record, "author", "unknown");
        let files: Vec<&str> = record
            .get("files")
            .and_then(Value::as_array)
            .map(|files| files.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let id = format!("change_{}", commit_id);
        let short: String = commit_id.chars().take(8).collect();
        let mut change = OntologyObject::new(id.as_str(), "code_change")
            .with_name(format!("change {}", short))
            .with_attribute("commit_id", commit_id)
            .with_attribute("message", message)
            .with_attribute("author", author)
            .with_attribute("files", files.join(","))
            .with_attribute("file_count", files.len())
            .with_permitted_action("code_review")
            .with_permitted_action("static_analysis");

        if let Some(defect) = FIXES.captures(message).and_then(|c| c.get(1)) {
            change.add_link(Link::new("fixes", id.as_str(), format!("defect_{}", defect.as_str())));
            change
                .attributes
                .insert("fixes_defect".to_string(), AttributeValue::from(defect.as_str()));
        }
        if let Some(req) = IMPLEMENTS.captures(message).and_then(|c| c.get(1)) {
            change.add_link(Link::new("implements", id.as_str(), format!("req_{}", req.as_str())));
            change.attributes.insert(
                "implements_requirement".to_string(),
                AttributeValue::from(req.as_str()),
            );
        }

        Ok(vec![change])
    }
}

/// `requirement` records: id, title, security_level, status
pub struct RequirementMapper;

impl DataMapper for RequirementMapper {
    fn map(&self, record: &Value) -> Result<Vec<OntologyObject>, LiftError> {
        let id = required(record, "requirement", "id")?;
        let requirement = OntologyObject::new(format!("req_{}", id), "requirement")
            .with_name(text_or(record, "title", id))
            .with_attribute("requirement_id", id)
            .with_attribute("security_level", text_or(record, "security_level", "B"))
            .with_attribute("status", text_or(record, "status", "open"));
        Ok(vec![requirement])
    }
}

/// `defect` records: id, title, severity, status
pub struct DefectMapper;

impl DataMapper for DefectMapper {
    fn map(&self, record: &Value) -> Result<Vec<OntologyObject>, LiftError> {
        let id = required(record, "defect", "id")?;
        let defect = OntologyObject::new(format!("defect_{}", id), "defect")
            .with_name(text_or(record, "title", id))
            .with_attribute("defect_id", id)
            .with_attribute("severity", text_or(record, "severity", "medium"))
            .with_attribute("status", text_or(record, "status", "open"));
        Ok(vec![defect])
    }
}

/// Registry of mappers keyed by source type
pub struct SemanticLifter {
    mappers: HashMap<String, Box<dyn DataMapper>>,
}

impl Default for SemanticLifter {
    fn default() -> Self {
        let mut lifter = Self::empty();
        lifter.register_mapper("git_commit", GitCommitMapper);
        lifter.register_mapper("requirement", RequirementMapper);
        lifter.register_mapper("defect", DefectMapper);
        lifter
    }
}

impl SemanticLifter {
    /// Lifter with the git_commit, requirement and defect mappers
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            mappers: HashMap::new(),
        }
    }

    pub fn register_mapper(&mut self, source_type: impl Into<String>, mapper: impl DataMapper + 'static) {
        self.mappers.insert(source_type.into(), Box::new(mapper));
    }

    pub fn source_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.mappers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Map a record without registering anything
    pub fn lift(&self, source_type: &str, record: &Value) -> Result<Vec<OntologyObject>, LiftError> {
        let mapper = self.mappers.get(source_type).ok_or_else(|| {
            warn!(source_type, "no mapper for source type");
            LiftError::UnknownSource(source_type.to_string())
        })?;
        mapper.map(record)
    }

    /// Map a record and register the objects with the engine
    pub fn ingest(
        &self,
        engine: &Engine,
        source_type: &str,
        record: &Value,
    ) -> Result<Vec<ObjectId>, LiftError> {
        let objects = self.lift(source_type, record)?;
        let ids: Vec<ObjectId> = objects.iter().map(|o| o.id.clone()).collect();
        for object in objects {
            engine.register_object(object);
        }
        info!(source_type, lifted = ids.len(), "records lifted");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commit_message_links() {
        let objects = GitCommitMapper
            .map(&json!({
                "commit_id": "a1b2c3d4e5f6",
                "message": "Fixes #1024 and Implements #2048",
                "author": "dev",
                "files": ["src/main.rs", "src/auth.rs"],
            }))
            .unwrap();

        let change = &objects[0];
        assert_eq!(change.id.as_str(), "change_a1b2c3d4e5f6");
        assert_eq!(change.name, "change a1b2c3d4");
        assert_eq!(change.attribute("file_count"), Some(&AttributeValue::from(2)));
        assert_eq!(change.attribute("fixes_defect"), Some(&AttributeValue::from("1024")));
        assert_eq!(
            change.attribute("implements_requirement"),
            Some(&AttributeValue::from("2048"))
        );
        let mut targets: Vec<&str> = change.links.values().map(|l| l.target.as_str()).collect();
        targets.sort_unstable();
        assert_eq!(targets, vec!["defect_1024", "req_2048"]);
        assert!(change.permits("code_review"));
        assert!(!change.permits("power_on"));
    }

    #[test]
    fn test_defaults_applied() {
        let lifter = SemanticLifter::new();
        let req = lifter.lift("requirement", &json!({"id": "7"})).unwrap();
        assert_eq!(req[0].attribute("security_level"), Some(&AttributeValue::from("B")));
        let defect = lifter.lift("defect", &json!({"id": "9"})).unwrap();
        assert_eq!(defect[0].attribute("severity"), Some(&AttributeValue::from("medium")));
    }

    #[test]
    fn test_unknown_source_and_missing_field() {
        let lifter = SemanticLifter::new();
        assert!(matches!(
            lifter.lift("jira", &json!({})),
            Err(LiftError::UnknownSource(_))
        ));
        assert!(matches!(
            lifter.lift("git_commit", &json!({"message": "x"})),
            Err(LiftError::MissingField { .. })
        ));
    }

    #[test]
    fn test_ingest_registers_objects() {
        let engine = Engine::with_defaults();
        let ids = SemanticLifter::new()
            .ingest(&engine, "defect", &json!({"id": "1024", "severity": "high"}))
            .unwrap();
        assert_eq!(ids, vec![ObjectId::new("defect_1024")]);
        assert_eq!(
            engine.object("defect_1024").unwrap().attribute("severity"),
            Some(&AttributeValue::from("high"))
        );
    }
}
