//! Semantic lifting of sample tool records

use super::flush_notices;
use anyhow::{bail, Result};
use ontonet_core::{Engine, SemanticLifter};
use serde_json::{json, Value};
use std::io::Write;

/// Representative record for each supported source type
pub fn sample_record(kind: &str) -> Option<Value> {
    match kind {
        "git_commit" => Some(json!({
            "commit_id": uuid::Uuid::new_v4().simple().to_string(),
            "message": "Fixes #1024: escape user input on the login page",
            "author": "developer",
            "files": ["src/login.rs", "src/security.rs"],
        })),
        "requirement" => Some(json!({
            "id": "2048",
            "title": "User authentication",
            "security_level": "A",
        })),
        "defect" => Some(json!({
            "id": "1024",
            "title": "XSS on login page",
            "severity": "high",
        })),
        _ => None,
    }
}

pub fn ingest_sample(engine: &Engine, kind: &str, out: &mut impl Write) -> Result<()> {
    let lifter = SemanticLifter::new();
    let Some(record) = sample_record(kind) else {
        bail!(
            "Unknown source type '{}' (expected one of: {})",
            kind,
            lifter.source_types().join(", ")
        );
    };

    let ids = lifter.ingest(engine, kind, &record)?;
    writeln!(out, "Lifted {} object(s) from {}", ids.len(), kind)?;
    for id in &ids {
        writeln!(out, "  {}", id)?;
        for linked in engine.linked_objects(id.as_str(), None) {
            writeln!(out, "    linked to {} [{}]", linked.id, linked.object_type)?;
        }
    }
    flush_notices(engine, out)?;
    Ok(())
}
