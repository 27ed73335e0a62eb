//! Read-only listings of objects, rules and resources

use anyhow::Result;
use ontonet_core::{Engine, Project, SharedResource};
use serde::Serialize;
use std::io::Write;

pub fn list_objects(engine: &Engine, json: bool, out: &mut impl Write) -> Result<()> {
    let objects = engine.objects();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&objects)?)?;
        return Ok(());
    }
    if objects.is_empty() {
        writeln!(out, "No objects registered")?;
        return Ok(());
    }

    for object in &objects {
        writeln!(out, "{} [{}] {}", object.id, object.object_type, object.name)?;
        for (key, value) in &object.attributes {
            writeln!(out, "    {} = {}", key, value)?;
        }
        for link in object.links.values() {
            writeln!(out, "    -{}-> {}", link.relation, link.target)?;
        }
    }
    Ok(())
}

pub fn list_rules(engine: &Engine, json: bool, out: &mut impl Write) -> Result<()> {
    let rules = engine.rules();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&rules)?)?;
        return Ok(());
    }
    if rules.is_empty() {
        writeln!(out, "No rules registered")?;
        return Ok(());
    }

    for rule in &rules {
        writeln!(
            out,
            "[{:>4}] {} - {}{}",
            rule.priority,
            rule.id,
            rule.name,
            if rule.enabled { "" } else { " (disabled)" }
        )?;
        writeln!(out, "    when {}", rule.condition)?;
        for effect in &rule.effects {
            writeln!(out, "    then {} on {}", effect.action, effect.target)?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ResourceListing {
    resources: Vec<SharedResource>,
    projects: Vec<Project>,
}

pub fn list_resources(engine: &Engine, json: bool, out: &mut impl Write) -> Result<()> {
    let listing = ResourceListing {
        resources: engine.resources(),
        projects: engine.projects(),
    };

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&listing)?)?;
        return Ok(());
    }

    writeln!(out, "Resources:")?;
    for resource in &listing.resources {
        match &resource.owner {
            Some(owner) => writeln!(out, "  {} ({}) -> {}", resource.id, resource.name, owner)?,
            None => writeln!(out, "  {} ({}) available", resource.id, resource.name)?,
        }
    }
    writeln!(out, "Projects:")?;
    for project in &listing.projects {
        writeln!(
            out,
            "  {} priority {} [{}] holds {}",
            project.id,
            project.priority,
            project.status,
            project.held.len()
        )?;
    }
    Ok(())
}
