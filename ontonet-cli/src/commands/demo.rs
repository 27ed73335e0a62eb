//! Scripted walkthrough of a rule cascade

use super::{flush_notices, list_objects};
use anyhow::Result;
use ontonet_core::{
    AttributeCondition, DecisionRule, Engine, ObjectId, OntologyObject, Operator, RuleEffect,
};
use std::io::Write;

/// Register a requirement and a strict-review rule when nothing is loaded
fn seed(engine: &Engine) -> Result<ObjectId> {
    let id = ObjectId::new("req_demo");
    engine.register_object(
        OntologyObject::new(id.clone(), "requirement")
            .with_name("Demo requirement")
            .with_attribute("security_level", "B")
            .with_attribute("status", "open"),
    );
    engine.register_rule(
        DecisionRule::new("demo_strict_review", "Strict review for level A")
            .with_priority(10)
            .with_condition(
                AttributeCondition::new()
                    .on_type("requirement")
                    .on_attribute("security_level")
                    .compare(Operator::Equals, "A"),
            )
            .then(RuleEffect::new("enable_review", "$source"))
            .then(RuleEffect::new("notify", "$source").with_param("message", "security review scheduled")),
    )?;
    Ok(id)
}

pub fn run_demo(engine: &Engine, out: &mut impl Write) -> Result<()> {
    let requirement = match engine
        .objects()
        .into_iter()
        .find(|o| o.object_type == "requirement")
    {
        Some(object) => object.id,
        None => seed(engine)?,
    };

    writeln!(out, "== Raising {} to security level A ==", requirement)?;
    engine.update_attribute(requirement.as_str(), "security_level", "A")?;
    flush_notices(engine, out)?;

    writeln!(out)?;
    writeln!(out, "== Objects after cascade ==")?;
    list_objects(engine, false, out)?;

    let stats = engine.stats();
    writeln!(out)?;
    writeln!(
        out,
        "{} events processed, {} rules fired, {} effects executed",
        stats.events_processed, stats.rules_fired, stats.effects_executed
    )?;
    Ok(())
}
