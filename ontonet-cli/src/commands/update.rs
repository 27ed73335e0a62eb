//! Attribute updates from the console

use super::flush_notices;
use anyhow::{Context, Result};
use ontonet_core::{AttributeValue, Engine};
use std::io::Write;

pub fn update_attribute(
    engine: &Engine,
    object: &str,
    attribute: &str,
    raw_value: &str,
    out: &mut impl Write,
) -> Result<()> {
    let value = AttributeValue::parse_literal(raw_value);
    let event = engine
        .update_attribute(object, attribute, value.clone())
        .with_context(|| format!("Failed to update {}.{}", object, attribute))?;

    writeln!(out, "{} {}.{} = {}", event, object, attribute, value)?;
    flush_notices(engine, out)?;
    Ok(())
}
