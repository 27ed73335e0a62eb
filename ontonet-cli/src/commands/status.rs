//! Engine status summary

use anyhow::Result;
use ontonet_core::Engine;
use std::io::Write;

pub fn show_status(engine: &Engine, json: bool, out: &mut impl Write) -> Result<()> {
    let stats = engine.stats();

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        return Ok(());
    }

    writeln!(
        out,
        "Engine: {}",
        if stats.running { "running" } else { "stopped" }
    )?;
    writeln!(out, "  objects:   {}", stats.objects)?;
    writeln!(out, "  rules:     {}", stats.rules)?;
    writeln!(out, "  actions:   {}", stats.actions)?;
    writeln!(out, "  resources: {}", stats.resources)?;
    writeln!(out, "  projects:  {}", stats.projects)?;
    writeln!(
        out,
        "  events:    {} processed, {} ignored, {} dropped",
        stats.events_processed, stats.events_ignored, stats.events_dropped
    )?;
    writeln!(
        out,
        "  effects:   {} executed, {} skipped, {} failed ({} rules fired)",
        stats.effects_executed, stats.effects_skipped, stats.effects_failed, stats.rules_fired
    )?;
    Ok(())
}
