//! Line-oriented interactive shell

use super::{
    flush_notices, ingest_sample, list_objects, list_resources, list_rules, show_status,
    update_attribute,
};
use anyhow::Result;
use ontonet_core::{Allocation, Engine};
use std::io::{BufRead, Write};

const HELP: &str = "\
Commands:
  status                          engine statistics
  objects | rules | resources     listings
  update <object> <attr> <value>  write an attribute and run rules
  ingest <kind>                   lift a sample git_commit, requirement or defect
  request <resource> <project>    request a resource for a project
  release <resource>              release a resource
  start | stop                    resume or pause rule evaluation
  help                            this text
  exit                            leave the shell";

enum Flow {
    Continue,
    Exit,
}

pub fn run_shell(engine: &Engine, input: impl BufRead, out: &mut impl Write) -> Result<()> {
    writeln!(out, "ontonet shell, type 'help' for commands")?;
    prompt(out)?;

    for line in input.lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        if !words.is_empty() {
            // Command errors are reported and the shell keeps going
            match execute(engine, &words, out) {
                Ok(Flow::Exit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => writeln!(out, "error: {:#}", err)?,
            }
        }
        prompt(out)?;
    }
    writeln!(out, "bye")?;
    Ok(())
}

fn prompt(out: &mut impl Write) -> std::io::Result<()> {
    write!(out, "> ")?;
    out.flush()
}

fn execute(engine: &Engine, words: &[&str], out: &mut impl Write) -> Result<Flow> {
    match words {
        ["exit" | "quit"] => return Ok(Flow::Exit),
        ["help"] => writeln!(out, "{}", HELP)?,
        ["status"] => show_status(engine, false, out)?,
        ["objects"] => list_objects(engine, false, out)?,
        ["rules"] => list_rules(engine, false, out)?,
        ["resources"] => list_resources(engine, false, out)?,
        ["update", object, attribute, value @ ..] if !value.is_empty() => {
            update_attribute(engine, object, attribute, &value.join(" "), out)?
        }
        ["ingest", kind] => ingest_sample(engine, kind, out)?,
        ["request", resource, project] => {
            let allocation = engine.request_resource(resource, project);
            let verdict = match &allocation {
                Allocation::Granted { .. } => "granted",
                Allocation::Denied { .. } => "denied",
            };
            writeln!(out, "{}: {}", verdict, allocation)?;
            engine.clear_notices();
        }
        ["release", resource] => {
            match engine.release_resource(resource)? {
                Some(project) => writeln!(out, "{} released by {}", resource, project)?,
                None => writeln!(out, "{} was not allocated", resource)?,
            }
            engine.clear_notices();
        }
        ["start"] => {
            engine.start();
            writeln!(out, "engine running")?;
        }
        ["stop"] => {
            engine.stop();
            writeln!(out, "engine stopped")?;
        }
        [verb, ..] => writeln!(out, "unknown or incomplete command '{}', try 'help'", verb)?,
        [] => {}
    }
    flush_notices(engine, out)?;
    Ok(Flow::Continue)
}
