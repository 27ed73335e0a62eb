//! CLI command implementations.
//!
//! Commands write to a caller-supplied sink so the shell can reuse them.

pub mod demo;
pub mod ingest;
pub mod list;
pub mod shell;
pub mod status;
pub mod update;

pub use demo::run_demo;
pub use ingest::ingest_sample;
pub use list::{list_objects, list_resources, list_rules};
pub use shell::run_shell;
pub use status::show_status;
pub use update::update_attribute;

use ontonet_core::Engine;
use std::io::Write;

/// Print and clear the notices recorded by the last operation
pub(crate) fn flush_notices(engine: &Engine, out: &mut impl Write) -> std::io::Result<()> {
    for notice in engine.notices() {
        writeln!(out, "  {}", notice)?;
    }
    engine.clear_notices();
    Ok(())
}
