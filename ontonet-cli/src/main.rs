//! # ontonet CLI
//!
//! Console front end for the ontonet decision network and resource
//! scheduler.

mod commands;
mod session;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ontonet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding ontonet.yml and the catalog files
    #[arg(long, env = "ONTONET_CONFIG_DIR", default_value = "config")]
    config_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine statistics
    Status {
        #[arg(long)]
        json: bool,
    },

    /// List ontology objects
    Objects {
        #[arg(long)]
        json: bool,
    },

    /// List rules in firing order
    Rules {
        #[arg(long)]
        json: bool,
    },

    /// List resources, owners and projects
    Resources {
        #[arg(long)]
        json: bool,
    },

    /// Update an attribute and run the rules it triggers
    Update {
        object: String,
        attribute: String,
        /// Parsed as boolean, number or null where possible, else text
        value: String,
    },

    /// Lift a sample record from an external tool into the ontology
    Ingest {
        /// git_commit, requirement or defect
        kind: String,
    },

    /// Raise a requirement's security level and show the cascade
    Demo,

    /// Interactive shell over a single engine
    Shell,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let engine = session::load_engine(&cli.config_dir)?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Status { json } => commands::show_status(&engine, json, &mut out),
        Commands::Objects { json } => commands::list_objects(&engine, json, &mut out),
        Commands::Rules { json } => commands::list_rules(&engine, json, &mut out),
        Commands::Resources { json } => commands::list_resources(&engine, json, &mut out),
        Commands::Update {
            object,
            attribute,
            value,
        } => commands::update_attribute(&engine, &object, &attribute, &value, &mut out),
        Commands::Ingest { kind } => commands::ingest_sample(&engine, &kind, &mut out),
        Commands::Demo => commands::run_demo(&engine, &mut out),
        Commands::Shell => commands::run_shell(&engine, std::io::stdin().lock(), &mut out),
    }
}
