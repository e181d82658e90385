//! DeskBridge CLI
//!
//! Command-line tools for operating a file-backed staging area.
//!
//! # Commands
//!
//! - `inspect` - Show per-stage record counts (and keys)
//! - `promote` - Run the two-phase promotion sweep
//! - `notifications` - Drain outcome notifications for a type
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use deskbridge_core::{Namespace, ObjectType};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DeskBridge staging-area tools.
#[derive(Parser)]
#[command(name = "deskbridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory of the file-backed store
    #[arg(global = true, short, long)]
    root: Option<PathBuf>,

    /// Connection identifier scoping the staging area
    #[arg(global = true, short, long)]
    connection: Option<String>,

    /// Origin tag (defaults to "primary")
    #[arg(global = true, short, long)]
    origin: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-stage record counts
    Inspect {
        /// List every key, not just counts
        #[arg(short, long)]
        keys: bool,
    },

    /// Relocate two-phase records into pending
    Promote,

    /// Drain outcome notifications for one object type
    Notifications {
        /// Plural object type token (orders, customers, ...)
        object_type: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { keys } => {
            let (root, namespace) = required_scope(&cli)?;
            commands::inspect::run(&root, namespace, keys)?;
        }
        Commands::Promote => {
            let (root, namespace) = required_scope(&cli)?;
            commands::promote::run(&root, namespace)?;
        }
        Commands::Notifications { ref object_type } => {
            let (root, namespace) = required_scope(&cli)?;
            let ty = ObjectType::from_plural(&object_type)
                .ok_or_else(|| format!("unknown object type: {object_type}"))?;
            commands::notifications::run(&root, namespace, ty)?;
        }
        Commands::Version => {
            println!("DeskBridge CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("DeskBridge Core v{}", deskbridge_core::VERSION);
        }
    }

    Ok(())
}

fn required_scope(cli: &Cli) -> Result<(PathBuf, Namespace), Box<dyn std::error::Error>> {
    let root = cli.root.clone().ok_or("Store root required (--root)")?;
    let connection = cli
        .connection
        .clone()
        .ok_or("Connection id required (--connection)")?;

    let mut namespace = Namespace::new(connection);
    if let Some(origin) = &cli.origin {
        namespace = namespace.origin(origin.clone());
    }
    Ok((root, namespace))
}
