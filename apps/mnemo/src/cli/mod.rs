//! # Mnemo CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new object store
//! - `status` - Show store and schema status
//! - `seed` - Store a sample Team/Person graph
//! - `show` - Load and print one object
//! - `capture` - Write a memento of one object to a file
//! - `recreate` - Rebuild a memento file's graph and save it
//! - `destroy` - Delete one stored object

mod commands;

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand, ValueEnum};
use mnemo_core::MnemoError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Mnemo - object identity map and memento tool
#[derive(Parser, Debug)]
#[command(name = "mnemo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the object database (overrides `[store] path`)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to the TOML configuration
    #[arg(short = 'C', long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// On-disk encoding of a memento file.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MementoFormat {
    /// Header plus postcard payload
    #[default]
    Binary,
    /// serde_json, for inspection
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty object store
    Init {
        /// Force initialization even if the database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show store and schema status
    Status,

    /// Store a sample team with two members
    Seed,

    /// Load an object and print its fields
    Show {
        /// Oid of the object
        oid: u64,
    },

    /// Capture an object into a memento file
    Capture {
        /// Oid of the object
        oid: u64,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short = 't', long, value_enum, default_value_t = MementoFormat::Binary)]
        format: MementoFormat,
    },

    /// Recreate a memento file's object graph and save it
    Recreate {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short = 't', long, value_enum, default_value_t = MementoFormat::Binary)]
        format: MementoFormat,
    },

    /// Delete a stored object
    Destroy {
        /// Oid of the object
        oid: u64,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Resolved settings shared by every command.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub database: PathBuf,
    pub json_mode: bool,
    pub quiet: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Result<Self, MnemoError> {
        let config = Config::load(&cli.config)?;
        let database = config.store_path(cli.database.clone());
        Ok(Self {
            config,
            database,
            json_mode: cli.json_mode,
            quiet: cli.quiet,
        })
    }
}

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), MnemoError> {
    let ctx = Context::from_cli(&cli)?;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Seed) => cmd_seed(&ctx),
        Some(Commands::Show { oid }) => cmd_show(&ctx, oid),
        Some(Commands::Capture {
            oid,
            output,
            format,
        }) => cmd_capture(&ctx, oid, &output, format),
        Some(Commands::Recreate { input, format }) => cmd_recreate(&ctx, &input, format),
        Some(Commands::Destroy { oid }) => cmd_destroy(&ctx, oid),
    }
}
