//! omas - inspect, validate and convert ordered data structure files
//!
//! # Usage
//!
//! ```bash
//! # Structures of a data dictionary version
//! omas --imas-version 3.21.0 structures
//!
//! # Filled paths and values of a file
//! omas paths shot.json
//! omas --format json flat shot.yaml
//! omas get shot.json "equilibrium.time_slice.:.global_quantities.ip"
//!
//! # Check a file and convert it
//! omas validate --requirements shot.json
//! omas convert shot.json shot.dump
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use omas::cli::commands::{convert, inspect, validate};
use omas::cli::output::OutputFormat;
use omas::config::OmasConfig;
use omas::schema;

#[derive(Parser)]
#[command(name = "omas", version, about = "Ordered, schema-constrained data structures")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data dictionary version, overriding the configuration
    #[arg(long, global = true)]
    imas_version: Option<String>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the structures of the data dictionary
    Structures,
    /// Show the schema entry of a location
    Info { location: String },
    /// List the filled leaf paths of a file
    Paths { input: PathBuf },
    /// Print every filled leaf with its value
    Flat { input: PathBuf },
    /// Read one value (paths may contain `:` or start with `@`)
    Get { input: PathBuf, path: String },
    /// Check a file against the data dictionary
    Validate {
        input: PathBuf,
        /// Also run the time bookkeeping checks
        #[arg(long)]
        requirements: bool,
    },
    /// Convert between .json, .yaml/.yml and .dump files
    Convert { input: PathBuf, output: PathBuf },
}

fn init_tracing(quiet: bool, verbose: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(cli: &Cli) -> Result<OmasConfig> {
    let mut config = match &cli.config {
        Some(path) => OmasConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => OmasConfig::default(),
    };
    config = config.with_env_overrides(std::env::vars())?;
    if let Some(version) = &cli.imas_version {
        config.default_imas_version = schema::resolve_version(version)?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Structures => inspect::handle_structures(&config, cli.format)?,
        Commands::Info { location } => inspect::handle_info(&config, location, cli.format)?,
        Commands::Paths { input } => inspect::handle_paths(&config, input, cli.format)?,
        Commands::Flat { input } => inspect::handle_flat(&config, input, cli.format)?,
        Commands::Get { input, path } => inspect::handle_get(&config, input, path, cli.format)?,
        Commands::Validate {
            input,
            requirements,
        } => validate::handle_validate(&config, input, *requirements)
            .with_context(|| format!("{} is not valid", input.display()))?,
        Commands::Convert { input, output } => convert::handle_convert(&config, input, output)
            .with_context(|| format!("Failed to convert {}", input.display()))?,
    }
    Ok(())
}
