//! Read-only commands: structures, info, paths, flat, get

use std::path::Path as FsPath;

use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, format_entry, format_flat, format_list, format_paths, format_value};
use crate::config::OmasConfig;
use crate::schema;

use super::load_input;

/// Handle the structures command
pub fn handle_structures(config: &OmasConfig, format: OutputFormat) -> Result<(), CliError> {
    let schema = schema::load_schema_from(&config.default_imas_version, config.schema_dir.as_deref())?;
    println!("{}", format_list(&schema.list_structures(), format));
    Ok(())
}

/// Handle the info command
pub fn handle_info(config: &OmasConfig, location: &str, format: OutputFormat) -> Result<(), CliError> {
    let ods = crate::ods::Ods::with_config(config)?;
    let entry = ods.info(location)?;
    println!("{}", format_entry(location, &entry, format));
    Ok(())
}

/// Handle the paths command
pub fn handle_paths(config: &OmasConfig, input: &FsPath, format: OutputFormat) -> Result<(), CliError> {
    let ods = load_input(input, config)?;
    println!("{}", format_paths(&ods.paths(), format));
    Ok(())
}

/// Handle the flat command
pub fn handle_flat(config: &OmasConfig, input: &FsPath, format: OutputFormat) -> Result<(), CliError> {
    let ods = load_input(input, config)?;
    println!("{}", format_flat(&ods.flat(), format));
    Ok(())
}

/// Handle the get command
pub fn handle_get(
    config: &OmasConfig,
    input: &FsPath,
    path: &str,
    format: OutputFormat,
) -> Result<(), CliError> {
    let ods = load_input(input, config)?;
    if path.trim().is_empty() {
        return Err(CliError::InvalidArgument("path must not be empty".to_string()));
    }
    let value = ods.get(path)?;
    println!("{}", format_value(&value, format));
    Ok(())
}
