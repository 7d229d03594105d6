//! Validate command implementation

use std::path::Path as FsPath;

use crate::cli::error::CliError;
use crate::config::OmasConfig;

use super::load_input;

/// Handle the validate command
///
/// Checks every filled leaf against the schema and, with `requirements`,
/// runs the per-structure time bookkeeping checks as well.
pub fn handle_validate(config: &OmasConfig, input: &FsPath, requirements: bool) -> Result<(), CliError> {
    let mut ods = load_input(input, config)?;
    ods.validate()
        .map_err(|e| CliError::ValidationError(e.to_string()))?;
    if requirements {
        ods.satisfy_requirements()
            .map_err(|e| CliError::ValidationError(e.to_string()))?;
    }

    println!(
        "Validation successful: {} leaves against data dictionary {}",
        ods.paths().len(),
        ods.imas_version()
    );
    Ok(())
}
