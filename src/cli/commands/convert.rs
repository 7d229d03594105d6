//! Convert command implementation

use std::path::Path as FsPath;

use crate::cli::error::CliError;
use crate::config::OmasConfig;
use crate::storage::{self, FileFormat};

use super::load_input;

/// Handle the convert command; formats follow the file extensions
pub fn handle_convert(config: &OmasConfig, input: &FsPath, output: &FsPath) -> Result<(), CliError> {
    FileFormat::from_path(output)?;
    let ods = load_input(input, config)?;
    storage::save(&ods, output)?;
    println!("Wrote {} leaves to {}", ods.paths().len(), output.display());
    Ok(())
}
