//! Command implementations

pub mod convert;
pub mod inspect;
pub mod validate;

use std::path::Path as FsPath;

use crate::cli::error::CliError;
use crate::config::OmasConfig;
use crate::ods::Ods;
use crate::storage;

/// Load an input file, checking it exists first
pub(crate) fn load_input(input: &FsPath, config: &OmasConfig) -> Result<Ods, CliError> {
    if !input.is_file() {
        return Err(CliError::FileReadError(
            input.to_path_buf(),
            "no such file".to_string(),
        ));
    }
    Ok(storage::load(input, config)?)
}
