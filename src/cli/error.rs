//! CLI error type

use std::path::PathBuf;

use thiserror::Error;

use crate::error::OdsError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to read {0}: {1}")]
    FileReadError(PathBuf, String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Ods(#[from] OdsError),
}
