//! Save and load by file extension

use std::path::Path as FsPath;
use std::str::FromStr;

use tracing::info;

use crate::config::OmasConfig;
use crate::error::{OdsError, OdsResult};
use crate::ods::Ods;

use super::LoadOptions;
use super::dump::{dump, undump};
use super::json::{from_json_str, from_yaml_str, to_json_string, to_yaml_string};

/// On-disk formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
    Dump,
}

impl FileFormat {
    /// Format implied by a file name
    pub fn from_path(path: &FsPath) -> OdsResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                OdsError::Configuration(format!(
                    "Cannot infer a format for {}: no file extension",
                    path.display()
                ))
            })?;
        extension.parse()
    }
}

impl FromStr for FileFormat {
    type Err = OdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(FileFormat::Json),
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            "dump" => Ok(FileFormat::Dump),
            _ => Err(OdsError::Configuration(format!(
                "Invalid file format: {}. Expected: json, yaml, yml, dump",
                s
            ))),
        }
    }
}

/// Write `ods` to `path` in the format its extension names
pub fn save(ods: &Ods, path: &FsPath) -> OdsResult<()> {
    let format = FileFormat::from_path(path)?;
    let content = match format {
        FileFormat::Json => to_json_string(ods)?,
        FileFormat::Yaml => to_yaml_string(ods)?,
        FileFormat::Dump => dump(ods)?,
    };
    std::fs::write(path, content)?;
    info!("Saved {} leaves to {}", ods.paths().len(), path.display());
    Ok(())
}

/// Read a file written by [`save`]
///
/// Documents are loaded into a new handle built from `config`; dumps carry
/// their own settings and only take the schema directory from it.
pub fn load(path: &FsPath, config: &OmasConfig) -> OdsResult<Ods> {
    let format = FileFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    let ods = match format {
        FileFormat::Dump => undump(&content, config.schema_dir.as_deref())?,
        FileFormat::Json | FileFormat::Yaml => {
            let mut ods = Ods::with_config(config)?;
            let options = LoadOptions::from_config(config);
            if format == FileFormat::Json {
                from_json_str(&mut ods, &content, &options)?;
            } else {
                from_yaml_str(&mut ods, &content, &options)?;
            }
            ods
        }
    };
    info!("Loaded {} leaves from {}", ods.paths().len(), path.display());
    Ok(ods)
}

impl Ods {
    /// Save to a `.json`, `.yaml`/`.yml` or `.dump` file
    pub fn save(&self, path: impl AsRef<FsPath>) -> OdsResult<()> {
        save(self, path.as_ref())
    }

    /// Load a file using the default configuration
    pub fn load(path: impl AsRef<FsPath>) -> OdsResult<Ods> {
        load(path.as_ref(), &OmasConfig::default())
    }
}
