//! Process-wide defaults for new ODS instances
//!
//! Values come from [`OmasConfig::default`], a TOML file, or `OMAS_*`
//! environment variables layered on top:
//!
//! ```toml
//! default_imas_version = "3.21.0"
//! consistency_check = true
//! dynamic_path_creation = "dynamic_array_structures"
//! schema_dir = "/opt/omas/schemas"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OdsError, OdsResult};

/// Data dictionary version used when none is requested
pub const DEFAULT_IMAS_VERSION: &str = "3.21.0";

pub const ENV_IMAS_VERSION: &str = "OMAS_IMAS_VERSION";
pub const ENV_SCHEMA_DIR: &str = "OMAS_SCHEMA_DIR";
pub const ENV_CONSISTENCY_CHECK: &str = "OMAS_CONSISTENCY_CHECK";
pub const ENV_DYNAMIC_PATH_CREATION: &str = "OMAS_DYNAMIC_PATH_CREATION";

/// Whether missing intermediate nodes are created on access
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicPathCreation {
    /// Every intermediate node must already exist
    Off,
    /// Intermediate nodes are created; sequences grow one element at a time
    #[default]
    On,
    /// Like `On`, and writing past the end of a sequence back-fills it
    DynamicArrayStructures,
}

impl DynamicPathCreation {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, DynamicPathCreation::Off)
    }
}

impl From<bool> for DynamicPathCreation {
    fn from(enabled: bool) -> Self {
        if enabled {
            DynamicPathCreation::On
        } else {
            DynamicPathCreation::Off
        }
    }
}

impl std::str::FromStr for DynamicPathCreation {
    type Err = OdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" | "false" | "0" => Ok(DynamicPathCreation::Off),
            "on" | "true" | "1" => Ok(DynamicPathCreation::On),
            "dynamic_array_structures" => Ok(DynamicPathCreation::DynamicArrayStructures),
            _ => Err(OdsError::Configuration(format!(
                "Invalid dynamic path creation policy: {}. Expected: off, on, dynamic_array_structures",
                s
            ))),
        }
    }
}

/// Defaults applied to every new ODS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct OmasConfig {
    /// Data dictionary version for new instances
    pub default_imas_version: String,
    /// Validate writes against the data dictionary
    pub consistency_check: bool,
    /// Creation policy for missing intermediate nodes
    pub dynamic_path_creation: DynamicPathCreation,
    /// Directory searched for `<version>.json` before the bundled schemas
    pub schema_dir: Option<PathBuf>,
    /// Downgrade schema lookup failures to warnings when importing from a backend
    pub allow_missing_schema_nodes: bool,
}

impl Default for OmasConfig {
    fn default() -> Self {
        Self {
            default_imas_version: DEFAULT_IMAS_VERSION.to_string(),
            consistency_check: true,
            dynamic_path_creation: DynamicPathCreation::On,
            schema_dir: None,
            allow_missing_schema_nodes: false,
        }
    }
}

impl OmasConfig {
    /// Create a new builder for OmasConfig
    pub fn builder() -> OmasConfigBuilder {
        OmasConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> OdsResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> OdsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Defaults overridden by the `OMAS_*` process environment
    pub fn from_env() -> OdsResult<Self> {
        Self::default().with_env_overrides(std::env::vars())
    }

    /// Apply `OMAS_*` overrides from a list of variables
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> OdsResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                ENV_IMAS_VERSION => self.default_imas_version = value.trim().to_string(),
                ENV_SCHEMA_DIR => self.schema_dir = Some(PathBuf::from(value)),
                ENV_CONSISTENCY_CHECK => self.consistency_check = parse_bool(ENV_CONSISTENCY_CHECK, value)?,
                ENV_DYNAMIC_PATH_CREATION => self.dynamic_path_creation = value.parse()?,
                _ => continue,
            }
            debug!("Configuration override from {}", key.as_ref());
        }
        Ok(self)
    }
}

fn parse_bool(name: &str, value: &str) -> OdsResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OdsError::Configuration(format!(
            "{} must be a boolean, got `{}`",
            name, value
        ))),
    }
}

/// Builder for OmasConfig
#[derive(Debug, Default)]
pub struct OmasConfigBuilder {
    default_imas_version: Option<String>,
    consistency_check: Option<bool>,
    dynamic_path_creation: Option<DynamicPathCreation>,
    schema_dir: Option<PathBuf>,
    allow_missing_schema_nodes: bool,
}

impl OmasConfigBuilder {
    /// Set the data dictionary version
    pub fn imas_version(mut self, version: &str) -> Self {
        self.default_imas_version = Some(version.to_string());
        self
    }

    /// Enable or disable consistency checking
    pub fn consistency_check(mut self, enabled: bool) -> Self {
        self.consistency_check = Some(enabled);
        self
    }

    /// Set the dynamic path creation policy
    pub fn dynamic_path_creation(mut self, policy: impl Into<DynamicPathCreation>) -> Self {
        self.dynamic_path_creation = Some(policy.into());
        self
    }

    /// Set the extra schema directory
    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    /// Allow bulk imports to skip locations missing from the schema
    pub fn allow_missing_schema_nodes(mut self, allow: bool) -> Self {
        self.allow_missing_schema_nodes = allow;
        self
    }

    /// Build the OmasConfig, rejecting malformed version strings
    pub fn build(self) -> OdsResult<OmasConfig> {
        let default_imas_version = match self.default_imas_version {
            Some(version) => crate::schema::resolve_version(&version)?,
            None => DEFAULT_IMAS_VERSION.to_string(),
        };

        Ok(OmasConfig {
            default_imas_version,
            consistency_check: self.consistency_check.unwrap_or(true),
            dynamic_path_creation: self.dynamic_path_creation.unwrap_or_default(),
            schema_dir: self.schema_dir,
            allow_missing_schema_nodes: self.allow_missing_schema_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OmasConfig::default();
        assert_eq!(config.default_imas_version, "3.21.0");
        assert!(config.consistency_check);
        assert_eq!(config.dynamic_path_creation, DynamicPathCreation::On);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "off".parse::<DynamicPathCreation>().unwrap(),
            DynamicPathCreation::Off
        );
        assert_eq!(
            "True".parse::<DynamicPathCreation>().unwrap(),
            DynamicPathCreation::On
        );
        assert_eq!(
            "dynamic_array_structures"
                .parse::<DynamicPathCreation>()
                .unwrap(),
            DynamicPathCreation::DynamicArrayStructures
        );
        assert!("sometimes".parse::<DynamicPathCreation>().is_err());
    }

    #[test]
    fn test_toml() {
        let config = OmasConfig::from_toml_str(
            r#"
            default_imas_version = "3.20.0"
            dynamic_path_creation = "dynamic_array_structures"
            "#,
        )
        .unwrap();
        assert_eq!(config.default_imas_version, "3.20.0");
        assert_eq!(
            config.dynamic_path_creation,
            DynamicPathCreation::DynamicArrayStructures
        );
        assert!(config.consistency_check);
        assert!(matches!(
            OmasConfig::from_toml_str("consistency_check = \"maybe\""),
            Err(OdsError::Configuration(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let config = OmasConfig::default()
            .with_env_overrides([
                (ENV_IMAS_VERSION, "develop.3"),
                (ENV_CONSISTENCY_CHECK, "false"),
                (ENV_DYNAMIC_PATH_CREATION, "off"),
                ("UNRELATED", "x"),
            ])
            .unwrap();
        assert_eq!(config.default_imas_version, "develop.3");
        assert!(!config.consistency_check);
        assert_eq!(config.dynamic_path_creation, DynamicPathCreation::Off);

        assert!(
            OmasConfig::default()
                .with_env_overrides([(ENV_CONSISTENCY_CHECK, "perhaps")])
                .is_err()
        );
    }

    #[test]
    fn test_builder() {
        let config = OmasConfig::builder()
            .imas_version("3.20.0")
            .consistency_check(false)
            .dynamic_path_creation(false)
            .build()
            .unwrap();
        assert_eq!(config.default_imas_version, "3.20.0");
        assert!(!config.consistency_check);
        assert_eq!(config.dynamic_path_creation, DynamicPathCreation::Off);

        assert!(OmasConfig::builder().imas_version("nope").build().is_err());
    }
}
