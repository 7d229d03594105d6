//! Schema registry
//!
//! Loads the versioned data dictionary that every consistency-checked ODS is
//! validated against. Schemas are loaded once per version string and cached
//! for the lifetime of the process; a loaded [`Schema`] is never mutated.
//!
//! Schema files are JSON documents of the form:
//!
//! ```json
//! {
//!   "version": "3.20.0",
//!   "structures": {
//!     "equilibrium": {
//!       "equilibrium.time_slice": {"data_type": "struct_array", "type": "dynamic"},
//!       "equilibrium.time_slice.:.global_quantities.ip": {"data_type": "FLT_0D", "cocos": "ip_like"}
//!     }
//!   }
//! }
//! ```
//!
//! Only leaves need to be listed: intermediate structures and arrays of
//! structures are derived from the leaf locations, and `_error_upper` /
//! `_error_lower` companions are added for every floating point leaf.

mod entry;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path as FsPath;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{OdsError, OdsResult};
use crate::ods::NodeKind;
use crate::path::WILDCARD;

pub use entry::{DataType, SchemaEntry, TimeType};

/// Suffix of the standard deviation companion of a floating point leaf
pub const ERROR_UPPER: &str = "_error_upper";

/// Suffix of the lower error bar companion of a floating point leaf
pub const ERROR_LOWER: &str = "_error_lower";

/// Alias resolving to the most recent development version
pub const DEVELOP_ALIAS: &str = "develop";

const EMBEDDED_SCHEMAS: &[(&str, &str)] = &[
    ("3.20.0", include_str!("../../schemas/3.20.0.json")),
    ("3.21.0", include_str!("../../schemas/3.21.0.json")),
    ("develop.3", include_str!("../../schemas/develop.3.json")),
];

static VERSION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.\d+\.\d+|develop\.\d+)$").unwrap());

static SCHEMA_CACHE: Lazy<RwLock<HashMap<String, Arc<Schema>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Answer to "may a node live at this location?"
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub allowed: bool,
    pub child_kind: Option<NodeKind>,
    pub coordinates: Vec<String>,
    pub is_dynamic_array: bool,
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    version: String,
    structures: BTreeMap<String, BTreeMap<String, SchemaEntry>>,
}

/// One version of the data dictionary
#[derive(Debug)]
pub struct Schema {
    version: String,
    structures: BTreeSet<String>,
    entries: HashMap<String, SchemaEntry>,
}

impl Schema {
    /// Parse a schema document
    pub fn from_json(content: &str) -> OdsResult<Self> {
        let file: SchemaFile = serde_json::from_str(content)?;
        Self::build(file)
    }

    fn build(file: SchemaFile) -> OdsResult<Self> {
        let mut entries: HashMap<String, SchemaEntry> = HashMap::new();
        let mut structures = BTreeSet::new();

        for (structure, locations) in file.structures {
            structures.insert(structure.clone());
            entries.insert(structure.clone(), SchemaEntry::new(DataType::Structure));

            for (location, entry) in locations {
                if !location.starts_with(&format!("{}.", structure)) {
                    return Err(OdsError::Configuration(format!(
                        "Schema {}: `{}` listed under structure `{}`",
                        file.version, location, structure
                    )));
                }
                if entry.data_type.is_float() && !location.ends_with(ERROR_UPPER) {
                    for suffix in [ERROR_UPPER, ERROR_LOWER] {
                        let mut companion = SchemaEntry::new(entry.data_type);
                        companion.time_type = entry.time_type;
                        companion.units = entry.units.clone();
                        companion.cocos = entry.cocos;
                        entries.insert(format!("{}{}", location, suffix), companion);
                    }
                }
                entries.insert(location, entry);
            }
        }

        // derive intermediate structures and arrays of structures
        let locations: Vec<String> = entries.keys().cloned().collect();
        for location in locations {
            let parts: Vec<&str> = location.split('.').collect();
            for i in 1..parts.len() {
                let prefix = parts[..i].join(".");
                let derived = if parts[i] == WILDCARD {
                    DataType::StructArray
                } else {
                    DataType::Structure
                };
                match entries.get(&prefix) {
                    None => {
                        entries.insert(prefix, SchemaEntry::new(derived));
                    }
                    Some(existing) if existing.data_type != derived => {
                        return Err(OdsError::Configuration(format!(
                            "Schema {}: `{}` is declared {} but has children",
                            file.version, prefix, existing.data_type
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        debug!(
            "Built schema {} with {} locations",
            file.version,
            entries.len()
        );

        Ok(Self {
            version: file.version,
            structures,
            entries,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Entry for a wildcard location
    pub fn entry(&self, ulocation: &str) -> Option<&SchemaEntry> {
        self.entries.get(ulocation)
    }

    /// Look up a wildcard location
    pub fn lookup(&self, ulocation: &str) -> Lookup {
        match self.entries.get(ulocation) {
            Some(entry) => Lookup {
                allowed: true,
                child_kind: Some(entry.data_type.node_kind()),
                coordinates: entry.coordinates.clone(),
                is_dynamic_array: entry.data_type == DataType::StructArray && entry.is_dynamic(),
            },
            None => Lookup {
                allowed: false,
                child_kind: None,
                coordinates: Vec::new(),
                is_dynamic_array: false,
            },
        }
    }

    /// Top-level structure names
    pub fn list_structures(&self) -> Vec<String> {
        self.structures.iter().cloned().collect()
    }

    /// Every location of the schema, sorted
    pub fn locations(&self) -> Vec<&str> {
        let mut locations: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        locations.sort_unstable();
        locations
    }
}

/// Versions that can be loaded without a schema directory
pub fn embedded_versions() -> Vec<&'static str> {
    EMBEDDED_SCHEMAS.iter().map(|(v, _)| *v).collect()
}

/// Resolve aliases and reject malformed version strings
pub fn resolve_version(version: &str) -> OdsResult<String> {
    let version = version.trim();
    if version == DEVELOP_ALIAS {
        return EMBEDDED_SCHEMAS
            .iter()
            .filter_map(|(v, _)| {
                v.strip_prefix("develop.")
                    .and_then(|n| n.parse::<u32>().ok())
                    .map(|n| (n, *v))
            })
            .max()
            .map(|(_, v)| v.to_string())
            .ok_or_else(|| {
                OdsError::Configuration("No development schema is available".to_string())
            });
    }
    if !VERSION_REGEX.is_match(version) {
        return Err(OdsError::Configuration(format!(
            "Invalid data dictionary version `{}`",
            version
        )));
    }
    Ok(version.to_string())
}

/// Load (or fetch from the cache) the schema for a version
pub fn load_schema(version: &str) -> OdsResult<Arc<Schema>> {
    load_schema_from(version, None)
}

/// Load a schema, looking in `schema_dir` for `<version>.json` before the
/// embedded copies
pub fn load_schema_from(version: &str, schema_dir: Option<&FsPath>) -> OdsResult<Arc<Schema>> {
    let version = resolve_version(version)?;

    if let Ok(cache) = SCHEMA_CACHE.read()
        && let Some(schema) = cache.get(&version)
    {
        return Ok(Arc::clone(schema));
    }

    let schema = Arc::new(read_schema(&version, schema_dir)?);
    info!(
        "Loaded data dictionary {} ({} structures)",
        version,
        schema.structures.len()
    );

    let mut cache = SCHEMA_CACHE
        .write()
        .map_err(|_| OdsError::Configuration("Schema cache is poisoned".to_string()))?;
    Ok(Arc::clone(cache.entry(version).or_insert(schema)))
}

fn read_schema(version: &str, schema_dir: Option<&FsPath>) -> OdsResult<Schema> {
    if let Some(dir) = schema_dir {
        let file = dir.join(format!("{}.json", version));
        if file.exists() {
            let content = std::fs::read_to_string(&file)?;
            let schema = Schema::from_json(&content)?;
            if schema.version != version {
                return Err(OdsError::Configuration(format!(
                    "{} declares version {}",
                    file.display(),
                    schema.version
                )));
            }
            return Ok(schema);
        }
    }

    match EMBEDDED_SCHEMAS.iter().find(|(v, _)| *v == version) {
        Some((_, content)) => Schema::from_json(content),
        None => Err(OdsError::Configuration(format!(
            "Unknown data dictionary version `{}` (available: {})",
            version,
            embedded_versions().join(", ")
        ))),
    }
}

/// Look up a wildcard location in a version of the schema
pub fn lookup(version: &str, ulocation: &str) -> OdsResult<Lookup> {
    Ok(load_schema(version)?.lookup(ulocation))
}

/// Top-level structures of a version of the schema
pub fn list_structures(version: &str) -> OdsResult<Vec<String>> {
    Ok(load_schema(version)?.list_structures())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_versions_load() {
        for version in embedded_versions() {
            let schema = load_schema(version).unwrap();
            assert_eq!(schema.version(), version);
            assert!(schema.list_structures().contains(&"equilibrium".to_string()));
        }
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let a = load_schema("3.20.0").unwrap();
        let b = load_schema("3.20.0").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_develop_alias() {
        assert_eq!(resolve_version("develop").unwrap(), "develop.3");
        assert!(load_schema("develop").is_ok());
    }

    #[test]
    fn test_unknown_versions() {
        assert!(matches!(
            load_schema("does_not_exist"),
            Err(OdsError::Configuration(_))
        ));
        assert!(matches!(
            load_schema("9.99.0"),
            Err(OdsError::Configuration(_))
        ));
    }

    #[test]
    fn test_derived_locations() {
        let schema = load_schema("3.20.0").unwrap();
        let aos = schema.lookup("equilibrium.time_slice");
        assert!(aos.allowed);
        assert_eq!(aos.child_kind, Some(NodeKind::Sequence));
        assert!(aos.is_dynamic_array);

        let element = schema.lookup("equilibrium.time_slice.:");
        assert_eq!(element.child_kind, Some(NodeKind::Mapping));

        let leaf = schema.lookup("equilibrium.time_slice.:.global_quantities.ip");
        assert_eq!(leaf.child_kind, Some(NodeKind::Leaf));

        assert!(schema
            .lookup("equilibrium.time_slice.:.global_quantities.ip_error_upper")
            .allowed);
        assert!(!schema.lookup("equilibrium.time_slice.:.bogus").allowed);
    }

    #[test]
    fn test_version_differences() {
        assert!(
            lookup("3.20.0", "ec_antennas.antenna.:.power.data")
                .unwrap()
                .allowed
        );
        assert!(
            !lookup("3.21.0", "ec_antennas.antenna.:.power.data")
                .unwrap()
                .allowed
        );
    }

    #[test]
    fn test_schema_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("1.0.0.json"),
            r#"{"version": "1.0.0", "structures": {"demo": {"demo.a.:.b": {"data_type": "INT_0D"}}}}"#,
        )
        .unwrap();
        let schema = load_schema_from("1.0.0", Some(dir.path())).unwrap();
        assert_eq!(schema.list_structures(), vec!["demo".to_string()]);
        assert_eq!(
            schema.lookup("demo.a").child_kind,
            Some(NodeKind::Sequence)
        );
    }

    #[test]
    fn test_conflicting_schema_rejected() {
        let content = r#"{"version": "1.0.1", "structures": {"demo": {
            "demo.a": {"data_type": "FLT_0D"},
            "demo.a.b": {"data_type": "FLT_0D"}
        }}}"#;
        assert!(matches!(
            Schema::from_json(content),
            Err(OdsError::Configuration(_))
        ));
    }
}
