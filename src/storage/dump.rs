//! Structure dump
//!
//! Serializes the node tree itself together with the handle's settings, so
//! undumping reconstructs identical node kinds (including empty sequence
//! positions) and flags. The dump is YAML, which keeps NaN values intact.

use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DynamicPathCreation;
use crate::error::{OdsError, OdsResult};
use crate::ods::{Node, Ods, Settings};
use crate::path::Path;
use crate::schema;

/// Format marker written at the top of every dump
pub const DUMP_FORMAT: &str = "omas-dump";

/// Layout version of the dump document
pub const DUMP_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
struct Dump {
    format: String,
    version: u32,
    imas_version: String,
    consistency_check: bool,
    dynamic_path_creation: DynamicPathCreation,
    cocosio: u8,
    location: Path,
    root: Node,
}

/// Dump a handle and its settings
pub fn dump(ods: &Ods) -> OdsResult<String> {
    let document = Dump {
        format: DUMP_FORMAT.to_string(),
        version: DUMP_VERSION,
        imas_version: ods.imas_version().to_string(),
        consistency_check: ods.consistency_check(),
        dynamic_path_creation: ods.dynamic_path_creation(),
        cocosio: ods.cocosio(),
        location: ods.location().clone(),
        root: ods.root().clone(),
    };
    Ok(serde_yaml::to_string(&document)?)
}

/// Rebuild a handle from a dump
///
/// The schema named in the dump is loaded (from `schema_dir` first when
/// given) and, when the dump had consistency checking on, the tree is
/// validated against it.
pub fn undump(content: &str, schema_dir: Option<&FsPath>) -> OdsResult<Ods> {
    let document: Dump = serde_yaml::from_str(content)?;
    if document.format != DUMP_FORMAT {
        return Err(OdsError::Serialization(format!(
            "not a structure dump (format `{}`)",
            document.format
        )));
    }
    if document.version != DUMP_VERSION {
        return Err(OdsError::Serialization(format!(
            "unsupported dump version {}. Expected: {}",
            document.version, DUMP_VERSION
        )));
    }

    let schema = schema::load_schema_from(&document.imas_version, schema_dir)?;
    crate::cocos::Cocos::new(document.cocosio)?;
    let settings = Settings {
        consistency_check: document.consistency_check,
        dynamic_path_creation: document.dynamic_path_creation,
        cocosio: document.cocosio,
        ..Settings::default()
    };
    let ods = Ods::from_parts(
        document.root,
        document.location,
        schema,
        schema_dir.map(FsPath::to_path_buf),
        settings,
    );
    if ods.consistency_check() {
        ods.validate()?;
    }
    debug!("Undumped {} leaves", ods.paths().len());
    Ok(ods)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_keeps_flags_and_placeholders() {
        let mut ods = Ods::builder()
            .dynamic_path_creation(DynamicPathCreation::DynamicArrayStructures)
            .build()
            .unwrap();
        ods.set("equilibrium.time_slice.2.global_quantities.ip", f64::NAN)
            .unwrap();

        let back = undump(&dump(&ods).unwrap(), None).unwrap();
        assert_eq!(
            back.dynamic_path_creation(),
            DynamicPathCreation::DynamicArrayStructures
        );
        assert_eq!(back.keys_at("equilibrium.time_slice").unwrap().len(), 3);
        let ip = back
            .get("equilibrium.time_slice.2.global_quantities.ip")
            .unwrap();
        assert!(ip.as_f64().is_some_and(f64::is_nan));
        assert_eq!(back.paths(), ods.paths());
        assert!(matches!(back.root(), Node::Mapping(_)));
    }

    #[test]
    fn test_rejects_foreign_documents() {
        let foreign = "format: other\nversion: 1\n";
        assert!(undump(foreign, None).is_err());
    }
}
