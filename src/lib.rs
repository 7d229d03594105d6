//! OMAS - ordered, schema-constrained data structures for integrated modelling data
//!
//! Provides:
//! - The hierarchical container ([`Ods`]) with path addressing, dynamic
//!   path creation, slicing and time handling
//! - The address parser ([`path`]) and the versioned schema registry ([`schema`])
//! - Uncertain values stored as nominal/error leaf pairs ([`value::uncertain`])
//! - Coordinate convention transforms ([`cocos`]) and code parameters ([`code_parameters`])
//! - Serialization adapters: backend protocol, JSON/YAML documents and dumps ([`storage`])
//!
//! ```
//! use omas::{Ods, Value};
//!
//! let mut ods = Ods::new().unwrap();
//! ods.set("equilibrium.time_slice.0.time", 0.1).unwrap();
//! ods.set("equilibrium.time_slice.1.time", 0.2).unwrap();
//! assert_eq!(
//!     ods.get("equilibrium.time_slice.:.time").unwrap(),
//!     Value::from(vec![0.1, 0.2])
//! );
//! ```

pub mod cocos;
pub mod code_parameters;
pub mod config;
pub mod error;
pub mod ods;
pub mod path;
pub mod schema;
pub mod storage;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

// Re-export commonly used types
pub use config::{DynamicPathCreation, OmasConfig, OmasConfigBuilder};
pub use error::{OdsError, OdsResult};
pub use ods::{Environment, EnvironmentGuard, Node, NodeKind, Ods, OdsBuilder};
pub use path::{IntoAddress, Key, Path, Pattern, Token};
pub use schema::{DataType, Schema, SchemaEntry, TimeType};
pub use storage::{Backend, LoadOptions, MemoryBackend, Session};
pub use value::{NdArray, UArray, UFloat, Value};
