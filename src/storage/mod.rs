//! Serialization adapters
//!
//! Every backend is driven through the same small protocol built on the
//! ordered list of filled leaf paths:
//!
//! - saving opens a [`Session`], allocates every array of structures in
//!   reverse path order, then writes leaves in forward order
//! - loading reads the backend's filled paths, skips "empty" sentinels and
//!   pairs `<leaf>_error_upper` fields back with their nominal values
//!
//! Backends store raw values in the internal coordinate convention, so a
//! save/load round trip reconstructs an equal tree.
//!
//! Implementations:
//! - [`MemoryBackend`]: in-process database requiring explicit array allocation
//! - [`json`]: hierarchical JSON/YAML documents
//! - [`dump`]: full structure dump including settings
//! - [`file`]: save/load dispatch by file extension

pub mod dump;
pub mod file;
pub mod json;
pub mod memory;

use std::collections::{HashMap, HashSet};
use std::ops::{Deref, DerefMut};

use tracing::{debug, info, warn};

use crate::config::{DynamicPathCreation, OmasConfig};
use crate::error::OdsResult;
use crate::ods::{Environment, Ods};
use crate::path::{Path, Token};
use crate::schema::ERROR_UPPER;
use crate::value::{Value, uncertain};

pub use dump::{dump, undump};
pub use file::{FileFormat, load, save};
pub use json::{from_json_value, from_yaml_str, to_json_value, to_yaml_string};
pub use memory::MemoryBackend;

/// External storage reached through canonical paths
pub trait Backend {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Acquire the connection
    fn open(&mut self) -> OdsResult<()>;

    /// Release the connection
    fn close(&mut self) -> OdsResult<()>;

    /// Pre-size the array of structures at `path`
    fn allocate(&mut self, path: &Path, len: usize) -> OdsResult<()>;

    /// Store one leaf
    fn write(&mut self, path: &Path, value: &Value) -> OdsResult<()>;

    /// Fetch one leaf; `None` when nothing is stored there
    fn read(&mut self, path: &Path) -> OdsResult<Option<Value>>;

    /// Every stored leaf path, in the order it was written
    fn filled_paths(&mut self) -> OdsResult<Vec<Path>>;
}

/// An open backend connection, closed when dropped
pub struct Session<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
}

impl<'a, B: Backend + ?Sized> Session<'a, B> {
    pub fn open(backend: &'a mut B) -> OdsResult<Self> {
        backend.open()?;
        info!("Opened {} session", backend.name());
        Ok(Self { backend })
    }
}

impl<B: Backend + ?Sized> Deref for Session<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.backend
    }
}

impl<B: Backend + ?Sized> DerefMut for Session<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.backend
    }
}

impl<B: Backend + ?Sized> Drop for Session<'_, B> {
    fn drop(&mut self) {
        match self.backend.close() {
            Ok(()) => info!("Closed {} session", self.backend.name()),
            Err(e) => warn!("Failed to close {} session: {}", self.backend.name(), e),
        }
    }
}

/// Options for bulk imports
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Only load paths under these prefixes; `:` matches any index
    pub paths: Option<Vec<Path>>,
    /// Skip leaves the schema does not know instead of failing
    pub allow_missing_schema_nodes: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &OmasConfig) -> Self {
        Self {
            paths: None,
            allow_missing_schema_nodes: config.allow_missing_schema_nodes,
        }
    }

    /// Restrict the import to paths under `prefixes`
    pub fn paths<I, S>(mut self, prefixes: I) -> OdsResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes = prefixes
            .into_iter()
            .map(|p| Path::parse(p.as_ref()))
            .collect::<OdsResult<Vec<_>>>()?;
        self.paths = Some(prefixes);
        Ok(self)
    }

    pub fn allow_missing_schema_nodes(mut self, allow: bool) -> Self {
        self.allow_missing_schema_nodes = allow;
        self
    }

    fn wants(&self, path: &Path) -> bool {
        match &self.paths {
            None => true,
            Some(prefixes) => prefixes.iter().any(|prefix| matches_prefix(path, prefix)),
        }
    }
}

fn matches_prefix(path: &Path, prefix: &Path) -> bool {
    prefix.len() <= path.len()
        && prefix
            .tokens()
            .iter()
            .zip(path.tokens())
            .all(|(wanted, actual)| match (wanted, actual) {
                (Token::Slice, Token::Index(_)) => true,
                _ => wanted == actual,
            })
}

fn is_error_path(path: &Path) -> bool {
    path.last()
        .and_then(Token::as_name)
        .is_some_and(|name| name.ends_with(ERROR_UPPER))
}

/// Filled leaf paths in stable depth-first order
pub fn enumerate_filled_paths(ods: &Ods) -> Vec<Path> {
    ods.paths()
}

/// Stored value of one leaf
pub fn read_leaf(ods: &Ods, path: &Path) -> OdsResult<Value> {
    ods.get_raw(path)
}

/// Store one leaf, optionally downgrading schema lookup failures to warnings
///
/// Returns whether the value was written.
pub fn write_leaf(
    ods: &mut Ods,
    path: &Path,
    value: Value,
    allow_missing_schema_nodes: bool,
) -> OdsResult<bool> {
    match ods.set_raw(path, value) {
        Ok(()) => Ok(true),
        Err(e) if allow_missing_schema_nodes && e.is_schema_lookup() => {
            warn!("Skipping `{}`: {}", path, e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Write every filled leaf of `ods` to `backend`
pub fn save_to_backend<B: Backend + ?Sized>(ods: &Ods, backend: &mut B) -> OdsResult<()> {
    let paths = enumerate_filled_paths(ods);
    let mut session = Session::open(backend)?;

    let mut allocated = HashSet::new();
    for path in paths.iter().rev() {
        for (position, token) in path.tokens().iter().enumerate() {
            if !token.is_positional() {
                continue;
            }
            let array = path.prefix(position);
            if allocated.insert(array.clone()) {
                let len = ods.keys_at(&array)?.len();
                session.allocate(&array, len)?;
            }
        }
    }

    for path in &paths {
        session.write(path, &read_leaf(ods, path)?)?;
    }
    info!("Saved {} leaves to {}", paths.len(), session.name());
    Ok(())
}

/// Read leaves from `backend` into `ods`; returns the number of leaves loaded
pub fn load_from_backend<B: Backend + ?Sized>(
    ods: &mut Ods,
    backend: &mut B,
    options: &LoadOptions,
) -> OdsResult<usize> {
    let mut session = Session::open(backend)?;
    let mut leaves = Vec::new();
    for path in session.filled_paths()? {
        if !options.wants(&path) {
            continue;
        }
        if let Some(value) = session.read(&path)? {
            leaves.push((path, value));
        }
    }
    let loaded = import_leaves(ods, leaves, options)?;
    info!("Loaded {} leaves from {}", loaded, session.name());
    Ok(loaded)
}

/// Write raw `(path, value)` pairs into `ods`
///
/// `<leaf>_error_upper` entries are folded into their nominal leaf; an
/// unusable standard deviation is dropped with a warning. Arrays of
/// structures may be back-filled because a subset import can skip indices.
pub(crate) fn import_leaves(
    ods: &mut Ods,
    leaves: Vec<(Path, Value)>,
    options: &LoadOptions,
) -> OdsResult<usize> {
    let mut errors: HashMap<Path, Value> = HashMap::new();
    let mut nominals = Vec::with_capacity(leaves.len());
    for (path, value) in leaves {
        if value.is_empty_sentinel() {
            debug!("Skipping empty `{}`", path);
            continue;
        }
        if is_error_path(&path) {
            errors.insert(path, value);
        } else {
            nominals.push((path, value));
        }
    }

    let env = Environment::new().dynamic_path_creation(DynamicPathCreation::DynamicArrayStructures);
    ods.with_environment(env, |ods| {
        let mut loaded = 0;
        for (path, value) in nominals {
            let value = match path.with_name_suffix(ERROR_UPPER).and_then(|e| errors.remove(&e)) {
                Some(std_dev) => {
                    let text = path.to_string();
                    match uncertain::validate_std_dev(&std_dev, &text)
                        .and_then(|()| uncertain::combine(value.clone(), std_dev, &text))
                    {
                        Ok(combined) => combined,
                        Err(e) => {
                            warn!("Dropping uncertainty of `{}`: {}", path, e);
                            value
                        }
                    }
                }
                None => value,
            };
            if write_leaf(ods, &path, value, options.allow_missing_schema_nodes)? {
                loaded += 1;
            }
        }
        for path in errors.keys() {
            warn!("Ignoring `{}` without a nominal value", path);
        }
        Ok(loaded)
    })
}
