//! Hierarchical container
//!
//! An [`Ods`] is a handle over a tree of [`Node`]s plus the settings that
//! govern it: the data dictionary version, consistency checking, the
//! dynamic path creation policy and the scoped [`Environment`] options.
//!
//! Every address is parsed into a [`Path`] and resolved against the tree in
//! two phases: a read-only pass that validates kinds, indices and the
//! creation policy, then a mutating pass. A failed write therefore never
//! leaves partially created nodes behind.
//!
//! ```
//! use omas::Ods;
//! use omas::value::{UFloat, Value};
//!
//! let mut ods = Ods::new().unwrap();
//! ods.set("equilibrium.time_slice.+.global_quantities.ip", 1.5e6).unwrap();
//! ods.set("equilibrium.time_slice.+.global_quantities.ip", UFloat::new(2.0e6, 1.0e4)).unwrap();
//!
//! assert_eq!(
//!     ods.get("equilibrium.time_slice[0].global_quantities.ip").unwrap(),
//!     Value::Float(1.5e6)
//! );
//! assert!(ods.get("equilibrium.time_slice.-1.global_quantities.ip").unwrap().is_uncertain());
//! ```

mod environment;
mod node;
mod time;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use crate::cocos::{self, INTERNAL_COCOS};
use crate::code_parameters::{self, is_code_parameters_location};
use crate::config::{DynamicPathCreation, OmasConfig};
use crate::error::{OdsError, OdsResult};
use crate::path::{Address, IntoAddress, Key, Path, Token, WILDCARD, ulocation_of};
use crate::schema::{self, DataType, ERROR_LOWER, ERROR_UPPER, Schema, SchemaEntry};
use crate::value::{Value, uncertain};

/// Most placeholder elements a single back-filling write may add
pub const MAX_BACK_FILL: usize = 1 << 16;

pub use environment::{Environment, EnvironmentGuard, ProcessFn, Settings};
pub use node::{Node, NodeKind};

/// Ordered data structure: a schema-constrained tree handle
#[derive(Clone)]
pub struct Ods {
    root: Node,
    location: Path,
    schema: Arc<Schema>,
    schema_dir: Option<PathBuf>,
    settings: Settings,
}

impl fmt::Debug for Ods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ods")
            .field("imas_version", &self.schema.version())
            .field("location", &self.location.to_string())
            .field("settings", &self.settings)
            .field("root", &self.root)
            .finish()
    }
}

/// Two handles are equal when their trees are; settings are not compared
impl PartialEq for Ods {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

/// Builder for Ods
#[derive(Debug, Default)]
pub struct OdsBuilder {
    imas_version: Option<String>,
    consistency_check: Option<bool>,
    dynamic_path_creation: Option<DynamicPathCreation>,
    cocosio: Option<u8>,
    schema_dir: Option<PathBuf>,
}

impl OdsBuilder {
    pub fn imas_version(mut self, version: &str) -> Self {
        self.imas_version = Some(version.to_string());
        self
    }

    pub fn consistency_check(mut self, enabled: bool) -> Self {
        self.consistency_check = Some(enabled);
        self
    }

    pub fn dynamic_path_creation(mut self, policy: impl Into<DynamicPathCreation>) -> Self {
        self.dynamic_path_creation = Some(policy.into());
        self
    }

    pub fn cocosio(mut self, cocos: u8) -> Self {
        self.cocosio = Some(cocos);
        self
    }

    pub fn schema_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.schema_dir = Some(dir.into());
        self
    }

    /// Build the Ods, loading its schema
    pub fn build(self) -> OdsResult<Ods> {
        let defaults = OmasConfig::default();
        let version = self
            .imas_version
            .unwrap_or(defaults.default_imas_version);
        let schema = schema::load_schema_from(&version, self.schema_dir.as_deref())?;

        let cocosio = self.cocosio.unwrap_or(INTERNAL_COCOS);
        cocos::Cocos::new(cocosio)?;

        Ok(Ods {
            root: Node::Unset,
            location: Path::root(),
            schema,
            schema_dir: self.schema_dir,
            settings: Settings {
                consistency_check: self
                    .consistency_check
                    .unwrap_or(defaults.consistency_check),
                dynamic_path_creation: self
                    .dynamic_path_creation
                    .unwrap_or(defaults.dynamic_path_creation),
                cocosio,
                ..Settings::default()
            },
        })
    }
}

fn render(tokens: &[Token]) -> String {
    if tokens.is_empty() {
        return "<root>".to_string();
    }
    tokens
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Data type at an absolute location, validating every prefix on the way
///
/// Returns `None` below a code parameters node, where the schema does not
/// apply.
fn schema_data_type(schema: &Schema, tokens: &[Token]) -> OdsResult<Option<DataType>> {
    let mut parent: Option<DataType> = None;
    for i in 0..tokens.len() {
        match (parent, &tokens[i]) {
            (Some(DataType::CodeParameters), _) => return Ok(None),
            (Some(DataType::StructArray), Token::Name(name)) => {
                return Err(OdsError::Address(format!(
                    "`{}` is an array of structures and needs an index before `{}`",
                    render(&tokens[..i]),
                    name
                )));
            }
            (Some(DataType::Structure) | None, token) if token.is_positional() => {
                return Err(OdsError::Address(format!(
                    "`{}` is not an array of structures and cannot take index `{}`",
                    render(&tokens[..i]),
                    token
                )));
            }
            (Some(dt), _) if dt.is_data() => {
                return Err(OdsError::Address(format!(
                    "`{}` is a {} leaf and has no children",
                    render(&tokens[..i]),
                    dt
                )));
            }
            _ => {}
        }
        let location = ulocation_of(&tokens[..=i]);
        let entry = schema
            .entry(&location)
            .ok_or_else(|| OdsError::SchemaLookup {
                location: location.clone(),
                version: schema.version().to_string(),
            })?;
        parent = Some(entry.data_type);
    }
    Ok(parent)
}

/// Resolve a positional token against the current sequence length
fn resolve_index(token: &Token, len: usize, here: &str) -> OdsResult<usize> {
    match token {
        Token::Append => Ok(len),
        Token::Index(i) if *i < 0 => {
            let resolved = len as i64 + i;
            if resolved < 0 {
                return Err(OdsError::Index {
                    path: here.to_string(),
                    index: *i,
                    len,
                });
            }
            Ok(resolved as usize)
        }
        Token::Index(i) => Ok(*i as usize),
        other => Err(OdsError::Address(format!(
            "`{}` cannot be used at `{}` here",
            other, here
        ))),
    }
}

/// A populated node may not change kind
fn check_kind(node: &Node, wanted: NodeKind, here: &str) -> OdsResult<()> {
    match node.kind() {
        Some(current) if current != wanted && node.has_data() => Err(OdsError::type_error(
            here,
            format!("cannot turn a populated {} into a {}", current, wanted),
        )),
        _ => Ok(()),
    }
}

impl Ods {
    /// New empty tree using the default configuration
    pub fn new() -> OdsResult<Self> {
        Self::with_config(&OmasConfig::default())
    }

    pub fn with_config(config: &OmasConfig) -> OdsResult<Self> {
        let mut builder = Self::builder()
            .imas_version(&config.default_imas_version)
            .consistency_check(config.consistency_check)
            .dynamic_path_creation(config.dynamic_path_creation);
        if let Some(dir) = &config.schema_dir {
            builder = builder.schema_dir(dir.clone());
        }
        builder.build()
    }

    pub fn builder() -> OdsBuilder {
        OdsBuilder::default()
    }

    pub(crate) fn from_parts(
        root: Node,
        location: Path,
        schema: Arc<Schema>,
        schema_dir: Option<PathBuf>,
        settings: Settings,
    ) -> Self {
        Self {
            root,
            location,
            schema,
            schema_dir,
            settings,
        }
    }

    /// Empty handle sharing this handle's schema and settings
    pub fn empty_like(&self) -> Self {
        Self::from_parts(
            Node::Unset,
            self.location.clone(),
            Arc::clone(&self.schema),
            self.schema_dir.clone(),
            self.settings.clone(),
        )
    }

    pub fn imas_version(&self) -> &str {
        self.schema.version()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn consistency_check(&self) -> bool {
        self.settings.consistency_check
    }

    pub fn dynamic_path_creation(&self) -> DynamicPathCreation {
        self.settings.dynamic_path_creation
    }

    pub fn cocosio(&self) -> u8 {
        self.settings.cocosio
    }

    /// Absolute location of this handle within its structure
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Absolute location with indices replaced by the wildcard
    pub fn ulocation(&self) -> String {
        self.location.ulocation()
    }

    /// The tree behind this handle
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Turn consistency checking on or off
    ///
    /// Turning it on validates the whole tree first; on failure the flag
    /// stays off and the validation error is returned.
    pub fn set_consistency_check(&mut self, enabled: bool) -> OdsResult<()> {
        if enabled && !self.settings.consistency_check {
            self.validate()?;
        }
        self.settings.consistency_check = enabled;
        Ok(())
    }

    pub fn set_dynamic_path_creation(&mut self, policy: impl Into<DynamicPathCreation>) {
        self.settings.dynamic_path_creation = policy.into();
    }

    /// Switch data dictionary version, re-validating when checks are on
    pub fn set_imas_version(&mut self, version: &str) -> OdsResult<()> {
        let schema = schema::load_schema_from(version, self.schema_dir.as_deref())?;
        if self.settings.consistency_check {
            self.validate_against(&schema)?;
        }
        debug!(
            "Switched `{}` from {} to {}",
            self.location,
            self.schema.version(),
            schema.version()
        );
        self.schema = schema;
        Ok(())
    }

    /// Check every filled leaf against the schema, regardless of settings
    pub fn validate(&self) -> OdsResult<()> {
        self.validate_against(&self.schema)
    }

    fn validate_against(&self, schema: &Schema) -> OdsResult<()> {
        for rel in self.paths() {
            let abs = self.location.join(&rel);
            if let Some(dt @ (DataType::Structure | DataType::StructArray)) =
                schema_data_type(schema, abs.tokens())?
            {
                return Err(OdsError::Address(format!(
                    "`{}` holds a value but is a {} location",
                    abs, dt
                )));
            }
        }
        Ok(())
    }

    fn checked_data_type(&self, abs: &Path) -> OdsResult<Option<DataType>> {
        if self.settings.consistency_check {
            schema_data_type(&self.schema, abs.tokens())
        } else {
            Ok(None)
        }
    }

    /// Convention factor for a location, if the environment asks for one
    fn cocos_factor(&self, abs: &Path, inbound: bool) -> OdsResult<Option<f64>> {
        if self.settings.cocosio == INTERNAL_COCOS {
            return Ok(None);
        }
        let Some(label) = self.schema.entry(&abs.ulocation()).and_then(|e| e.cocos) else {
            return Ok(None);
        };
        let factor = if inbound {
            cocos::input_factor(self.settings.cocosio, label)?
        } else {
            cocos::output_factor(self.settings.cocosio, label)?
        };
        let is_error_bar = abs
            .last()
            .and_then(Token::as_name)
            .is_some_and(|name| name.ends_with(ERROR_UPPER) || name.ends_with(ERROR_LOWER));
        Ok(Some(if is_error_bar { factor.abs() } else { factor }))
    }

    // ------------------------------------------------------------------
    // resolution
    // ------------------------------------------------------------------

    /// Read-only pass of a write: concrete keys for every token
    fn resolve_for_write(&self, rel: &Path, target: Option<NodeKind>) -> OdsResult<Vec<Key>> {
        let policy = self.settings.dynamic_path_creation;
        let tokens = rel.tokens();
        let mut keys = Vec::with_capacity(tokens.len());
        let mut node = Some(&self.root);

        for (i, token) in tokens.iter().enumerate() {
            let here = render(&tokens[..i]);
            let wanted = if token.is_positional() {
                NodeKind::Sequence
            } else {
                NodeKind::Mapping
            };
            if let Some(current) = node {
                check_kind(current, wanted, &here)?;
            }

            let key = match token {
                Token::Name(name) => Key::Name(name.clone()),
                Token::Slice => {
                    return Err(OdsError::Address(format!(
                        "`{}`: slices can only be read",
                        rel
                    )));
                }
                Token::Append | Token::Index(_) => {
                    let len = match node {
                        Some(Node::Sequence(items)) => items.len(),
                        _ => 0,
                    };
                    let index = resolve_index(token, len, &here)?;
                    if (index > len && policy != DynamicPathCreation::DynamicArrayStructures)
                        || index.saturating_sub(len) > MAX_BACK_FILL
                    {
                        return Err(OdsError::Index {
                            path: here,
                            index: index as i64,
                            len,
                        });
                    }
                    Key::Index(index)
                }
            };

            let child = node.and_then(|n| n.child(&key));
            if child.is_none() && i + 1 < tokens.len() && !policy.is_enabled() {
                return Err(OdsError::Configuration(format!(
                    "dynamic path creation is off and `{}` does not exist",
                    render(&tokens[..=i])
                )));
            }
            node = child;
            keys.push(key);
        }

        if let (Some(existing), Some(kind)) = (node, target) {
            check_kind(existing, kind, &rel.to_string())?;
        }
        Ok(keys)
    }

    /// Mutating pass of a write; kinds were checked by [`Self::resolve_for_write`]
    fn write_node(&mut self, keys: &[Key], rel: &Path, new: Node) -> OdsResult<()> {
        let mut node = &mut self.root;
        for (i, key) in keys.iter().enumerate() {
            let here = rel.prefix(i);
            match key {
                Key::Name(name) => {
                    node.ensure_kind(NodeKind::Mapping, &here)?;
                    node = match node {
                        Node::Mapping(children) => children.entry(name.clone()).or_default(),
                        _ => return Err(OdsError::type_error(&here, "expected a mapping")),
                    };
                }
                Key::Index(index) => {
                    node.ensure_kind(NodeKind::Sequence, &here)?;
                    node = match node {
                        Node::Sequence(items) => {
                            if items.len() <= *index {
                                debug!("Growing `{}` to {} elements", here, index + 1);
                                items.resize_with(index + 1, Node::default);
                            }
                            &mut items[*index]
                        }
                        _ => return Err(OdsError::type_error(&here, "expected a sequence")),
                    };
                }
            }
        }
        *node = new;
        Ok(())
    }

    /// Keys of an existing node; never creates anything
    fn resolve_for_read(&self, rel: &Path) -> OdsResult<Vec<Key>> {
        let tokens = rel.tokens();
        let mut keys = Vec::with_capacity(tokens.len());
        let mut node = &self.root;

        for (i, token) in tokens.iter().enumerate() {
            let here = render(&tokens[..i]);
            let key = match token {
                Token::Name(name) => Key::Name(name.clone()),
                Token::Index(_) => {
                    let len = match node {
                        Node::Sequence(items) => items.len(),
                        _ => 0,
                    };
                    Key::Index(resolve_index(token, len, &here)?)
                }
                Token::Append => {
                    return Err(OdsError::Address(format!(
                        "`{}`: `+` can only be used when writing",
                        rel
                    )));
                }
                Token::Slice => {
                    return Err(OdsError::Address(format!(
                        "`{}`: slice reads must go through get()",
                        rel
                    )));
                }
            };

            match node.child(&key) {
                Some(child) => node = child,
                None => return Err(Self::missing(node, &key, &here, rel)),
            }
            keys.push(key);
        }
        Ok(keys)
    }

    fn missing(node: &Node, key: &Key, here: &str, rel: &Path) -> OdsError {
        match (node, key) {
            (Node::Leaf(_), _) => {
                OdsError::Address(format!("`{}` is a leaf and has no children", here))
            }
            (Node::Mapping(_), Key::Index(index)) if node.has_data() => OdsError::Address(format!(
                "`{}` is a mapping and cannot take index `{}`",
                here, index
            )),
            (Node::Sequence(_), Key::Name(name)) if node.has_data() => OdsError::Address(format!(
                "`{}` is a sequence and has no field `{}`",
                here, name
            )),
            (Node::Sequence(items), Key::Index(index)) if *index > items.len() => OdsError::Index {
                path: here.to_string(),
                index: *index as i64,
                len: items.len(),
            },
            _ => OdsError::MissingLeaf(rel.to_string()),
        }
    }

    // ------------------------------------------------------------------
    // writing
    // ------------------------------------------------------------------

    /// Write a value, creating intermediate nodes per the creation policy
    ///
    /// Uncertain values are stored as a nominal leaf plus an `_error_upper`
    /// sibling. The standard deviation is validated before anything is
    /// written, so a rejected pair leaves both leaves untouched.
    pub fn set<A: IntoAddress>(&mut self, path: A, value: impl Into<Value>) -> OdsResult<()> {
        let rel = path.into_path()?;
        self.set_value(&rel, value.into(), true)
    }

    /// Write a value as stored, bypassing input processing functions and
    /// coordinate convention transforms
    pub fn set_raw<A: IntoAddress>(&mut self, path: A, value: impl Into<Value>) -> OdsResult<()> {
        let rel = path.into_path()?;
        self.set_value(&rel, value.into(), false)
    }

    fn set_value(&mut self, rel: &Path, value: Value, transform: bool) -> OdsResult<()> {
        if rel.is_empty() {
            return Err(OdsError::Address(
                "a value cannot replace the root of a handle".to_string(),
            ));
        }
        if rel.has_slice() {
            return Err(OdsError::Address(format!(
                "`{}`: slices can only be read",
                rel
            )));
        }
        let abs = self.location.join(rel);
        let path_text = rel.to_string();

        let mut value = value;
        if transform {
            for process in &self.settings.input_data_process_functions {
                value = process(value);
            }
        }

        if is_code_parameters_location(abs.tokens())
            && let Value::Str(xml) = &value
        {
            self.checked_data_type(&abs)?;
            let tree = code_parameters::parse_xml(xml)?;
            return self.insert_node(rel, tree);
        }

        let data_type = self.checked_data_type(&abs)?;
        let (nominal, std_dev) = uncertain::split(value);
        if let Some(std_dev) = &std_dev {
            uncertain::validate_std_dev(std_dev, &path_text)?;
        }
        let (mut nominal, mut std_dev) = match data_type {
            Some(dt) if dt.is_data() => (
                nominal.coerce(dt, &path_text)?,
                std_dev.map(|s| s.coerce(dt, &path_text)).transpose()?,
            ),
            Some(dt) => {
                return Err(OdsError::type_error(
                    &path_text,
                    format!("a {} location cannot hold a {}", dt, nominal.kind_name()),
                ));
            }
            None => (nominal, std_dev),
        };

        if transform && let Some(factor) = self.cocos_factor(&abs, true)? {
            nominal = nominal.scale(factor);
            std_dev = std_dev.map(|s| s.scale(factor.abs()));
        }

        let keys = self.resolve_for_write(rel, Some(NodeKind::Leaf))?;
        let error_bar = match std_dev {
            Some(std_dev) => {
                let error_path = rel.with_name_suffix(ERROR_UPPER).ok_or_else(|| {
                    OdsError::Address(format!(
                        "`{}`: uncertain values need a named leaf",
                        rel
                    ))
                })?;
                let error_keys = self.resolve_for_write(&error_path, Some(NodeKind::Leaf))?;
                Some((error_path, error_keys, std_dev))
            }
            None => None,
        };

        self.write_node(&keys, rel, Node::Leaf(nominal))?;
        if let Some((error_path, error_keys, std_dev)) = error_bar {
            self.write_node(&error_keys, &error_path, Node::Leaf(std_dev))?;
        }
        Ok(())
    }

    fn insert_node(&mut self, rel: &Path, node: Node) -> OdsResult<()> {
        let keys = self.resolve_for_write(rel, node.kind())?;
        self.write_node(&keys, rel, node)
    }

    /// Insert a subtree, validating it at its new location
    pub fn set_subtree<A: IntoAddress>(&mut self, path: A, subtree: Ods) -> OdsResult<()> {
        let rel = path.into_path()?;
        if rel.has_slice() {
            return Err(OdsError::Address(format!(
                "`{}`: slices can only be read",
                rel
            )));
        }
        let abs = self.location.join(&rel);

        if self.settings.consistency_check {
            if !rel.is_empty() || !self.location.is_empty() {
                let data_type = schema_data_type(&self.schema, abs.tokens())?;
                if let (Some(dt), Some(kind)) = (data_type, subtree.root.kind())
                    && dt != DataType::CodeParameters
                    && dt.node_kind() != kind
                {
                    return Err(OdsError::type_error(
                        &abs,
                        format!("cannot place a {} at a {} location", kind, dt),
                    ));
                }
            }
            for leaf in subtree.paths() {
                schema_data_type(&self.schema, abs.join(&leaf).tokens())?;
            }
        }

        if rel.is_empty() {
            if let Some(kind) = subtree.root.kind() {
                check_kind(&self.root, kind, &render(&[]))?;
            }
            self.root = subtree.root;
            return Ok(());
        }
        self.insert_node(&rel, subtree.root)
    }

    /// Remove a node and everything below it
    ///
    /// Removing the last element of a sequence shortens it; removing any
    /// other element leaves an empty placeholder so positions never shift.
    pub fn delete<A: IntoAddress>(&mut self, path: A) -> OdsResult<()> {
        let rel = path.into_path()?;
        if rel.has_slice() {
            return Err(OdsError::Address(format!(
                "`{}`: slices can only be read",
                rel
            )));
        }
        let keys = self.resolve_for_read(&rel)?;
        let Some((last, parent_keys)) = keys.split_last() else {
            self.root = Node::Unset;
            return Ok(());
        };
        let parent = self
            .root
            .descend_mut(parent_keys)
            .ok_or_else(|| OdsError::MissingLeaf(rel.to_string()))?;

        match (parent, last) {
            (Node::Mapping(children), Key::Name(name)) => {
                children.remove(name);
                for suffix in [ERROR_UPPER, ERROR_LOWER] {
                    children.remove(&format!("{}{}", name, suffix));
                }
            }
            (Node::Sequence(items), Key::Index(index)) => {
                if index + 1 == items.len() {
                    items.pop();
                } else {
                    items[*index] = Node::Unset;
                }
            }
            _ => {}
        }
        debug!("Deleted `{}`", rel);
        Ok(())
    }

    // ------------------------------------------------------------------
    // reading
    // ------------------------------------------------------------------

    /// Read a value
    ///
    /// Reading never creates nodes. A path that ends on an unassigned but
    /// schema-valid location fails with [`OdsError::MissingLeaf`]; a path
    /// containing `:` returns the per-element values stacked by index; a
    /// pattern (`@...`) returns the value of the first matching filled path.
    pub fn get<A: IntoAddress>(&self, path: A) -> OdsResult<Value> {
        match path.into_address()? {
            Address::Path(rel) => self.read_value(&rel, true),
            Address::Pattern(pattern) => {
                for rel in self.paths() {
                    if pattern.matches(&rel.to_string()) {
                        return self.read_value(&rel, true);
                    }
                }
                Err(OdsError::Address(format!(
                    "no filled path matches `@{}`",
                    pattern.as_str()
                )))
            }
        }
    }

    /// Read a value, falling back to `default` when nothing is stored there
    pub fn get_or<A: IntoAddress>(&self, path: A, default: impl Into<Value>) -> OdsResult<Value> {
        match self.get(path) {
            Ok(value) => Ok(value),
            Err(e) if e.is_missing() || matches!(e, OdsError::Index { .. }) => Ok(default.into()),
            Err(e) => Err(e),
        }
    }

    /// Per-element values of a slice read, in index order
    pub fn get_slice<A: IntoAddress>(&self, path: A) -> OdsResult<Vec<Value>> {
        let rel = path.into_path()?;
        if !rel.has_slice() {
            return Err(OdsError::Address(format!("`{}` contains no `:`", rel)));
        }
        self.read_slice(&rel, true)
    }

    /// Stored value without uncertainty pairing or convention transforms
    pub fn get_raw<A: IntoAddress>(&self, path: A) -> OdsResult<Value> {
        let rel = path.into_path()?;
        self.raw_leaf(&rel).cloned()
    }

    fn raw_leaf(&self, rel: &Path) -> OdsResult<&Value> {
        let keys = self.resolve_for_read(rel)?;
        match self.root.descend(&keys) {
            Some(Node::Leaf(value)) => Ok(value),
            Some(Node::Unset) | None => Err(OdsError::MissingLeaf(rel.to_string())),
            Some(other) => Err(OdsError::Address(format!(
                "`{}` is a {}, not a leaf",
                rel,
                other.kind().map(|k| k.to_string()).unwrap_or_default()
            ))),
        }
    }

    fn read_value(&self, rel: &Path, transform: bool) -> OdsResult<Value> {
        if rel.has_slice() {
            let values = self.read_slice(rel, transform)?;
            return Value::stack(values, &rel.to_string());
        }

        let abs = self.location.join(rel);
        self.checked_data_type(&abs)?;

        let keys = self.resolve_for_read(rel)?;
        let node = self
            .root
            .descend(&keys)
            .ok_or_else(|| OdsError::MissingLeaf(rel.to_string()))?;

        match node {
            Node::Leaf(value) => {
                let mut value = value.clone();
                if let Some(error_path) = rel.with_name_suffix(ERROR_UPPER)
                    && let Ok(std_dev) = self.raw_leaf(&error_path)
                {
                    value = uncertain::combine(value, std_dev.clone(), &rel.to_string())?;
                }
                if transform && let Some(factor) = self.cocos_factor(&abs, false)? {
                    value = value.scale(factor);
                }
                Ok(value)
            }
            Node::Unset => Err(OdsError::MissingLeaf(rel.to_string())),
            Node::Mapping(_)
                if self.settings.raw_code_parameters && is_code_parameters_location(abs.tokens()) =>
            {
                Ok(Value::Str(code_parameters::to_xml(node)?))
            }
            other => Err(OdsError::Address(format!(
                "`{}` is a {}; use subtree() to read it",
                rel,
                other.kind().map(|k| k.to_string()).unwrap_or_default()
            ))),
        }
    }

    fn read_slice(&self, rel: &Path, transform: bool) -> OdsResult<Vec<Value>> {
        let tokens = rel.tokens();
        let Some(position) = tokens.iter().position(|t| *t == Token::Slice) else {
            return Ok(vec![self.read_value(rel, transform)?]);
        };
        let head = rel.prefix(position);
        let keys = self.resolve_for_read(&head)?;
        let len = match self.root.descend(&keys) {
            Some(Node::Sequence(items)) => items.len(),
            Some(Node::Unset) | None => 0,
            Some(other) => {
                return Err(OdsError::Address(format!(
                    "`{}` is a {} and cannot be sliced",
                    render(head.tokens()),
                    other.kind().map(|k| k.to_string()).unwrap_or_default()
                )));
            }
        };

        (0..len)
            .map(|index| {
                let mut element = head.tokens().to_vec();
                element.push(Token::Index(index as i64));
                element.extend(tokens[position + 1..].iter().cloned());
                self.read_value(&Path::from_tokens(element)?, transform)
            })
            .collect()
    }

    /// True when something is stored at the address; never creates nodes
    pub fn contains<A: IntoAddress>(&self, path: A) -> bool {
        match path.into_address() {
            Ok(Address::Path(rel)) => {
                !rel.has_slice()
                    && self
                        .resolve_for_read(&rel)
                        .ok()
                        .and_then(|keys| self.root.descend(&keys))
                        .is_some_and(|node| node.kind().is_some())
            }
            Ok(Address::Pattern(pattern)) => self
                .paths()
                .iter()
                .any(|rel| pattern.matches(&rel.to_string())),
            Err(_) => false,
        }
    }

    /// Handle over the subtree at `path`
    ///
    /// The handle is an independent copy carrying this handle's settings and
    /// its absolute location, so schema checks keep working inside it. Insert
    /// it back with [`Ods::set_subtree`].
    pub fn subtree<A: IntoAddress>(&self, path: A) -> OdsResult<Ods> {
        let rel = path.into_path()?;
        if rel.has_slice() {
            return Err(OdsError::Address(format!(
                "`{}`: use get() for slice reads",
                rel
            )));
        }
        let abs = self.location.join(&rel);
        if let Some(dt) = self.checked_data_type(&abs)?
            && dt.is_data()
        {
            return Err(OdsError::Address(format!(
                "`{}` is a {} leaf; use get() to read it",
                rel, dt
            )));
        }

        let keys = self.resolve_for_write(&rel, None)?;
        let root = match self.root.descend(&keys) {
            Some(Node::Leaf(_)) => {
                return Err(OdsError::Address(format!(
                    "`{}` is a leaf; use get() to read it",
                    rel
                )));
            }
            Some(node) => node.clone(),
            None if self.settings.dynamic_path_creation.is_enabled() => Node::Unset,
            None => return Err(OdsError::MissingLeaf(rel.to_string())),
        };

        let location = self
            .location
            .join(&Path::from_tokens(keys.into_iter().map(Token::from))?);
        Ok(Self::from_parts(
            root,
            location,
            Arc::clone(&self.schema),
            self.schema_dir.clone(),
            self.settings.clone(),
        ))
    }

    /// Deep copy; the copy shares no mutable storage with `self`
    pub fn copy(&self) -> Ods {
        self.clone()
    }

    // ------------------------------------------------------------------
    // traversal
    // ------------------------------------------------------------------

    /// Immediate children of this handle, names sorted, positions ascending
    pub fn keys(&self) -> Vec<Key> {
        self.root.keys()
    }

    /// Immediate children of the node at `path`
    pub fn keys_at<A: IntoAddress>(&self, path: A) -> OdsResult<Vec<Key>> {
        let rel = path.into_path()?;
        let keys = self.resolve_for_read(&rel)?;
        Ok(self
            .root
            .descend(&keys)
            .map(Node::keys)
            .unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Every path holding a value, depth first
    ///
    /// Mapping children are visited in name order and sequence elements in
    /// index order, so parents always precede their descendants and the
    /// order is stable across identical trees.
    pub fn paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        self.root.collect_paths(&mut Vec::new(), &mut out);
        out
    }

    /// Single-level view from path string to stored value
    pub fn flat(&self) -> BTreeMap<String, Value> {
        self.paths()
            .into_iter()
            .filter_map(|rel| {
                let value = self.raw_leaf(&rel).ok()?.clone();
                Some((rel.to_string(), value))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // schema information
    // ------------------------------------------------------------------

    /// Schema entry for a path
    pub fn info<A: IntoAddress>(&self, path: A) -> OdsResult<SchemaEntry> {
        let rel = path.into_path()?;
        let abs = self.location.join(&rel);
        schema_data_type(&self.schema, abs.tokens())?;
        let location = abs.ulocation();
        self.schema
            .entry(&location)
            .cloned()
            .ok_or_else(|| OdsError::SchemaLookup {
                location,
                version: self.schema.version().to_string(),
            })
    }

    /// Filled coordinate paths referenced by the filled leaves
    pub fn list_coordinates(&self) -> BTreeSet<String> {
        let mut coordinates = BTreeSet::new();
        for rel in self.paths() {
            let abs = self.location.join(&rel);
            let Some(entry) = self.schema.entry(&abs.ulocation()) else {
                continue;
            };
            let indices: Vec<&Token> = abs.tokens().iter().filter(|t| t.is_positional()).collect();

            for coordinate in &entry.coordinates {
                if coordinate.starts_with("1...") {
                    continue;
                }
                let mut next_index = indices.iter();
                let tokens: Option<Vec<Token>> = coordinate
                    .split('.')
                    .map(|part| {
                        if part == WILDCARD {
                            next_index.next().map(|t| (*t).clone())
                        } else {
                            Some(Token::Name(part.to_string()))
                        }
                    })
                    .collect();
                let Some(coordinate) = tokens.and_then(|t| Path::from_tokens(t).ok()) else {
                    continue;
                };
                if !coordinate.starts_with(&self.location) {
                    continue;
                }
                let coordinate = coordinate.tokens()[self.location.len()..].to_vec();
                if let Ok(coordinate) = Path::from_tokens(coordinate)
                    && self.raw_leaf(&coordinate).is_ok()
                {
                    coordinates.insert(coordinate.to_string());
                }
            }
        }
        coordinates
    }
}
