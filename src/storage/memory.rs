//! In-process database backend
//!
//! Behaves like the external databases the save protocol targets: the
//! session must be open, and every array of structures must be allocated
//! with enough room before an indexed leaf below it can be written.

use std::collections::HashMap;

use crate::error::{OdsError, OdsResult};
use crate::path::{Path, Token};
use crate::value::Value;

use super::Backend;

/// Database kept in memory for the lifetime of the value
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    name: String,
    open: bool,
    arrays: HashMap<Path, usize>,
    order: Vec<Path>,
    fields: HashMap<Path, Value>,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Allocated size of an array of structures
    pub fn allocated(&self, path: &Path) -> Option<usize> {
        self.arrays.get(path).copied()
    }

    /// Number of stored fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Store a field directly, bypassing allocation checks
    pub fn insert(&mut self, path: Path, value: Value) {
        if !self.fields.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.fields.insert(path, value);
    }

    fn error(&self, reason: impl std::fmt::Display) -> OdsError {
        OdsError::Backend(format!("{}: {}", self.name, reason))
    }

    fn ensure_open(&self) -> OdsResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(self.error("session is not open"))
        }
    }

    fn check_allocation(&self, path: &Path) -> OdsResult<()> {
        for (position, token) in path.tokens().iter().enumerate() {
            let index = match token {
                Token::Index(index) => *index,
                Token::Name(_) => continue,
                other => return Err(self.error(format!("`{}` is not a concrete index in `{}`", other, path))),
            };
            let array = path.prefix(position);
            let len = self
                .allocated(&array)
                .ok_or_else(|| self.error(format!("`{}` was not allocated", array)))?;
            if index < 0 || index as usize >= len {
                return Err(self.error(format!(
                    "index {} is outside the {} allocated elements of `{}`",
                    index, len, array
                )));
            }
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> OdsResult<()> {
        if self.open {
            return Err(self.error("session is already open"));
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> OdsResult<()> {
        self.ensure_open()?;
        self.open = false;
        Ok(())
    }

    fn allocate(&mut self, path: &Path, len: usize) -> OdsResult<()> {
        self.ensure_open()?;
        let size = self.arrays.entry(path.clone()).or_default();
        *size = (*size).max(len);
        Ok(())
    }

    fn write(&mut self, path: &Path, value: &Value) -> OdsResult<()> {
        self.ensure_open()?;
        self.check_allocation(path)?;
        self.insert(path.clone(), value.clone());
        Ok(())
    }

    fn read(&mut self, path: &Path) -> OdsResult<Option<Value>> {
        self.ensure_open()?;
        Ok(self.fields.get(path).cloned())
    }

    fn filled_paths(&mut self) -> OdsResult<Vec<Path>> {
        self.ensure_open()?;
        Ok(self.order.clone())
    }
}
