//! Restricted pattern matching over canonical path strings
//!
//! Patterns are written after a leading `@` (e.g. `@eq.*1.*.ip`):
//!
//! - `.*` directly followed by text matches any run of characters,
//!   separators included (`eq.*1` matches `equilibrium.time_slice.1`)
//! - a `*` segment matches exactly one segment (`coil.*.name`)
//! - `*` inside a segment matches within that segment
//! - everything else matches literally
//!
//! A pattern must match a whole path. This is a lookup convenience, not a
//! query language.

use regex::Regex;

use crate::error::{OdsError, OdsResult};

#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> OdsResult<Self> {
        let source = pattern.trim();
        if source.is_empty() {
            return Err(OdsError::Address("empty pattern".to_string()));
        }

        let mut body = String::new();
        for (i, segment) in source.split('.').enumerate() {
            let (separator, segment) = match segment.strip_prefix('*') {
                Some(rest) if i > 0 && !rest.is_empty() => (".*", rest),
                _ if i > 0 => (r"\.", segment),
                _ => ("", segment),
            };
            body.push_str(separator);
            body.push_str(&regex::escape(segment).replace(r"\*", "[^.]*"));
        }

        let regex = Regex::new(&format!("^{}$", body))
            .map_err(|e| OdsError::Address(format!("invalid pattern `{}`: {}", source, e)))?;

        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}
