//! Address parsing
//!
//! Converts every supported surface syntax for an ODS location into one
//! canonical sequence of [`Token`]s:
//!
//! - dotted strings: `"equilibrium.time_slice.0.global_quantities.ip"`
//! - bracket indices: `"equilibrium.time_slice[0].global_quantities.ip"`
//! - token lists: `tokens!["equilibrium", "time_slice", 0, "global_quantities.ip"]`
//! - the append marker `+` (new element at the current length)
//! - negative indices (counted from the end)
//! - the slice marker `:` or `[:]` (every element, read-only)
//!
//! Negative indices and the append marker are kept symbolic here; the
//! container resolves them against the current sequence length.
//!
//! A leading `@` turns a string into a [`Pattern`] query instead of a path.

pub mod pattern;

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OdsError, OdsResult};

pub use pattern::Pattern;

/// Wildcard used in place of indices in schema locations
pub const WILDCARD: &str = ":";

/// Marker for "new element at the current length"
pub const APPEND: &str = "+";

static NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").unwrap());

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Token {
    /// Field of a mapping node
    Name(String),
    /// Position in a sequence node; negative values count from the end
    Index(i64),
    /// New element at the current length of the sequence
    Append,
    /// Every element of the sequence
    Slice,
}

impl Token {
    /// Name of the field, if this is a field token
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Token::Name(name) => Some(name),
            _ => None,
        }
    }

    /// True for tokens that address sequence positions
    pub fn is_positional(&self) -> bool {
        !matches!(self, Token::Name(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => f.write_str(name),
            Token::Index(index) => write!(f, "{}", index),
            Token::Append => f.write_str(APPEND),
            Token::Slice => f.write_str(WILDCARD),
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Name(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Name(s)
    }
}

impl From<i64> for Token {
    fn from(i: i64) -> Self {
        Token::Index(i)
    }
}

impl From<i32> for Token {
    fn from(i: i32) -> Self {
        Token::Index(i as i64)
    }
}

impl From<usize> for Token {
    fn from(i: usize) -> Self {
        Token::Index(i as i64)
    }
}

impl From<Key> for Token {
    fn from(key: Key) -> Self {
        match key {
            Key::Name(name) => Token::Name(name),
            Key::Index(index) => Token::Index(index as i64),
        }
    }
}

/// Build a `Vec<Token>` from mixed names and indices
///
/// ```
/// use omas::tokens;
/// use omas::path::Path;
///
/// let path = Path::from_tokens(tokens!["equilibrium", "time_slice", 1, "time"]).unwrap();
/// assert_eq!(path.to_string(), "equilibrium.time_slice.1.time");
/// ```
#[macro_export]
macro_rules! tokens {
    ($($tok:expr),* $(,)?) => {
        vec![$($crate::path::Token::from($tok)),*]
    };
}

/// A resolved child key: a field name or a concrete non-negative position
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Canonical path: an ordered sequence of tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Path(Vec<Token>);

impl Path {
    /// The empty path, addressing the node a handle points at
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Parse a dotted/bracket path string
    ///
    /// # Examples
    ///
    /// ```
    /// use omas::path::Path;
    ///
    /// let a = Path::parse("equilibrium.time_slice[1].time").unwrap();
    /// let b = Path::parse("equilibrium.time_slice.1.time").unwrap();
    /// assert_eq!(a, b);
    /// assert!(Path::parse("equilibrium.time_slice[1.time").is_err());
    /// ```
    pub fn parse(input: &str) -> OdsResult<Self> {
        let input = input.trim();
        let mut tokens = Vec::new();
        if input.is_empty() {
            return Ok(Path(tokens));
        }
        for segment in split_segments(input)? {
            parse_segment(input, segment, &mut tokens)?;
        }
        Ok(Path(tokens))
    }

    /// Build a path from tokens, re-parsing names that carry path syntax
    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> OdsResult<Self> {
        let mut out = Vec::new();
        for token in tokens {
            match token {
                Token::Name(name) => {
                    if NAME_REGEX.is_match(&name) {
                        out.push(Token::Name(name));
                    } else if name.trim().is_empty() {
                        return Err(OdsError::Address("empty field name".to_string()));
                    } else {
                        out.extend(Path::parse(&name)?.0);
                    }
                }
                other => out.push(other),
            }
        }
        Ok(Path(out))
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Token> {
        self.0.last()
    }

    pub fn push(&mut self, token: Token) {
        self.0.push(token);
    }

    /// Path without its last token
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Concatenate two paths
    pub fn join(&self, other: &Path) -> Path {
        let mut tokens = self.0.clone();
        tokens.extend(other.0.iter().cloned());
        Path(tokens)
    }

    /// Append one token, returning a new path
    pub fn child(&self, token: impl Into<Token>) -> Path {
        let mut tokens = self.0.clone();
        tokens.push(token.into());
        Path(tokens)
    }

    /// First `n` tokens
    pub fn prefix(&self, n: usize) -> Path {
        Path(self.0[..n.min(self.0.len())].to_vec())
    }

    pub fn starts_with(&self, other: &Path) -> bool {
        self.0.starts_with(&other.0)
    }

    pub fn has_slice(&self) -> bool {
        self.0.contains(&Token::Slice)
    }

    /// Schema location: every positional token replaced by the wildcard
    pub fn ulocation(&self) -> String {
        ulocation_of(&self.0)
    }

    /// Same path with `suffix` appended to the final field name
    pub fn with_name_suffix(&self, suffix: &str) -> Option<Path> {
        match self.0.last() {
            Some(Token::Name(name)) => {
                let mut tokens = self.0.clone();
                let last = tokens.len() - 1;
                tokens[last] = Token::Name(format!("{}{}", name, suffix));
                Some(Path(tokens))
            }
            _ => None,
        }
    }
}

/// Wildcard location for a token slice
pub(crate) fn ulocation_of(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| match t {
            Token::Name(name) => name.as_str(),
            _ => WILDCARD,
        })
        .collect::<Vec<_>>()
        .join(".")
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for token in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            first = false;
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for Path {
    type Error = OdsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Path::parse(&s)
    }
}

impl std::str::FromStr for Path {
    type Err = OdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

/// Split on `.` outside of bracket groups
fn split_segments(input: &str) -> OdsResult<Vec<&str>> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '[' => {
                if depth > 0 {
                    return Err(OdsError::Address(format!(
                        "nested brackets are not allowed in `{}`",
                        input
                    )));
                }
                depth += 1;
            }
            ']' => {
                if depth == 0 {
                    return Err(OdsError::Address(format!(
                        "unbalanced `]` in `{}`",
                        input
                    )));
                }
                depth -= 1;
            }
            '.' if depth == 0 => {
                segments.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(OdsError::Address(format!("unclosed `[` in `{}`", input)));
    }
    segments.push(&input[start..]);
    Ok(segments)
}

fn parse_segment(input: &str, segment: &str, tokens: &mut Vec<Token>) -> OdsResult<()> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err(OdsError::Address(format!("empty segment in `{}`", input)));
    }

    let (base, mut rest) = match segment.find('[') {
        Some(pos) => (&segment[..pos], &segment[pos..]),
        None => (segment, ""),
    };

    if !base.is_empty() {
        tokens.push(classify(input, base)?);
    }

    while !rest.is_empty() {
        let close = match (rest.starts_with('['), rest.find(']')) {
            (true, Some(close)) => close,
            _ => {
                return Err(OdsError::Address(format!(
                    "unexpected `{}` after index in `{}`",
                    rest, input
                )));
            }
        };
        let content = rest[1..close].trim();
        let token = match classify(input, content)? {
            Token::Name(_) => {
                return Err(OdsError::Address(format!(
                    "brackets must hold an index, `+` or `:` in `{}`",
                    input
                )));
            }
            other => other,
        };
        tokens.push(token);
        rest = &rest[close + 1..];
    }
    Ok(())
}

fn classify(input: &str, text: &str) -> OdsResult<Token> {
    match text {
        "" => Err(OdsError::Address(format!("empty index in `{}`", input))),
        APPEND => Ok(Token::Append),
        WILDCARD => Ok(Token::Slice),
        _ => {
            if let Ok(index) = text.parse::<i64>() {
                Ok(Token::Index(index))
            } else if NAME_REGEX.is_match(text) {
                Ok(Token::Name(text.to_string()))
            } else {
                Err(OdsError::Address(format!(
                    "invalid segment `{}` in `{}`",
                    text, input
                )))
            }
        }
    }
}

/// A parsed address: a concrete path or a pattern query
#[derive(Debug, Clone)]
pub enum Address {
    Path(Path),
    Pattern(Pattern),
}

/// Anything that can be used to address an ODS
pub trait IntoAddress {
    fn into_address(self) -> OdsResult<Address>;

    /// Parse as a plain path, rejecting pattern queries
    fn into_path(self) -> OdsResult<Path>
    where
        Self: Sized,
    {
        match self.into_address()? {
            Address::Path(path) => Ok(path),
            Address::Pattern(pattern) => Err(OdsError::Address(format!(
                "pattern `@{}` can only be used for reading",
                pattern.as_str()
            ))),
        }
    }
}

impl IntoAddress for &str {
    fn into_address(self) -> OdsResult<Address> {
        match self.trim().strip_prefix('@') {
            Some(pattern) => Ok(Address::Pattern(Pattern::new(pattern)?)),
            None => Ok(Address::Path(Path::parse(self)?)),
        }
    }
}

impl IntoAddress for String {
    fn into_address(self) -> OdsResult<Address> {
        self.as_str().into_address()
    }
}

impl IntoAddress for &String {
    fn into_address(self) -> OdsResult<Address> {
        self.as_str().into_address()
    }
}

impl IntoAddress for Path {
    fn into_address(self) -> OdsResult<Address> {
        Ok(Address::Path(self))
    }
}

impl IntoAddress for &Path {
    fn into_address(self) -> OdsResult<Address> {
        Ok(Address::Path(self.clone()))
    }
}

impl IntoAddress for Vec<Token> {
    fn into_address(self) -> OdsResult<Address> {
        Ok(Address::Path(Path::from_tokens(self)?))
    }
}

impl IntoAddress for &[Token] {
    fn into_address(self) -> OdsResult<Address> {
        Ok(Address::Path(Path::from_tokens(self.iter().cloned())?))
    }
}

impl<const N: usize> IntoAddress for [Token; N] {
    fn into_address(self) -> OdsResult<Address> {
        Ok(Address::Path(Path::from_tokens(self)?))
    }
}
