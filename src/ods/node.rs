//! Tree nodes
//!
//! A node starts [`Node::Unset`] and becomes a mapping, a sequence or a leaf
//! on first write. Once it holds data its kind is fixed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{OdsError, OdsResult};
use crate::path::{Key, Path, Token};
use crate::value::Value;

/// The three shapes a populated node can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Mapping,
    Sequence,
    Leaf,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Mapping => f.write_str("mapping"),
            NodeKind::Sequence => f.write_str("sequence"),
            NodeKind::Leaf => f.write_str("leaf"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Node {
    #[default]
    Unset,
    Mapping(BTreeMap<String, Node>),
    Sequence(Vec<Node>),
    Leaf(Value),
}

impl Node {
    /// Empty node of the given kind
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Mapping => Node::Mapping(BTreeMap::new()),
            NodeKind::Sequence => Node::Sequence(Vec::new()),
            NodeKind::Leaf => Node::Unset,
        }
    }

    pub fn kind(&self) -> Option<NodeKind> {
        match self {
            Node::Unset => None,
            Node::Mapping(_) => Some(NodeKind::Mapping),
            Node::Sequence(_) => Some(NodeKind::Sequence),
            Node::Leaf(_) => Some(NodeKind::Leaf),
        }
    }

    /// True when some leaf below (or at) this node holds a value
    pub fn has_data(&self) -> bool {
        match self {
            Node::Unset => false,
            Node::Leaf(_) => true,
            Node::Mapping(children) => children.values().any(Node::has_data),
            Node::Sequence(items) => items.iter().any(Node::has_data),
        }
    }

    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Node::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// Number of immediate children
    pub fn len(&self) -> usize {
        match self {
            Node::Mapping(children) => children.len(),
            Node::Sequence(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Immediate children, names sorted and positions ascending
    pub fn keys(&self) -> Vec<Key> {
        match self {
            Node::Mapping(children) => children.keys().cloned().map(Key::Name).collect(),
            Node::Sequence(items) => (0..items.len()).map(Key::Index).collect(),
            _ => Vec::new(),
        }
    }

    pub fn child(&self, key: &Key) -> Option<&Node> {
        match (self, key) {
            (Node::Mapping(children), Key::Name(name)) => children.get(name),
            (Node::Sequence(items), Key::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, key: &Key) -> Option<&mut Node> {
        match (self, key) {
            (Node::Mapping(children), Key::Name(name)) => children.get_mut(name),
            (Node::Sequence(items), Key::Index(index)) => items.get_mut(*index),
            _ => None,
        }
    }

    /// Descend along resolved keys
    pub fn descend(&self, keys: &[Key]) -> Option<&Node> {
        keys.iter().try_fold(self, |node, key| node.child(key))
    }

    pub fn descend_mut(&mut self, keys: &[Key]) -> Option<&mut Node> {
        keys.iter().try_fold(self, |node, key| node.child_mut(key))
    }

    /// Make this node `kind`, allowed only while it holds no data
    pub fn ensure_kind(&mut self, kind: NodeKind, path: &Path) -> OdsResult<()> {
        match self.kind() {
            Some(current) if current == kind => Ok(()),
            Some(current) if self.has_data() => Err(OdsError::type_error(
                path,
                format!("cannot turn a populated {} into a {}", current, kind),
            )),
            _ => {
                *self = Node::empty(kind);
                Ok(())
            }
        }
    }

    /// Filled leaf paths below this node, appended to `out` in traversal order
    pub(crate) fn collect_paths(&self, prefix: &mut Vec<Token>, out: &mut Vec<Path>) {
        match self {
            Node::Unset => {}
            Node::Leaf(_) => {
                if let Ok(path) = Path::from_tokens(prefix.iter().cloned()) {
                    out.push(path);
                }
            }
            Node::Mapping(children) => {
                for (name, child) in children {
                    prefix.push(Token::Name(name.clone()));
                    child.collect_paths(prefix, out);
                    prefix.pop();
                }
            }
            Node::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    prefix.push(Token::Index(index as i64));
                    item.collect_paths(prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}
