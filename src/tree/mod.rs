//! Parameter tree subsystem.
//!
//! # Data Flow
//! ```text
//! query string / X-YT-Parameters / request body
//!     → json.rs (decode binary-safe strings and attributes)
//!     → Node / Tree (typed, per request)
//!     → text.rs (canonical text form for the engine and logs)
//! ```
//!
//! # Design Decisions
//! - Strings are byte strings; UTF-8 is not assumed for values
//! - Maps are ordered by key so merged trees compare and print deterministically
//! - Attributes are a property of a value, not of the map holding it

pub mod json;
pub mod text;

use std::collections::BTreeMap;

pub use json::{decode, decode_map, encode, DecodeError};

/// Ordered string-keyed map of nodes.
pub type Tree = BTreeMap<String, Node>;

/// A typed value of a parameter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Null-like value, printed as `#`.
    Entity,
    Boolean(bool),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    /// Binary-safe string.
    String(Vec<u8>),
    List(Vec<Node>),
    Map(Tree),
    /// A value annotated with its own attribute map.
    Attributed { value: Box<Node>, attributes: Tree },
}

impl Node {
    /// Attach attributes to a value. Empty attribute maps leave the value bare.
    pub fn with_attributes(value: Node, attributes: Tree) -> Node {
        if attributes.is_empty() {
            return value;
        }
        match value {
            Node::Attributed { value, attributes: mut existing } => {
                existing.extend(attributes);
                Node::Attributed { value, attributes: existing }
            }
            value => Node::Attributed {
                value: Box::new(value),
                attributes,
            },
        }
    }

    /// The value with any attributes stripped.
    pub fn value(&self) -> &Node {
        match self {
            Node::Attributed { value, .. } => value.value(),
            other => other,
        }
    }

    /// Attributes of this node, if any.
    pub fn attributes(&self) -> Option<&Tree> {
        match self {
            Node::Attributed { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    /// Borrow the string payload as UTF-8, if this is a textual string.
    pub fn as_str(&self) -> Option<&str> {
        match self.value() {
            Node::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Tree> {
        match self.value() {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::String(value.as_bytes().to_vec())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::String(value.into_bytes())
    }
}

impl From<Vec<u8>> for Node {
    fn from(value: Vec<u8>) -> Self {
        Node::String(value)
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Boolean(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Int64(value)
    }
}

impl From<Tree> for Node {
    fn from(value: Tree) -> Self {
        Node::Map(value)
    }
}

/// Shallow union of trees: later trees overwrite earlier ones key by key.
///
/// A key present in a later tree replaces the earlier value entirely,
/// nested maps included.
pub fn merge<I>(layers: I) -> Tree
where
    I: IntoIterator<Item = Tree>,
{
    let mut merged = Tree::new();
    for layer in layers {
        merged.extend(layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(pairs: &[(&str, &str)]) -> Tree {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Node::from(*v)))
            .collect()
    }

    #[test]
    fn merge_respects_layer_order() {
        let merged = merge([
            tree(&[("a1", "foo"), ("a2", "bar"), ("a3", "baz")]),
            tree(&[("a2", "xyz"), ("a3", "www"), ("a4", "abc")]),
            tree(&[("a3", "pooh"), ("a4", "puff"), ("a5", "blah")]),
        ]);

        assert_eq!(
            merged,
            tree(&[
                ("a1", "foo"),
                ("a2", "xyz"),
                ("a3", "pooh"),
                ("a4", "puff"),
                ("a5", "blah"),
            ])
        );
    }

    #[test]
    fn merge_is_shallow() {
        let mut low = Tree::new();
        low.insert("options".into(), Node::Map(tree(&[("a", "1"), ("b", "2")])));
        let mut high = Tree::new();
        high.insert("options".into(), Node::Map(tree(&[("c", "3")])));

        let merged = merge([low, high]);
        assert_eq!(merged["options"], Node::Map(tree(&[("c", "3")])));
    }

    #[test]
    fn empty_attributes_leave_value_bare() {
        let node = Node::with_attributes(Node::from("yson"), Tree::new());
        assert_eq!(node, Node::from("yson"));
        assert!(node.attributes().is_none());
    }
}
