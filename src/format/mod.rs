//! Data format specifications.
//!
//! # Responsibilities
//! - Represent a format as a name plus attributes
//! - Convert to and from the tree form carried by `X-YT-*-Format` headers
//! - Provide per-data-type defaults and their MIME types
//!
//! # Design Decisions
//! - The format name is validated against the engine registry elsewhere;
//!   here any string is a syntactically valid name

pub mod mime;

use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::engine::DataType;
use crate::tree::{self, Node, Tree};

pub use mime::{format_for_content_type, format_for_mime, negotiate_accept, MimeError};

/// A named data encoding with optional attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    name: String,
    attributes: Tree,
}

/// Errors from parsing a format specification.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("malformed format specification: {0}")]
    Malformed(#[from] tree::DecodeError),

    #[error("format specification must be a string, found {0}")]
    NotAString(String),
}

impl Format {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Tree::new(),
        }
    }

    /// Add an attribute, builder style.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Node>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Tree {
        &self.attributes
    }

    /// Parse the JSON form used by override headers: `"yson"` or
    /// `{"$value": "yson", "$attributes": {...}}`.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(tree::DecodeError::from)?;
        Self::from_node(tree::decode(value)?)
    }

    pub fn from_node(node: Node) -> Result<Self, FormatError> {
        let attributes = node.attributes().cloned().unwrap_or_default();
        match node.as_str() {
            Some(name) => Ok(Self {
                name: name.to_string(),
                attributes,
            }),
            None => Err(FormatError::NotAString(node.value().to_string())),
        }
    }

    pub fn to_node(&self) -> Node {
        Node::with_attributes(Node::from(self.name.as_str()), self.attributes.clone())
    }

    /// Default format for a command data type, with the MIME type it is served as.
    pub fn default_for(data_type: DataType) -> (Format, Option<&'static str>) {
        match data_type {
            DataType::Structured => (Format::new("json"), Some("application/json")),
            DataType::Tabular => (
                Format::new("yson").with_attribute("format", "text"),
                Some("application/x-yt-yson-text"),
            ),
            DataType::Binary => (Format::new("yson"), Some("application/octet-stream")),
            DataType::None => (Format::new("json"), None),
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_node())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_per_data_type() {
        assert_eq!(Format::default_for(DataType::Structured).0.to_string(), r#""json""#);
        assert_eq!(
            Format::default_for(DataType::Tabular).0.to_string(),
            r#"<"format"="text">"yson""#
        );
        assert_eq!(Format::default_for(DataType::Binary).0.to_string(), r#""yson""#);
    }

    #[test]
    fn parses_attributed_override() {
        let format = Format::parse(r#"{"$attributes":{"foo":"bar"},"$value":"yson"}"#).unwrap();
        assert_eq!(format.name(), "yson");
        assert_eq!(format.to_string(), r#"<"foo"="bar">"yson""#);
    }

    #[test]
    fn rejects_garbage_and_non_strings() {
        assert!(matches!(
            Format::parse("i-am-a-cool-hacker666{}[]"),
            Err(FormatError::Malformed(_))
        ));
        assert!(matches!(Format::parse("42"), Err(FormatError::NotAString(_))));
    }
}
