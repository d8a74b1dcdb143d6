//! Parameter sources.
//!
//! Each source yields a flat tree; `negotiate` merges them in precedence order.

use crate::tree::{self, DecodeError, Node, Tree};

/// Query string parameters. Values are plain strings; a repeated key keeps the last value.
pub fn from_query(query: &str) -> Tree {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), Node::from(value.into_owned())))
        .collect()
}

/// Parameters carried as a JSON tree in a header.
pub fn from_header(value: &[u8]) -> Result<Tree, DecodeError> {
    tree::decode_map(value)
}

/// Parameters carried as a JSON tree in a POST body. An empty body means none.
pub fn from_body(body: &[u8]) -> Result<Tree, DecodeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Tree::new());
    }
    tree::decode_map(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_decoded_strings() {
        let params = from_query("path=%2F%2Fhome&recursive=true&path=%2F%2Ftmp");
        assert_eq!(params.get("path").and_then(Node::as_str), Some("//tmp"));
        assert_eq!(params.get("recursive").and_then(Node::as_str), Some("true"));
    }

    #[test]
    fn blank_body_has_no_parameters() {
        assert!(from_body(b"").unwrap().is_empty());
        assert!(from_body(b" \n").unwrap().is_empty());
        assert_eq!(from_body(br#"{"a":1}"#).unwrap().len(), 1);
    }

    #[test]
    fn non_map_documents_are_rejected() {
        assert!(from_header(b"[1,2]").is_err());
        assert!(from_body(b"not json").is_err());
    }
}
