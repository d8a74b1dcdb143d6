//! JSON representation of parameter trees.
//!
//! JSON has neither byte strings nor attributes, so two conventions are layered on top:
//! - A string starting with `&` carries base64-encoded bytes (keys and values).
//! - An object holding only `$value` and `$attributes` is an attributed value.
//!   Inside a regular object a sibling key `$name` holds the attributes of `name`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::{Node, Tree};

const BINARY_SIGIL: char = '&';
const ATTRIBUTE_SIGIL: char = '$';
const VALUE_KEY: &str = "$value";
const ATTRIBUTES_KEY: &str = "$attributes";

/// Errors produced while decoding a JSON tree.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("expected a map, found {0}")]
    NotAMap(&'static str),

    #[error("invalid binary string {text:?}")]
    Binary {
        text: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("map key is not valid UTF-8 after decoding {0:?}")]
    NonUtf8Key(String),

    #[error("\"$attributes\" must be a map")]
    AttributesNotAMap,

    #[error("attributes given for missing key {0:?}")]
    DanglingAttributes(String),
}

/// Decode a JSON value into a node.
pub fn decode(value: Value) -> Result<Node, DecodeError> {
    match value {
        Value::Null => Ok(Node::Entity),
        Value::Bool(b) => Ok(Node::Boolean(b)),
        Value::Number(n) => Ok(decode_number(&n)),
        Value::String(s) => decode_string(s).map(Node::String),
        Value::Array(items) => items
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()
            .map(Node::List),
        Value::Object(object) => decode_object(object),
    }
}

/// Decode a JSON document that must be a map (possibly attributed).
pub fn decode_map(text: &[u8]) -> Result<Tree, DecodeError> {
    let value: Value = serde_json::from_slice(text)?;
    match decode(value)? {
        Node::Map(map) => Ok(map),
        Node::Attributed { value, .. } => match *value {
            Node::Map(map) => Ok(map),
            other => Err(DecodeError::NotAMap(kind(&other))),
        },
        other => Err(DecodeError::NotAMap(kind(&other))),
    }
}

/// Encode a node as JSON using the binary and attribute conventions.
pub fn encode(node: &Node) -> Value {
    match node {
        Node::Entity => Value::Null,
        Node::Boolean(b) => Value::Bool(*b),
        Node::Int64(i) => Value::from(*i),
        Node::Uint64(u) => Value::from(*u),
        Node::Double(d) => Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null),
        Node::String(bytes) => Value::String(encode_string(bytes, false)),
        Node::List(items) => Value::Array(items.iter().map(encode).collect()),
        Node::Map(map) => Value::Object(encode_tree(map)),
        Node::Attributed { value, attributes } => {
            let mut object = Map::new();
            object.insert(ATTRIBUTES_KEY.to_string(), Value::Object(encode_tree(attributes)));
            object.insert(VALUE_KEY.to_string(), encode(value));
            Value::Object(object)
        }
    }
}

fn encode_tree(tree: &Tree) -> Map<String, Value> {
    tree.iter()
        .map(|(key, value)| (encode_string(key.as_bytes(), true), encode(value)))
        .collect()
}

fn encode_string(bytes: &[u8], is_key: bool) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text)
            if !text.starts_with(BINARY_SIGIL)
                && !(is_key && text.starts_with(ATTRIBUTE_SIGIL)) =>
        {
            text.to_string()
        }
        _ => format!("{}{}", BINARY_SIGIL, STANDARD.encode(bytes)),
    }
}

fn decode_number(number: &Number) -> Node {
    if let Some(i) = number.as_i64() {
        Node::Int64(i)
    } else if let Some(u) = number.as_u64() {
        Node::Uint64(u)
    } else {
        Node::Double(number.as_f64().unwrap_or(f64::NAN))
    }
}

fn decode_string(text: String) -> Result<Vec<u8>, DecodeError> {
    match text.strip_prefix(BINARY_SIGIL) {
        Some(encoded) => STANDARD
            .decode(encoded)
            .map_err(|source| DecodeError::Binary { text: text.clone(), source }),
        None => Ok(text.into_bytes()),
    }
}

fn decode_key(text: String) -> Result<String, DecodeError> {
    let original = text.clone();
    let bytes = decode_string(text)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::NonUtf8Key(original))
}

fn decode_object(mut object: Map<String, Value>) -> Result<Node, DecodeError> {
    let is_wrapper = object.contains_key(VALUE_KEY)
        && object.keys().all(|k| k == VALUE_KEY || k == ATTRIBUTES_KEY);

    if is_wrapper {
        let value = decode(object.remove(VALUE_KEY).unwrap_or(Value::Null))?;
        let attributes = match object.remove(ATTRIBUTES_KEY) {
            Some(Value::Object(attrs)) => decode_plain_map(attrs)?,
            Some(_) => return Err(DecodeError::AttributesNotAMap),
            None => Tree::new(),
        };
        return Ok(Node::with_attributes(value, attributes));
    }

    decode_plain_map(object).map(Node::Map)
}

fn decode_plain_map(object: Map<String, Value>) -> Result<Tree, DecodeError> {
    let mut entries = Tree::new();
    let mut side_attributes = Vec::new();

    for (key, value) in object {
        if let Some(target) = key.strip_prefix(ATTRIBUTE_SIGIL) {
            match value {
                Value::Object(attrs) => {
                    side_attributes.push((decode_key(target.to_string())?, decode_plain_map(attrs)?))
                }
                _ => return Err(DecodeError::AttributesNotAMap),
            }
            continue;
        }
        entries.insert(decode_key(key)?, decode(value)?);
    }

    for (target, attributes) in side_attributes {
        let value = entries
            .remove(&target)
            .ok_or_else(|| DecodeError::DanglingAttributes(target.clone()))?;
        entries.insert(target, Node::with_attributes(value, attributes));
    }

    Ok(entries)
}

fn kind(node: &Node) -> &'static str {
    match node.value() {
        Node::Entity => "entity",
        Node::Boolean(_) => "boolean",
        Node::Int64(_) | Node::Uint64(_) | Node::Double(_) => "number",
        Node::String(_) => "string",
        Node::List(_) => "list",
        Node::Map(_) => "map",
        Node::Attributed { .. } => "attributed value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binary_strings_decode_in_keys_and_values() {
        let tree = decode_map(br#"{"&aGVsbG8=":"&d29ybGQ="}"#).unwrap();
        assert_eq!(tree["hello"], Node::from("world"));
    }

    #[test]
    fn wrapper_object_becomes_attributed_value() {
        let tree =
            decode_map(br#"{"path":{"$value":"//home","$attributes":{"append":"true"}}}"#).unwrap();
        let path = &tree["path"];
        assert_eq!(path.value(), &Node::from("//home"));
        assert_eq!(path.attributes().unwrap()["append"], Node::from("true"));
    }

    #[test]
    fn sibling_sigil_key_attaches_attributes() {
        let tree = decode_map(br#"{"path":"//home","$path":{"append":true}}"#).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree["path"].attributes().unwrap()["append"], Node::Boolean(true));
    }

    #[test]
    fn sibling_attributes_without_target_fail() {
        let err = decode_map(br#"{"$path":{"append":true}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::DanglingAttributes(key) if key == "path"));
    }

    #[test]
    fn non_map_documents_are_rejected() {
        assert!(matches!(decode_map(b"[1, 2]"), Err(DecodeError::NotAMap("list"))));
        assert!(matches!(decode_map(b"i-am-a-cool-hacker666{}[]"), Err(DecodeError::Syntax(_))));
    }

    #[test]
    fn invalid_base64_is_reported() {
        assert!(matches!(decode_map(br#"{"a":"&***"}"#), Err(DecodeError::Binary { .. })));
    }

    #[test]
    fn raw_bytes_survive_reencoding() {
        let tree = decode_map(br#"{"&aGVsbG8=":"&3q2+7w=="}"#).unwrap();
        let value = &tree["hello"];
        assert_eq!(value, &Node::String(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(encode(value), json!("&3q2+7w=="));
        assert_eq!(&decode(encode(value)).unwrap(), value);
    }

    #[test]
    fn non_utf8_keys_are_rejected() {
        let err = decode_map(br#"{"&AP8=":"x"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::NonUtf8Key(key) if key == "&AP8="));
    }

    #[test]
    fn sigil_prefixed_text_is_escaped_on_encode() {
        let mut tree = Tree::new();
        tree.insert("$weird".into(), Node::from("&not-binary"));
        let encoded = encode(&Node::Map(tree.clone()));
        let decoded = decode(encoded).unwrap();
        assert_eq!(decoded, Node::Map(tree));
    }
}
