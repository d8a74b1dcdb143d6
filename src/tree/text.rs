//! Canonical text form of parameter trees.
//!
//! This is the form the engine logs and echoes back, e.g.
//! `{"path"=<"append"="true">"//home"}`.

use std::fmt::{self, Display, Formatter, Write};

use super::{Node, Tree};

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Node::Entity => f.write_char('#'),
            Node::Boolean(b) => write!(f, "%{}", b),
            Node::Int64(i) => write!(f, "{}", i),
            Node::Uint64(u) => write!(f, "{}u", u),
            Node::Double(d) => write!(f, "{:?}", d),
            Node::String(bytes) => write_quoted(f, bytes),
            Node::List(items) => {
                f.write_char('[')?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_char(';')?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_char(']')
            }
            Node::Map(map) => {
                f.write_char('{')?;
                write_entries(f, map)?;
                f.write_char('}')
            }
            Node::Attributed { value, attributes } => {
                f.write_char('<')?;
                write_entries(f, attributes)?;
                f.write_char('>')?;
                write!(f, "{}", value)
            }
        }
    }
}

fn write_entries(f: &mut Formatter<'_>, map: &Tree) -> fmt::Result {
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            f.write_char(';')?;
        }
        write_quoted(f, key.as_bytes())?;
        write!(f, "={}", value)?;
    }
    Ok(())
}

fn write_quoted(f: &mut Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    f.write_char('"')?;
    for &byte in bytes {
        match byte {
            b'"' => f.write_str("\\\"")?,
            b'\\' => f.write_str("\\\\")?,
            b'\n' => f.write_str("\\n")?,
            b'\r' => f.write_str("\\r")?,
            b'\t' => f.write_str("\\t")?,
            0x20..=0x7e => f.write_char(byte as char)?,
            _ => write!(f, "\\x{:02X}", byte)?,
        }
    }
    f.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_attributed_map_entries() {
        let mut attributes = Tree::new();
        attributes.insert("append".into(), Node::from("true"));
        let mut map = Tree::new();
        map.insert(
            "path".into(),
            Node::with_attributes(Node::from("//home"), attributes),
        );

        assert_eq!(Node::Map(map).to_string(), r#"{"path"=<"append"="true">"//home"}"#);
    }

    #[test]
    fn prints_scalars_and_lists() {
        let node = Node::List(vec![
            Node::Int64(-3),
            Node::Uint64(7),
            Node::Double(1.5),
            Node::Boolean(true),
            Node::Entity,
        ]);
        assert_eq!(node.to_string(), "[-3;7u;1.5;%true;#]");
    }

    #[test]
    fn escapes_non_printable_bytes() {
        let node = Node::String(vec![b'a', b'"', 0x00, 0xff]);
        assert_eq!(node.to_string(), r#""a\"\x00\xFF""#);
    }
}
