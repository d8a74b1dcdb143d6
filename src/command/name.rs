//! Command name syntax.

/// Whether `name` is a syntactically valid command name: `[a-z0-9_]+`,
/// starting with a letter or underscore.
pub fn is_valid_command_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_lowercase_identifiers() {
        for name in ["get", "map_reduce", "_private", "v2"] {
            assert!(is_valid_command_name(name), "{name}");
        }
    }

    #[test]
    fn rejects_everything_else() {
        for name in ["", "Get", "2fast", "map-reduce", "ünïcode", "a b", "../etc"] {
            assert!(!is_valid_command_name(name), "{name}");
        }
    }
}
