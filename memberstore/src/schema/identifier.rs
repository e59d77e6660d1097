// Table and column names cannot be bound as statement parameters, so the
// migration, introspection and row builders interpolate them into SQL text.
// Everything interpolated passes through here first.

use crate::error::{Result, StoreError};
use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

fn type_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*( [A-Za-z_][A-Za-z0-9_]*)*(\(\s*[+-]?\d+\s*(,\s*[+-]?\d+\s*)?\))?)?$")
            .expect("type name pattern is valid")
    })
}

/// Validate a table or column name and return it double-quoted.
pub fn quote_identifier(name: &str) -> Result<String> {
    if identifier_pattern().is_match(name) {
        Ok(format!("\"{name}\""))
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a declared column type. An empty type is allowed (no affinity).
pub fn check_type_name(column_type: &str) -> Result<&str> {
    if type_name_pattern().is_match(column_type) {
        Ok(column_type)
    } else {
        Err(StoreError::InvalidIdentifier(column_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names_are_quoted() {
        assert_eq!(quote_identifier("npcs").unwrap(), "\"npcs\"");
        assert_eq!(quote_identifier("_tmp_1").unwrap(), "\"_tmp_1\"");
        // Keywords are fine once quoted.
        assert_eq!(quote_identifier("key").unwrap(), "\"key\"");
    }

    #[test]
    fn test_injection_attempts_are_rejected() {
        for name in [
            "",
            "1abc",
            "kv; DROP TABLE npcs",
            "a\"b",
            "name--",
            "spaced name",
            "ünïcode",
        ] {
            assert!(
                matches!(quote_identifier(name), Err(StoreError::InvalidIdentifier(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_type_names() {
        for ty in ["", "TEXT", "INT", "BOOLEAN", "VARCHAR(255)", "DECIMAL(10, 2)", "UNSIGNED BIG INT"] {
            assert!(check_type_name(ty).is_ok(), "{ty:?} should be accepted");
        }
        for ty in ["TEXT)", "INT; DROP TABLE x", "TEXT PRIMARY KEY,", "'x'"] {
            assert!(check_type_name(ty).is_err(), "{ty:?} should be rejected");
        }
    }
}
