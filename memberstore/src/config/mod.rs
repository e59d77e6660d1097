use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Connection settings applied every time a store is opened, including the
/// reopen at the end of a snapshot install.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// How many compiled statements the connection keeps for reuse.
    pub statement_cache_capacity: usize,
    /// How long the engine waits on a locked file before failing, in milliseconds.
    pub busy_timeout_ms: u64,
    /// Enforce `FOREIGN KEY` constraints.
    pub foreign_keys: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        StoreOptions {
            statement_cache_capacity: 32,
            busy_timeout_ms: 5000,
            foreign_keys: false,
        }
    }
}

impl StoreOptions {
    /// Load options from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse options from a YAML string. Missing fields take their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let options: StoreOptions = serde_yaml::from_str(content)?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let options = StoreOptions::from_yaml_str("foreign_keys: true\n").unwrap();
        assert_eq!(
            options,
            StoreOptions {
                foreign_keys: true,
                ..StoreOptions::default()
            }
        );
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("store.yaml");
        std::fs::write(&path, "statement_cache_capacity: 4\nbusy_timeout_ms: 100\n").unwrap();

        let options = StoreOptions::load(&path).unwrap();
        assert_eq!(options.statement_cache_capacity, 4);
        assert_eq!(options.busy_timeout_ms, 100);
        assert!(!options.foreign_keys);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        assert!(StoreOptions::from_yaml_str("busy_timeout_ms: [1, 2]").is_err());
    }
}
