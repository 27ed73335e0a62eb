//! Engine configuration (`ontonet.yml`)

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up in the configuration directory
pub const CONFIG_FILE: &str = "ontonet.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of notices kept in the journal
    #[serde(default = "default_journal_capacity")]
    pub journal_capacity: usize,

    /// Skip actions an object does not list in its permitted actions
    #[serde(default = "default_true")]
    pub enforce_permitted_actions: bool,
}

fn default_journal_capacity() -> usize {
    256
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            journal_capacity: default_journal_capacity(),
            enforce_permitted_actions: true,
        }
    }
}

impl EngineConfig {
    /// Load from a YAML file; a missing file yields the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, CatalogError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config = EngineConfig::from_yaml_str("enforce_permitted_actions: false\n").unwrap();
        assert_eq!(config.journal_capacity, 256);
        assert!(!config.enforce_permitted_actions);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::from_file(dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
