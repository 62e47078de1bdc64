//! Engine configuration.
//!
//! ```json
//! { "threads": 8, "validate_on_load": true }
//! ```
//!
//! Every field is optional; missing fields take the defaults below.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for a [`HashGraph`](crate::HashGraph).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Worker count of a dedicated pool for parallel iteration. `None` runs
    /// on rayon's global pool.
    pub threads: Option<usize>,
    /// Check adjacency symmetry and path/index agreement after loading.
    pub validate_on_load: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            threads: None,
            validate_on_load: true,
        }
    }
}

impl GraphConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GraphConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn with_validate_on_load(mut self, validate: bool) -> Self {
        self.validate_on_load = validate;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(Error::Config("threads must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = GraphConfig::from_json_str("{}").unwrap();
        assert_eq!(config, GraphConfig::default());
        assert!(config.validate_on_load);
    }

    #[test]
    fn test_parse_fields() {
        let config = GraphConfig::from_json_str(r#"{"threads": 4, "validate_on_load": false}"#).unwrap();
        assert_eq!(config, GraphConfig::default().with_threads(4).with_validate_on_load(false));
    }

    #[test]
    fn test_rejects_zero_threads_and_unknown_fields() {
        assert!(matches!(GraphConfig::from_json_str(r#"{"threads": 0}"#), Err(Error::Config(_))));
        assert!(matches!(GraphConfig::from_json_str(r#"{"thread": 2}"#), Err(Error::Config(_))));
    }
}
