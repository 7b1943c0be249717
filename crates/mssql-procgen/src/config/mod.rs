//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub use validation::{
    validate_compatibility_level, MAX_COMPATIBILITY_LEVEL, MIN_COMPATIBILITY_LEVEL,
};

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the generation settings, recorded in the
    /// output manifest. Connection credentials are left out.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(&self.generation).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
