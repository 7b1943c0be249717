//! Configuration validation.

use super::Config;
use crate::error::{GenError, Result};

/// Lowest compatibility level accepted (SQL Server 2000).
pub const MIN_COMPATIBILITY_LEVEL: u16 = 80;

/// Highest compatibility level accepted (SQL Server 2025).
pub const MAX_COMPATIBILITY_LEVEL: u16 = 170;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if let Some(conn) = &config.connection {
        if conn.host.is_empty() {
            return Err(GenError::Config("connection.host is required".into()));
        }
        if conn.database.is_empty() {
            return Err(GenError::Config("connection.database is required".into()));
        }
        if conn.user.is_empty() {
            return Err(GenError::Config("connection.user is required".into()));
        }
        if conn.port == 0 {
            return Err(GenError::Config("connection.port must be at least 1".into()));
        }
    }

    if let Some(level) = config.generation.compatibility_level {
        validate_compatibility_level(level)?;
    }

    if config.generation.output_dir.as_os_str().is_empty() {
        return Err(GenError::Config(
            "generation.output_dir must not be empty".into(),
        ));
    }

    Ok(())
}

/// Reject compatibility levels SQL Server has never shipped.
pub fn validate_compatibility_level(level: u16) -> Result<()> {
    if !(MIN_COMPATIBILITY_LEVEL..=MAX_COMPATIBILITY_LEVEL).contains(&level) {
        return Err(GenError::Config(format!(
            "compatibility level must be between {} and {}, got {}",
            MIN_COMPATIBILITY_LEVEL, MAX_COMPATIBILITY_LEVEL, level
        )));
    }
    Ok(())
}
