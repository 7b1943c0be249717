//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target SQL Server. Only needed when the compatibility level is
    /// probed or scripts are deployed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,

    /// Script generation behavior.
    #[serde(default)]
    pub generation: GenerationConfig,
}

/// SQL Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: "true").
    #[serde(default = "default_true_string")]
    pub encrypt: String,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,
}

impl ConnectionConfig {
    /// Interpret the `encrypt` setting. Unknown values keep encryption on.
    pub fn encryption_enabled(&self) -> bool {
        !matches!(
            self.encrypt.to_lowercase().as_str(),
            "false" | "no" | "0" | "disable"
        )
    }
}

/// Script generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Pinned compatibility level. When unset the level is read from the
    /// connected database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_level: Option<u16>,

    /// Directory generated scripts are written to (default: "procedures").
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Also emit `CREATE TABLE` scripts (default: false).
    #[serde(default)]
    pub table_scripts: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            compatibility_level: None,
            output_dir: default_output_dir(),
            table_scripts: false,
        }
    }
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_true_string() -> String {
    "true".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("procedures")
}
