//! SQL Server dialect (Strategy pattern).
//!
//! Capabilities are derived from the database compatibility level, which
//! gates the syntax SQL Server accepts regardless of the engine version.

use crate::core::identifier::string_literal;
use crate::core::traits::Dialect;

/// First level accepting `CREATE OR ALTER` and `STRING_SPLIT` (SQL Server 2016).
pub const CREATE_OR_ALTER_MIN_LEVEL: u16 = 130;

/// First level accepting `OFFSET ... FETCH` (SQL Server 2012).
pub const OFFSET_FETCH_MIN_LEVEL: u16 = 110;

/// Syntax features available at a compatibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialectCapabilities {
    pub supports_create_or_alter: bool,
    pub supports_offset_fetch: bool,
    pub supports_string_split: bool,
}

impl DialectCapabilities {
    /// Derive capabilities from a compatibility level.
    pub fn for_level(level: u16) -> Self {
        Self {
            supports_create_or_alter: level >= CREATE_OR_ALTER_MIN_LEVEL,
            supports_offset_fetch: level >= OFFSET_FETCH_MIN_LEVEL,
            supports_string_split: level >= CREATE_OR_ALTER_MIN_LEVEL,
        }
    }

    /// Older levels must drop an existing procedure before creating it.
    pub fn requires_drop_guard(&self) -> bool {
        !self.supports_create_or_alter
    }
}

/// Microsoft SQL Server dialect pinned to a compatibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlServerDialect {
    level: u16,
    capabilities: DialectCapabilities,
}

impl SqlServerDialect {
    /// Create a dialect for the given compatibility level.
    pub fn new(level: u16) -> Self {
        Self {
            level,
            capabilities: DialectCapabilities::for_level(level),
        }
    }

    pub fn capabilities(&self) -> DialectCapabilities {
        self.capabilities
    }
}

impl Dialect for SqlServerDialect {
    fn name(&self) -> &str {
        "mssql"
    }

    fn compatibility_level(&self) -> u16 {
        self.level
    }

    fn supports_create_or_alter(&self) -> bool {
        self.capabilities.supports_create_or_alter
    }

    fn supports_offset_fetch(&self) -> bool {
        self.capabilities.supports_offset_fetch
    }

    fn supports_string_split(&self) -> bool {
        self.capabilities.supports_string_split
    }

    fn procedure_header(&self, procedure: &str) -> String {
        if self.capabilities.requires_drop_guard() {
            // DROP PROCEDURE IF EXISTS is itself a 130 feature
            format!(
                "IF OBJECT_ID({}, 'P') IS NOT NULL\n    DROP PROCEDURE {}\nGO\nCREATE PROCEDURE {}",
                string_literal(procedure),
                procedure,
                procedure
            )
        } else {
            format!("CREATE OR ALTER PROCEDURE {}", procedure)
        }
    }
}
