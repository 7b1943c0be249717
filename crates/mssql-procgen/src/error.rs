//! Error types for the procedure generator.

use thiserror::Error;

/// Main error type for generation and deployment operations.
#[derive(Error, Debug)]
pub enum GenError {
    /// Element metadata cannot produce a valid script.
    #[error("Invalid element '{element}': {message}")]
    InvalidInput { element: String, message: String },

    /// A metadata file does not describe valid elements
    #[error("Invalid metadata in '{path}': {message}")]
    Metadata { path: String, message: String },

    /// SQL Server connection or query error
    #[error("Database error: {0}")]
    Connectivity(#[from] tiberius::error::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// The server answered but did not report a compatibility level
    #[error("Compatibility level unavailable for database '{0}'")]
    CompatibilityUnavailable(String),

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GenError {
    /// Create an InvalidInput error for an element.
    pub fn invalid(element: impl Into<String>, message: impl Into<String>) -> Self {
        GenError::InvalidInput {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidInput error naming the offending field.
    pub fn invalid_field(
        element: impl Into<String>,
        field: &str,
        message: impl std::fmt::Display,
    ) -> Self {
        GenError::InvalidInput {
            element: element.into(),
            message: format!("field '{}': {}", field, message),
        }
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl Into<String>, context: impl Into<String>) -> Self {
        GenError::Pool {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            GenError::InvalidInput { .. } | GenError::Metadata { .. } => 2,
            GenError::Config(_) => 3,
            GenError::Connectivity(_)
            | GenError::Pool { .. }
            | GenError::CompatibilityUnavailable(_) => 4,
            GenError::Io(_) | GenError::Yaml(_) | GenError::Json(_) => 5,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, GenError>;
