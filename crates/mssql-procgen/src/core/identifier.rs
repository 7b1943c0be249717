//! Identifier validation for generated T-SQL.
//!
//! Generated procedures use field names twice: as column references and as
//! `@`-prefixed parameter names. Only plain identifiers are valid in both
//! positions without quoting, so metadata is restricted to
//! `[A-Za-z_][A-Za-z0-9_]*`. Object names (tables, procedures) may be
//! schema-qualified with dots, each part being a plain identifier.

use thiserror::Error;

/// SQL Server identifier length limit (characters).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Why an identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier exceeds {MAX_IDENTIFIER_LENGTH} characters (got {0})")]
    TooLong(usize),

    #[error("identifier cannot start with {0:?}")]
    InvalidStart(char),

    #[error("identifier contains {0:?}; only letters, digits and '_' are allowed")]
    InvalidChar(char),
}

/// Validate a plain (unqualified, unquoted) identifier.
pub fn validate_plain_identifier(name: &str) -> Result<(), IdentifierError> {
    let mut chars = name.chars();
    let first = chars.next().ok_or(IdentifierError::Empty)?;

    let len = name.chars().count();
    if len > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong(len));
    }

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(IdentifierError::InvalidStart(first));
    }

    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(IdentifierError::InvalidChar(bad));
    }

    Ok(())
}

/// Validate an object name such as `Customer` or `dbo.Customer`.
pub fn validate_object_name(name: &str) -> Result<(), IdentifierError> {
    name.split('.').try_for_each(validate_plain_identifier)
}

/// Render a T-SQL string literal, doubling embedded quotes.
pub fn string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
