//! Backing table DDL for an element.

use tracing::debug;

use super::script::ScriptBuilder;
use crate::core::identifier::string_literal;
use crate::core::schema::{Element, ElementField};
use crate::dialect::sql_type;
use crate::error::{GenError, Result};

/// Generate a `CREATE TABLE` script guarded by an existence check.
///
/// Only `Real` fields are persisted. Identity fields get `IDENTITY(1,1)`,
/// key and required fields are `NOT NULL`, and the key becomes a
/// `PK_<table>` constraint.
pub fn table_script(element: &Element) -> Result<String> {
    element.validate()?;

    let fields: Vec<&ElementField> = element.write_fields().collect();
    if fields.is_empty() {
        return Err(GenError::invalid(
            &element.name,
            "element has no Real fields to persist",
        ));
    }

    let table = element.table_name.as_str();
    let mut definitions: Vec<String> = fields.iter().map(|f| column_definition(f)).collect();

    let keys: Vec<&str> = fields
        .iter()
        .filter(|f| f.is_pk)
        .map(|f| f.name.as_str())
        .collect();
    if !keys.is_empty() {
        definitions.push(format!(
            "CONSTRAINT PK_{} PRIMARY KEY ({})",
            table.replace('.', "_"),
            keys.join(", ")
        ));
    }

    let mut sql = ScriptBuilder::new();
    sql.line(0, format!("IF OBJECT_ID({}, 'U') IS NULL", string_literal(table)));
    sql.line(0, "BEGIN");
    sql.line(1, format!("CREATE TABLE {} (", table));
    let last = definitions.len() - 1;
    for (idx, definition) in definitions.iter().enumerate() {
        let separator = if idx == last { "" } else { "," };
        sql.line(2, format!("{}{}", definition, separator));
    }
    sql.line(1, ")");
    sql.line(0, "END");

    let script = sql.finish();
    debug!("Generated table script for {} ({} columns)", table, fields.len());
    Ok(script)
}

fn column_definition(field: &ElementField) -> String {
    let identity = if field.auto_num { " IDENTITY(1,1)" } else { "" };
    let null_clause = if field.is_pk || field.is_required {
        "NOT NULL"
    } else {
        "NULL"
    };
    format!("{} {}{} {}", field.name, sql_type(field), identity, null_clause)
}
