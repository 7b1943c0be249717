//! Insert/update/delete procedure generation.
//!
//! The generated procedure takes an `@action` discriminator:
//!
//! | `@action` | branch | `@RET` |
//! |---|---|---|
//! | `' '` / `NULL` | auto-detect by key lookup | |
//! | `'I'` | insert | 0 |
//! | `'A'` | update (or no-op) | 1 |
//! | `'E'` | delete | 2 |

use tracing::{debug, warn};

use super::script::ScriptBuilder;
use crate::core::schema::{Element, ElementField};
use crate::core::traits::Dialect;
use crate::dialect::sql_type;
use crate::error::{GenError, Result};

/// Names declared by the generated procedure itself.
const RESERVED_NAMES: &[&str] = &["action", "RET", "TYPEACTION", "NCOUNT"];

pub const ACTION_AUTO: &str = " ";
pub const ACTION_INSERT: &str = "I";
pub const ACTION_UPDATE: &str = "A";
pub const ACTION_DELETE: &str = "E";

pub const RET_INSERT: i32 = 0;
pub const RET_UPDATE: i32 = 1;
pub const RET_DELETE: i32 = 2;

/// Generate the write procedure of an element.
///
/// # Errors
///
/// Returns `GenError::InvalidInput` when the element has no fields, no
/// `Real` field, or a field whose name collides with a generated variable.
pub fn write_procedure_script(element: &Element, dialect: &dyn Dialect) -> Result<String> {
    element.validate()?;
    element.reject_reserved(RESERVED_NAMES)?;

    let fields: Vec<&ElementField> = element.write_fields().collect();
    if fields.is_empty() {
        return Err(GenError::invalid(
            &element.name,
            "element has no Real fields to write",
        ));
    }

    let table = element.table_name.as_str();
    let procedure = element.write_procedure();
    let keys: Vec<&ElementField> = fields.iter().copied().filter(|f| f.is_pk).collect();

    let mut sql = ScriptBuilder::new();
    sql.raw(dialect.procedure_header(&procedure));
    write_parameters(&mut sql, &fields);
    sql.line(0, "AS").line(0, "BEGIN");
    sql.line(1, "SET NOCOUNT ON");
    sql.line(1, "DECLARE @TYPEACTION VARCHAR(1)");
    if !keys.is_empty() {
        sql.line(1, "DECLARE @NCOUNT INT");
    }
    sql.line(1, "SET @TYPEACTION = @action");
    sql.blank();

    write_auto_detect(&mut sql, table, &keys);
    sql.blank();
    write_insert(&mut sql, table, &fields);
    write_update(&mut sql, element, &fields, &keys);
    write_delete(&mut sql, element, &keys);
    sql.line(0, "END");

    let script = sql.finish();
    debug!(
        "Generated write procedure {} for element {} ({} bytes)",
        procedure,
        element.name,
        script.len()
    );
    Ok(script)
}

fn write_parameters(sql: &mut ScriptBuilder, fields: &[&ElementField]) {
    sql.line(0, "@action VARCHAR(1),");
    for field in fields {
        let default = if !field.is_required || field.auto_num {
            " = NULL"
        } else {
            ""
        };
        sql.line(
            0,
            format!("@{} {}{},", field.name, sql_type(field), default),
        );
    }
    sql.line(0, "@RET INT OUTPUT");
}

/// `col = @col AND ...` over the given fields.
fn key_predicate(keys: &[&ElementField]) -> String {
    keys.iter()
        .map(|f| format!("{} = @{}", f.name, f.name))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn write_auto_detect(sql: &mut ScriptBuilder, table: &str, keys: &[&ElementField]) {
    sql.line(
        1,
        format!("IF @TYPEACTION IS NULL OR @TYPEACTION = '{}'", ACTION_AUTO),
    );
    sql.line(1, "BEGIN");
    sql.line(2, format!("SET @TYPEACTION = '{}'", ACTION_INSERT));
    if keys.is_empty() {
        sql.line(2, "-- no primary key: rows are always inserted");
    } else {
        // Dirty read: only decides between insert and update
        sql.line(2, "SELECT @NCOUNT = COUNT(*)");
        sql.line(2, format!("FROM {} WITH (NOLOCK)", table));
        sql.line(2, format!("WHERE {}", key_predicate(keys)));
        sql.line(2, "IF @NCOUNT > 0");
        sql.line(3, format!("SET @TYPEACTION = '{}'", ACTION_UPDATE));
    }
    sql.line(1, "END");
}

fn write_insert(sql: &mut ScriptBuilder, table: &str, fields: &[&ElementField]) {
    let columns: Vec<&str> = fields
        .iter()
        .filter(|f| !f.auto_num)
        .map(|f| f.name.as_str())
        .collect();
    let generated: Vec<String> = fields
        .iter()
        .filter(|f| f.is_pk && f.auto_num)
        .map(|f| format!("Inserted.{}", f.name))
        .collect();

    sql.line(1, format!("IF @TYPEACTION = '{}'", ACTION_INSERT));
    sql.line(1, "BEGIN");
    if columns.is_empty() {
        sql.line(2, format!("INSERT INTO {}", table));
    } else {
        sql.line(2, format!("INSERT INTO {} ({})", table, columns.join(", ")));
    }
    if !generated.is_empty() {
        sql.line(2, format!("OUTPUT {}", generated.join(", ")));
    }
    if columns.is_empty() {
        sql.line(2, "DEFAULT VALUES");
    } else {
        let values: Vec<String> = columns.iter().map(|c| format!("@{}", c)).collect();
        sql.line(2, format!("VALUES ({})", values.join(", ")));
    }
    sql.line(2, format!("SET @RET = {}", RET_INSERT));
    sql.line(1, "END");
}

fn write_update(
    sql: &mut ScriptBuilder,
    element: &Element,
    fields: &[&ElementField],
    keys: &[&ElementField],
) {
    // Identity columns cannot be assigned
    let assignments: Vec<String> = fields
        .iter()
        .filter(|f| !f.is_pk && !f.auto_num)
        .map(|f| format!("{} = @{}", f.name, f.name))
        .collect();

    sql.line(1, format!("ELSE IF @TYPEACTION = '{}'", ACTION_UPDATE));
    sql.line(1, "BEGIN");
    if assignments.is_empty() {
        // UPDATE without a SET list is not valid T-SQL
        sql.line(2, "-- no updatable fields: every persisted field is part of the key");
    } else {
        sql.line(2, format!("UPDATE {}", element.table_name));
        sql.line(2, format!("SET {}", assignments.join(",\n            ")));
        if keys.is_empty() {
            warn!(
                "Element {} has no primary key: generated UPDATE affects every row of {}",
                element.name, element.table_name
            );
        } else {
            sql.line(2, format!("WHERE {}", key_predicate(keys)));
        }
    }
    sql.line(2, format!("SET @RET = {}", RET_UPDATE));
    sql.line(1, "END");
}

fn write_delete(sql: &mut ScriptBuilder, element: &Element, keys: &[&ElementField]) {
    let delete_keys: Vec<&ElementField> = keys
        .iter()
        .copied()
        .filter(|f| f.enable_on_delete)
        .collect();

    sql.line(1, format!("ELSE IF @TYPEACTION = '{}'", ACTION_DELETE));
    sql.line(1, "BEGIN");
    sql.line(2, format!("DELETE FROM {}", element.table_name));
    if delete_keys.is_empty() {
        warn!(
            "Element {} has no delete key: generated DELETE affects every row of {}",
            element.name, element.table_name
        );
    } else {
        sql.line(2, format!("WHERE {}", key_predicate(&delete_keys)));
    }
    sql.line(2, format!("SET @RET = {}", RET_DELETE));
    sql.line(1, "END");
}
