//! T-SQL type rendering for element fields.

use crate::core::schema::{ElementField, FieldType};

/// Precision used when a DATETIME2 field carries no usable size.
const DEFAULT_DATETIME2_PRECISION: i32 = 7;

/// Render the T-SQL type of a field as used in parameter and column
/// declarations.
///
/// `VARCHAR`/`NVARCHAR` carry their length (`MAX` for `-1`); `DATETIME2`
/// carries a fractional-seconds precision in `0..=7`.
pub fn sql_type(field: &ElementField) -> String {
    match field.data_type {
        FieldType::Int => "INT".to_string(),
        FieldType::BigInt => "BIGINT".to_string(),
        FieldType::Float => "FLOAT".to_string(),
        FieldType::Bit => "BIT".to_string(),
        FieldType::Varchar => format!("VARCHAR({})", length_clause(field.size)),
        FieldType::NVarchar => format!("NVARCHAR({})", length_clause(field.size)),
        FieldType::Text => "TEXT".to_string(),
        FieldType::NText => "NTEXT".to_string(),
        FieldType::Date => "DATE".to_string(),
        FieldType::DateTime => "DATETIME".to_string(),
        FieldType::DateTime2 => {
            let precision = if (0..=7).contains(&field.size) {
                field.size
            } else {
                DEFAULT_DATETIME2_PRECISION
            };
            format!("DATETIME2({})", precision)
        }
        FieldType::Time => "TIME".to_string(),
        FieldType::UniqueIdentifier => "UNIQUEIDENTIFIER".to_string(),
    }
}

/// Type of a filter parameter that receives free text for a LIKE match.
///
/// Character fields keep their own type; other fields are matched through
/// their string form.
pub fn text_filter_type(field: &ElementField) -> String {
    match field.data_type {
        FieldType::Varchar | FieldType::NVarchar => sql_type(field),
        _ => "NVARCHAR(MAX)".to_string(),
    }
}

fn length_clause(size: i32) -> String {
    if size == -1 {
        "MAX".to_string()
    } else {
        size.to_string()
    }
}
