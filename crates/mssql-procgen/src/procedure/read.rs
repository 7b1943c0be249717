//! Paged select procedure generation.
//!
//! The generated procedure assembles its query as dynamic SQL so the caller
//! can choose the sort order, and runs it through `sp_executesql` with
//! every filter value bound as a parameter. Only `@orderby` is spliced into
//! the statement text; it must come from trusted code, never from end users.
//!
//! Signature:
//!
//! ```text
//! @orderby NVARCHAR(MAX),
//! <filter parameters, all defaulting to NULL>,
//! @regporpag INT,          -- rows per page, <= 0 returns every row
//! @pag INT,                -- 1-based page
//! @qtdtotal INT OUTPUT     -- total rows, computed when NULL or 0 on entry
//! ```

use std::collections::HashSet;

use tracing::{debug, warn};

use super::script::ScriptBuilder;
use crate::core::identifier::string_literal;
use crate::core::schema::{Element, ElementField, FieldType, FilterMode};
use crate::core::traits::Dialect;
use crate::dialect::{sql_type, text_filter_type};
use crate::error::{GenError, Result};

/// Names declared by the generated procedure itself.
const RESERVED_NAMES: &[&str] = &[
    "orderby",
    "regporpag",
    "pag",
    "qtdtotal",
    "sqlcolumn",
    "sqltable",
    "sqlcond",
    "sqlorder",
    "sqlparam",
    "countparam",
    "query",
    "__rn",
];

/// One bound parameter of the dynamic query.
struct FilterParam {
    name: String,
    sql_type: String,
    /// Condition appended to the WHERE clause when the parameter is set.
    condition: String,
}

/// Generate the read procedure of an element.
///
/// # Errors
///
/// Returns `GenError::InvalidInput` when the element has no readable field,
/// a field name collides with a generated parameter, or a filter mode does
/// not apply to the field type.
pub fn read_procedure_script(element: &Element, dialect: &dyn Dialect) -> Result<String> {
    element.validate()?;
    element.reject_reserved(RESERVED_NAMES)?;

    let fields: Vec<&ElementField> = element.read_fields().collect();
    if fields.is_empty() {
        return Err(GenError::invalid(
            &element.name,
            "element has no Real or ViewOnly fields to read",
        ));
    }

    let params = filter_params(element, &fields, dialect)?;
    let order = default_order(element, &fields)?;
    let procedure = element.read_procedure();

    let mut sql = ScriptBuilder::new();
    sql.raw(dialect.procedure_header(&procedure));
    sql.line(0, "@orderby NVARCHAR(MAX),");
    for param in &params {
        sql.line(0, format!("@{} {} = NULL,", param.name, param.sql_type));
    }
    sql.line(0, "@regporpag INT,");
    sql.line(0, "@pag INT,");
    sql.line(0, "@qtdtotal INT OUTPUT");
    sql.line(0, "AS").line(0, "BEGIN");
    sql.line(1, "SET NOCOUNT ON");
    for var in ["sqlcolumn", "sqltable", "sqlcond", "sqlorder", "sqlparam", "countparam", "query"] {
        sql.line(1, format!("DECLARE @{} NVARCHAR(MAX)", var));
    }
    sql.blank();

    let columns: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    sql.line(1, "--COLUMNS");
    sql.line(1, format!("SET @sqlcolumn = N{}", string_literal(&columns.join(", "))));
    sql.line(1, "--TABLE");
    sql.line(
        1,
        format!(
            "SET @sqltable = N{}",
            string_literal(&format!("{} WITH (NOLOCK)", element.table_name))
        ),
    );

    sql.line(1, "--CONDITIONS");
    sql.line(1, "SET @sqlcond = N' WHERE 1=1'");
    for param in &params {
        sql.line(1, format!("IF @{} IS NOT NULL", param.name));
        sql.line(
            2,
            format!(
                "SET @sqlcond = @sqlcond + N{}",
                string_literal(&format!(" AND {}", param.condition))
            ),
        );
    }

    sql.line(1, "--ORDER BY");
    sql.line(1, "IF @orderby IS NULL OR LTRIM(RTRIM(@orderby)) = ''");
    sql.line(
        2,
        format!(
            "SET @sqlorder = N{}",
            string_literal(&format!(" ORDER BY {}", order))
        ),
    );
    sql.line(1, "ELSE");
    sql.line(2, "SET @sqlorder = N' ORDER BY ' + @orderby");

    let declarations: Vec<String> = params
        .iter()
        .map(|p| format!("@{} {}", p.name, p.sql_type))
        .collect();
    let mut count_declarations = vec!["@qtdtotal INT OUTPUT".to_string()];
    count_declarations.extend(declarations.iter().cloned());

    sql.line(1, "--PARAMETERS");
    sql.line(
        1,
        format!("SET @sqlparam = N{}", string_literal(&declarations.join(", "))),
    );
    sql.line(
        1,
        format!(
            "SET @countparam = N{}",
            string_literal(&count_declarations.join(", "))
        ),
    );
    sql.blank();

    let bindings: String = params
        .iter()
        .map(|p| format!(", @{} = @{}", p.name, p.name))
        .collect();

    sql.line(1, "IF @pag IS NULL OR @pag < 1");
    sql.line(2, "SET @pag = 1");
    sql.blank();

    sql.line(1, "--TOTAL OF RECORDS");
    sql.line(1, "IF @qtdtotal IS NULL OR @qtdtotal = 0");
    sql.line(1, "BEGIN");
    sql.line(2, "SET @qtdtotal = 0");
    sql.line(
        2,
        "SET @query = N'SELECT @qtdtotal = COUNT(*) FROM ' + @sqltable + @sqlcond",
    );
    sql.line(
        2,
        format!(
            "EXECUTE sp_executesql @query, @countparam, @qtdtotal = @qtdtotal OUTPUT{}",
            bindings
        ),
    );
    sql.line(1, "END");
    sql.blank();

    sql.line(1, "--RECORDS");
    sql.line(1, "IF @regporpag IS NULL OR @regporpag <= 0");
    sql.line(
        2,
        "SET @query = N'SELECT ' + @sqlcolumn + N' FROM ' + @sqltable + @sqlcond + @sqlorder",
    );
    sql.line(1, "ELSE");
    sql.line(2, format!("SET @query = {}", paged_query(dialect)));
    if params.is_empty() {
        sql.line(1, "EXECUTE sp_executesql @query");
    } else {
        sql.line(1, format!("EXECUTE sp_executesql @query, @sqlparam{}", bindings));
    }
    sql.line(0, "END");

    let script = sql.finish();
    debug!(
        "Generated read procedure {} for element {} ({} filters, {} bytes)",
        procedure,
        element.name,
        params.len(),
        script.len()
    );
    Ok(script)
}

/// Page expression over `@sqlcolumn`, `@sqltable`, `@sqlcond`, `@sqlorder`.
fn paged_query(dialect: &dyn Dialect) -> String {
    if dialect.supports_offset_fetch() {
        "N'SELECT ' + @sqlcolumn + N' FROM ' + @sqltable + @sqlcond + @sqlorder \
         + N' OFFSET ' + CAST((@pag - 1) * @regporpag AS NVARCHAR(20)) \
         + N' ROWS FETCH NEXT ' + CAST(@regporpag AS NVARCHAR(20)) + N' ROWS ONLY'"
            .to_string()
    } else {
        "N'SELECT ' + @sqlcolumn + N' FROM (SELECT ' + @sqlcolumn \
         + N', ROW_NUMBER() OVER (' + @sqlorder + N') AS __rn FROM ' + @sqltable + @sqlcond \
         + N') AS paged WHERE __rn BETWEEN ' + CAST((@pag - 1) * @regporpag + 1 AS NVARCHAR(20)) \
         + N' AND ' + CAST(@pag * @regporpag AS NVARCHAR(20)) + N' ORDER BY __rn'"
            .to_string()
    }
}

/// Key columns, or the first sortable column for keyless elements.
///
/// `TEXT`/`NTEXT` columns cannot appear in `ORDER BY`.
fn default_order(element: &Element, fields: &[&ElementField]) -> Result<String> {
    let keys: Vec<&str> = fields
        .iter()
        .filter(|f| f.is_pk)
        .map(|f| f.name.as_str())
        .collect();
    if !keys.is_empty() {
        return Ok(keys.join(", "));
    }

    fields
        .iter()
        .find(|f| !f.data_type.is_lob())
        .map(|f| f.name.clone())
        .ok_or_else(|| {
            GenError::invalid(
                &element.name,
                "element has no key and only TEXT/NTEXT columns to order by",
            )
        })
}

/// Column expression usable in string comparisons.
fn text_expr(field: &ElementField) -> String {
    match field.data_type {
        FieldType::Varchar | FieldType::NVarchar => field.name.clone(),
        _ => format!("CAST({} AS NVARCHAR(MAX))", field.name),
    }
}

fn filter_params(
    element: &Element,
    fields: &[&ElementField],
    dialect: &dyn Dialect,
) -> Result<Vec<FilterParam>> {
    let mut params = Vec::new();

    for field in fields {
        let name = &field.name;
        match field.effective_filter() {
            FilterMode::None => {}
            FilterMode::Equal => {
                let (sql_type, condition) = if field.data_type.is_lob() {
                    (
                        "NVARCHAR(MAX)".to_string(),
                        format!("{} LIKE @{}", name, name),
                    )
                } else {
                    (sql_type(field), format!("{} = @{}", name, name))
                };
                params.push(FilterParam {
                    name: name.clone(),
                    sql_type,
                    condition,
                });
            }
            FilterMode::Contain => params.push(FilterParam {
                name: name.clone(),
                sql_type: text_filter_type(field),
                condition: format!("{} LIKE '%' + @{} + '%'", text_expr(field), name),
            }),
            FilterMode::Range => {
                if field.data_type.is_lob() {
                    return Err(GenError::invalid_field(
                        &element.name,
                        name,
                        "Range filter is not supported for Text/NText fields",
                    ));
                }
                for (suffix, op) in [("from", ">="), ("to", "<=")] {
                    let param = format!("{}_{}", name, suffix);
                    params.push(FilterParam {
                        condition: format!("{} {} @{}", name, op, param),
                        name: param,
                        sql_type: sql_type(field),
                    });
                }
            }
            mode @ (FilterMode::MultValuesEqual | FilterMode::MultValuesContain) => {
                params.push(FilterParam {
                    name: name.clone(),
                    sql_type: "NVARCHAR(MAX)".to_string(),
                    condition: multi_value_condition(element, field, mode, dialect),
                });
            }
        }
    }

    // Range parameters can shadow another field's parameter
    let mut seen = HashSet::new();
    for param in &params {
        if !seen.insert(param.name.to_lowercase()) {
            return Err(GenError::invalid_field(
                &element.name,
                &param.name,
                "filter parameter is declared twice",
            ));
        }
    }

    Ok(params)
}

/// Match a column against a comma separated list held by the parameter.
fn multi_value_condition(
    element: &Element,
    field: &ElementField,
    mode: FilterMode,
    dialect: &dyn Dialect,
) -> String {
    let name = &field.name;
    let column = text_expr(field);

    if dialect.supports_string_split() {
        if mode == FilterMode::MultValuesContain {
            format!(
                "EXISTS (SELECT 1 FROM STRING_SPLIT(@{}, ',') s WHERE {} LIKE '%' + LTRIM(RTRIM(s.value)) + '%')",
                name, column
            )
        } else {
            format!(
                "{} IN (SELECT LTRIM(RTRIM(value)) FROM STRING_SPLIT(@{}, ','))",
                column, name
            )
        }
    } else {
        if mode == FilterMode::MultValuesContain {
            warn!(
                "Element {} field {}: compatibility level {} has no STRING_SPLIT, \
                 multi-value contain filter matches whole values only",
                element.name,
                name,
                dialect.compatibility_level()
            );
        }
        format!("',' + @{} + ',' LIKE '%,' + {} + ',%'", name, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldBehavior;
    use crate::drivers::mssql::SqlServerDialect;

    fn customer() -> Element {
        Element::new(
            "Customer",
            vec![
                ElementField::new("Id", FieldType::Int).pk().auto_num(),
                ElementField::new("Name", FieldType::Varchar)
                    .size(100)
                    .required()
                    .filter(FilterMode::Contain),
                ElementField::new("CreatedAt", FieldType::DateTime).filter(FilterMode::Range),
                ElementField::new("Status", FieldType::Int).filter(FilterMode::MultValuesEqual),
                ElementField::new("Balance", FieldType::Float).behavior(FieldBehavior::ViewOnly),
                ElementField::new("Avatar", FieldType::Varchar)
                    .size(200)
                    .behavior(FieldBehavior::Virtual),
            ],
        )
    }

    fn generate(element: &Element, level: u16) -> String {
        read_procedure_script(element, &SqlServerDialect::new(level)).unwrap()
    }

    #[test]
    fn test_signature() {
        let sql = generate(&customer(), 150);
        assert!(sql.starts_with("CREATE OR ALTER PROCEDURE CustomerGet\n@orderby NVARCHAR(MAX),\n"));
        assert!(sql.contains("@Id INT = NULL,\n"));
        assert!(sql.contains("@Name VARCHAR(100) = NULL,\n"));
        assert!(sql.contains("@CreatedAt_from DATETIME = NULL,\n@CreatedAt_to DATETIME = NULL,\n"));
        assert!(sql.contains("@Status NVARCHAR(MAX) = NULL,\n"));
        assert!(sql.contains("@regporpag INT,\n@pag INT,\n@qtdtotal INT OUTPUT\nAS\n"));
        assert!(!sql.contains("@Balance"));
        assert!(sql.ends_with("END\nGO\n"));
    }

    #[test]
    fn test_projection_includes_view_only() {
        let sql = generate(&customer(), 150);
        assert!(sql.contains("SET @sqlcolumn = N'Id, Name, CreatedAt, Status, Balance'"));
        assert!(sql.contains("SET @sqltable = N'Customer WITH (NOLOCK)'"));
        assert!(!sql.contains("Avatar"));
    }

    #[test]
    fn test_conditions_are_parameterized() {
        let sql = generate(&customer(), 150);
        assert!(sql.contains("IF @Id IS NOT NULL\n        SET @sqlcond = @sqlcond + N' AND Id = @Id'"));
        assert!(sql.contains("SET @sqlcond = @sqlcond + N' AND Name LIKE ''%'' + @Name + ''%'''"));
        assert!(sql.contains("N' AND CreatedAt >= @CreatedAt_from'"));
        assert!(sql.contains("N' AND CreatedAt <= @CreatedAt_to'"));
        assert!(sql.contains(
            "SET @sqlparam = N'@Id INT, @Name VARCHAR(100), @CreatedAt_from DATETIME, @CreatedAt_to DATETIME, @Status NVARCHAR(MAX)'"
        ));
        assert!(sql.contains("SET @countparam = N'@qtdtotal INT OUTPUT, @Id INT,"));
        assert!(sql.contains(
            "EXECUTE sp_executesql @query, @sqlparam, @Id = @Id, @Name = @Name, @CreatedAt_from = @CreatedAt_from, @CreatedAt_to = @CreatedAt_to, @Status = @Status"
        ));
    }

    #[test]
    fn test_each_filter_parameter_declared_once() {
        let sql = generate(&customer(), 150);
        let header: Vec<&str> = sql.lines().take_while(|l| *l != "AS").collect();
        for name in ["@Id ", "@Name ", "@CreatedAt_from ", "@CreatedAt_to ", "@Status "] {
            assert_eq!(header.iter().filter(|l| l.starts_with(name)).count(), 1, "{}", name);
        }
    }

    #[test]
    fn test_offset_fetch_at_110() {
        let sql = generate(&customer(), 110);
        assert!(sql.contains("OFFSET"));
        assert!(sql.contains("FETCH NEXT"));
        assert!(!sql.contains("ROW_NUMBER()"));
        assert!(sql.starts_with("IF OBJECT_ID('CustomerGet', 'P') IS NOT NULL"));
    }

    #[test]
    fn test_row_number_below_110() {
        let sql = generate(&customer(), 100);
        assert!(sql.contains("ROW_NUMBER() OVER ("));
        assert!(sql.contains("__rn BETWEEN"));
        assert!(!sql.contains("FETCH NEXT"));
    }

    #[test]
    fn test_string_split_gated_by_level() {
        let modern = generate(&customer(), 130);
        assert!(modern.contains(
            "CAST(Status AS NVARCHAR(MAX)) IN (SELECT LTRIM(RTRIM(value)) FROM STRING_SPLIT(@Status, '',''))"
        ));

        let legacy = generate(&customer(), 120);
        assert!(!legacy.contains("STRING_SPLIT"));
        assert!(legacy.contains("N' AND '','' + @Status + '','' LIKE ''%,'' + CAST(Status AS NVARCHAR(MAX)) + '',%'''"));
    }

    #[test]
    fn test_multi_value_contain() {
        let element = Element::new(
            "Product",
            vec![
                ElementField::new("Sku", FieldType::Varchar).size(20).pk(),
                ElementField::new("Tags", FieldType::NVarchar)
                    .size(400)
                    .filter(FilterMode::MultValuesContain),
            ],
        );
        let sql = generate(&element, 150);
        assert!(sql.contains(
            "EXISTS (SELECT 1 FROM STRING_SPLIT(@Tags, '','') s WHERE Tags LIKE ''%'' + LTRIM(RTRIM(s.value)) + ''%'')"
        ));
    }

    #[test]
    fn test_default_order() {
        let sql = generate(&customer(), 150);
        assert!(sql.contains("SET @sqlorder = N' ORDER BY Id'"));
        assert!(sql.contains("SET @sqlorder = N' ORDER BY ' + @orderby"));

        let keyless = Element::new(
            "Event",
            vec![
                ElementField::new("Happened", FieldType::DateTime2),
                ElementField::new("Kind", FieldType::Varchar).size(20),
            ],
        );
        let sql = generate(&keyless, 150);
        assert!(sql.contains("SET @sqlorder = N' ORDER BY Happened'"));
    }

    #[test]
    fn test_default_order_skips_lob_columns() {
        let memo = Element::new(
            "Memo",
            vec![
                ElementField::new("Body", FieldType::NText),
                ElementField::new("Written", FieldType::DateTime),
            ],
        );
        let sql = generate(&memo, 150);
        assert!(sql.contains("SET @sqlorder = N' ORDER BY Written'"));
        assert!(!sql.contains("ORDER BY Body"));

        let only_text = Element::new(
            "Blob",
            vec![ElementField::new("Body", FieldType::Text)],
        );
        let err = read_procedure_script(&only_text, &SqlServerDialect::new(150)).unwrap_err();
        assert!(matches!(err, GenError::InvalidInput { .. }));
        assert!(err.to_string().contains("Blob"));
    }

    #[test]
    fn test_without_filters() {
        let keyless = Element::new(
            "Event",
            vec![ElementField::new("Kind", FieldType::Varchar).size(20)],
        );
        let sql = generate(&keyless, 150);
        assert!(sql.contains("SET @sqlparam = N''"));
        assert!(sql.contains("EXECUTE sp_executesql @query, @countparam, @qtdtotal = @qtdtotal OUTPUT\n"));
        assert!(sql.contains("    EXECUTE sp_executesql @query\nEND\n"));
    }

    #[test]
    fn test_paging_guards() {
        let sql = generate(&customer(), 150);
        assert!(sql.contains("IF @pag IS NULL OR @pag < 1\n        SET @pag = 1"));
        assert!(sql.contains("IF @qtdtotal IS NULL OR @qtdtotal = 0"));
        assert!(sql.contains("IF @regporpag IS NULL OR @regporpag <= 0"));
    }

    #[test]
    fn test_lob_filters() {
        let element = Element::new(
            "Note",
            vec![
                ElementField::new("Id", FieldType::Int).pk(),
                ElementField::new("Body", FieldType::NText).filter(FilterMode::Equal),
            ],
        );
        let sql = generate(&element, 150);
        assert!(sql.contains("@Body NVARCHAR(MAX) = NULL,"));
        assert!(sql.contains("N' AND Body LIKE @Body'"));

        let ranged = Element::new(
            "Note",
            vec![ElementField::new("Body", FieldType::Text).filter(FilterMode::Range)],
        );
        let err = read_procedure_script(&ranged, &SqlServerDialect::new(150)).unwrap_err();
        assert!(err.to_string().contains("field 'Body'"));
    }

    #[test]
    fn test_range_parameter_collision() {
        let element = Element::new(
            "Stay",
            vec![
                ElementField::new("Day", FieldType::Date).filter(FilterMode::Range),
                ElementField::new("Day_from", FieldType::Date).filter(FilterMode::Equal),
            ],
        );
        let err = read_procedure_script(&element, &SqlServerDialect::new(150)).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_rejects_unreadable_and_reserved() {
        let dialect = SqlServerDialect::new(150);
        let hidden = Element::new(
            "Hidden",
            vec![ElementField::new("Secret", FieldType::Int).behavior(FieldBehavior::Virtual)],
        );
        let err = read_procedure_script(&hidden, &dialect).unwrap_err();
        assert!(err.to_string().contains("no Real or ViewOnly"));

        let reserved = Element::new(
            "Paging",
            vec![ElementField::new("pag", FieldType::Int)],
        );
        let err = read_procedure_script(&reserved, &dialect).unwrap_err();
        assert!(err.to_string().contains("field 'pag'"));

        // Row number alias of the legacy paging wrapper
        let row_number = Element::new(
            "Paging",
            vec![
                ElementField::new("Id", FieldType::Int).pk(),
                ElementField::new("__rn", FieldType::Int),
            ],
        );
        let err = read_procedure_script(&row_number, &SqlServerDialect::new(100)).unwrap_err();
        assert!(err.to_string().contains("field '__rn'"));
    }

    #[test]
    fn test_idempotent_output() {
        let element = customer();
        assert_eq!(generate(&element, 100), generate(&element, 100));
        assert_eq!(generate(&element, 150), generate(&element, 150));
    }
}
