//! Data dictionary metadata: elements (tables) and their fields (columns).
//!
//! These types are deserialized from persisted metadata and handed to the
//! generators as read-only input.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::identifier::{validate_object_name, validate_plain_identifier};
use crate::error::{GenError, Result};

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    BigInt,
    Float,
    Bit,
    Varchar,
    NVarchar,
    Text,
    NText,
    Date,
    DateTime,
    DateTime2,
    Time,
    UniqueIdentifier,
}

impl FieldType {
    /// Character types compare and filter as strings.
    pub fn is_character(self) -> bool {
        matches!(
            self,
            FieldType::Varchar | FieldType::NVarchar | FieldType::Text | FieldType::NText
        )
    }

    /// Legacy large-object types that do not support `=`.
    pub fn is_lob(self) -> bool {
        matches!(self, FieldType::Text | FieldType::NText)
    }
}

/// How a field participates in persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FieldBehavior {
    /// Read and written.
    #[default]
    Real,
    /// Read only.
    ViewOnly,
    /// Never persisted.
    Virtual,
}

/// Filter applied to a field by the read procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    #[default]
    None,
    Equal,
    Contain,
    Range,
    MultValuesEqual,
    MultValuesContain,
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementField {
    /// Column name, unique within the element.
    pub name: String,

    /// Data type.
    pub data_type: FieldType,

    /// Character length (-1 for max).
    #[serde(default)]
    pub size: i32,

    /// Part of the primary key.
    #[serde(default)]
    pub is_pk: bool,

    /// Identity column.
    #[serde(default)]
    pub auto_num: bool,

    /// NOT NULL column.
    #[serde(default)]
    pub is_required: bool,

    #[serde(default)]
    pub data_behavior: FieldBehavior,

    /// Whether this key field is part of the delete predicate.
    #[serde(default = "default_true")]
    pub enable_on_delete: bool,

    #[serde(default)]
    pub filter: FilterMode,
}

fn default_true() -> bool {
    true
}

impl ElementField {
    /// Create a nullable, non-key `Real` field.
    pub fn new(name: impl Into<String>, data_type: FieldType) -> Self {
        Self {
            name: name.into(),
            data_type,
            size: 0,
            is_pk: false,
            auto_num: false,
            is_required: false,
            data_behavior: FieldBehavior::Real,
            enable_on_delete: true,
            filter: FilterMode::None,
        }
    }

    pub fn size(mut self, size: i32) -> Self {
        self.size = size;
        self
    }

    /// Mark as primary key (implies required).
    pub fn pk(mut self) -> Self {
        self.is_pk = true;
        self.is_required = true;
        self
    }

    pub fn auto_num(mut self) -> Self {
        self.auto_num = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn behavior(mut self, behavior: FieldBehavior) -> Self {
        self.data_behavior = behavior;
        self
    }

    pub fn filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn disable_on_delete(mut self) -> Self {
        self.enable_on_delete = false;
        self
    }

    /// Check if the field is written by the write procedure.
    pub fn is_real(&self) -> bool {
        self.data_behavior == FieldBehavior::Real
    }

    /// Check if the field is projected by the read procedure.
    pub fn is_readable(&self) -> bool {
        self.data_behavior != FieldBehavior::Virtual
    }

    /// Filter mode used by the read procedure. Keys are always filterable.
    pub fn effective_filter(&self) -> FilterMode {
        match self.filter {
            FilterMode::None if self.is_pk => FilterMode::Equal,
            mode => mode,
        }
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Element {
    /// Logical identifier.
    pub name: String,

    /// Physical table, optionally schema-qualified.
    pub table_name: String,

    /// Ordered column definitions.
    pub fields: Vec<ElementField>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_procedure_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_procedure_name: Option<String>,
}

impl Element {
    /// Create an element whose name and table name are the same.
    pub fn new(name: impl Into<String>, fields: Vec<ElementField>) -> Self {
        let name = name.into();
        Self {
            table_name: name.clone(),
            name,
            fields,
            write_procedure_name: None,
            read_procedure_name: None,
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Name of the insert/update/delete procedure.
    pub fn write_procedure(&self) -> String {
        self.write_procedure_name
            .clone()
            .unwrap_or_else(|| format!("{}Set", self.table_name))
    }

    /// Name of the paged select procedure.
    pub fn read_procedure(&self) -> String {
        self.read_procedure_name
            .clone()
            .unwrap_or_else(|| format!("{}Get", self.table_name))
    }

    /// Fields written by the write procedure, in element order.
    pub fn write_fields(&self) -> impl Iterator<Item = &ElementField> {
        self.fields.iter().filter(|f| f.is_real())
    }

    /// Fields projected by the read procedure, in element order.
    pub fn read_fields(&self) -> impl Iterator<Item = &ElementField> {
        self.fields.iter().filter(|f| f.is_readable())
    }

    /// Persisted primary key fields, in element order.
    pub fn primary_keys(&self) -> impl Iterator<Item = &ElementField> {
        self.write_fields().filter(|f| f.is_pk)
    }

    /// Check if the element has a persisted primary key.
    pub fn has_pk(&self) -> bool {
        self.primary_keys().next().is_some()
    }

    /// Validate structural metadata shared by every generator.
    ///
    /// # Errors
    ///
    /// Returns `GenError::InvalidInput` naming the element (and field, when
    /// one is at fault).
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GenError::invalid(&self.table_name, "element name is empty"));
        }
        if self.table_name.trim().is_empty() {
            return Err(GenError::invalid(&self.name, "table name is empty"));
        }
        validate_object_name(&self.table_name)
            .map_err(|e| GenError::invalid(&self.name, format!("table name: {}", e)))?;
        if let Some(name) = &self.write_procedure_name {
            validate_object_name(name).map_err(|e| {
                GenError::invalid(&self.name, format!("write procedure name: {}", e))
            })?;
        }
        if let Some(name) = &self.read_procedure_name {
            validate_object_name(name).map_err(|e| {
                GenError::invalid(&self.name, format!("read procedure name: {}", e))
            })?;
        }

        if self.fields.is_empty() {
            return Err(GenError::invalid(&self.name, "element has no fields"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            validate_plain_identifier(&field.name)
                .map_err(|e| GenError::invalid_field(&self.name, &field.name, e))?;
            if !seen.insert(field.name.to_lowercase()) {
                return Err(GenError::invalid_field(
                    &self.name,
                    &field.name,
                    "duplicate field name",
                ));
            }
            validate_size(field).map_err(|e| GenError::invalid_field(&self.name, &field.name, e))?;
        }

        Ok(())
    }

    /// Fail when a field would shadow one of the generated parameter names.
    pub(crate) fn reject_reserved(&self, reserved: &[&str]) -> Result<()> {
        for field in &self.fields {
            if reserved.iter().any(|r| r.eq_ignore_ascii_case(&field.name)) {
                return Err(GenError::invalid_field(
                    &self.name,
                    &field.name,
                    "name collides with a name the generated procedure declares",
                ));
            }
        }
        Ok(())
    }
}

/// Check the declared size against the limits of the field's type.
fn validate_size(field: &ElementField) -> std::result::Result<(), String> {
    let max = match field.data_type {
        FieldType::Varchar => 8000,
        FieldType::NVarchar => 4000,
        _ => return Ok(()),
    };
    if field.size == -1 || (1..=max).contains(&field.size) {
        Ok(())
    } else {
        Err(format!(
            "size {} is invalid for {:?} (expected -1 or 1..={})",
            field.size, field.data_type, max
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer() -> Element {
        Element::new(
            "Customer",
            vec![
                ElementField::new("Id", FieldType::Int).pk().auto_num(),
                ElementField::new("Name", FieldType::Varchar).size(100).required(),
                ElementField::new("Balance", FieldType::Float).behavior(FieldBehavior::ViewOnly),
                ElementField::new("Label", FieldType::Varchar)
                    .size(20)
                    .behavior(FieldBehavior::Virtual),
            ],
        )
    }

    #[test]
    fn test_default_procedure_names() {
        let element = customer().with_table_name("dbo.Customer");
        assert_eq!(element.write_procedure(), "dbo.CustomerSet");
        assert_eq!(element.read_procedure(), "dbo.CustomerGet");
    }

    #[test]
    fn test_field_subsets_follow_behavior() {
        let element = customer();
        let write: Vec<_> = element.write_fields().map(|f| f.name.as_str()).collect();
        let read: Vec<_> = element.read_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(write, vec!["Id", "Name"]);
        assert_eq!(read, vec!["Id", "Name", "Balance"]);
        assert!(element.has_pk());
    }

    #[test]
    fn test_view_only_key_is_not_a_write_key() {
        let element = Element::new(
            "Audit",
            vec![
                ElementField::new("Id", FieldType::Int)
                    .pk()
                    .behavior(FieldBehavior::ViewOnly),
                ElementField::new("Note", FieldType::NVarchar).size(50),
            ],
        );
        assert!(!element.has_pk());
    }

    #[test]
    fn test_effective_filter_for_keys() {
        let key = ElementField::new("Id", FieldType::Int).pk();
        let ranged = ElementField::new("Id", FieldType::Int).pk().filter(FilterMode::Range);
        let plain = ElementField::new("Name", FieldType::Varchar).size(10);
        assert_eq!(key.effective_filter(), FilterMode::Equal);
        assert_eq!(ranged.effective_filter(), FilterMode::Range);
        assert_eq!(plain.effective_filter(), FilterMode::None);
    }

    #[test]
    fn test_validate_accepts_customer() {
        assert!(customer().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let element = Element::new("Empty", vec![]);
        let err = element.validate().unwrap_err();
        assert!(matches!(err, GenError::InvalidInput { ref element, .. } if element == "Empty"));
    }

    #[test]
    fn test_validate_rejects_duplicate_field() {
        let element = Element::new(
            "Dup",
            vec![
                ElementField::new("Code", FieldType::Int),
                ElementField::new("code", FieldType::Int),
            ],
        );
        let err = element.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate"));
        assert!(err.contains("'code'"));
    }

    #[test]
    fn test_validate_rejects_bad_sizes() {
        for size in [0, -2, 8001] {
            let element = Element::new(
                "Sized",
                vec![ElementField::new("Text", FieldType::Varchar).size(size)],
            );
            let err = element.validate().unwrap_err().to_string();
            assert!(err.contains("field 'Text'"), "size {}: {}", size, err);
        }

        let element = Element::new(
            "Sized",
            vec![ElementField::new("Text", FieldType::NVarchar).size(4001)],
        );
        assert!(element.validate().is_err());

        let element = Element::new(
            "Sized",
            vec![ElementField::new("Text", FieldType::NVarchar).size(-1)],
        );
        assert!(element.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_unsafe_names() {
        let element = Element::new(
            "Bad",
            vec![ElementField::new("Name; DROP TABLE x", FieldType::Int)],
        );
        assert!(element.validate().is_err());

        let element = Element::new("Bad", vec![ElementField::new("Id", FieldType::Int)])
            .with_table_name("dbo.[Bad]");
        assert!(element.validate().is_err());
    }

    #[test]
    fn test_reject_reserved_is_case_insensitive() {
        let element = Element::new("R", vec![ElementField::new("ret", FieldType::Int)]);
        let err = element.reject_reserved(&["RET"]).unwrap_err().to_string();
        assert!(err.contains("field 'ret'"));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "name": "Customer",
            "table_name": "Customer",
            "fields": [
                { "name": "Id", "data_type": "Int", "is_pk": true, "auto_num": true },
                { "name": "Name", "data_type": "Varchar", "size": 100, "filter": "Contain" }
            ]
        }"#;
        let element: Element = serde_json::from_str(json).unwrap();
        assert_eq!(element.fields.len(), 2);
        assert!(element.fields[0].enable_on_delete);
        assert_eq!(element.fields[0].data_behavior, FieldBehavior::Real);
        assert_eq!(element.fields[1].filter, FilterMode::Contain);
        assert!(element.write_procedure_name.is_none());
    }
}
