//! Type rendering for generated T-SQL.
//!
//! Maps the closed [`FieldType`](crate::core::FieldType) enumeration to
//! SQL Server type declarations used in procedure parameters and table
//! columns.

mod typemap;

pub use typemap::{sql_type, text_filter_type};
