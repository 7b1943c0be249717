//! Core abstractions for procedure generation.
//!
//! - [`schema`]: element and field metadata
//! - [`identifier`]: identifier validation for generated T-SQL
//! - [`metadata`]: loading elements from JSON/YAML files
//! - [`traits`]: compatibility probing and the dialect strategy

pub mod identifier;
pub mod metadata;
pub mod schema;
pub mod traits;

pub use metadata::{load_elements, parse_elements};
pub use schema::{Element, ElementField, FieldBehavior, FieldType, FilterMode};
pub use traits::{CompatibilityProbe, Dialect, FixedCompatibility};
