//! # mssql-procgen
//!
//! SQL Server stored procedure generator for data dictionary elements.
//!
//! An [`Element`] describes a logical entity and its fields. For each
//! element the library emits T-SQL that:
//!
//! - **Writes** rows through one procedure driven by an `@action` code
//!   (insert, update, delete, or detect insert-vs-update from the key)
//! - **Reads** rows through one procedure with per-field filters, ordering,
//!   paging and an optional total count
//! - **Creates** the backing table when asked to
//!
//! Syntax is chosen from the target database's compatibility level, read
//! from a live server or pinned in configuration.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_procgen::{Element, ElementField, FieldType, FixedCompatibility, ProcedureGenerator};
//!
//! #[tokio::main]
//! async fn main() -> mssql_procgen::Result<()> {
//!     let customer = Element::new(
//!         "Customer",
//!         vec![
//!             ElementField::new("Id", FieldType::Int).pk().auto_num(),
//!             ElementField::new("Name", FieldType::Varchar).size(100).required(),
//!         ],
//!     );
//!     let generator = ProcedureGenerator::new(FixedCompatibility(150));
//!     let set = generator.generate(&customer).await?;
//!     print!("{}", set.write.sql);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dialect;
pub mod drivers;
pub mod error;
pub mod output;
pub mod procedure;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, GenerationConfig};
pub use crate::core::{
    load_elements, CompatibilityProbe, Dialect, Element, ElementField, FieldBehavior, FieldType,
    FilterMode, FixedCompatibility,
};
pub use drivers::{MssqlPool, SqlServerDialect};
pub use error::{GenError, Result};
pub use output::{Manifest, ScriptWriter};
pub use procedure::{generate_scripts, ProcedureGenerator, ProcedureSet, Script, ScriptKind};
