//! Stored procedure generation.
//!
//! - [`write`]: insert/update/delete procedure driven by `@action`
//! - [`read`]: filtered, ordered and paged select procedure
//! - [`table`]: backing table DDL
//! - [`script`]: text assembly and `GO` batch splitting
//!
//! The generator functions are pure: they never mutate the element, keep
//! no state between calls, and return byte-identical text for identical
//! input. [`ProcedureGenerator`] adds the one blocking step, asking a
//! [`CompatibilityProbe`] for the target's compatibility level.

pub mod read;
pub mod script;
pub mod table;
pub mod write;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

pub use read::read_procedure_script;
pub use table::table_script;
pub use write::write_procedure_script;

use crate::core::schema::Element;
use crate::core::traits::{CompatibilityProbe, Dialect};
use crate::drivers::mssql::SqlServerDialect;
use crate::error::Result;

/// Kind of generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    Table,
    Write,
    Read,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Table => "table",
            ScriptKind::Write => "write",
            ScriptKind::Read => "read",
        }
    }
}

/// One generated script, terminated by `GO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub kind: ScriptKind,
    /// Table or procedure created by the script.
    pub object_name: String,
    pub sql: String,
}

impl Script {
    /// File name used when persisting the script.
    pub fn file_name(&self) -> String {
        match self.kind {
            ScriptKind::Table => format!("{}.table.sql", self.object_name),
            _ => format!("{}.sql", self.object_name),
        }
    }

    /// SHA-256 of the script text.
    pub fn fingerprint(&self) -> String {
        format!("{:x}", Sha256::digest(self.sql.as_bytes()))
    }
}

/// Scripts generated for one element.
#[derive(Debug, Clone)]
pub struct ProcedureSet {
    pub element: String,
    pub table: Option<Script>,
    pub write: Script,
    pub read: Script,
}

impl ProcedureSet {
    /// Scripts in deployment order (table first).
    pub fn scripts(&self) -> impl Iterator<Item = &Script> {
        self.table
            .iter()
            .chain(std::iter::once(&self.write))
            .chain(std::iter::once(&self.read))
    }
}

/// Generate every script of an element for a known dialect.
pub fn generate_scripts(
    element: &Element,
    dialect: &SqlServerDialect,
    include_table: bool,
) -> Result<ProcedureSet> {
    // Fail before any script is built
    element.validate()?;

    let table = if include_table {
        Some(Script {
            kind: ScriptKind::Table,
            object_name: element.table_name.clone(),
            sql: table_script(element)?,
        })
    } else {
        None
    };

    Ok(ProcedureSet {
        element: element.name.clone(),
        table,
        write: Script {
            kind: ScriptKind::Write,
            object_name: element.write_procedure(),
            sql: write_procedure_script(element, dialect)?,
        },
        read: Script {
            kind: ScriptKind::Read,
            object_name: element.read_procedure(),
            sql: read_procedure_script(element, dialect)?,
        },
    })
}

/// Generates procedure scripts for the database behind a probe.
pub struct ProcedureGenerator<P> {
    probe: P,
    include_table: bool,
}

impl<P: CompatibilityProbe> ProcedureGenerator<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            include_table: false,
        }
    }

    /// Also emit the backing table script.
    pub fn with_table_scripts(mut self, enabled: bool) -> Self {
        self.include_table = enabled;
        self
    }

    /// Ask the probe for the dialect. Errors propagate unchanged.
    pub async fn dialect(&self) -> Result<SqlServerDialect> {
        let level = self.probe.compatibility_level().await?;
        Ok(SqlServerDialect::new(level))
    }

    /// Generate the scripts of one element.
    ///
    /// Metadata is validated before the probe is consulted.
    pub async fn generate(&self, element: &Element) -> Result<ProcedureSet> {
        element.validate()?;
        let dialect = self.dialect().await?;
        generate_scripts(element, &dialect, self.include_table)
    }

    /// Generate the scripts of several elements with a single probe call.
    ///
    /// Fails on the first invalid element; nothing is returned for the
    /// others.
    pub async fn generate_all(&self, elements: &[Element]) -> Result<Vec<ProcedureSet>> {
        for element in elements {
            element.validate()?;
        }
        let dialect = self.dialect().await?;
        info!(
            "Generating scripts for {} element(s) at compatibility level {}",
            elements.len(),
            dialect.compatibility_level()
        );

        elements
            .iter()
            .map(|e| generate_scripts(e, &dialect, self.include_table))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::core::schema::{ElementField, FieldType};
    use crate::core::traits::FixedCompatibility;
    use crate::error::GenError;

    /// Probe that counts calls and fails like an unreachable server.
    struct UnreachableProbe {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompatibilityProbe for UnreachableProbe {
        async fn compatibility_level(&self) -> Result<u16> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(GenError::pool("connection refused", "probing compatibility level"))
        }
    }

    fn customer() -> Element {
        Element::new(
            "Customer",
            vec![
                ElementField::new("Id", FieldType::Int).pk().auto_num(),
                ElementField::new("Name", FieldType::Varchar).size(100).required(),
            ],
        )
    }

    #[tokio::test]
    async fn test_generate_customer() {
        let generator = ProcedureGenerator::new(FixedCompatibility(150));
        let set = generator.generate(&customer()).await.unwrap();

        assert_eq!(set.element, "Customer");
        assert!(set.table.is_none());
        assert_eq!(set.write.object_name, "CustomerSet");
        assert_eq!(set.read.object_name, "CustomerGet");
        assert!(set.write.sql.starts_with("CREATE OR ALTER PROCEDURE CustomerSet"));
        assert!(set.write.sql.contains("OUTPUT Inserted.Id"));
        assert!(set.read.sql.starts_with("CREATE OR ALTER PROCEDURE CustomerGet"));
    }

    #[tokio::test]
    async fn test_generate_with_table_orders_scripts() {
        let generator = ProcedureGenerator::new(FixedCompatibility(120)).with_table_scripts(true);
        let set = generator.generate(&customer()).await.unwrap();
        let kinds: Vec<_> = set.scripts().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ScriptKind::Table, ScriptKind::Write, ScriptKind::Read]);
        assert_eq!(set.table.as_ref().unwrap().file_name(), "Customer.table.sql");
        assert_eq!(set.write.file_name(), "CustomerSet.sql");
    }

    #[tokio::test]
    async fn test_probe_failure_propagates() {
        let probe = UnreachableProbe {
            calls: AtomicUsize::new(0),
        };
        let generator = ProcedureGenerator::new(&probe);
        let err = generator.generate(&customer()).await.unwrap_err();
        assert!(matches!(err, GenError::Pool { .. }));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_input_fails_before_probe() {
        let probe = UnreachableProbe {
            calls: AtomicUsize::new(0),
        };
        let generator = ProcedureGenerator::new(&probe);
        let err = generator
            .generate(&Element::new("Empty", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, GenError::InvalidInput { .. }));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generate_all_probes_once() {
        struct CountingProbe(AtomicUsize);

        #[async_trait]
        impl CompatibilityProbe for CountingProbe {
            async fn compatibility_level(&self) -> Result<u16> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(140)
            }
        }

        let probe = CountingProbe(AtomicUsize::new(0));
        let generator = ProcedureGenerator::new(&probe);
        let other = Element::new(
            "Tag",
            vec![ElementField::new("Label", FieldType::NVarchar).size(30).pk()],
        );
        let sets = generator.generate_all(&[customer(), other]).await.unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].write.object_name, "TagSet");
        assert_eq!(probe.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_identical_input_identical_output() {
        let generator = ProcedureGenerator::new(FixedCompatibility(130));
        let first = generator.generate(&customer()).await.unwrap();
        let second = generator.generate(&customer()).await.unwrap();
        assert_eq!(first.write, second.write);
        assert_eq!(first.read, second.read);
        assert_eq!(first.write.fingerprint(), second.write.fingerprint());
        assert_eq!(first.write.fingerprint().len(), 64);
    }

    #[test]
    fn test_generate_from_many_threads() {
        let element = customer();
        let dialect = SqlServerDialect::new(150);
        let expected = write_procedure_script(&element, &dialect).unwrap();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| write_procedure_script(&element, &dialect).unwrap()))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_legacy_write_script_splits_into_two_batches() {
        let set = generate_scripts(&customer(), &SqlServerDialect::new(120), false).unwrap();
        let batches = script::split_batches(&set.write.sql);
        assert_eq!(batches.len(), 2);
        assert!(batches[0].starts_with("IF OBJECT_ID('CustomerSet', 'P') IS NOT NULL"));
        assert!(batches[1].starts_with("CREATE PROCEDURE CustomerSet"));
    }
}
