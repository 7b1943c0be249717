//! Persisting generated scripts.
//!
//! Each script lands in its own `.sql` file under the output directory,
//! alongside a `manifest.json` describing what was generated.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::procedure::{ProcedureSet, ScriptKind};

/// Name of the manifest written next to the scripts.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Record of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    /// When the scripts were written.
    pub generated_at: DateTime<Utc>,

    /// Compatibility level the scripts target.
    pub compatibility_level: u16,

    /// SHA256 hash of the generation settings.
    pub config_hash: String,

    /// One entry per written file, in deployment order.
    pub scripts: Vec<ManifestEntry>,
}

/// One written script.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    pub element: String,
    pub kind: ScriptKind,
    pub object: String,
    pub file: String,
    pub sha256: String,
}

/// Writes procedure sets to a directory.
pub struct ScriptWriter {
    dir: PathBuf,
}

impl ScriptWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write every script and the manifest, creating the directory if
    /// needed. Existing files with the same names are overwritten.
    pub fn write(
        &self,
        sets: &[ProcedureSet],
        compatibility_level: u16,
        config_hash: &str,
    ) -> Result<Manifest> {
        std::fs::create_dir_all(&self.dir)?;

        let mut entries = Vec::new();
        for set in sets {
            for script in set.scripts() {
                let file = script.file_name();
                let path = self.dir.join(&file);
                std::fs::write(&path, &script.sql)?;
                debug!("Wrote {} ({} bytes)", path.display(), script.sql.len());

                entries.push(ManifestEntry {
                    element: set.element.clone(),
                    kind: script.kind,
                    object: script.object_name.clone(),
                    file,
                    sha256: script.fingerprint(),
                });
            }
        }

        let manifest = Manifest {
            generated_at: Utc::now(),
            compatibility_level,
            config_hash: config_hash.to_string(),
            scripts: entries,
        };

        let content = serde_json::to_string_pretty(&manifest)?;
        // Atomic write: write to temp file, then rename
        let path = self.dir.join(MANIFEST_FILE);
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &path)?;

        info!(
            "Wrote {} script(s) to {}",
            manifest.scripts.len(),
            self.dir.display()
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Element, ElementField, FieldType};
    use crate::drivers::mssql::SqlServerDialect;
    use crate::procedure::generate_scripts;

    fn sets(include_table: bool) -> Vec<ProcedureSet> {
        let element = Element::new(
            "Customer",
            vec![
                ElementField::new("Id", FieldType::Int).pk().auto_num(),
                ElementField::new("Name", FieldType::Varchar).size(100),
            ],
        );
        vec![generate_scripts(&element, &SqlServerDialect::new(150), include_table).unwrap()]
    }

    #[test]
    fn test_writes_scripts_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("sql");
        let writer = ScriptWriter::new(&out);
        let manifest = writer.write(&sets(true), 150, "abc").unwrap();

        assert_eq!(manifest.scripts.len(), 3);
        assert_eq!(manifest.scripts[0].file, "Customer.table.sql");
        assert_eq!(manifest.scripts[1].file, "CustomerSet.sql");
        assert_eq!(manifest.scripts[2].file, "CustomerGet.sql");

        let write_sql = std::fs::read_to_string(out.join("CustomerSet.sql")).unwrap();
        assert!(write_sql.starts_with("CREATE OR ALTER PROCEDURE CustomerSet"));
        assert!(!out.join("manifest.tmp").exists());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(json["compatibility_level"], 150);
        assert_eq!(json["config_hash"], "abc");
        assert_eq!(json["scripts"][1]["kind"], "write");
        assert_eq!(json["scripts"][1]["element"], "Customer");
        assert_eq!(
            json["scripts"][1]["sha256"].as_str().unwrap().len(),
            64
        );
    }

    #[test]
    fn test_rewrite_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ScriptWriter::new(dir.path());
        writer.write(&sets(false), 150, "first").unwrap();
        let manifest = writer.write(&sets(false), 150, "second").unwrap();

        assert_eq!(manifest.scripts.len(), 2);
        let content = std::fs::read_to_string(dir.path().join(MANIFEST_FILE)).unwrap();
        assert!(content.contains("second"));
    }
}
