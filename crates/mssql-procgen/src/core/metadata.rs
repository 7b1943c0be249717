//! Loading element metadata from JSON or YAML files.
//!
//! A metadata file holds either a single element or a list of elements.
//! A directory is read file by file in name order; files without a
//! `.json`, `.yaml` or `.yml` extension are skipped.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::schema::Element;
use crate::error::{GenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

fn format_of(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "json" => Some(Format::Json),
        "yaml" | "yml" => Some(Format::Yaml),
        _ => None,
    }
}

/// Parse elements from a metadata string.
///
/// The document shape (list or single element) is detected first so that
/// typed parsing reports the offending key or value with its position.
pub fn parse_elements(content: &str, json: bool) -> Result<Vec<Element>> {
    if json {
        let doc: serde_json::Value = serde_json::from_str(content)?;
        if doc.is_array() {
            Ok(serde_json::from_str::<Vec<Element>>(content)?)
        } else {
            Ok(vec![serde_json::from_str::<Element>(content)?])
        }
    } else {
        let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
        if doc.is_sequence() {
            Ok(serde_yaml::from_str::<Vec<Element>>(content)?)
        } else {
            Ok(vec![serde_yaml::from_str::<Element>(content)?])
        }
    }
}

/// Load elements from a metadata file or a directory of metadata files.
pub fn load_elements<P: AsRef<Path>>(path: P) -> Result<Vec<Element>> {
    let path = path.as_ref();

    if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && format_of(p).is_some())
            .collect();
        files.sort();

        let mut elements = Vec::new();
        for file in files {
            elements.extend(load_file(&file)?);
        }
        debug!(
            "Loaded {} element(s) from directory {}",
            elements.len(),
            path.display()
        );
        return Ok(elements);
    }

    load_file(path)
}

fn load_file(path: &Path) -> Result<Vec<Element>> {
    let format = format_of(path).ok_or_else(|| {
        GenError::Config(format!(
            "unsupported metadata file {} (expected .json, .yaml or .yml)",
            path.display()
        ))
    })?;
    let content = std::fs::read_to_string(path)?;
    let elements =
        parse_elements(&content, format == Format::Json).map_err(|e| match e {
            GenError::Json(e) => metadata_error(path, e),
            GenError::Yaml(e) => metadata_error(path, e),
            other => other,
        })?;
    debug!("Loaded {} element(s) from {}", elements.len(), path.display());
    Ok(elements)
}

fn metadata_error(path: &Path, err: impl std::fmt::Display) -> GenError {
    GenError::Metadata {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
