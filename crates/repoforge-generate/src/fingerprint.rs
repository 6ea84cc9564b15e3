//! Fingerprinting and manifest persistence.
//!
//! Fingerprints are SHA-256 hex digests over canonical strings, so they are
//! stable across runs and across processes. Three scopes exist: per table,
//! schema wide, and over the user-visible configuration. The manifest is
//! the persisted record of the previous run; it is written atomically and
//! any parse or version problem degrades to first-run semantics instead of
//! failing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use repoforge_core::{Config, Result, Schema, Table};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Manifest file name, relative to the output base directory
pub const MANIFEST_FILE: &str = ".repoforge-manifest.json";

/// Bumped whenever the manifest layout changes; older or unknown versions
/// are treated as absent.
pub const MANIFEST_FORMAT_VERSION: &str = "1";

fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// Hash of a generated file's content
pub fn file_fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Per-table fingerprint over the canonical column and foreign-key lines.
///
/// Columns contribute in position order, foreign keys in name order, so the
/// digest is independent of catalog query quirks.
pub fn table_fingerprint(table: &Table) -> String {
    let mut canonical = String::new();
    canonical.push_str(&table.name);
    canonical.push('\n');
    for col in &table.columns {
        canonical.push_str(&format!(
            "{}:{}:{}:{}\n",
            col.name, col.db_type, col.is_nullable, col.is_primary_key
        ));
    }
    let mut fks: Vec<_> = table.foreign_keys.iter().collect();
    fks.sort_by(|a, b| a.name.cmp(&b.name));
    for fk in fks {
        canonical.push_str(&format!(
            "{}:{}:{}:{}\n",
            fk.column, fk.referenced_table, fk.referenced_column, fk.name
        ));
    }
    sha256_hex(&canonical)
}

/// Schema-wide fingerprint: per-table fingerprints concatenated in
/// table-name order.
pub fn schema_fingerprint(schema: &Schema) -> String {
    let mut tables: Vec<_> = schema.tables.iter().collect();
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    let mut canonical = String::new();
    for table in tables {
        canonical.push_str(&table_fingerprint(table));
        canonical.push('\n');
    }
    sha256_hex(&canonical)
}

/// Fingerprint over the options that change generated output. Anything not
/// listed here can change between runs without forcing regeneration.
pub fn config_fingerprint(config: &Config) -> String {
    let mut canonical = String::new();
    canonical.push_str(&format!(
        "template_dir:{}\n",
        config
            .template_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    ));
    canonical.push_str(&format!("mock_provider:{}\n", config.mock_provider.as_str()));
    canonical.push_str(&format!("with_tests:{}\n", config.with_tests));
    let mut tables = config.tables.clone();
    tables.sort();
    canonical.push_str(&format!("tables:{}\n", tables.join(",")));
    canonical.push_str(&format!(
        "output_overrides:{}\n",
        config.output_dirs.has_overrides()
    ));
    sha256_hex(&canonical)
}

/// Bookkeeping for one generated file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub size: u64,
    /// Unix mtime, seconds
    pub mtime: i64,
    pub owning_table: String,
    pub artifact_kind: String,
}

/// The persisted record of the previous generation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: String,
    pub last_generation: DateTime<Utc>,
    pub schema_hash: String,
    pub config_hash: String,
    /// table name -> table fingerprint
    pub table_hashes: BTreeMap<String, String>,
    /// relative path -> content fingerprint
    pub file_hashes: BTreeMap<String, String>,
    /// relative path -> file bookkeeping
    pub files: BTreeMap<String, FileRecord>,
}

impl Manifest {
    /// A fresh manifest with no recorded state
    pub fn empty() -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION.to_string(),
            last_generation: Utc::now(),
            schema_hash: String::new(),
            config_hash: String::new(),
            table_hashes: BTreeMap::new(),
            file_hashes: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Load the manifest under `base`. Absent, unreadable, or
    /// version-mismatched manifests return `None` (first-run semantics).
    pub fn load(base: &Path) -> Option<Self> {
        let path = base.join(MANIFEST_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "manifest unreadable, treating as first run");
                return None;
            }
        };
        match serde_json::from_str::<Manifest>(&raw) {
            Ok(manifest) if manifest.format_version == MANIFEST_FORMAT_VERSION => Some(manifest),
            Ok(manifest) => {
                tracing::warn!(
                    found = %manifest.format_version,
                    expected = %MANIFEST_FORMAT_VERSION,
                    "manifest format version mismatch, treating as first run"
                );
                None
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "manifest corrupt, treating as first run");
                None
            }
        }
    }

    /// Persist atomically under `base` (temp file plus rename)
    pub fn store(&self, base: &Path) -> Result<()> {
        let path = base.join(MANIFEST_FILE);
        let tmp = base.join(format!("{}.tmp", MANIFEST_FILE));
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), "manifest written");
        Ok(())
    }

    /// Delete the persisted manifest (forced regeneration)
    pub fn remove(base: &Path) -> Result<()> {
        let path = base.join(MANIFEST_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Relative paths of files owned by `table`
    pub fn files_owned_by(&self, table: &str) -> Vec<String> {
        self.files
            .iter()
            .filter(|(_, record)| record.owning_table == table)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Record one file: hash its content and stat it. `relative` is the
    /// manifest key, `absolute` the on-disk location.
    pub fn record_file(
        &mut self,
        relative: String,
        absolute: &Path,
        owning_table: &str,
        artifact_kind: &str,
    ) -> Result<()> {
        let bytes = fs::read(absolute)?;
        let metadata = fs::metadata(absolute)?;
        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.file_hashes
            .insert(relative.clone(), file_fingerprint(&bytes));
        self.files.insert(
            relative,
            FileRecord {
                size: metadata.len(),
                mtime,
                owning_table: owning_table.to_string(),
                artifact_kind: artifact_kind.to_string(),
            },
        );
        Ok(())
    }
}

/// Relative manifest key for an absolute artifact path
pub fn relative_key(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Build the table-hash mapping for a schema
pub fn table_hashes(schema: &Schema) -> BTreeMap<String, String> {
    schema
        .tables
        .iter()
        .map(|t| (t.name.clone(), table_fingerprint(t)))
        .collect()
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;

#[cfg(test)]
pub(crate) use self::test_fixtures::*;
