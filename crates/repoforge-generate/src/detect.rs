//! Incremental change detection.
//!
//! Compares the current schema fingerprints against the persisted manifest
//! and reports which tables need regeneration. Unchanged tables are simply
//! absent from the change set.

use repoforge_core::Schema;

use crate::fingerprint::{schema_fingerprint, table_fingerprint, Manifest};

/// What happened to a table since the previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

/// One table-level change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableChange {
    pub table: String,
    pub kind: ChangeKind,
}

/// The detector's output
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub changes: Vec<TableChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    fn names_of(&self, kind: ChangeKind) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.table.as_str())
            .collect()
    }

    pub fn added(&self) -> Vec<&str> {
        self.names_of(ChangeKind::Added)
    }

    pub fn modified(&self) -> Vec<&str> {
        self.names_of(ChangeKind::Modified)
    }

    pub fn removed(&self) -> Vec<&str> {
        self.names_of(ChangeKind::Removed)
    }

    /// Tables the coordinator must regenerate: added plus modified
    pub fn to_regenerate(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| c.kind != ChangeKind::Removed)
            .map(|c| c.table.as_str())
            .collect()
    }

    fn push(&mut self, table: &str, kind: ChangeKind) {
        self.changes.push(TableChange {
            table: table.to_string(),
            kind,
        });
    }
}

/// Diff the current schema against the previous run.
///
/// Decision rules, in order:
/// 1. No manifest, or the persisted config fingerprint differs: every
///    current table is `added`; nothing is `modified` or `removed`.
/// 2. Equal schema fingerprints: the empty set.
/// 3. Otherwise a per-table diff over the fingerprint maps.
pub fn detect(schema: &Schema, manifest: Option<&Manifest>, config_hash: &str) -> ChangeSet {
    let mut set = ChangeSet::default();

    let manifest = match manifest {
        Some(m) if m.config_hash == config_hash => m,
        _ => {
            for table in &schema.tables {
                set.push(&table.name, ChangeKind::Added);
            }
            tracing::debug!(
                tables = set.len(),
                "no usable manifest, regenerating everything"
            );
            return set;
        }
    };

    if manifest.schema_hash == schema_fingerprint(schema) {
        return set;
    }

    for table in &schema.tables {
        let current = table_fingerprint(table);
        match manifest.table_hashes.get(&table.name) {
            None => set.push(&table.name, ChangeKind::Added),
            Some(previous) if *previous != current => set.push(&table.name, ChangeKind::Modified),
            Some(_) => {}
        }
    }
    for name in manifest.table_hashes.keys() {
        if schema.table(name).is_none() {
            set.push(name, ChangeKind::Removed);
        }
    }

    tracing::info!(
        added = set.added().len(),
        modified = set.modified().len(),
        removed = set.removed().len(),
        "change detection complete"
    );
    set
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
