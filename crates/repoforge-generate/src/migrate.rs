//! Goose migration emission for table-level schema changes.
//!
//! Added tables produce a full `CREATE TABLE` (columns, primary key,
//! secondary indexes, foreign keys) with a `DROP TABLE` down script;
//! removed tables produce the inverse. Column-level diffs have reserved
//! hooks that currently emit nothing.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use repoforge_core::{Column, Result, Schema, Table};
use repoforge_templates::{builtin_source, TemplateCache};
use serde::Serialize;

use crate::detect::ChangeSet;

const GOOSE_TEMPLATE: &str = "migration_goose";

#[derive(Serialize)]
struct GooseSections {
    up: String,
    down: String,
}

/// Emits one goose-format SQL file per table-level diff operation
pub struct MigrationEmitter {
    cache: Arc<TemplateCache>,
    output_dir: PathBuf,
}

impl MigrationEmitter {
    pub fn new(cache: Arc<TemplateCache>, output_dir: PathBuf) -> Self {
        Self { cache, output_dir }
    }

    /// Emit migrations for the change set. Versions start at the current
    /// wall-clock second and increment per file so one run never produces
    /// duplicate version numbers.
    pub fn emit(&self, changes: &ChangeSet, schema: &Schema) -> Result<Vec<PathBuf>> {
        let base: u64 = Utc::now()
            .format("%Y%m%d%H%M%S")
            .to_string()
            .parse()
            .unwrap_or(0);
        self.emit_with_version(changes, schema, base)
    }

    /// Version-pinned variant of [`emit`](Self::emit)
    pub fn emit_with_version(
        &self,
        changes: &ChangeSet,
        schema: &Schema,
        version_base: u64,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let mut version = version_base;

        for name in changes.added() {
            let Some(table) = schema.table(name) else {
                continue;
            };
            let up = create_table_script(table);
            let down = drop_table_sql(&table.name);
            let path = self.write_migration(version, &format!("create_{}", table.name), &up, &down)?;
            written.push(path);
            version += 1;
        }

        for name in changes.removed() {
            let up = drop_table_sql(name);
            // The previous definition is not recorded in the manifest, so
            // the down script only restores a stub.
            let down = format!("CREATE TABLE {} ();", name);
            let path = self.write_migration(version, &format!("drop_{}", name), &up, &down)?;
            written.push(path);
            version += 1;
        }

        if !written.is_empty() {
            tracing::info!(files = written.len(), dir = %self.output_dir.display(), "wrote migrations");
        }
        Ok(written)
    }

    fn write_migration(
        &self,
        version: u64,
        description: &str,
        up: &str,
        down: &str,
    ) -> Result<PathBuf> {
        let source = builtin_source(GOOSE_TEMPLATE).unwrap_or_default();
        let compiled = self.cache.get(GOOSE_TEMPLATE, source)?;
        let rendered = compiled.render(&GooseSections {
            up: up.to_string(),
            down: down.to_string(),
        })?;

        let path = self
            .output_dir
            .join(format!("{}_{}.sql", version, description));
        fs::write(&path, rendered)?;
        Ok(path)
    }
}

fn create_table_script(table: &Table) -> String {
    let mut statements = vec![create_table_sql(table)];
    for index in &table.indexes {
        let unique = if index.is_unique { "UNIQUE " } else { "" };
        statements.push(format!(
            "CREATE {}INDEX {} ON {} ({});",
            unique,
            index.name,
            table.name,
            index.columns.join(", ")
        ));
    }
    for fk in &table.foreign_keys {
        statements.push(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
            table.name, fk.name, fk.column, fk.referenced_table, fk.referenced_column
        ));
    }
    statements.join("\n")
}

fn create_table_sql(table: &Table) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|col| format!("    {}", column_definition(col)))
        .collect();
    if !table.primary_keys.is_empty() {
        lines.push(format!("    PRIMARY KEY ({})", table.primary_keys.join(", ")));
    }
    format!("CREATE TABLE {} (\n{}\n);", table.name, lines.join(",\n"))
}

fn column_definition(col: &Column) -> String {
    let mut def = format!("{} {}", col.name, col.db_type);
    if !col.is_nullable {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = &col.default_value {
        def.push_str(&format!(" DEFAULT {}", default));
    }
    def
}

fn drop_table_sql(name: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", name)
}

/// Reserved hook for column-level diffs; emits nothing yet.
pub fn alter_table_statements(_table: &Table) -> Vec<String> {
    Vec::new()
}

/// Reserved hook for index-level diffs; emits nothing yet.
pub fn alter_index_statements(_table: &Table) -> Vec<String> {
    Vec::new()
}

/// Reserved hook for foreign-key diffs; emits nothing yet.
pub fn alter_foreign_key_statements(_table: &Table) -> Vec<String> {
    Vec::new()
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;

/// Migration subdirectory helper used by the coordinator
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}
