//! Artifact rendering: turns one `(table, kind)` pair into one file on disk.
//!
//! The renderer is side-effect free until the final rename: output is
//! rendered to memory, written to a sibling temp file, and renamed into
//! place, so an interrupted render never leaves a partial artifact at the
//! final path.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use convert_case::{Case, Casing};
use parking_lot::Mutex;
use repoforge_core::{gotype, Column, Config, ForgeError, Result, Table, FALLBACK_TYPE};
use repoforge_templates::{builtin_source, TemplateCache};
use serde::Serialize;
use std::sync::Arc;

/// The five generated artifact categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Model,
    Interface,
    Implementation,
    Mock,
    Test,
}

impl ArtifactKind {
    /// All kinds in priority order
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Model,
        ArtifactKind::Interface,
        ArtifactKind::Implementation,
        ArtifactKind::Mock,
        ArtifactKind::Test,
    ];

    /// Scheduling priority; lower dispatches earlier
    pub fn priority(self) -> u8 {
        match self {
            ArtifactKind::Model => 1,
            ArtifactKind::Interface => 2,
            ArtifactKind::Implementation => 3,
            ArtifactKind::Mock => 4,
            ArtifactKind::Test => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Interface => "interface",
            ArtifactKind::Implementation => "implementation",
            ArtifactKind::Mock => "mock",
            ArtifactKind::Test => "test",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }

    /// Template implementing this kind. The mock kind picks its template
    /// from the configured provider.
    pub fn template_name(self, config: &Config) -> &'static str {
        match self {
            ArtifactKind::Model => "model",
            ArtifactKind::Interface => "interface",
            ArtifactKind::Implementation => "implementation",
            ArtifactKind::Mock => config.mock_provider.template_name(),
            ArtifactKind::Test => "test",
        }
    }

    /// Output file name for a table: snake-case name plus the kind suffix
    pub fn file_name(self, table: &str) -> String {
        let snake = table.to_case(Case::Snake);
        match self {
            ArtifactKind::Model => format!("{}.go", snake),
            ArtifactKind::Interface | ArtifactKind::Implementation => {
                format!("{}_repository.go", snake)
            }
            ArtifactKind::Mock => format!("{}_repository_mock.go", snake),
            ArtifactKind::Test => format!("{}_repository_test.go", snake),
        }
    }

    /// Resolved output directory for this kind
    pub fn output_dir(self, config: &Config) -> PathBuf {
        let dirs = &config.output_dirs;
        match self {
            ArtifactKind::Model => dirs.models_dir(),
            ArtifactKind::Interface => dirs.interfaces_dir(),
            ArtifactKind::Implementation => dirs.repositories_dir(),
            ArtifactKind::Mock => dirs.mocks_dir(),
            ArtifactKind::Test => dirs.tests_dir(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successfully written artifact
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub table: String,
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// A foreign key that crosses into a sibling schema. Collected during
/// rendering; the coordinator drains the list after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossReference {
    /// Source table
    pub table: String,
    /// Constraint name
    pub foreign_key: String,
    /// Referenced schema
    pub schema: String,
    /// Referenced table (bare name)
    pub referenced_table: String,
}

/// A permitted cross-schema foreign key, resolved into the Go surface the
/// templates emit: a related-entity field on the model and a fetch helper
/// on the repository, both typed against the sibling schema's package.
#[derive(Debug, Serialize)]
struct CrossRelation {
    /// Go field and method name (`user_id` -> `User`)
    field: String,
    /// Sibling package name (snake-cased schema)
    package: String,
    /// Qualified Go type, e.g. `auth.Users`
    go_type: String,
    /// Referencing column in this table
    column: String,
    /// Go field name of the referencing column
    column_field: String,
    /// Qualified SQL table, e.g. `auth.users`
    sql_table: String,
    /// Referenced column
    referenced_column: String,
}

/// The uniform data structure handed to every template
#[derive(Debug, Serialize)]
struct TemplateData<'a> {
    table: &'a Table,
    pascal_name: String,
    /// Package of the artifact being rendered
    package: String,
    /// Package the model struct lives in
    model_package: String,
    /// How this artifact names the model type (`User` or `models.User`)
    model_ref: String,
    /// Whether the artifact must import the model package
    model_import: bool,
    /// Source schema name
    schema: &'a str,
    pk_type: String,
    pk_column: String,
    pk_field: String,
    /// Non-primary-key columns in position order
    value_columns: Vec<&'a Column>,
    /// Columns with a single-column unique index (FindBy* extensions)
    unique_columns: Vec<&'a Column>,
    /// Go import paths required by the column types, plus the sibling
    /// packages referenced by `relations`
    imports: Vec<String>,
    /// Permitted cross-schema foreign keys (see `CrossSchemaConfig`)
    relations: Vec<CrossRelation>,
    /// Unique sibling packages referenced by `relations`
    relation_imports: Vec<String>,
}

/// Renders artifacts for tables of one schema
pub struct Renderer {
    config: Arc<Config>,
    cache: Arc<TemplateCache>,
    schema_name: String,
    cross_refs: Mutex<Vec<CrossReference>>,
}

impl Renderer {
    pub fn new(config: Arc<Config>, cache: Arc<TemplateCache>, schema_name: &str) -> Self {
        Self {
            config,
            cache,
            schema_name: schema_name.to_string(),
            cross_refs: Mutex::new(Vec::new()),
        }
    }

    /// Render one artifact and write it atomically. Returns the written
    /// path on success.
    pub fn render(&self, table: &Table, kind: ArtifactKind) -> Result<RenderedArtifact> {
        let template_name = kind.template_name(&self.config);
        let source = self.template_source(template_name)?;
        let compiled = self.cache.get(template_name, &source)?;

        let data = self.template_data(table, kind);
        let rendered = compiled.render(&data)?;

        let dir = kind.output_dir(&self.config);
        let path = dir.join(kind.file_name(&table.name));
        write_atomic(&path, rendered.as_bytes())?;

        if kind == ArtifactKind::Model {
            self.record_cross_references(table);
        }

        tracing::debug!(table = %table.name, kind = %kind, path = %path.display(), "wrote artifact");
        Ok(RenderedArtifact {
            table: table.name.clone(),
            kind,
            path,
        })
    }

    /// Cross-schema references observed so far; draining resets the channel.
    pub fn take_cross_references(&self) -> Vec<CrossReference> {
        std::mem::take(&mut self.cross_refs.lock())
    }

    /// Template source: a `<name>.tmpl` file in the configured template
    /// directory replaces the built-in of the same name.
    fn template_source(&self, name: &str) -> Result<Cow<'static, str>> {
        if let Some(dir) = &self.config.template_dir {
            let candidate = dir.join(format!("{}.tmpl", name));
            if candidate.is_file() {
                tracing::debug!(template = %name, path = %candidate.display(), "using replacement template");
                return Ok(Cow::Owned(fs::read_to_string(&candidate)?));
            }
        }
        builtin_source(name).map(Cow::Borrowed).ok_or_else(|| {
            ForgeError::Compile {
                template: name.to_string(),
                message: "no built-in template with this name".to_string(),
            }
        })
    }

    fn template_data<'a>(&'a self, table: &'a Table, kind: ArtifactKind) -> TemplateData<'a> {
        let pascal_name = table.name.to_case(Case::Pascal);
        let package = dir_package(&kind.output_dir(&self.config));
        let model_package = dir_package(&ArtifactKind::Model.output_dir(&self.config));

        let (model_ref, model_import) = if kind == ArtifactKind::Model || package == model_package {
            (pascal_name.clone(), false)
        } else {
            (format!("{}.{}", model_package, pascal_name), true)
        };

        // Single-column primary keys drive the repository surface; absent
        // or composite keys fall back to a placeholder the templates are
        // required to tolerate.
        let (pk_type, pk_column, pk_field) = match table.single_primary_key() {
            Some(pk) => (
                pk.go_type.clone(),
                pk.name.clone(),
                pk.name.to_case(Case::Pascal),
            ),
            None => (FALLBACK_TYPE.to_string(), "id".to_string(), "Id".to_string()),
        };

        let value_columns = table.value_columns();
        let unique_columns = table.unique_single_columns();
        let relations = self.cross_relations(table);

        let mut imports: Vec<String> = Vec::new();
        for col in &table.columns {
            if let Some(import) = gotype::go_import(&col.go_type) {
                if !imports.iter().any(|i| i == import) {
                    imports.push(import.to_string());
                }
            }
        }
        // The relation fields reference the sibling package, so its import
        // is always used when emitted.
        for relation in &relations {
            if !imports.iter().any(|i| *i == relation.package) {
                imports.push(relation.package.clone());
            }
        }
        imports.sort();

        let mut relation_imports: Vec<String> =
            relations.iter().map(|r| r.package.clone()).collect();
        relation_imports.sort();
        relation_imports.dedup();

        TemplateData {
            table,
            pascal_name,
            package,
            model_package,
            model_ref,
            model_import,
            schema: &self.schema_name,
            pk_type,
            pk_column,
            pk_field,
            value_columns,
            unique_columns,
            imports,
            relations,
            relation_imports,
        }
    }

    /// Resolve the cross-schema foreign keys the configuration permits.
    /// The sibling schema becomes a package reference; the referenced table
    /// becomes a qualified Go type.
    fn cross_relations(&self, table: &Table) -> Vec<CrossRelation> {
        let mut relations = Vec::new();
        for fk in &table.foreign_keys {
            let (Some(fk_schema), referenced) = fk.referenced_parts() else {
                continue;
            };
            if !self.config.cross_schema.permits(fk_schema) {
                continue;
            }
            if table.column(&fk.column).is_none() {
                tracing::warn!(
                    table = %table.name,
                    foreign_key = %fk.name,
                    column = %fk.column,
                    "foreign key references a column not in the table, skipping relation"
                );
                continue;
            }
            let package = fk_schema.to_case(Case::Snake);
            relations.push(CrossRelation {
                field: relation_field(&fk.column, referenced),
                go_type: format!("{}.{}", package, referenced.to_case(Case::Pascal)),
                package,
                column: fk.column.clone(),
                column_field: fk.column.to_case(Case::Pascal),
                sql_table: fk.referenced_table.clone(),
                referenced_column: fk.referenced_column.clone(),
            });
        }
        relations
    }

    fn record_cross_references(&self, table: &Table) {
        for fk in &table.foreign_keys {
            if let (Some(schema), referenced) = fk.referenced_parts() {
                tracing::debug!(
                    table = %table.name,
                    foreign_key = %fk.name,
                    referenced = %fk.referenced_table,
                    "cross-schema reference"
                );
                self.cross_refs.lock().push(CrossReference {
                    table: table.name.clone(),
                    foreign_key: fk.name.clone(),
                    schema: schema.to_string(),
                    referenced_table: referenced.to_string(),
                });
            }
        }
    }
}

/// Go name for a related-entity accessor: the referencing column minus its
/// `_id` suffix, falling back to the referenced table name.
fn relation_field(column: &str, referenced_table: &str) -> String {
    let base = column
        .strip_suffix("_id")
        .filter(|s| !s.is_empty())
        .unwrap_or(referenced_table);
    base.to_case(Case::Pascal)
}

/// Go package name for an output directory: its last component, snake-cased
fn dir_package(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_case(Case::Snake))
        .unwrap_or_else(|| "generated".to_string())
}

/// Write bytes to `<path>.tmp` and rename over the final path. The temp
/// file lives in the target directory so the rename never crosses a
/// filesystem boundary.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
