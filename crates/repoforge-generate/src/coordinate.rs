//! Generation coordinator.
//!
//! Drives one full run: manifest load, directory creation, introspection,
//! change detection, removed-file cleanup, scheduling, optional migration
//! emission, and the final atomic manifest refresh. On any error the
//! manifest is left untouched, so the next run's change detection catches
//! up from the previous consistent state.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use repoforge_core::{Config, Result, Schema, Table};
use repoforge_introspect::{Introspector, PgConnection};
use repoforge_templates::{CacheStats, TemplateCache, BUILTIN_TEMPLATES};
use walkdir::WalkDir;

use crate::detect::{detect, ChangeKind, ChangeSet};
use crate::fingerprint::{
    config_fingerprint, relative_key, schema_fingerprint, table_hashes, Manifest,
};
use crate::migrate::{self, MigrationEmitter};
use crate::render::{CrossReference, Renderer};
use crate::schedule::{build_tasks, WorkScheduler};

/// Outcome of one generation run
#[derive(Debug)]
pub struct GenerationSummary {
    /// Tables in the effective schema
    pub tables: usize,
    /// Artifact files written
    pub written: usize,
    /// Stale files deleted
    pub deleted: usize,
    /// Migration files written
    pub migrations: Vec<PathBuf>,
    /// Cross-schema foreign keys observed during rendering
    pub cross_references: Vec<CrossReference>,
    /// Template cache counters for the run
    pub cache: CacheStats,
    /// True when change detection found nothing to do
    pub up_to_date: bool,
}

/// Orchestrates the full generation cycle
#[derive(Debug)]
pub struct Coordinator {
    config: Arc<Config>,
    cache: Arc<TemplateCache>,
}

impl Coordinator {
    /// Validates the configuration and sets up the shared template cache.
    /// Fails before any I/O when the configuration is inconsistent.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let cache_size = if config.template_optimization.enabled {
            config.template_optimization.cache_size.max(1)
        } else {
            1
        };
        Ok(Self {
            config: Arc::new(config),
            cache: Arc::new(TemplateCache::new(cache_size)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Full run against a live database: introspect, then generate.
    pub async fn run(&self) -> Result<GenerationSummary> {
        let manifest = self.prepare()?;

        let conn = PgConnection::connect(&self.config.dsn).await?;
        let introspector = Introspector::new(&conn, self.config.schema.clone());
        let mut schema = introspector.introspect(&self.config.tables).await?;
        self.apply_exclusions(&mut schema);

        self.generate_with(schema, manifest).await
    }

    /// Generate from an already materialized schema. Behaves exactly like
    /// [`run`](Self::run) minus the introspection phase.
    pub async fn generate(&self, mut schema: Schema) -> Result<GenerationSummary> {
        let manifest = self.prepare()?;
        self.apply_exclusions(&mut schema);
        self.generate_with(schema, manifest).await
    }

    /// Manifest handling and directory creation shared by both entry points
    fn prepare(&self) -> Result<Option<Manifest>> {
        let base = &self.config.output_dirs.base;
        fs::create_dir_all(base)?;

        if self.config.incremental.force {
            Manifest::remove(base)?;
            tracing::info!("forced regeneration, manifest cleared");
        }
        let manifest = Manifest::load(base);

        for dir in self.config.output_dirs.all() {
            fs::create_dir_all(&dir)?;
        }
        Ok(manifest)
    }

    fn apply_exclusions(&self, schema: &mut Schema) {
        if self.config.ignore_tables.is_empty() {
            return;
        }
        schema
            .tables
            .retain(|t| !self.config.ignore_tables.iter().any(|ig| ig == &t.name));
    }

    async fn generate_with(
        &self,
        schema: Schema,
        manifest: Option<Manifest>,
    ) -> Result<GenerationSummary> {
        let config_hash = config_fingerprint(&self.config);

        let changes = if self.config.incremental.enabled {
            detect(&schema, manifest.as_ref(), &config_hash)
        } else {
            all_added(&schema)
        };

        if changes.is_empty() {
            // Nothing to do: bump the timestamp so the manifest records
            // this run, keep everything else as-is.
            let mut updated = manifest.unwrap_or_else(Manifest::empty);
            updated.last_generation = chrono::Utc::now();
            updated.schema_hash = schema_fingerprint(&schema);
            updated.config_hash = config_hash;
            updated.table_hashes = table_hashes(&schema);
            if let Err(e) = updated.store(&self.config.output_dirs.base) {
                tracing::warn!(error = %e, "manifest timestamp update failed");
            }
            tracing::info!("schema unchanged, nothing to generate");
            return Ok(GenerationSummary {
                tables: schema.tables.len(),
                written: 0,
                deleted: 0,
                migrations: Vec::new(),
                cross_references: Vec::new(),
                cache: self.cache.stats(),
                up_to_date: true,
            });
        }

        let deleted = self.delete_removed(manifest.as_ref(), &changes)?;

        if self.config.template_optimization.precompile {
            self.cache.precompile(BUILTIN_TEMPLATES.iter().copied())?;
        }

        let targets: Vec<Arc<Table>> = changes
            .to_regenerate()
            .into_iter()
            .filter_map(|name| schema.table(name).cloned().map(Arc::new))
            .collect();
        let tasks = build_tasks(&targets, self.config.with_tests);
        tracing::info!(
            tables = targets.len(),
            tasks = tasks.len(),
            workers = self.config.worker_count(),
            "scheduling generation"
        );

        let renderer = Arc::new(Renderer::new(
            self.config.clone(),
            self.cache.clone(),
            &schema.name,
        ));
        let scheduler = WorkScheduler::new(self.config.worker_count());
        let artifacts = scheduler.run(renderer.clone(), tasks).await?;

        let migrations = if self.config.migrations.enabled {
            let dir = self
                .config
                .migrations
                .resolved_dir(&self.config.output_dirs.base);
            migrate::ensure_dir(&dir)?;
            MigrationEmitter::new(self.cache.clone(), dir).emit(&changes, &schema)?
        } else {
            Vec::new()
        };

        let cross_references = renderer.take_cross_references();

        let new_manifest =
            self.refresh_manifest(&schema, config_hash, manifest.as_ref(), &changes, &artifacts)?;
        // Outputs are already valid at this point; a failed manifest write
        // only costs the next run some extra regeneration.
        if let Err(e) = new_manifest.store(&self.config.output_dirs.base) {
            tracing::warn!(error = %e, "manifest write failed, next run will regenerate more than necessary");
        }

        Ok(GenerationSummary {
            tables: schema.tables.len(),
            written: artifacts.len(),
            deleted,
            migrations,
            cross_references,
            cache: self.cache.stats(),
            up_to_date: false,
        })
    }

    /// Delete files owned by removed tables, per the old manifest
    fn delete_removed(&self, manifest: Option<&Manifest>, changes: &ChangeSet) -> Result<usize> {
        let Some(manifest) = manifest else {
            return Ok(0);
        };
        let base = &self.config.output_dirs.base;
        let mut deleted = 0;
        for table in changes.removed() {
            for relative in manifest.files_owned_by(table) {
                let path = base.join(&relative);
                match fs::remove_file(&path) {
                    Ok(()) => {
                        tracing::debug!(path = %path.display(), table = %table, "deleted stale artifact");
                        deleted += 1;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(deleted)
    }

    /// Build the next manifest: carry forward entries for untouched tables,
    /// add the artifacts of this run, then walk the output tree once to
    /// hash and stat every expected file. Files that vanished are dropped
    /// with a warning.
    fn refresh_manifest(
        &self,
        schema: &Schema,
        config_hash: String,
        previous: Option<&Manifest>,
        changes: &ChangeSet,
        artifacts: &[crate::render::RenderedArtifact],
    ) -> Result<Manifest> {
        let base = &self.config.output_dirs.base;

        // Expected files: previous entries minus removed tables, plus the
        // artifacts just written.
        let mut expected: BTreeMap<String, (String, String)> = BTreeMap::new();
        if let Some(previous) = previous {
            let removed: Vec<&str> = changes
                .changes
                .iter()
                .filter(|c| c.kind == ChangeKind::Removed)
                .map(|c| c.table.as_str())
                .collect();
            for (path, record) in &previous.files {
                if removed.contains(&record.owning_table.as_str()) {
                    continue;
                }
                expected.insert(
                    path.clone(),
                    (record.owning_table.clone(), record.artifact_kind.clone()),
                );
            }
        }
        for artifact in artifacts {
            expected.insert(
                relative_key(base, &artifact.path),
                (artifact.table.clone(), artifact.kind.as_str().to_string()),
            );
        }

        let mut manifest = Manifest::empty();
        manifest.schema_hash = schema_fingerprint(schema);
        manifest.config_hash = config_hash;
        manifest.table_hashes = table_hashes(schema);

        // One walk over the artifact directories; files outside the
        // expected set (editor droppings, foreign files) are left alone.
        let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();
        for dir in self.config.output_dirs.all() {
            for entry in WalkDir::new(&dir).into_iter().filter_map(|e| e.ok()) {
                if entry.file_type().is_file() {
                    seen.insert(
                        relative_key(base, entry.path()),
                        entry.path().to_path_buf(),
                    );
                }
            }
        }

        for (relative, (table, kind)) in expected {
            match seen.get(&relative) {
                Some(absolute) => {
                    manifest.record_file(relative, absolute, &table, &kind)?;
                }
                None => {
                    tracing::warn!(path = %relative, "expected artifact missing from disk, dropping from manifest");
                }
            }
        }

        Ok(manifest)
    }
}

/// Change set that regenerates every table (incremental mode off)
fn all_added(schema: &Schema) -> ChangeSet {
    let mut set = ChangeSet::default();
    for table in &schema.tables {
        set.changes.push(crate::detect::TableChange {
            table: table.name.clone(),
            kind: ChangeKind::Added,
        });
    }
    set
}

#[cfg(test)]
#[path = "coordinate_tests.rs"]
mod tests;
