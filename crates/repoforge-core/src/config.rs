//! Generator configuration.
//!
//! The configuration is one serde struct tree so it can be deserialized
//! from a TOML file as-is; the CLI overlays flag values on top. All
//! validation happens in [`Config::validate`] before any I/O is attempted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ForgeError, Result};

/// Hard bounds on the worker pool size
pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 32;

/// Top-level generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database connection string (required)
    pub dsn: String,
    /// Source schema name
    pub schema: String,
    /// Explicit table inclusion; empty means all base tables
    pub tables: Vec<String>,
    /// Table exclusion; conflicting with `tables` is a validation error
    pub ignore_tables: Vec<String>,
    pub output_dirs: OutputDirs,
    /// Directory of replacement templates; built-ins are used when absent
    pub template_dir: Option<PathBuf>,
    pub mock_provider: MockProvider,
    /// Generate test skeletons
    pub with_tests: bool,
    pub parallel: ParallelConfig,
    pub template_optimization: TemplateOptimization,
    pub incremental: IncrementalConfig,
    pub cross_schema: CrossSchemaConfig,
    pub migrations: MigrationsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            schema: "public".to_string(),
            tables: Vec::new(),
            ignore_tables: Vec::new(),
            output_dirs: OutputDirs::default(),
            template_dir: None,
            mock_provider: MockProvider::default(),
            with_tests: true,
            parallel: ParallelConfig::default(),
            template_optimization: TemplateOptimization::default(),
            incremental: IncrementalConfig::default(),
            cross_schema: CrossSchemaConfig::default(),
            migrations: MigrationsConfig::default(),
        }
    }
}

impl Config {
    /// Validate the configuration. Called by the coordinator before any
    /// database or filesystem access.
    pub fn validate(&self) -> Result<()> {
        if self.dsn.trim().is_empty() {
            return Err(ForgeError::Config("dsn must not be empty".to_string()));
        }
        if self.schema.trim().is_empty() {
            return Err(ForgeError::Config("schema must not be empty".to_string()));
        }

        let ignored: HashSet<&str> = self.ignore_tables.iter().map(String::as_str).collect();
        let mut conflicts: Vec<&str> = self
            .tables
            .iter()
            .map(String::as_str)
            .filter(|t| ignored.contains(t))
            .collect();
        if !conflicts.is_empty() {
            conflicts.sort_unstable();
            return Err(ForgeError::Config(format!(
                "tables listed in both tables and ignore_tables: {}",
                conflicts.join(", ")
            )));
        }

        if let Some(dir) = &self.template_dir {
            if !dir.is_dir() {
                return Err(ForgeError::Config(format!(
                    "template_dir does not exist: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Effective worker count, clamped to the supported range.
    /// Disabled parallelism collapses to a single worker.
    pub fn worker_count(&self) -> usize {
        if !self.parallel.enabled {
            return 1;
        }
        self.parallel.workers.clamp(MIN_WORKERS, MAX_WORKERS)
    }
}

/// Where generated artifacts land. Unset directories derive from `base`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDirs {
    pub base: PathBuf,
    pub models: Option<PathBuf>,
    pub interfaces: Option<PathBuf>,
    pub repositories: Option<PathBuf>,
    pub mocks: Option<PathBuf>,
    pub tests: Option<PathBuf>,
}

impl Default for OutputDirs {
    fn default() -> Self {
        Self {
            base: PathBuf::from("./output"),
            models: None,
            interfaces: None,
            repositories: None,
            mocks: None,
            tests: None,
        }
    }
}

impl OutputDirs {
    pub fn models_dir(&self) -> PathBuf {
        self.resolve(&self.models, "models")
    }

    pub fn interfaces_dir(&self) -> PathBuf {
        self.resolve(&self.interfaces, "interfaces")
    }

    pub fn repositories_dir(&self) -> PathBuf {
        self.resolve(&self.repositories, "repositories")
    }

    pub fn mocks_dir(&self) -> PathBuf {
        self.resolve(&self.mocks, "mocks")
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.resolve(&self.tests, "tests")
    }

    /// All resolved artifact directories, in artifact-kind order
    pub fn all(&self) -> Vec<PathBuf> {
        vec![
            self.models_dir(),
            self.interfaces_dir(),
            self.repositories_dir(),
            self.mocks_dir(),
            self.tests_dir(),
        ]
    }

    /// True when any directory is set explicitly instead of derived from
    /// `base`. Part of the config fingerprint.
    pub fn has_overrides(&self) -> bool {
        self.models.is_some()
            || self.interfaces.is_some()
            || self.repositories.is_some()
            || self.mocks.is_some()
            || self.tests.is_some()
    }

    fn resolve(&self, explicit: &Option<PathBuf>, default_name: &str) -> PathBuf {
        match explicit {
            Some(path) => path.clone(),
            None => self.base.join(default_name),
        }
    }
}

/// Which mock idiom the mock artifact uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockProvider {
    /// testify-style mocks (`mock.Mock` embedding)
    #[default]
    Testify,
    /// gomock-style mocks (controller + recorder)
    Mock,
}

impl MockProvider {
    /// Name of the built-in template implementing this idiom
    pub fn template_name(&self) -> &'static str {
        match self {
            MockProvider::Testify => "mock_testify",
            MockProvider::Mock => "mock_gomock",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MockProvider::Testify => "testify",
            MockProvider::Mock => "mock",
        }
    }
}

impl FromStr for MockProvider {
    type Err = ForgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "testify" => Ok(MockProvider::Testify),
            "mock" => Ok(MockProvider::Mock),
            other => Err(ForgeError::Config(format!(
                "unknown mock provider '{}' (expected 'testify' or 'mock')",
                other
            ))),
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    pub enabled: bool,
    pub workers: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: 4,
        }
    }
}

/// Template cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptimization {
    pub enabled: bool,
    pub cache_size: usize,
    /// Warm the cache with every built-in template before scheduling
    pub precompile: bool,
}

impl Default for TemplateOptimization {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_size: 50,
            precompile: true,
        }
    }
}

/// Incremental generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalConfig {
    pub enabled: bool,
    /// Discard the manifest and regenerate everything
    pub force: bool,
}

impl Default for IncrementalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            force: false,
        }
    }
}

/// Cross-schema foreign key handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossSchemaConfig {
    pub enabled: bool,
    /// Sibling schemas whose packages may be referenced. A non-empty list
    /// is authoritative; an empty list defers to `relationship_detection`.
    pub schemas: Vec<String>,
    /// Pick up cross-schema foreign keys automatically when the allow-list
    /// is empty. With detection off, only allow-listed schemas qualify.
    pub relationship_detection: bool,
}

impl Default for CrossSchemaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            schemas: Vec::new(),
            relationship_detection: true,
        }
    }
}

impl CrossSchemaConfig {
    /// Whether generated code may reference the sibling schema's package
    pub fn permits(&self, schema: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.schemas.is_empty() {
            return self.schemas.iter().any(|s| s == schema);
        }
        self.relationship_detection
    }
}

/// Migration script emission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    pub enabled: bool,
    /// Defaults to `<base>/migrations`
    pub output_dir: Option<PathBuf>,
    pub format: MigrationFormat,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: None,
            format: MigrationFormat::default(),
        }
    }
}

impl MigrationsConfig {
    pub fn resolved_dir(&self, base: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => base.join("migrations"),
        }
    }
}

/// Supported migration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationFormat {
    #[default]
    Goose,
}
