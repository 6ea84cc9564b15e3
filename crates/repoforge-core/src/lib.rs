//! Core types for repoforge: the introspected schema model, the generator
//! configuration, the error taxonomy, and the PostgreSQL-to-Go type mapper.

pub mod config;
pub mod error;
pub mod gotype;
pub mod schema;

pub use config::{
    Config, CrossSchemaConfig, IncrementalConfig, MigrationFormat, MigrationsConfig, MockProvider,
    OutputDirs, ParallelConfig, TemplateOptimization,
};
pub use error::{ForgeError, Result};
pub use gotype::{go_import, go_type, FALLBACK_TYPE};
pub use schema::{Column, ForeignKey, Index, Schema, Table};
