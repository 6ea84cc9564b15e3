//! Generation pipeline for repoforge: renders artifacts for each table,
//! detects which tables changed since the previous run, schedules the work
//! across a bounded worker pool, and persists a manifest describing the
//! outputs.

pub mod coordinate;
pub mod detect;
pub mod fingerprint;
pub mod migrate;
pub mod render;
pub mod schedule;

pub use coordinate::{Coordinator, GenerationSummary};
pub use detect::{detect, ChangeKind, ChangeSet, TableChange};
pub use fingerprint::{
    config_fingerprint, file_fingerprint, schema_fingerprint, table_fingerprint, FileRecord,
    Manifest, MANIFEST_FILE, MANIFEST_FORMAT_VERSION,
};
pub use migrate::MigrationEmitter;
pub use render::{ArtifactKind, CrossReference, RenderedArtifact, Renderer};
pub use schedule::{build_tasks, Task, WorkScheduler};
