//! Tests for the generation coordinator. These run the full pipeline
//! against hand-built schemas; no database is involved.

use std::fs;
use std::path::Path;

use repoforge_core::{Config, ForgeError, Schema};
use tempfile::TempDir;

use super::Coordinator;
use crate::fingerprint::{test_column, test_schema, Manifest};

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.dsn = "postgres://localhost/test".to_string();
    config.output_dirs.base = dir.path().to_path_buf();
    config
}

fn artifact_count(base: &Path) -> usize {
    walkdir::WalkDir::new(base)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file() && e.path().extension().map(|x| x == "go").unwrap_or(false)
        })
        .count()
}

#[tokio::test]
async fn first_run_generates_five_files_per_table() {
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(config_in(&dir)).unwrap();

    let summary = coordinator
        .generate(test_schema(&["users", "orders"]))
        .await
        .unwrap();
    assert_eq!(summary.tables, 2);
    assert_eq!(summary.written, 10);
    assert!(!summary.up_to_date);
    assert_eq!(artifact_count(dir.path()), 10);

    let manifest = Manifest::load(dir.path()).unwrap();
    assert_eq!(manifest.table_hashes.len(), 2);
    assert_eq!(manifest.files.len(), 10);
    assert_eq!(manifest.file_hashes.len(), 10);
}

#[tokio::test]
async fn empty_schema_writes_empty_manifest() {
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(config_in(&dir)).unwrap();

    let summary = coordinator.generate(Schema::new("public")).await.unwrap();
    assert_eq!(summary.written, 0);
    assert!(summary.up_to_date);
    assert_eq!(artifact_count(dir.path()), 0);
    assert!(Manifest::load(dir.path()).is_some());
}

#[tokio::test]
async fn second_run_with_no_change_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let schema = test_schema(&["users", "orders"]);

    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    coordinator.generate(schema.clone()).await.unwrap();
    let first = Manifest::load(dir.path()).unwrap();

    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    let summary = coordinator.generate(schema).await.unwrap();
    assert!(summary.up_to_date);
    assert_eq!(summary.written, 0);

    let second = Manifest::load(dir.path()).unwrap();
    assert!(second.last_generation >= first.last_generation);
    assert_eq!(second.schema_hash, first.schema_hash);
}

#[tokio::test]
async fn modified_table_regenerates_only_its_files() {
    let dir = TempDir::new().unwrap();
    let schema = test_schema(&["users", "orders"]);

    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    coordinator.generate(schema.clone()).await.unwrap();

    let orders_model = dir.path().join("models/orders.go");
    let orders_before = fs::read_to_string(&orders_model).unwrap();

    let mut changed = schema.clone();
    let users = changed
        .tables
        .iter_mut()
        .find(|t| t.name == "users")
        .unwrap();
    users
        .columns
        .push(test_column("created_at", "timestamp with time zone", false, 3));

    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    let summary = coordinator.generate(changed).await.unwrap();
    assert_eq!(summary.written, 5);

    let users_model = fs::read_to_string(dir.path().join("models/users.go")).unwrap();
    assert!(users_model.contains("CreatedAt time.Time"));
    assert_eq!(fs::read_to_string(&orders_model).unwrap(), orders_before);
}

#[tokio::test]
async fn removed_table_files_are_deleted() {
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    coordinator
        .generate(test_schema(&["users", "orders"]))
        .await
        .unwrap();
    assert!(dir.path().join("models/orders.go").is_file());

    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    let summary = coordinator.generate(test_schema(&["users"])).await.unwrap();
    assert_eq!(summary.deleted, 5);
    assert!(!dir.path().join("models/orders.go").exists());
    assert!(!dir
        .path()
        .join("repositories/orders_repository.go")
        .exists());

    let manifest = Manifest::load(dir.path()).unwrap();
    assert!(manifest.files_owned_by("orders").is_empty());
    assert!(!manifest.table_hashes.contains_key("orders"));
}

#[tokio::test]
async fn conflicting_table_lists_fail_before_any_io() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.tables = vec!["users".to_string(), "orders".to_string()];
    config.ignore_tables = vec!["users".to_string()];

    let err = Coordinator::new(config).unwrap_err();
    assert!(matches!(err, ForgeError::Config(_)));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn ignored_tables_are_excluded_from_generation() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.ignore_tables = vec!["audit_log".to_string()];

    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator
        .generate(test_schema(&["users", "audit_log"]))
        .await
        .unwrap();
    assert_eq!(summary.tables, 1);
    assert!(!dir.path().join("models/audit_log.go").exists());
}

#[tokio::test]
async fn forced_regeneration_discards_manifest_state() {
    let dir = TempDir::new().unwrap();
    let schema = test_schema(&["users"]);

    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    coordinator.generate(schema.clone()).await.unwrap();

    let mut config = config_in(&dir);
    config.incremental.force = true;
    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator.generate(schema).await.unwrap();
    assert_eq!(summary.written, 5, "force regenerates despite no change");
}

#[tokio::test]
async fn incremental_disabled_always_regenerates() {
    let dir = TempDir::new().unwrap();
    let schema = test_schema(&["users"]);

    let mut config = config_in(&dir);
    config.incremental.enabled = false;
    let coordinator = Coordinator::new(config).unwrap();
    coordinator.generate(schema.clone()).await.unwrap();

    let mut config = config_in(&dir);
    config.incremental.enabled = false;
    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator.generate(schema).await.unwrap();
    assert_eq!(summary.written, 5);
}

#[tokio::test]
async fn with_tests_disabled_skips_test_artifacts() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.with_tests = false;

    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator.generate(test_schema(&["users"])).await.unwrap();
    assert_eq!(summary.written, 4);
    assert!(!dir.path().join("tests/users_repository_test.go").exists());
}

#[tokio::test]
async fn migrations_are_emitted_when_enabled() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.migrations.enabled = true;

    let coordinator = Coordinator::new(config).unwrap();
    let summary = coordinator
        .generate(test_schema(&["users", "orders"]))
        .await
        .unwrap();
    assert_eq!(summary.migrations.len(), 2);
    for path in &summary.migrations {
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("-- +goose Up"));
        assert!(content.contains("-- +goose Down"));
    }
}

#[tokio::test]
async fn precompile_makes_generation_hit_heavy() {
    let dir = TempDir::new().unwrap();
    let coordinator = Coordinator::new(config_in(&dir)).unwrap();
    let summary = coordinator
        .generate(test_schema(&["users", "orders", "payments"]))
        .await
        .unwrap();

    // Every compile happened during precompile; the scheduled work itself
    // only hits.
    assert!(summary.cache.hits >= summary.written as u64);
    assert!(summary.cache.hit_ratio() > 0.5);
}
