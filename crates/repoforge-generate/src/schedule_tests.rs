//! Tests for the work scheduler

use std::collections::HashSet;
use std::fs;
use std::sync::Arc;

use repoforge_core::{gotype, Column, Config, ForgeError, Table};
use repoforge_templates::TemplateCache;
use tempfile::TempDir;

use super::{build_tasks, Task, WorkScheduler};
use crate::render::{ArtifactKind, Renderer};

fn table(name: &str) -> Arc<Table> {
    let mut table = Table {
        name: name.to_string(),
        comment: String::new(),
        columns: vec![
            Column {
                name: "id".to_string(),
                db_type: "integer".to_string(),
                go_type: gotype::go_type("integer", false),
                is_primary_key: false,
                is_nullable: false,
                default_value: None,
                comment: String::new(),
                position: 1,
            },
            Column {
                name: "name".to_string(),
                db_type: "text".to_string(),
                go_type: gotype::go_type("text", false),
                is_primary_key: false,
                is_nullable: false,
                default_value: None,
                comment: String::new(),
                position: 2,
            },
        ],
        primary_keys: vec!["id".to_string()],
        indexes: Vec::new(),
        foreign_keys: Vec::new(),
    };
    table.reconcile_primary_keys();
    Arc::new(table)
}

fn renderer_in(dir: &TempDir, template_dir: Option<&TempDir>) -> Arc<Renderer> {
    let mut config = Config::default();
    config.dsn = "postgres://localhost/test".to_string();
    config.output_dirs.base = dir.path().to_path_buf();
    config.template_dir = template_dir.map(|d| d.path().to_path_buf());
    let config = Arc::new(config);
    for path in config.output_dirs.all() {
        fs::create_dir_all(path).unwrap();
    }
    Arc::new(Renderer::new(
        config,
        Arc::new(TemplateCache::new(16)),
        "public",
    ))
}

#[test]
fn build_tasks_expands_kinds_and_respects_tests_toggle() {
    let tables = vec![table("users"), table("orders")];
    assert_eq!(build_tasks(&tables, true).len(), 10);
    assert_eq!(build_tasks(&tables, false).len(), 8);
}

#[test]
fn tasks_sort_into_priority_tiers() {
    let tables = vec![table("users")];
    let mut tasks: Vec<Task> = build_tasks(&tables, true).into_iter().rev().collect();
    tasks.sort_by_key(Task::priority);
    let kinds: Vec<ArtifactKind> = tasks.iter().map(|t| t.kind).collect();
    assert_eq!(kinds, ArtifactKind::ALL.to_vec());
}

#[tokio::test]
async fn parallel_run_renders_every_artifact() {
    let dir = TempDir::new().unwrap();
    let renderer = renderer_in(&dir, None);
    let tables = vec![table("users"), table("orders")];

    let scheduler = WorkScheduler::new(4);
    let results = scheduler
        .run(renderer, build_tasks(&tables, true))
        .await
        .unwrap();

    assert_eq!(results.len(), 10);
    for artifact in &results {
        assert!(artifact.path.is_file(), "missing {}", artifact.path.display());
    }
}

#[tokio::test]
async fn sequential_run_matches_parallel_output() {
    let dir = TempDir::new().unwrap();
    let renderer = renderer_in(&dir, None);
    let tables = vec![table("users")];

    let scheduler = WorkScheduler::new(1);
    let results = scheduler
        .run(renderer, build_tasks(&tables, true))
        .await
        .unwrap();
    assert_eq!(results.len(), 5);

    // Sequential mode executes strictly in priority order.
    let kinds: Vec<ArtifactKind> = results.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, ArtifactKind::ALL.to_vec());
}

#[tokio::test]
async fn output_paths_never_collide() {
    let dir = TempDir::new().unwrap();
    let renderer = renderer_in(&dir, None);
    let tables = vec![table("users"), table("orders"), table("payments")];

    let results = WorkScheduler::new(8)
        .run(renderer, build_tasks(&tables, true))
        .await
        .unwrap();

    let paths: HashSet<_> = results.iter().map(|a| a.path.clone()).collect();
    assert_eq!(paths.len(), results.len());
}

#[tokio::test]
async fn first_failure_cancels_and_surfaces() {
    let dir = TempDir::new().unwrap();
    let template_dir = TempDir::new().unwrap();
    // A broken replacement for the lowest-priority kind: the failure lands
    // after models have been dispatched.
    fs::write(template_dir.path().join("test.tmpl"), "{% endfor %}").unwrap();

    let renderer = renderer_in(&dir, Some(&template_dir));
    let tables = vec![table("users"), table("orders")];

    let err = WorkScheduler::new(2)
        .run(renderer, build_tasks(&tables, true))
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Compile { .. }));
}

#[tokio::test]
async fn sequential_failure_stops_at_first_error() {
    let dir = TempDir::new().unwrap();
    let template_dir = TempDir::new().unwrap();
    fs::write(template_dir.path().join("interface.tmpl"), "{% if %}").unwrap();

    let renderer = renderer_in(&dir, Some(&template_dir));
    let tables = vec![table("users")];

    let err = WorkScheduler::new(1)
        .run(renderer, build_tasks(&tables, true))
        .await
        .unwrap_err();
    assert!(matches!(err, ForgeError::Compile { .. }));

    // The model (priority 1) was rendered before the interface failed; the
    // later tiers never ran.
    assert!(dir.path().join("models/users.go").is_file());
    assert!(!dir.path().join("repositories/users_repository.go").exists());
}
