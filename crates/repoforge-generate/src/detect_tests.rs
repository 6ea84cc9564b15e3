//! Tests for change detection

use super::*;
use crate::fingerprint::{
    config_fingerprint, table_hashes, test_column, test_schema, Manifest,
};
use repoforge_core::Config;

fn manifest_for(schema: &repoforge_core::Schema, config_hash: &str) -> Manifest {
    let mut manifest = Manifest::empty();
    manifest.schema_hash = schema_fingerprint(schema);
    manifest.config_hash = config_hash.to_string();
    manifest.table_hashes = table_hashes(schema);
    manifest
}

#[test]
fn first_run_adds_every_table() {
    let schema = test_schema(&["orders", "users"]);
    let set = detect(&schema, None, "cfg");
    assert_eq!(set.added(), vec!["orders", "users"]);
    assert!(set.modified().is_empty());
    assert!(set.removed().is_empty());
}

#[test]
fn config_change_forces_full_regeneration() {
    let schema = test_schema(&["users"]);
    let manifest = manifest_for(&schema, "old-config");
    let set = detect(&schema, Some(&manifest), "new-config");
    assert_eq!(set.added(), vec!["users"]);
    assert!(set.removed().is_empty());
}

#[test]
fn unchanged_schema_yields_empty_set() {
    let schema = test_schema(&["orders", "users"]);
    let config_hash = config_fingerprint(&Config::default());
    let manifest = manifest_for(&schema, &config_hash);
    let set = detect(&schema, Some(&manifest), &config_hash);
    assert!(set.is_empty());
}

#[test]
fn per_table_diff_classifies_add_modify_remove() {
    let old = test_schema(&["orders", "users"]);
    let manifest = manifest_for(&old, "cfg");

    let mut new = test_schema(&["users", "payments"]);
    let users = new
        .tables
        .iter_mut()
        .find(|t| t.name == "users")
        .unwrap();
    users
        .columns
        .push(test_column("created_at", "timestamp with time zone", false, 3));

    let set = detect(&new, Some(&manifest), "cfg");
    assert_eq!(set.added(), vec!["payments"]);
    assert_eq!(set.modified(), vec!["users"]);
    assert_eq!(set.removed(), vec!["orders"]);
    assert_eq!(set.to_regenerate().len(), 2);
}

#[test]
fn detection_is_idempotent_after_a_run() {
    let schema = test_schema(&["users"]);
    let manifest = manifest_for(&schema, "cfg");
    // Simulates the second run with identical inputs.
    let first = detect(&schema, Some(&manifest), "cfg");
    let second = detect(&schema, Some(&manifest), "cfg");
    assert!(first.is_empty());
    assert!(second.is_empty());
}
