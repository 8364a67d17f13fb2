//! Tests for CacheBackend
//!
//! These tests verify:
//! - Get/set/delete/size through the StorageBackend trait
//! - Size accounting on overwrite and delete
//! - Isolation between databases

use pcl::backend::{CacheBackend, StorageBackend, StorageKey};
use pcl::PclError;

fn key(name: &str) -> StorageKey {
    StorageKey::new("app1", format!("/node/{}", name))
}

#[test]
fn test_set_then_get() {
    let cache = CacheBackend::new();

    assert_eq!(cache.set(&key("a"), b"hello").unwrap(), 5);
    assert_eq!(cache.get(&key("a")).unwrap(), b"hello");
    assert_eq!(cache.size(&key("a")).unwrap(), 5);
}

#[test]
fn test_missing_key() {
    let cache = CacheBackend::new();

    assert!(matches!(cache.get(&key("nope")), Err(PclError::NoKey)));
    assert!(matches!(cache.size(&key("nope")), Err(PclError::NoKey)));
    assert!(matches!(cache.delete(&key("nope")), Err(PclError::NoKey)));
    assert!(!cache.contains(&key("nope")).unwrap());
}

#[test]
fn test_overwrite_and_delete_track_size() {
    let cache = CacheBackend::new();

    cache.set(&key("a"), b"1234").unwrap();
    let after_first = cache.size_bytes();
    cache.set(&key("a"), b"12345678").unwrap();

    assert_eq!(cache.size_bytes(), after_first + 4);
    assert_eq!(cache.entry_count(), 1);

    cache.delete(&key("a")).unwrap();
    assert_eq!(cache.size_bytes(), 0);
    assert!(cache.is_empty());
}

#[test]
fn test_databases_are_isolated() {
    let cache = CacheBackend::new();
    let local = StorageKey::new("app1", "/node/x");
    let public = StorageKey::new("Shared/Public", "/node/x");

    cache.set(&local, b"local").unwrap();

    assert!(matches!(cache.get(&public), Err(PclError::NoKey)));
}

#[test]
fn test_clear() {
    let cache = CacheBackend::new();
    cache.set(&key("a"), b"1").unwrap();
    cache.set(&key("b"), b"2").unwrap();

    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.size_bytes(), 0);
}
