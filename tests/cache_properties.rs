//! Integration Tests for the Cache Facade
//!
//! Exercises the public API the way an application would: build a cache from
//! configuration, then store, read, expire and flush values.

use mini_cache::{BackendRegistry, Cache, CacheConfig, CacheError, FileConfig, FileStorage, Storage};
use serde_json::{json, Value};
use std::thread::sleep;
use std::time::Duration;

fn file_cache(dir: &tempfile::TempDir) -> Cache {
    Cache::new(&CacheConfig::file(dir.path())).unwrap()
}

#[test]
fn test_roundtrip_value_types() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(&dir);

    let values = [
        ("string", json!("Cache")),
        ("int", json!(23)),
        ("negative", json!(-7)),
        ("float", json!(23.99)),
        ("bool", json!(true)),
        ("null", Value::Null),
        ("array", json!(["key1", "key2"])),
        ("object", json!({"outer": {"inner": [1, {"deep": null}]}})),
    ];

    for (ttl, (name, value)) in values.iter().enumerate() {
        let key = format!("pu-test-{}", name);
        assert!(cache.set(&key, value, ttl as u64 * 10));
        assert!(cache.exists(&key), "{} should exist", name);
        assert_eq!(cache.get(&key).as_ref(), Some(value), "{} should round-trip", name);
    }
}

#[test]
fn test_expiration_boundary() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(&dir);

    assert!(cache.set("short", &json!("v"), 1));
    assert_eq!(cache.get("short"), Some(json!("v")));

    sleep(Duration::from_millis(2100));

    assert!(!cache.exists("short"));
    assert_eq!(cache.get("short"), None);
}

#[test]
fn test_never_expire() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(&dir);

    cache.set("forever", &json!("v"), 0);
    sleep(Duration::from_millis(1100));
    assert!(cache.exists("forever"));

    assert!(cache.delete("forever"));
    assert!(!cache.exists("forever"));
}

#[test]
fn test_idempotent_delete() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(&dir);

    assert!(!cache.delete("absent"));

    cache.set("present", &json!(1), 0);
    assert!(cache.delete("present"));
    assert!(!cache.exists("present"));
    assert!(!cache.delete("present"));
}

#[test]
fn test_flush_clears_all() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(&dir);

    let keys: Vec<String> = (0..25).map(|i| format!("key-{}", i)).collect();
    for key in &keys {
        cache.set(key, &json!(key), 0);
    }

    assert!(cache.flush());
    for key in &keys {
        assert!(!cache.exists(key));
    }
}

#[test]
fn test_unknown_storage_matches_file() {
    let dir_known = tempfile::tempdir().unwrap();
    let dir_unknown = tempfile::tempdir().unwrap();

    let known = Cache::new(&CacheConfig::file(dir_known.path()).with_storage("file")).unwrap();
    let unknown = Cache::new(&CacheConfig::file(dir_unknown.path()).with_storage("unknown")).unwrap();

    assert_eq!(known.backend_name(), unknown.backend_name());
    for cache in [&known, &unknown] {
        assert!(cache.is_connected());
        assert!(cache.set("k", &json!({"v": 1}), 0));
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));
    }

    let listing = |dir: &tempfile::TempDir| -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    };
    assert_eq!(listing(&dir_known), listing(&dir_unknown));
}

#[test]
fn test_key_isolation_with_secret() {
    let dir = tempfile::tempdir().unwrap();
    let first = FileStorage::open(dir.path(), Some("first-secret".into()), false).unwrap();
    let second = FileStorage::open(dir.path(), Some("second-secret".into()), false).unwrap();

    assert_ne!(first.path_for("user"), second.path_for("user"));

    first.set("user", &json!("first"), 0);
    assert!(first.exists("user"));
    assert!(!second.exists("user"));

    second.set("user", &json!("second"), 0);
    assert_eq!(first.get("user"), Some(json!("first")));
    assert_eq!(second.get("user"), Some(json!("second")));
}

#[test]
fn test_shared_directory_between_instances() {
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig {
        file: Some(FileConfig {
            path: dir.path().to_path_buf(),
            secret: Some("shared".into()),
            remove_expired: false,
        }),
        ..CacheConfig::default()
    };

    let writer = Cache::new(&config).unwrap();
    let reader = Cache::new(&config).unwrap();

    writer.set("session", &json!({"user": 7}), 60);
    assert_eq!(reader.get("session"), Some(json!({"user": 7})));
}

#[test]
fn test_config_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let json = format!(
        r#"{{"storage": "file", "file": {{"path": {}, "remove_expired": true}}, "ignored": 1}}"#,
        serde_json::to_string(dir.path()).unwrap()
    );

    let cache = Cache::new(&CacheConfig::from_json_str(&json).unwrap()).unwrap();
    assert!(cache.set("k", &json!(1), 0));
    assert!(dir.path().join("k.cache").exists());
}

#[test]
fn test_remember_against_files() {
    let dir = tempfile::tempdir().unwrap();
    let cache = file_cache(&dir);

    assert_eq!(cache.remember("pu-test-remember", json!("itemvalue"), 0), json!("itemvalue"));
    assert_eq!(cache.get("pu-test-remember"), Some(json!("itemvalue")));
}

#[test]
fn test_custom_backend_construction_failure_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let registry = BackendRegistry::default().with("remote", |_: &CacheConfig| {
        Err::<Box<dyn Storage>, _>(CacheError::StorageUnavailable("no route".into()))
    });

    let cache = Cache::with_registry(&CacheConfig::file(dir.path()).with_storage("remote"), &registry).unwrap();
    assert_eq!(cache.backend_name(), "file");
    assert!(cache.set("k", &json!(1), 0));
}
