use std::collections::BTreeMap;

use crate::error::LockError;
use crate::solver::{apply_remote_wheels, hash_matches_lock, location_url};
use crate::tests::common::example_lock;

#[test]
fn location_url_passes_urls_through() {
    let dir = tempfile::tempdir().unwrap();
    let url = "https://cdn.example.org/wheels/numpy-1.24.3-py3-none-any.whl";
    assert_eq!(location_url("numpy", url, dir.path(), None).unwrap(), url);
}

#[test]
fn location_url_resolves_local_wheels() {
    let dir = tempfile::tempdir().unwrap();
    let name = "attrs-23.1.0-py3-none-any.whl";
    std::fs::write(dir.path().join(name), "").unwrap();

    let url = location_url("attrs", name, dir.path(), None).unwrap();
    assert!(url.starts_with("file://"));
    assert!(url.ends_with(name));
}

#[test]
fn location_url_falls_back_to_input_base_url() {
    let dir = tempfile::tempdir().unwrap();
    let name = "attrs-23.1.0-py3-none-any.whl";
    let url = location_url("attrs", name, dir.path(), Some("https://cdn.example.org/v1/"))
        .unwrap();
    assert_eq!(url, format!("https://cdn.example.org/v1/{name}"));
}

#[test]
fn missing_wheel_without_base_url_cannot_be_pinned() {
    let dir = tempfile::tempdir().unwrap();
    let err = location_url("attrs", "attrs-23.1.0-py3-none-any.whl", dir.path(), None)
        .unwrap_err();
    let LockError::UnpinnableLocation { package, location } = &err else {
        panic!("wrong error kind: {err}");
    };
    assert_eq!(package, "attrs");
    assert_eq!(location, "attrs-23.1.0-py3-none-any.whl");
}

#[test]
fn hash_comparison_requires_both_sides() {
    assert!(hash_matches_lock(Some("abc"), Some("abc")));
    assert!(!hash_matches_lock(Some("abc"), Some("def")));
    assert!(!hash_matches_lock(Some(""), Some("")));
    assert!(!hash_matches_lock(None, None));
    assert!(!hash_matches_lock(Some("abc"), None));
    assert!(!hash_matches_lock(None, Some("abc")));
}

#[test]
fn preserved_url_prefix_keeps_the_remote_wheel() {
    let dir = tempfile::tempdir().unwrap();
    let local = dir
        .path()
        .join("numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl");
    std::fs::write(&local, "").unwrap();

    let url =
        "https://cdn.example.org/numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl";
    let mut urls = BTreeMap::new();
    urls.insert("numpy".to_string(), url.to_string());

    let mut lock = example_lock();
    apply_remote_wheels(
        &mut lock,
        &urls,
        &["https://cdn.example.org/".to_string()],
        dir.path(),
    )
    .unwrap();

    assert_eq!(lock.packages["numpy"].file_name, url);
    assert!(!local.exists());
}

#[test]
fn unpreserved_urls_leave_entries_alone() {
    let dir = tempfile::tempdir().unwrap();
    let mut urls = BTreeMap::new();
    urls.insert(
        "numpy".to_string(),
        "https://files.example.net/numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl"
            .to_string(),
    );

    let mut lock = example_lock();
    let before = lock.packages["numpy"].file_name.clone();
    apply_remote_wheels(
        &mut lock,
        &urls,
        &["https://cdn.example.org/".to_string()],
        dir.path(),
    )
    .unwrap();
    assert_eq!(lock.packages["numpy"].file_name, before);
}

#[test]
fn no_prefixes_means_no_rewriting() {
    let dir = tempfile::tempdir().unwrap();
    let mut urls = BTreeMap::new();
    urls.insert(
        "numpy".to_string(),
        "https://cdn.example.org/numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl"
            .to_string(),
    );

    let mut lock = example_lock();
    let before = lock.packages["numpy"].file_name.clone();
    apply_remote_wheels(&mut lock, &urls, &[], dir.path()).unwrap();
    assert_eq!(lock.packages["numpy"].file_name, before);
}
