use crate::error::LockError;
use crate::lockfile::{self, Arch, Lockfile, PackageType};
use crate::tests::common::{example_lock, example_lock_json};

#[test]
fn roundtrip_preserves_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wasm-lock.json");
    let lock = example_lock();

    lockfile::write(&lock, &path, true).unwrap();
    let reloaded = lockfile::load(&path).unwrap();

    assert_eq!(lock.info, reloaded.info);
    assert_eq!(lock.packages, reloaded.packages);
}

#[test]
fn compact_and_pretty_forms_parse_the_same() {
    let dir = tempfile::tempdir().unwrap();
    let compact = dir.path().join("compact.json");
    let pretty = dir.path().join("pretty.json");
    let lock = example_lock();

    lockfile::write(&lock, &compact, false).unwrap();
    lockfile::write(&lock, &pretty, true).unwrap();

    assert!(!std::fs::read_to_string(&compact).unwrap().contains('\n'));
    assert!(std::fs::read_to_string(&pretty).unwrap().contains('\n'));
    assert_eq!(
        lockfile::load(&compact).unwrap(),
        lockfile::load(&pretty).unwrap()
    );
}

#[test]
fn defaults_fill_optional_fields() {
    let data = serde_json::json!({
        "info": {
            "platform": "emscripten_3_1_39",
            "version": "0.24.0.dev0",
            "python": "3.11.3"
        },
        "packages": {
            "pkg": {
                "name": "pkg",
                "version": "1.0.0",
                "file_name": "pkg-1.0.0-py3-none-any.whl",
                "install_dir": "site"
            }
        }
    });
    let lock: Lockfile = serde_json::from_value(data).unwrap();
    assert_eq!(lock.info.arch, Arch::Wasm32);
    let pkg = &lock.packages["pkg"];
    assert_eq!(pkg.sha256, "");
    assert_eq!(pkg.package_type, PackageType::Package);
    assert!(pkg.depends.is_empty());
    assert!(!pkg.shared_library);
}

#[test]
fn unknown_fields_rejected_at_every_level() {
    let mut top = example_lock_json();
    top["extra"] = "extra".into();
    assert!(serde_json::from_value::<Lockfile>(top).is_err());

    let mut info = example_lock_json();
    info["info"]["extra"] = "extra".into();
    assert!(serde_json::from_value::<Lockfile>(info).is_err());

    let mut package = example_lock_json();
    package["packages"]["numpy"]["extra"] = "extra".into();
    assert!(serde_json::from_value::<Lockfile>(package).is_err());
}

#[test]
fn filename_check_passes_on_consistent_lock() {
    example_lock().check_wheel_filenames().unwrap();
}

#[test]
fn filename_check_reports_name_mismatch() {
    let mut lock = example_lock();
    lock.packages.get_mut("numpy").unwrap().name = "numpy2".to_string();

    let err = lock.check_wheel_filenames().unwrap_err();
    let LockError::FilenameMismatch(lines) = &err else {
        panic!("wrong error kind: {err}");
    };
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("package name in wheel filename 'numpy' does not match 'numpy2'"));
}

#[test]
fn filename_check_collects_all_mismatches() {
    let mut lock = example_lock();
    {
        let numpy = lock.packages.get_mut("numpy").unwrap();
        numpy.name = "numpy2".to_string();
        numpy.version = "0.2.3".to_string();
    }

    let err = lock.check_wheel_filenames().unwrap_err();
    let LockError::FilenameMismatch(lines) = &err else {
        panic!("wrong error kind: {err}");
    };
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("version in wheel filename '1.24.3' does not match package version '0.2.3'"));
}

#[test]
fn filename_check_skips_non_wheel_locations() {
    let mut lock = example_lock();
    let numpy = lock.packages.get_mut("numpy").unwrap();
    numpy.file_name = "numpy-1.24.3.tar.gz".to_string();
    numpy.name = "different".to_string();
    lock.check_wheel_filenames().unwrap();
}

#[test]
fn filename_check_looks_past_url_prefixes() {
    let mut lock = example_lock();
    lock.packages.get_mut("numpy").unwrap().file_name =
        "https://cdn.example.org/wheels/numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl"
            .to_string();
    lock.check_wheel_filenames().unwrap();
}

#[test]
fn validate_depends_flags_unknown_names() {
    let mut lock = example_lock();
    lock.packages
        .get_mut("numpy")
        .unwrap()
        .depends
        .push("nothere".to_string());

    let err = lock.validate_depends().unwrap_err();
    let LockError::UnresolvedDepends(lines) = &err else {
        panic!("wrong error kind: {err}");
    };
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("numpy"));
    assert!(lines[0].contains("nothere"));
}

#[test]
fn validate_depends_matches_keys_canonically() {
    let mut lock = example_lock();
    // a hand-edited lockfile may carry a non-canonical key
    let mut entry = lock.packages["numpy"].clone();
    entry.name = "ruamel.yaml".to_string();
    entry.file_name = "ruamel.yaml-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl".to_string();
    lock.packages.insert("ruamel.yaml".to_string(), entry);
    lock.packages
        .get_mut("numpy")
        .unwrap()
        .depends
        .push("ruamel-yaml".to_string());

    lock.validate_depends().unwrap();
}

#[test]
fn remove_depends_strips_edges_everywhere() {
    let mut lock = example_lock();
    lock.packages
        .get_mut("numpy")
        .unwrap()
        .depends
        .push("OldDep".to_string());
    lock.remove_depends("old-dep");
    assert!(lock.packages["numpy"].depends.is_empty());
}

#[test]
fn update_sha256_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "foo").unwrap();

    let mut lock = example_lock();
    let numpy = lock.packages.get_mut("numpy").unwrap();
    numpy.update_sha256(&path).unwrap();
    assert_eq!(
        numpy.sha256,
        "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae"
    );
}
