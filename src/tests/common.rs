use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::lockfile::{Arch, Lockfile, PackageEntry, PackageType, RuntimeInfo};

/// A lockfile matching the shape shipped with real distributions: one
/// native numpy wheel for an emscripten wasm32 target.
pub fn example_lock() -> Lockfile {
    let mut packages = BTreeMap::new();
    packages.insert(
        "numpy".to_string(),
        PackageEntry {
            name: "numpy".to_string(),
            version: "1.24.3".to_string(),
            file_name: "numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl".to_string(),
            install_dir: "site".to_string(),
            sha256: "513af43ffb1f7d507c8d879c9f7e5d6c789ad21b6a67e5bca1d7cfb86bf8640f"
                .to_string(),
            package_type: PackageType::Package,
            imports: vec!["numpy".to_string()],
            depends: vec![],
            unvendored_tests: false,
            shared_library: false,
        },
    );
    Lockfile {
        info: RuntimeInfo {
            arch: Arch::Wasm32,
            platform: "emscripten_3_1_39".to_string(),
            version: "0.24.0.dev0".to_string(),
            python: "3.11.3".to_string(),
        },
        packages,
    }
}

/// JSON form of `example_lock`, for schema tests.
pub fn example_lock_json() -> serde_json::Value {
    serde_json::to_value(example_lock()).unwrap()
}

/// Declarative description of a test wheel to build.
pub struct TestWheel<'a> {
    pub name: &'a str,
    pub modules: &'a [&'a str],
    pub deps: &'a [&'a str],
    pub optional_deps: &'a [(&'a str, &'a [&'a str])],
}

impl<'a> TestWheel<'a> {
    pub fn new(name: &'a str) -> Self {
        TestWheel {
            name,
            modules: &[],
            deps: &[],
            optional_deps: &[],
        }
    }
}

/// Build a minimal but real wheel: one empty module per import name and a
/// dist-info METADATA declaring the requirements.
pub fn make_test_wheel(dir: &Path, wheel: &TestWheel) -> PathBuf {
    let snake = wheel.name.replace('-', "_");
    let path = dir.join(format!("{snake}-1.0.0-py3-none-any.whl"));

    let mut metadata = String::new();
    metadata.push_str("Metadata-Version: 2.1\n");
    metadata.push_str(&format!("Name: {}\n", wheel.name));
    metadata.push_str("Version: 1.0.0\n");
    for dep in wheel.deps {
        metadata.push_str(&format!("Requires-Dist: {dep}\n"));
    }
    for (extra, deps) in wheel.optional_deps {
        metadata.push_str(&format!("Provides-Extra: {extra}\n"));
        for dep in deps.iter() {
            metadata.push_str(&format!("Requires-Dist: {dep}; extra == \"{extra}\"\n"));
        }
    }
    metadata.push('\n');

    let modules: Vec<String> = if wheel.modules.is_empty() {
        vec![snake.clone()]
    } else {
        wheel.modules.iter().map(|m| m.to_string()).collect()
    };

    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for module in &modules {
        zip.start_file(format!("{module}.py"), options).unwrap();
        zip.write_all(b"").unwrap();
    }
    zip.start_file(format!("{snake}-1.0.0.dist-info/METADATA"), options)
        .unwrap();
    zip.write_all(metadata.as_bytes()).unwrap();
    zip.finish().unwrap();

    path
}

/// The standard batch used by the resolver tests: a base package, a
/// package depending on it (under a divergent spelling), one reachable
/// only through an extra, a package requesting that extra, and one with
/// an unsatisfiable requirement.
pub fn standard_wheels(dir: &Path) -> Vec<PathBuf> {
    let wheels = [
        TestWheel {
            name: "py-one",
            modules: &["one"],
            ..TestWheel::new("py-one")
        },
        TestWheel {
            deps: &["py_one"],
            ..TestWheel::new("needs-one")
        },
        TestWheel {
            optional_deps: &[("with_one", &["py-one"])],
            ..TestWheel::new("needs-one-opt")
        },
        TestWheel {
            deps: &["needs-one-opt[with_one]"],
            ..TestWheel::new("test-extra-dependencies")
        },
        TestWheel {
            deps: &["two"],
            ..TestWheel::new("failure")
        },
    ];
    wheels.iter().map(|w| make_test_wheel(dir, w)).collect()
}
