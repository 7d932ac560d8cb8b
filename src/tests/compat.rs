use crate::compat::check_wheel_compatible;
use crate::error::LockError;
use crate::lockfile::Arch;
use crate::tests::common::example_lock;
use crate::wheel::WheelFilename;

fn check(filename: &str) -> Result<(), LockError> {
    let parsed: WheelFilename = filename.parse().unwrap();
    check_wheel_compatible(&parsed, &example_lock().info)
}

#[test]
fn native_build_for_exact_target() {
    check("numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl").unwrap();
}

#[test]
fn native_build_for_other_platform_rejected() {
    let err = check("numpy-1.24.3-cp311-cp311-linux_x86_64.whl").unwrap_err();
    assert!(matches!(err, LockError::IncompatibleWheel { .. }));
    assert!(err.to_string().contains("cp311-cp311-emscripten_3_1_39_wasm32"));
}

#[test]
fn native_build_for_other_interpreter_rejected() {
    assert!(check("numpy-1.24.3-cp310-cp310-emscripten_3_1_39_wasm32.whl").is_err());
}

#[test]
fn native_build_for_other_arch_rejected() {
    let mut lock = example_lock();
    lock.info.arch = Arch::Wasm64;
    let parsed: WheelFilename = "numpy-1.24.3-cp311-cp311-emscripten_3_1_39_wasm32.whl"
        .parse()
        .unwrap();
    assert!(check_wheel_compatible(&parsed, &lock.info).is_err());
}

#[test]
fn pure_build_accepted() {
    check("attrs-23.1.0-py3-none-any.whl").unwrap();
}

#[test]
fn dual_major_pure_tag_accepted() {
    check("six-1.16.0-py2.py3-none-any.whl").unwrap();
}

#[test]
fn pure_build_with_earlier_minor_accepted() {
    check("pkg-1.0.0-py39-none-any.whl").unwrap();
}

#[test]
fn pure_build_with_later_minor_rejected() {
    assert!(check("pkg-1.0.0-py312-none-any.whl").is_err());
}

#[test]
fn pure_build_for_other_major_rejected() {
    assert!(check("pkg-1.0.0-py2-none-any.whl").is_err());
}

#[test]
fn pure_interpreter_with_concrete_platform_rejected() {
    assert!(check("pkg-1.0.0-py3-none-linux_x86_64.whl").is_err());
}
