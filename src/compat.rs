//! Build-tag compatibility: decide whether a wheel is installable under a
//! lockfile's target environment. This runs before any metadata is read
//! from the archive, since an incompatible wheel's metadata is not
//! trustworthy for this target.

use crate::environment::python_major_minor;
use crate::error::{LockError, Result};
use crate::lockfile::RuntimeInfo;
use crate::wheel::WheelFilename;

/// Accept a wheel when any declared tag triple matches the target:
/// either a native build for exactly this interpreter and platform, or a
/// pure-python build for this major version and an equal-or-earlier minor.
pub fn check_wheel_compatible(filename: &WheelFilename, info: &RuntimeInfo) -> Result<()> {
    let (major, minor) = python_major_minor(&info.python)?;
    let native_abi = format!("cp{major}{minor}");
    let native_platform = format!("{}_{}", info.platform, info.arch);

    for (interpreter, abi, platform) in filename.tags() {
        if interpreter == native_abi && abi == native_abi && platform == native_platform {
            return Ok(());
        }
        if abi == "none" && platform == "any" {
            if let Some(minor_digits) = interpreter.strip_prefix(&format!("py{major}")) {
                if minor_digits.is_empty() {
                    return Ok(());
                }
                if let Ok(tag_minor) = minor_digits.parse::<u64>() {
                    if tag_minor <= minor {
                        return Ok(());
                    }
                }
            }
        }
    }

    Err(LockError::IncompatibleWheel {
        wheel: filename.to_string(),
        expected: format!("{native_abi}-{native_abi}-{native_platform} or py{major}-none-any"),
    })
}
