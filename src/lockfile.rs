use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt, fs,
    path::Path,
};

use crate::error::{LockError, Result};
use crate::fsutil;
use crate::pep::{canonicalize_name, canonicalize_version};
use crate::wheel::WheelFilename;

/// Instruction-width variant of the WebAssembly target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    #[default]
    Wasm32,
    Wasm64,
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arch::Wasm32 => write!(f, "wasm32"),
            Arch::Wasm64 => write!(f, "wasm64"),
        }
    }
}

/// The one execution context a lockfile is valid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeInfo {
    #[serde(default)]
    pub arch: Arch,
    pub platform: String,
    pub version: String,
    pub python: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    #[default]
    Package,
    CpythonModule,
    SharedLibrary,
    StaticLibrary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageEntry {
    pub name: String,
    pub version: String,
    pub file_name: String,
    pub install_dir: String,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub package_type: PackageType,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub unvendored_tests: bool,
    /// Deprecated, kept so older lockfiles still round-trip.
    #[serde(default)]
    pub shared_library: bool,
}

impl PackageEntry {
    /// Recompute the sha256 field from a file on disk.
    pub fn update_sha256(&mut self, path: &Path) -> Result<()> {
        self.sha256 = fsutil::file_sha256(path)?;
        Ok(())
    }
}

/// A complete lockfile: the target descriptor plus the package map, keyed
/// by canonical package name. BTreeMap keeps output key order stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Lockfile {
    pub info: RuntimeInfo,
    #[serde(default)]
    pub packages: BTreeMap<String, PackageEntry>,
}

impl Lockfile {
    /// Check that package name and version agree with any wheel filename
    /// embedded in the location. All mismatches across the whole package
    /// map are collected before failing.
    pub fn check_wheel_filenames(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        for (name, entry) in &self.packages {
            // URLs and non-wheel locations carry no name/version to check.
            let file_name = entry
                .file_name
                .rsplit('/')
                .next()
                .unwrap_or(entry.file_name.as_str());
            if !file_name.ends_with(".whl") {
                continue;
            }
            let parsed: WheelFilename = match file_name.parse() {
                Ok(p) => p,
                Err(e) => {
                    errors.push(format!("{name}: {e}"));
                    continue;
                }
            };
            if canonicalize_name(&parsed.distribution) != canonicalize_name(&entry.name) {
                errors.push(format!(
                    "{name}: package name in wheel filename '{}' does not match '{}'",
                    parsed.distribution, entry.name
                ));
            }
            if canonicalize_version(&parsed.version) != canonicalize_version(&entry.version) {
                errors.push(format!(
                    "{name}: version in wheel filename '{}' does not match package version '{}'",
                    canonicalize_version(&parsed.version),
                    canonicalize_version(&entry.version)
                ));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LockError::FilenameMismatch(errors))
        }
    }

    /// Check the closure invariant: every name in every depends list must
    /// be a key of the package map. Both sides compare under their
    /// canonical form. Collects every unresolved name.
    pub fn validate_depends(&self) -> Result<()> {
        let known: BTreeSet<String> =
            self.packages.keys().map(|k| canonicalize_name(k)).collect();
        let mut missing: Vec<String> = Vec::new();
        for (name, entry) in &self.packages {
            for dep in &entry.depends {
                if !known.contains(&canonicalize_name(dep)) {
                    missing.push(format!("{name}: depends on unknown package '{dep}'"));
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LockError::UnresolvedDepends(missing))
        }
    }

    /// Drop a package from every depends list. Used when a package has
    /// been excluded from solving on purpose.
    pub fn remove_depends(&mut self, name: &str) {
        let target = canonicalize_name(name);
        for entry in self.packages.values_mut() {
            entry.depends.retain(|d| canonicalize_name(d) != target);
        }
    }
}

pub fn load(path: &Path) -> Result<Lockfile> {
    let data = fs::read_to_string(path)?;
    let lf: Lockfile = serde_json::from_str(&data)?;
    Ok(lf)
}

pub fn write(lf: &Lockfile, path: &Path, pretty: bool) -> Result<()> {
    let data = if pretty {
        serde_json::to_string_pretty(lf)?
    } else {
        serde_json::to_string(lf)?
    };
    fs::write(path, data)?;
    Ok(())
}
