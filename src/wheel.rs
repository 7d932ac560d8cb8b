//! Wheel archive inspection: filename parsing, embedded metadata, and
//! top-level import discovery. A wheel is a zip archive with a
//! `*.dist-info/METADATA` member carrying RFC-822 style headers.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use crate::error::{LockError, Result};
use crate::pep::Requirement;

/// The parsed fields of a `{name}-{version}(-{build})?-{py}-{abi}-{plat}.whl`
/// filename. The optional build tag is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFilename {
    pub distribution: String,
    pub version: String,
    pub python_tag: Vec<String>,
    pub abi_tag: Vec<String>,
    pub platform_tag: Vec<String>,
}

impl FromStr for WheelFilename {
    type Err = LockError;

    fn from_str(filename: &str) -> Result<Self> {
        let invalid = |reason: &str| LockError::InvalidWheelName {
            name: filename.to_string(),
            reason: reason.to_string(),
        };

        let basename = filename
            .strip_suffix(".whl")
            .ok_or_else(|| invalid("must end with .whl"))?;

        let parts: Vec<&str> = basename.split('-').collect();
        let (distribution, version, python, abi, platform) = match parts.as_slice() {
            [dist, version, python, abi, platform] => (dist, version, python, abi, platform),
            // six fields: the third is a build tag, used only to break ties
            [dist, version, _build, python, abi, platform] => {
                (dist, version, python, abi, platform)
            }
            _ => return Err(invalid("must have 5 or 6 dash-separated fields")),
        };
        if distribution.is_empty() || version.is_empty() {
            return Err(invalid("empty name or version field"));
        }

        let split = |tag: &str| tag.split('.').map(String::from).collect();
        Ok(WheelFilename {
            distribution: distribution.to_string(),
            version: version.to_string(),
            python_tag: split(python),
            abi_tag: split(abi),
            platform_tag: split(platform),
        })
    }
}

impl WheelFilename {
    /// Expand dotted compound tags ("py2.py3-none-any") into the cross
    /// product of single (interpreter, abi, platform) triples.
    pub fn tags(&self) -> Vec<(String, String, String)> {
        let mut out = Vec::new();
        for python in &self.python_tag {
            for abi in &self.abi_tag {
                for platform in &self.platform_tag {
                    out.push((python.clone(), abi.clone(), platform.clone()));
                }
            }
        }
        out
    }
}

impl fmt::Display for WheelFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}.whl",
            self.distribution,
            self.version,
            self.python_tag.join("."),
            self.abi_tag.join("."),
            self.platform_tag.join(".")
        )
    }
}

/// Metadata declared inside a wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelMetadata {
    pub name: String,
    pub version: String,
    pub requires_dist: Vec<Requirement>,
}

/// Read and parse `*.dist-info/METADATA` from a wheel on disk.
pub fn read_metadata(path: &Path) -> Result<WheelMetadata> {
    let unreadable = |reason: String| LockError::UnreadableWheel {
        path: path.display().to_string(),
        reason,
    };

    let file = fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| unreadable(e.to_string()))?;

    let metadata_member = archive
        .file_names()
        .find(|n| {
            let mut parts = n.split('/');
            matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(dir), Some("METADATA"), None) if dir.ends_with(".dist-info")
            )
        })
        .map(String::from)
        .ok_or_else(|| unreadable("no .dist-info/METADATA member".to_string()))?;

    let mut text = String::new();
    archive
        .by_name(&metadata_member)
        .map_err(|e| unreadable(e.to_string()))?
        .read_to_string(&mut text)
        .map_err(|e| unreadable(e.to_string()))?;

    parse_metadata(&text).map_err(|e| unreadable(e))
}

fn parse_metadata(text: &str) -> std::result::Result<WheelMetadata, String> {
    let mut name = None;
    let mut version = None;
    let mut requires_dist = Vec::new();

    // headers end at the first blank line; the body is the description
    for line in text.lines() {
        if line.is_empty() {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => name = Some(value.to_string()),
            "Version" => version = Some(value.to_string()),
            "Requires-Dist" => {
                let req: Requirement = value.parse().map_err(|e| format!("{e}"))?;
                requires_dist.push(req);
            }
            _ => {}
        }
    }

    Ok(WheelMetadata {
        name: name.ok_or("metadata has no Name header")?,
        version: version.ok_or("metadata has no Version header")?,
        requires_dist,
    })
}

/// Find the importable top-level names a wheel provides: single top-level
/// `.py` modules, plus top-level directories (with valid import names)
/// that contain python code somewhere below. `None` when nothing could be
/// determined, which is a warning for the caller, not a failure.
pub fn top_level_imports(path: &Path) -> Result<Option<Vec<String>>> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if !file_name.ends_with(".whl") {
        return Err(LockError::InvalidWheelName {
            name: file_name.to_string(),
            reason: "not a wheel file".to_string(),
        });
    }

    let file = fs::File::open(path)?;
    let archive = zip::ZipArchive::new(file).map_err(|e| LockError::UnreadableWheel {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let names: Vec<&str> = archive.file_names().collect();

    let mut imports: Vec<String> = Vec::new();
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for member in &names {
        match member.split_once('/') {
            // a python file sitting at the archive root
            None => {
                if let Some(stem) = member.strip_suffix(".py") {
                    if seen.insert(stem.to_string()) {
                        imports.push(stem.to_string());
                    }
                }
            }
            Some((top, _)) => {
                if !valid_import_name(top) || seen.contains(top) {
                    continue;
                }
                if dir_has_python_file(top, &names) {
                    seen.insert(top.to_string());
                    imports.push(top.to_string());
                }
            }
        }
    }

    if imports.is_empty() {
        Ok(None)
    } else {
        Ok(Some(imports))
    }
}

/// Valid import names carry no dots, dashes or spaces.
fn valid_import_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['.', '-', ' '])
}

/// True when some `.py` file lives under `top/`, reached only through
/// validly named intermediate directories.
fn dir_has_python_file(top: &str, names: &[&str]) -> bool {
    for member in names {
        let Some(rest) = member.strip_prefix(top).and_then(|r| r.strip_prefix('/')) else {
            continue;
        };
        if !rest.ends_with(".py") {
            continue;
        }
        let mut components: Vec<&str> = rest.split('/').collect();
        components.pop(); // the file itself
        if components.iter().all(|dir| valid_import_name(dir)) {
            return true;
        }
    }
    false
}
