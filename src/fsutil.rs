use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LockError, Result};

/// Hex-encoded sha256 of a file's contents.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Express `path` relative to `base` as a forward-slash string suitable
/// for a lockfile location, regardless of host path conventions.
pub fn relative_location(path: &Path, base: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .map_err(|_| LockError::PathNotUnderBase {
            path: path.to_path_buf(),
            base: base.to_path_buf(),
        })?;
    let rel = Utf8Path::from_path(rel)
        .ok_or_else(|| LockError::NonUtf8Path(rel.to_path_buf()))?;
    Ok(rel
        .components()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join("/"))
}

/// Resolve to an absolute, symlink-free path. The file must exist.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    Ok(fs::canonicalize(path)?)
}
