//! Batch update through an external dependency solver. The solver is an
//! opaque collaborator: we hand it a requirement/constraint file set, it
//! hands back a resolved `pylock.toml` manifest of concrete wheel paths
//! and URLs. Everything else (fetching, merging, validation) happens here.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::environment::python_major_minor;
use crate::error::{LockError, Result};
use crate::lockfile::{self, Lockfile};
use crate::pep::canonicalize_name;
use crate::resolver::{add_wheels, AddWheelsOptions};
use crate::wheel;

/// Environment variable naming the solver binary.
pub const ENV_SOLVER_BIN: &str = "WASMLOCK_SOLVER";

/// Default `--python-platform` value handed to the solver.
pub const DEFAULT_PYTHON_PLATFORM: &str = "wasm32-pyodide2024";

#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Lockfile used as the solve baseline.
    pub input: PathBuf,
    /// Where to write the updated lockfile; defaults to `input`.
    pub output: Option<PathBuf>,
    /// Folder for newly fetched wheels; defaults to the output's parent.
    pub wheel_dir: Option<PathBuf>,
    /// Requirement specs to include when solving.
    pub specs: Vec<String>,
    /// Local wheels to include when solving.
    pub wheels: Vec<PathBuf>,
    /// Requirement specs to constrain (not install) when solving.
    pub constraints: Vec<String>,
    /// Package names to exclude; their dependency edges are stripped from
    /// the result, which implies `ignore_missing` during the merge.
    pub excludes: Vec<String>,
    /// URL prefix existing lock entries are assumed to be hosted under,
    /// used to pin entries whose wheels are not on disk next to the input.
    pub input_base_url: Option<String>,
    /// Fetched wheels whose source URL starts with one of these prefixes
    /// keep the remote URL as their location instead of the local copy.
    pub preserve_url_prefixes: Vec<String>,
    pub solver_bin: Option<PathBuf>,
    pub python_platform: String,
    pub extra_args: Vec<String>,
    /// Working directory for solver inputs; a temp dir when unset.
    pub work_dir: Option<PathBuf>,
    pub pretty: bool,
}

impl SolverConfig {
    pub fn new(input: PathBuf) -> Self {
        SolverConfig {
            input,
            output: None,
            wheel_dir: None,
            specs: Vec::new(),
            wheels: Vec::new(),
            constraints: Vec::new(),
            excludes: Vec::new(),
            input_base_url: None,
            preserve_url_prefixes: Vec::new(),
            solver_bin: None,
            python_platform: DEFAULT_PYTHON_PLATFORM.to_string(),
            extra_args: Vec::new(),
            work_dir: None,
            pretty: true,
        }
    }

    /// Run the whole flow: solve, fetch, merge, validate, write.
    pub fn update(&self) -> Result<Lockfile> {
        match &self.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                self.update_in(dir)
            }
            None => {
                let work = tempfile::Builder::new().prefix("wasmlock-solve-").tempdir()?;
                self.update_in(work.path())
            }
        }
    }

    fn update_in(&self, work: &Path) -> Result<Lockfile> {
        let lock = lockfile::load(&self.input)?;

        let output_path = self.output.as_deref().unwrap_or(&self.input);
        let wheel_dir = match &self.wheel_dir {
            Some(dir) => dir.clone(),
            None => output_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .to_path_buf(),
        };
        fs::create_dir_all(&wheel_dir)?;

        let manifest = self.solve(work, &lock)?;
        let (new_wheels, new_wheel_urls) =
            self.fetch_new_wheels(&manifest, work, &wheel_dir, &lock)?;

        let opts = AddWheelsOptions {
            base_path: Some(
                self.input
                    .parent()
                    .map(Path::to_path_buf)
                    .filter(|p| !p.as_os_str().is_empty())
                    .unwrap_or_else(|| PathBuf::from(".")),
            ),
            ignore_missing: !self.excludes.is_empty(),
            ..AddWheelsOptions::default()
        };
        let mut new_lock = add_wheels(&lock, &new_wheels, &opts)?;

        for exclude in &self.excludes {
            new_lock.remove_depends(exclude);
        }
        new_lock.validate_depends()?;
        apply_remote_wheels(
            &mut new_lock,
            &new_wheel_urls,
            &self.preserve_url_prefixes,
            &wheel_dir,
        )?;

        lockfile::write(&new_lock, output_path, self.pretty)?;
        Ok(new_lock)
    }

    /// Write the solver's input files and run it, returning the parsed
    /// resolved manifest. Diagnostic output is captured and surfaced on
    /// failure.
    fn solve(&self, work: &Path, lock: &Lockfile) -> Result<ResolvedManifest> {
        let requested = self.write_requirements(work)?;
        let constraints_path = self.write_constraints(work, lock, &requested)?;
        let excludes_path = self.write_excludes(work)?;
        let manifest_path = work.join("pylock.toml");

        let (major, minor) = python_major_minor(&lock.info.python)?;
        let solver = self.solver_bin()?;

        let mut cmd = Command::new(&solver);
        cmd.arg("pip")
            .arg("compile")
            .arg("--format=pylock.toml")
            .arg("--no-build")
            .arg(format!("--python-platform={}", self.python_platform))
            .arg(format!("--python-version={major}.{minor}"))
            .arg(format!("--output-file={}", manifest_path.display()))
            .arg(format!("--constraints={}", constraints_path.display()));
        if let Some(excludes) = &excludes_path {
            cmd.arg(format!("--excludes={}", excludes.display()));
        }
        cmd.args(&self.extra_args);
        cmd.arg(work.join("requirements.in"));

        let output = cmd.output().map_err(|_| LockError::SolverNotFound)?;
        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(LockError::Solver {
                status: output.status.code().unwrap_or(-1),
                output: combined,
            });
        }

        let text = fs::read_to_string(&manifest_path)?;
        let manifest: ResolvedManifest =
            toml::from_str(&text).map_err(|e| LockError::Solver {
                status: 0,
                output: format!("unparseable resolved manifest: {e}"),
            })?;
        Ok(manifest)
    }

    /// `requirements.in`: explicit specs plus local wheels as direct URLs.
    /// Returns the set of requested canonical names.
    fn write_requirements(&self, work: &Path) -> Result<BTreeSet<String>> {
        let mut requested = BTreeSet::new();
        let mut lines = Vec::new();
        for spec in &self.specs {
            let req: crate::pep::Requirement = spec.parse()?;
            requested.insert(req.name);
            lines.push(spec.clone());
        }
        for path in &self.wheels {
            let path = crate::fsutil::absolutize(path)?;
            let metadata = wheel::read_metadata(&path)?;
            let name = canonicalize_name(&metadata.name);
            lines.push(format!("{name} @ file://{}", path.display()));
            requested.insert(name);
        }
        lines.sort();
        fs::write(work.join("requirements.in"), lines.join("\n"))?;
        Ok(requested)
    }

    /// `constraints.txt`: pin every package already in the lock to its
    /// current location, except the ones being re-requested.
    fn write_constraints(
        &self,
        work: &Path,
        lock: &Lockfile,
        requested: &BTreeSet<String>,
    ) -> Result<PathBuf> {
        let input_dir = self
            .input
            .parent()
            .map(Path::to_path_buf)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));

        let mut lines = Vec::new();
        for entry in lock.packages.values() {
            let name = canonicalize_name(&entry.name);
            if requested.contains(&name) {
                continue;
            }
            let url = location_url(
                &entry.name,
                &entry.file_name,
                &input_dir,
                self.input_base_url.as_deref(),
            )?;
            lines.push(format!("{name} @ {url}"));
        }
        for constraint in &self.constraints {
            let req: crate::pep::Requirement = constraint.parse()?;
            if !requested.contains(&req.name) {
                lines.push(constraint.clone());
            }
        }
        lines.sort();
        let path = work.join("constraints.txt");
        fs::write(&path, lines.join("\n"))?;
        Ok(path)
    }

    fn write_excludes(&self, work: &Path) -> Result<Option<PathBuf>> {
        if self.excludes.is_empty() {
            return Ok(None);
        }
        let mut lines: Vec<String> = self.excludes.iter().map(|e| canonicalize_name(e)).collect();
        lines.sort();
        let path = work.join("excludes.txt");
        fs::write(&path, lines.join("\n"))?;
        Ok(Some(path))
    }

    /// Materialize every wheel the manifest names into `wheel_dir`,
    /// skipping wheels whose hash already matches the lock. Returns the
    /// fetched paths plus, per package, the remote URL it came from.
    fn fetch_new_wheels(
        &self,
        manifest: &ResolvedManifest,
        work: &Path,
        wheel_dir: &Path,
        lock: &Lockfile,
    ) -> Result<(Vec<PathBuf>, BTreeMap<String, String>)> {
        let mut new_wheels = Vec::new();
        let mut new_wheel_urls = BTreeMap::new();
        for package in &manifest.packages {
            let name = canonicalize_name(&package.name);
            let in_lock_hash = lock.packages.get(&name).map(|e| e.sha256.as_str());

            if let Some(archive) = &package.archive {
                if let Some(path) = &archive.path {
                    let src = work.join(path);
                    let dest = wheel_dir.join(src.file_name().unwrap_or_default());
                    if src != dest {
                        fs::copy(&src, &dest)?;
                    }
                    new_wheels.push(dest);
                    continue;
                }
                if let Some(url) = &archive.url {
                    if hash_matches_lock(archive.hashes.sha256.as_deref(), in_lock_hash) {
                        continue;
                    }
                    new_wheels.push(fetch_wheel(url, wheel_dir)?);
                    new_wheel_urls.insert(name, url.clone());
                    continue;
                }
            }
            if let Some(first) = package.wheels.first() {
                if let Some(url) = &first.url {
                    if hash_matches_lock(first.hashes.sha256.as_deref(), in_lock_hash) {
                        continue;
                    }
                    new_wheels.push(fetch_wheel(url, wheel_dir)?);
                    new_wheel_urls.insert(name, url.clone());
                }
            }
        }
        Ok((new_wheels, new_wheel_urls))
    }

    fn solver_bin(&self) -> Result<PathBuf> {
        if let Some(bin) = &self.solver_bin {
            return Ok(bin.clone());
        }
        if let Some(bin) = std::env::var_os(ENV_SOLVER_BIN) {
            return Ok(PathBuf::from(bin));
        }
        Ok(PathBuf::from("uv"))
    }
}

/// Resolved manifest the solver produces. Parsed permissively: it belongs
/// to the external tool, not to us.
#[derive(Debug, Deserialize)]
struct ResolvedManifest {
    #[serde(default)]
    packages: Vec<ResolvedPackage>,
}

#[derive(Debug, Deserialize)]
struct ResolvedPackage {
    name: String,
    #[serde(default)]
    wheels: Vec<ResolvedWheel>,
    #[serde(default)]
    archive: Option<ResolvedWheel>,
}

#[derive(Debug, Deserialize)]
struct ResolvedWheel {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    hashes: ResolvedHashes,
}

#[derive(Debug, Deserialize, Default)]
struct ResolvedHashes {
    #[serde(default)]
    sha256: Option<String>,
}

/// A wheel already present in the lock with the same content hash needs
/// no re-fetch.
pub(crate) fn hash_matches_lock(manifest_hash: Option<&str>, lock_hash: Option<&str>) -> bool {
    match (manifest_hash, lock_hash) {
        (Some(m), Some(l)) => !l.is_empty() && m == l,
        _ => false,
    }
}

/// Express a lock entry's location as a URL the solver can install from.
/// Every entry must pin to *something*, or the solver is free to float it
/// to a different version; an unpinnable entry fails the solve.
pub(crate) fn location_url(
    package: &str,
    file_name: &str,
    input_dir: &Path,
    input_base_url: Option<&str>,
) -> Result<String> {
    if file_name.starts_with("http://")
        || file_name.starts_with("https://")
        || file_name.starts_with("file://")
    {
        return Ok(file_name.to_string());
    }
    let local = input_dir.join(file_name);
    if local.exists() {
        let absolute = fs::canonicalize(&local)?;
        return Ok(format!("file://{}", absolute.display()));
    }
    if let Some(base) = input_base_url {
        return Ok(format!("{}/{file_name}", base.trim_end_matches('/')));
    }
    Err(LockError::UnpinnableLocation {
        package: package.to_string(),
        location: file_name.to_string(),
    })
}

/// Rewrite merged entries whose wheel came from a preserved URL prefix to
/// point back at the remote URL, dropping the local copy.
pub(crate) fn apply_remote_wheels(
    lock: &mut Lockfile,
    new_wheel_urls: &BTreeMap<String, String>,
    prefixes: &[String],
    wheel_dir: &Path,
) -> Result<()> {
    if prefixes.is_empty() {
        return Ok(());
    }
    for (name, url) in new_wheel_urls {
        if !prefixes.iter().any(|p| url.starts_with(p.as_str())) {
            continue;
        }
        let Some(entry) = lock.packages.get_mut(name) else {
            continue;
        };
        let local = wheel_dir.join(
            Path::new(&entry.file_name)
                .file_name()
                .unwrap_or_default(),
        );
        if local.is_file() {
            fs::remove_file(&local)?;
        }
        entry.file_name = url.clone();
    }
    Ok(())
}

/// Blocking download of one wheel into `dir`.
fn fetch_wheel(url: &str, dir: &Path) -> Result<PathBuf> {
    let fetch_err = |reason: String| LockError::Fetch {
        url: url.to_string(),
        reason,
    };
    let file_name = url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| fetch_err("URL has no file name".to_string()))?;
    let dest = dir.join(file_name);

    if let Some(path) = url.strip_prefix("file://") {
        let src = PathBuf::from(path);
        if src != dest {
            fs::copy(&src, &dest)?;
        }
        return Ok(dest);
    }

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| fetch_err(e.to_string()))?;
    let bytes = response.bytes().map_err(|e| fetch_err(e.to_string()))?;
    fs::write(&dest, &bytes)?;
    Ok(dest)
}
