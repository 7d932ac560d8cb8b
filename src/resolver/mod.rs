//! The consistency-merge engine: take a batch of wheels, derive draft
//! package entries, resolve every dependency edge against the batch plus
//! the existing lockfile, expand extras, normalize locations, and merge.
//!
//! The existing lockfile is only ever read. All new state is built in a
//! draft map and merged into a copy at the end of the batch, so a failed
//! batch leaves the caller's lockfile fully intact.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::colors::*;
use crate::environment::{marker_environment, EnvironmentSource, MarkerEnv};
use crate::error::{LockError, Result};
use crate::fsutil;
use crate::lockfile::{Lockfile, PackageEntry, PackageType};
use crate::pep::Requirement;
use crate::wheel::{self, WheelFilename, WheelMetadata};

#[derive(Debug, Clone, Default)]
pub struct AddWheelsOptions {
    /// Wheel locations are rewritten relative to this path. Defaults to
    /// the parent directory of the first wheel in the batch.
    pub base_path: Option<PathBuf>,
    /// Prefix prepended to every rewritten location, for wheels hosted
    /// away from the core distribution.
    pub base_url: String,
    /// Record dependency edges even when they resolve to nothing. The
    /// resulting lockfile may be broken; this is an explicit escape hatch.
    pub ignore_missing: bool,
    pub source: EnvironmentSource,
}

/// A draft entry for one wheel in the batch, not yet merged.
struct Draft {
    entry: PackageEntry,
    path: PathBuf,
}

/// Wheel metadata is consulted several times per merge (base dependency
/// scan, then once per extras pass), so parse each archive only once.
/// The cache is scoped to one merge invocation.
#[derive(Default)]
struct MetadataCache {
    map: HashMap<PathBuf, WheelMetadata>,
}

impl MetadataCache {
    fn get(&mut self, path: &Path) -> Result<WheelMetadata> {
        if let Some(meta) = self.map.get(path) {
            return Ok(meta.clone());
        }
        let meta = wheel::read_metadata(path)?;
        self.map.insert(path.to_path_buf(), meta.clone());
        Ok(meta)
    }
}

/// Merge a batch of wheels into a lockfile, returning a new lockfile.
/// The input lockfile is never mutated; merging an empty batch returns an
/// equal copy.
pub fn add_wheels(
    lock: &Lockfile,
    wheels: &[PathBuf],
    opts: &AddWheelsOptions,
) -> Result<Lockfile> {
    let mut new_lock = lock.clone();
    if wheels.is_empty() {
        return Ok(new_lock);
    }

    let wheels: Vec<PathBuf> = wheels
        .iter()
        .map(|w| fsutil::absolutize(w))
        .collect::<Result<_>>()?;
    let base_path = match &opts.base_path {
        Some(base) => fsutil::absolutize(base)?,
        None => wheels[0]
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .to_path_buf(),
    };

    let env = marker_environment(&lock.info, opts.source)?;
    let mut cache = MetadataCache::default();

    let mut drafts: BTreeMap<String, Draft> = BTreeMap::new();
    for path in &wheels {
        let draft = draft_from_wheel(path, lock, &mut cache)?;
        drafts.insert(draft.entry.name.clone(), draft);
    }

    resolve_dependencies(lock, &mut drafts, &env, opts.ignore_missing, &mut cache)?;

    for draft in drafts.values_mut() {
        let relative = fsutil::relative_location(&draft.path, &base_path)?;
        draft.entry.file_name = format!("{}{}", opts.base_url, relative);
    }

    for (name, draft) in drafts {
        new_lock.packages.insert(name, draft.entry);
    }
    Ok(new_lock)
}

/// Build a dependency-less draft entry from an on-disk wheel. The
/// compatibility check runs before the archive is opened at all.
fn draft_from_wheel(path: &Path, lock: &Lockfile, cache: &mut MetadataCache) -> Result<Draft> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let parsed: WheelFilename = file_name.parse()?;
    crate::compat::check_wheel_compatible(&parsed, &lock.info)?;

    let metadata = cache.get(path)?;
    let name = crate::pep::canonicalize_name(&metadata.name);

    let imports = match wheel::top_level_imports(path)? {
        Some(imports) => imports,
        None => {
            eprintln!(
                "{C_GRAY}[wasmlock]{C_RESET} {C_YELLOW}warning{C_RESET}: failed to find top-level imports in {file_name}"
            );
            Vec::new()
        }
    };

    Ok(Draft {
        entry: PackageEntry {
            name,
            version: metadata.version.clone(),
            file_name: file_name.to_string(),
            install_dir: "site".to_string(),
            sha256: fsutil::file_sha256(path)?,
            package_type: PackageType::Package,
            imports,
            depends: Vec::new(),
            unvendored_tests: false,
            shared_library: false,
        },
        path: path.to_path_buf(),
    })
}

/// Populate the depends list of every draft entry, per the closure rules:
/// marker-false requirements are silently dropped, every surviving edge
/// must resolve inside batch ∪ lockfile, and extras on in-batch packages
/// augment the *target* package's edges via a worklist.
fn resolve_dependencies(
    lock: &Lockfile,
    drafts: &mut BTreeMap<String, Draft>,
    env: &MarkerEnv,
    ignore_missing: bool,
    cache: &mut MetadataCache,
) -> Result<()> {
    let batch_names: BTreeSet<String> = drafts.keys().cloned().collect();
    let known = |name: &str| batch_names.contains(name) || lock.packages.contains_key(name);

    // growable dependency sets per draft, finalized only once the
    // worklist is empty
    let mut dep_sets: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut pending: Vec<Requirement> = Vec::new();

    for (name, draft) in drafts.iter() {
        let metadata = cache.get(&draft.path)?;
        let mut depends: Vec<String> = Vec::new();
        for req in &metadata.requires_dist {
            if let Some(marker) = &req.marker {
                if !marker.evaluate(env) {
                    // inapplicable on this target, e.g. an OS-specific
                    // dependency or an extras-only requirement
                    continue;
                }
            }
            if !req.extras.is_empty() {
                // the target package may need this extra's own
                // sub-requirements; decided during the drain below
                pending.push(req.clone());
            }
            if req.name == *name {
                // a package asking for its own extras adds no edge
                continue;
            }
            if known(&req.name) || ignore_missing {
                depends.push(req.name.clone());
            } else {
                return Err(LockError::MissingDependency {
                    package: name.clone(),
                    requirement: req.name.clone(),
                });
            }
        }
        dep_sets.insert(name.clone(), depends);
    }

    // Drain pending extras. Only in-batch targets are expanded: packages
    // already in the lockfile are not being recomputed here. The batch is
    // fixed, so the worklist is bounded and this terminates.
    while let Some(req) = pending.pop() {
        let Some(draft) = drafts.get(&req.name) else {
            continue;
        };
        let metadata = cache.get(&draft.path)?;
        for extra in &req.extras {
            let extra_env = env.with_extra(extra);
            for sub in &metadata.requires_dist {
                if sub.name == req.name {
                    continue;
                }
                if dep_sets
                    .get(&req.name)
                    .is_some_and(|deps| deps.contains(&sub.name))
                {
                    continue;
                }
                // unconditional requirements were handled in the base pass
                let Some(marker) = &sub.marker else {
                    continue;
                };
                if !marker.evaluate(&extra_env) {
                    continue;
                }
                if known(&sub.name) {
                    dep_sets
                        .get_mut(&req.name)
                        .expect("extras target is a draft")
                        .push(sub.name.clone());
                    if !sub.extras.is_empty() {
                        pending.push(sub.clone());
                    }
                } else if ignore_missing {
                    dep_sets
                        .get_mut(&req.name)
                        .expect("extras target is a draft")
                        .push(sub.name.clone());
                } else {
                    return Err(LockError::MissingDependency {
                        package: req.name.clone(),
                        requirement: sub.name.clone(),
                    });
                }
            }
        }
    }

    for (name, mut depends) in dep_sets {
        depends.sort();
        depends.dedup();
        drafts
            .get_mut(&name)
            .expect("dep set key is a draft")
            .entry
            .depends = depends;
    }
    Ok(())
}
