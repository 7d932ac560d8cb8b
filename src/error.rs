use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LockError>;

/// Everything the lockfile engine can fail with. All of these are
/// deterministic input-validation failures; none are retried.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("wheel '{wheel}' is incompatible with this distribution, expected {expected}")]
    IncompatibleWheel { wheel: String, expected: String },

    #[error("could not read wheel metadata from '{path}': {reason}")]
    UnreadableWheel { path: String, reason: String },

    #[error("requirement '{requirement}' of package '{package}' is not in the lockfile or the added wheels")]
    MissingDependency {
        package: String,
        requirement: String,
    },

    #[error("wheel path '{path}' is not under base path '{base}'")]
    PathNotUnderBase { path: PathBuf, base: PathBuf },

    #[error("wheel filename check failed:\n{}", format_lines(.0))]
    FilenameMismatch(Vec<String>),

    #[error("lockfile has unresolved dependencies:\n{}", format_lines(.0))]
    UnresolvedDepends(Vec<String>),

    #[error("invalid wheel filename '{name}': {reason}")]
    InvalidWheelName { name: String, reason: String },

    #[error("invalid requirement '{requirement}': {reason}")]
    InvalidRequirement { requirement: String, reason: String },

    #[error("invalid marker expression '{marker}': {reason}")]
    InvalidMarker { marker: String, reason: String },

    #[error("cannot parse python version '{0}'")]
    InvalidPythonVersion(String),

    #[error("cannot pin '{package}' ('{location}') to an installable URL: wheel not found next to the lockfile and no input base URL is set")]
    UnpinnableLocation { package: String, location: String },

    #[error("solver exited with status {status}:\n{output}")]
    Solver { status: i32, output: String },

    #[error("no solver binary found: set --solver-bin, $WASMLOCK_SOLVER, or put 'uv' on PATH")]
    SolverNotFound,

    #[error("failed to fetch '{url}': {reason}")]
    Fetch { url: String, reason: String },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid lockfile: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_lines(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| format!("  - {l}"))
        .collect::<Vec<_>>()
        .join("\n")
}
