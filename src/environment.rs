use std::collections::BTreeMap;

use crate::error::{LockError, Result};
use crate::lockfile::RuntimeInfo;

/// Flat key/value mapping a marker expression is evaluated against.
/// Unknown keys read as the empty string, which matches how `extra`
/// behaves when no extra has been requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerEnv {
    map: BTreeMap<String, String>,
}

impl MarkerEnv {
    pub fn get(&self, key: &str) -> &str {
        self.map.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// A copy of this environment with `extra` bound, for evaluating
    /// extras-gated requirements of a single package.
    pub fn with_extra(&self, extra: &str) -> MarkerEnv {
        let mut env = self.clone();
        env.set("extra", extra);
        env
    }
}

/// Where marker environment values come from. `Descriptor` reconstructs
/// everything from the lockfile's own info block and is the deterministic
/// default; `Host` queries the machine we are running on, which is only
/// correct when that machine *is* the target runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentSource {
    #[default]
    Descriptor,
    Host,
}

pub fn marker_environment(info: &RuntimeInfo, source: EnvironmentSource) -> Result<MarkerEnv> {
    match source {
        EnvironmentSource::Descriptor => from_descriptor(info),
        EnvironmentSource::Host => from_host(info),
    }
}

/// Split major.minor out of an interpreter version string.
pub fn python_major_minor(python: &str) -> Result<(u64, u64)> {
    let mut parts = python.split('.');
    let major = parts.next().and_then(leading_number);
    let minor = parts.next().and_then(leading_number);
    match (major, minor) {
        (Some(major), Some(minor)) => Ok((major, minor)),
        _ => Err(LockError::InvalidPythonVersion(python.to_string())),
    }
}

fn leading_number(part: &str) -> Option<u64> {
    let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn from_descriptor(info: &RuntimeInfo) -> Result<MarkerEnv> {
    let (major, minor) = python_major_minor(&info.python)?;
    // "emscripten_3_1_39" splits into sys_platform "emscripten" and
    // platform_release "3_1_39" at the first underscore.
    let (sys_platform, platform_release) = info
        .platform
        .split_once('_')
        .unwrap_or((info.platform.as_str(), ""));

    let mut env = MarkerEnv::default();
    env.set("implementation_name", "cpython");
    env.set("implementation_version", &info.python);
    env.set("os_name", "posix");
    env.set("platform_machine", info.arch.to_string());
    env.set("platform_release", platform_release);
    env.set("platform_system", capitalize(sys_platform));
    env.set("platform_version", "#1");
    env.set("platform_python_implementation", "CPython");
    env.set("python_full_version", &info.python);
    env.set("python_version", format!("{major}.{minor}"));
    env.set("sys_platform", sys_platform);
    Ok(env)
}

/// Query the live host instead of reconstructing. Interpreter fields still
/// come from the descriptor since the host has no interpreter of its own.
fn from_host(info: &RuntimeInfo) -> Result<MarkerEnv> {
    let (major, minor) = python_major_minor(&info.python)?;
    let sys_platform = match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        os => os,
    };
    let mut env = MarkerEnv::default();
    env.set("implementation_name", "cpython");
    env.set("implementation_version", &info.python);
    env.set(
        "os_name",
        if cfg!(windows) { "nt" } else { "posix" },
    );
    env.set("platform_machine", std::env::consts::ARCH);
    env.set("platform_release", "");
    env.set("platform_system", capitalize(sys_platform));
    env.set("platform_version", "");
    env.set("platform_python_implementation", "CPython");
    env.set("python_full_version", &info.python);
    env.set("python_version", format!("{major}.{minor}"));
    env.set("sys_platform", sys_platform);
    Ok(env)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
