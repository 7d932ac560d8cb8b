use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

use crate::error::{LockError, Result};

pub mod marker;

pub use marker::MarkerExpr;

static NAME_NORMALIZE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_.]+").unwrap());

/// Canonical package name: lowercase, with runs of `.`, `_` and `-`
/// collapsed to a single `-`. Divergent spellings of the same package
/// unify under this form before any map lookup.
pub fn canonicalize_name(name: &str) -> String {
    NAME_NORMALIZE
        .replace_all(name.trim(), "-")
        .to_ascii_lowercase()
}

/// Normalized comparison form for version strings: lowercase, no leading
/// `v`, trailing `.0` release segments stripped ("1.24.0" == "1.24").
pub fn canonicalize_version(version: &str) -> String {
    let mut v = version
        .trim()
        .trim_start_matches(['v', 'V'])
        .to_ascii_lowercase();
    while let Some(stripped) = v.strip_suffix(".0") {
        if stripped.contains(|c: char| c.is_ascii_digit()) {
            v = stripped.to_string();
        } else {
            break;
        }
    }
    v
}

/// One declared requirement of a package. Version constraints and URLs are
/// parsed past and dropped: a lockfile dependency edge is purely nominal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Canonical name of the required package.
    pub name: String,
    /// Canonical extra names this requirement asks of the target package.
    pub extras: Vec<String>,
    /// Marker predicate; `None` means the requirement always applies.
    pub marker: Option<MarkerExpr>,
}

impl FromStr for Requirement {
    type Err = LockError;

    fn from_str(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| LockError::InvalidRequirement {
            requirement: raw.to_string(),
            reason: reason.to_string(),
        };

        let (head, marker_str) = split_marker(raw);
        let head = head.trim();

        let name_len = head
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(head.len());
        if name_len == 0 {
            return Err(invalid("missing package name"));
        }
        let name = canonicalize_name(&head[..name_len]);

        let mut rest = head[name_len..].trim_start();
        let mut extras = Vec::new();
        if let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped.find(']').ok_or_else(|| invalid("unclosed extras"))?;
            extras = stripped[..end]
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(canonicalize_name)
                .collect();
            rest = stripped[end + 1..].trim_start();
        }
        // The remainder is a version specifier set or a direct URL, neither
        // of which survives into the lockfile.
        let _ = rest;

        let marker = match marker_str {
            Some(m) if !m.trim().is_empty() => Some(m.trim().parse()?),
            _ => None,
        };

        Ok(Requirement {
            name,
            extras,
            marker,
        })
    }
}

/// Split a requirement string into its head and marker part at the first
/// `;` outside of quotes.
fn split_marker(raw: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    for (i, c) in raw.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == ';' => return (&raw[..i], Some(&raw[i + 1..])),
            None => {}
        }
    }
    (raw, None)
}
