//! Local path normalization and splitting.
//!
//! Paths inside a context are `/`-separated, carry no leading slash, and the
//! context root is the empty string. Directory paths have no trailing slash
//! once they're used as index keys.

use crate::{Error, Invariant, Result};

/// Validate a single link/child name per spec §7's BadArgument triggers:
/// required-but-empty, or `.`/`..`/otherwise not a valid path segment.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Invariant(Invariant::EmptyArgument { name: "name" }));
    }
    if name == "." || name == ".." || name.contains('/') {
        return Err(Error::Invariant(Invariant::InvalidName {
            name: name.to_owned(),
        }));
    }
    Ok(())
}

/// Validate a full local path: every segment must be a valid name, and none
/// may be `..`, which would walk above the context root.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    for segment in path.split('/') {
        if segment == ".." {
            return Err(Error::Invariant(Invariant::OutsideRoot {
                path: path.to_owned(),
            }));
        }
        if segment.is_empty() || segment == "." {
            return Err(Error::Invariant(Invariant::InvalidName {
                name: path.to_owned(),
            }));
        }
    }
    Ok(())
}

/// Split `path` into `(parent, child)`.
///
/// - A leading `/` is stripped before any other processing.
/// - `""` splits to `(None, "")` — the root has no parent.
/// - A trailing `/` is trimmed before splitting.
/// - If there's no `/` left after trimming, the parent is the root (`Some("")`).
/// - Otherwise the parent is everything before the last `/`.
pub fn split_parent_child(path: &str) -> (Option<String>, String) {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return (None, String::new());
    }

    let trimmed = path.strip_suffix('/').unwrap_or(path);
    match trimmed.rfind('/') {
        Some(idx) => (
            Some(trimmed[..idx].to_owned()),
            trimmed[idx + 1..].to_owned(),
        ),
        None => (Some(String::new()), trimmed.to_owned()),
    }
}

/// Join a parent local path and a child name into a local path.
///
/// The root's children are named directly (`"foo"`); any other parent's
/// children are prefixed with `"parent/"`.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}

/// Strip a `prefix` (a `rootEntryPath`, empty or ending in `/`) from a raw zip
/// entry name, yielding the local path relative to a context root.
///
/// Returns `None` if `name` does not start with `prefix`.
pub fn strip_root(prefix: &str, name: &str) -> Option<String> {
    name.strip_prefix(prefix).map(|s| s.to_owned())
}
