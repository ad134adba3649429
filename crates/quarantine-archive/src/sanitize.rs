use std::path::{Component, Path, PathBuf};

use crate::error::{StrategyError, StrategyResult};

/// An archive entry name made safe for staging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    /// Normalized archive-internal path, `/`-separated.
    pub relative: String,
    /// `base` joined with `relative`.
    pub resolved: PathBuf,
}

/// Normalize an entry name and resolve it under `base`.
///
/// Backslashes are treated as separators and `.` components are dropped.
/// Any name that is absolute, carries a drive prefix, contains a NUL byte,
/// or climbs above `base` through `..` is rejected as a corrupt archive.
pub fn sanitize_entry_path(entry_name: &str, base: &Path) -> StrategyResult<SanitizedPath> {
    if entry_name.contains('\0') {
        return Err(reject(entry_name, "contains a NUL byte"));
    }

    let unified = entry_name.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(reject(entry_name, "is an absolute path"));
    }

    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => match part.to_str() {
                Some(part) => parts.push(part),
                None => return Err(reject(entry_name, "is not valid UTF-8")),
            },
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(reject(entry_name, "escapes the staging directory"));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(reject(entry_name, "is an absolute path"));
            }
        }
    }

    if parts.is_empty() {
        return Err(reject(entry_name, "has no file name"));
    }

    let relative = parts.join("/");
    let resolved = parts.iter().fold(base.to_path_buf(), |acc, part| acc.join(part));

    if !resolved.starts_with(base) {
        return Err(reject(entry_name, "escapes the staging directory"));
    }

    Ok(SanitizedPath { relative, resolved })
}

/// Whether `path` lies under `base` after lexical normalization.
pub fn is_contained(path: &Path, base: &Path) -> bool {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return false;
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized.starts_with(base)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

fn reject(entry_name: &str, reason: &str) -> StrategyError {
    StrategyError::corrupt(format!("entry '{}' {reason}", entry_name.escape_debug()))
}
