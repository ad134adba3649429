use std::path::Path;

use crate::{Error, Result};

/// Strip write and execute bits from an extracted file.
///
/// On Unix: sets `0o444` (r--r--r--). Elsewhere this is a no-op, since a
/// read-only attribute would block the recursive delete of the staging tree.
#[cfg(unix)]
pub fn mark_read_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o444)).map_err(|e| {
        Error::Permissions {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
pub fn mark_read_only(_path: &Path) -> Result<()> { Ok(()) }

/// Whether any execute bit is set.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool { false }
