//! Atomic file replacement.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{DebsignError, DebsignResult};

/// Replace `path` with `content` through a temp file in the same directory.
///
/// Permissions of an existing target are carried over to the new file.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> DebsignResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DebsignError::io(dir, e))?;
    tmp.write_all(content)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| DebsignError::io(tmp.path(), e))?;

    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| DebsignError::io(tmp.path(), e))?;
    }

    tmp.persist(path)
        .map_err(|e| DebsignError::io(path, e.error))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "replaced file");
    Ok(())
}
