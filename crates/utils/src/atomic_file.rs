//! Atomic file operations so a crash never leaves a half-written config

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;
use warden_core::{Error, Result};

/// Write data to a file atomically by writing to a temporary file and renaming.
///
/// On unix the file is created with `mode`; elsewhere the mode is ignored.
pub fn write_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()
            .map_err(|e| Error::file_system(path, "resolve working directory", e))?,
    };

    fs::create_dir_all(&parent)
        .map_err(|e| Error::file_system(&parent, "create parent directory", e))?;

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let result = (|| -> Result<()> {
        let mut options = OpenOptions::new();
        options.create(true).write(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let mut file = options
            .open(&temp_path)
            .map_err(|e| Error::file_system(&temp_path, "create temporary file", e))?;

        file.write_all(content)
            .map_err(|e| Error::file_system(&temp_path, "write to temporary file", e))?;

        file.sync_all()
            .map_err(|e| Error::file_system(&temp_path, "sync temporary file", e))?;

        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::file_system(path, "atomic rename", e)
    })?;

    Ok(())
}

/// Write string content to an owner-only file atomically
pub fn write_atomic_private(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes(), 0o600)
}
