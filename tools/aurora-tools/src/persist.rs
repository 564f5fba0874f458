//! Writing a built image to disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ToolError;

/// Default output path, relative to the repository root.
pub const DEFAULT_OUT: &str = "build/init.elf";

/// Result of a successful write.
#[derive(Debug, Serialize)]
pub struct WriteOutput {
    pub path: PathBuf,
    pub bytes: usize,
}

/// Write `bytes` to `path`, creating parent directories as needed.
///
/// Writes to a temporary sibling first, then renames, so an interrupted run
/// never leaves a truncated image behind.
pub fn write_image(path: &Path, bytes: &[u8]) -> Result<WriteOutput, ToolError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| ToolError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let write_err = |source| ToolError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Err(source) = fs::write(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(source));
    }

    log::info!("wrote {} bytes to {}", bytes.len(), path.display());
    Ok(WriteOutput {
        path: path.to_path_buf(),
        bytes: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/init.elf");
        let out = write_image(&path, b"\x7fELF").unwrap();
        assert_eq!(out.bytes, 4);
        assert_eq!(fs::read(&path).unwrap(), b"\x7fELF");
        assert!(!dir.path().join("a/b/init.elf.tmp").exists());
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.elf");
        fs::write(&path, b"old contents that are longer").unwrap();
        write_image(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target path makes the rename fail.
        let path = dir.path().join("init.elf");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"").unwrap();

        let err = write_image(&path, b"x").unwrap_err();
        assert!(matches!(err, ToolError::Write { .. }));
        assert!(!dir.path().join("init.elf.tmp").exists());
    }

    #[test]
    fn failed_temp_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the temp file goes makes the write itself fail.
        fs::create_dir(dir.path().join("init.elf.tmp")).unwrap();
        let err = write_image(&dir.path().join("init.elf"), b"x").unwrap_err();
        assert!(matches!(err, ToolError::Write { .. }));
        assert!(!dir.path().join("init.elf").exists());
    }

    #[test]
    fn parent_that_is_a_file_fails_with_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("build");
        fs::write(&blocker, b"").unwrap();
        let err = write_image(&blocker.join("init.elf"), b"x").unwrap_err();
        assert!(matches!(err, ToolError::Write { .. }));
        assert_eq!(err.exit_status(), 1);
    }
}
