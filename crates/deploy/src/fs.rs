//! File system utils.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use fs2::FileExt;

pub struct FsHandler;

impl FsHandler {
    /// Create a directory (and its parents) if it doesn't exist.
    pub fn create_dir(path: &Path) -> std::io::Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)?;
            tracing::debug!("Created directory: {}", path.display());
        }
        Ok(())
    }

    /// Replace `path` with `contents` without ever exposing a partial file.
    ///
    /// The data is written and synced to a sibling temporary file, which is then
    /// renamed over the target. Readers see either the old or the new file.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Self::create_dir(parent)?;
        }

        let tmp_path = Self::temp_path_for(path);
        let result = (|| {
            let mut file = File::create(&tmp_path)?;
            file.write_all(contents)?;
            file.sync_all()?;
            std::fs::rename(&tmp_path, path)
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&tmp_path);
        }
        result
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.tmp-{}", file_name, std::process::id()))
    }
}

/// Exclusive advisory lock held for the duration of a run against one environment.
///
/// Released when dropped.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock, failing immediately if another run holds it.
    pub fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            FsHandler::create_dir(parent).context("Failed to create lock directory")?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .context(format!("Failed to open lock file {}", path.display()))?;

        FileExt::try_lock_exclusive(&file).context(format!(
            "Another run holds the lock at {}",
            path.display()
        ))?;

        tracing::debug!(path = %path.display(), "Run lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(err = %e, path = %self.path.display(), "Failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = TempDir::new("fs").unwrap();
        let path = dir.path().join("nested/out.env");

        FsHandler::write_atomic(&path, b"A=1\n").unwrap();
        FsHandler::write_atomic(&path, b"B=2\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "B=2\n");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_second_lock_is_refused_until_release() {
        let dir = TempDir::new("lock").unwrap();
        let path = dir.path().join("development/.lock");

        let lock = RunLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
        assert!(RunLock::acquire(&path).is_err());

        drop(lock);
        assert!(RunLock::acquire(&path).is_ok());
    }
}
