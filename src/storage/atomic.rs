//! Crash-safe file replacement: write a sibling temp file, fsync it, rename it
//! over the target, then fsync the directory.
//!
//! A reader of the target path sees either the old contents or the new ones,
//! never a torn write.

use std::{
    ffi::OsString,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

/// `tracks.json` -> `tracks.json.tmp`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Fully written and synced temp file, not yet visible under its target name
#[derive(Debug)]
#[must_use = "staged contents are invisible until committed"]
pub struct StagedFile {
    tmp: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    pub fn commit(self) -> io::Result<()> {
        fs::rename(&self.tmp, &self.target)?;
        sync_parent_dir(&self.target)
    }
}

pub fn stage(path: &Path, contents: &[u8]) -> io::Result<StagedFile> {
    let tmp = temp_path_for(path);

    let written = (|| -> io::Result<()> {
        let mut tmp_file = fs::File::create(&tmp)?;
        tmp_file.write_all(contents)?;
        tmp_file.sync_all()
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    Ok(StagedFile {
        tmp,
        target: path.to_path_buf(),
    })
}

pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    stage(path, contents)?.commit()
}

#[cfg(unix)]
pub(crate) fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::File::open(dir)?.sync_all()
}

// directories cannot be opened for syncing here; rename durability is left to the OS
#[cfg(not(unix))]
pub(crate) fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_keeps_extension() {
        assert_eq!(
            temp_path_for(Path::new("/vault/tracks.json")),
            PathBuf::from("/vault/tracks.json.tmp")
        );
        assert_eq!(
            temp_path_for(Path::new("certificates/track_1.json")),
            PathBuf::from("certificates/track_1.json.tmp")
        );
    }

    #[test]
    fn test_write_atomic_replaces_contents() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("tracks.json");

        write_atomic(&path, b"first")?;
        write_atomic(&path, b"second")?;

        assert_eq!(fs::read(&path)?, b"second");
        assert!(!temp_path_for(&path).exists());
        Ok(())
    }

    #[test]
    fn test_staged_file_is_invisible_until_commit() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("tracks.json");
        write_atomic(&path, b"old")?;

        let staged = stage(&path, b"new")?;
        assert_eq!(fs::read(&path)?, b"old");
        assert!(temp_path_for(&path).exists());

        staged.commit()?;
        assert_eq!(fs::read(&path)?, b"new");
        Ok(())
    }

    #[test]
    fn test_stage_into_missing_directory_fails_cleanly() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("tracks.json");

        assert!(stage(&path, b"data").is_err());
        assert!(!temp_path_for(&path).exists());
    }
}
