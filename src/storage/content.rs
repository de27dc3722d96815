//! Content-addressed storage for submitted bytes.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::debug;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::{domain::ids::FINGERPRINT_PREFIX, storage::atomic::sync_parent_dir};

#[derive(Debug, Error)]
#[error("content storage unavailable: {0}")]
pub struct StorageUnavailable(pub String);

/// Stores bytes and returns an opaque fingerprint addressing them
pub trait ContentStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<String, StorageUnavailable>;
}

/// Blob directory addressed by BLAKE3 digest. Identical content is stored once.
///
/// Uploads run outside the certificate store's writer lock, so every writer
/// stages into its own temp file and a blob only appears fully written.
#[derive(Debug)]
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn open(root: &Path) -> Result<Self, StorageUnavailable> {
        std::fs::create_dir_all(root).map_err(|e| {
            StorageUnavailable(format!(
                "cannot create blob directory {}: {e}",
                root.to_string_lossy()
            ))
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn fingerprint_of(bytes: &[u8]) -> String {
        format!("{FINGERPRINT_PREFIX}{}", blake3::hash(bytes).to_hex())
    }

    fn blob_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join(fingerprint)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.blob_path(fingerprint).is_file()
    }

    fn write_blob(&self, fingerprint: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.blob_path(fingerprint);

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;

        match tmp.persist_noclobber(&path) {
            Ok(_) => sync_parent_dir(&path),
            // a concurrent writer stored the same content first
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e.error),
        }
    }
}

impl ContentStore for LocalContentStore {
    fn put(&self, bytes: &[u8]) -> Result<String, StorageUnavailable> {
        let fingerprint = Self::fingerprint_of(bytes);
        if self.contains(&fingerprint) {
            debug!("blob {fingerprint} already stored");
            return Ok(fingerprint);
        }

        self.write_blob(&fingerprint, bytes).map_err(|e| {
            StorageUnavailable(format!("failed to write blob {fingerprint}: {e}"))
        })?;
        debug!("stored blob {fingerprint} ({} bytes)", bytes.len());
        Ok(fingerprint)
    }
}

#[cfg(test)]
pub(crate) mod doubles {
    use super::*;

    /// Test double: content store that is always unreachable
    pub struct UnreachableContentStore;

    impl ContentStore for UnreachableContentStore {
        fn put(&self, _bytes: &[u8]) -> Result<String, StorageUnavailable> {
            Err(StorageUnavailable("gateway timed out".to_string()))
        }
    }
}
