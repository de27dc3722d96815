//! On-disk layout of the track index.
//!
//! ```json
//! { "version": 1, "tracks": [ TrackRecord, ... ] }
//! ```
//!
//! Tracks are stored in creation order, which is also strictly increasing id order.

use std::{io, path::Path};

use serde::{Deserialize, Serialize};

use crate::{domain::track::TrackRecord, storage::error::StoreError};

pub const INDEX_VERSION: u32 = 1;

#[derive(Serialize)]
struct IndexRef<'a> {
    version: u32,
    tracks: &'a [TrackRecord],
}

#[derive(Deserialize)]
struct IndexOwned {
    version: u32,
    tracks: Vec<TrackRecord>,
}

pub fn encode(tracks: &[TrackRecord]) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec_pretty(&IndexRef {
        version: INDEX_VERSION,
        tracks,
    })?)
}

/// Reads the index. A missing file is an empty store; anything unreadable is corruption.
pub fn load(path: &Path) -> Result<Vec<TrackRecord>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::Fs(e)),
    };

    let corrupt = |reason: String| StoreError::CorruptStore {
        path: path.to_path_buf(),
        reason,
    };

    let index: IndexOwned =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("unparseable index: {e}")))?;

    if index.version != INDEX_VERSION {
        return Err(corrupt(format!(
            "unsupported index version {}",
            index.version
        )));
    }

    if let Some(pair) = index.tracks.windows(2).find(|w| w[0].id >= w[1].id) {
        return Err(corrupt(format!(
            "track {} is out of order or duplicated",
            pair[1].id
        )));
    }

    Ok(index.tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ids::TrackId, track::FileMeta};
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(id: u64) -> TrackRecord {
        TrackRecord {
            id: TrackId(id),
            title: format!("Track {id}"),
            artist: "Jane Doe".to_string(),
            fingerprint: format!("bafy{id}"),
            external_ref: format!("0x{id}"),
            file_meta: FileMeta {
                original_name: "t.mp3".to_string(),
                mime_type: "audio/mpeg".to_string(),
                size_bytes: 1024,
            },
            created_at: Utc::now(),
            certificate_ref: format!("http://localhost:4000/certificates/{id}"),
        }
    }

    #[test]
    fn test_missing_index_is_empty() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        assert!(load(&tmp.path().join("tracks.json"))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_encoded_index_loads_back() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("tracks.json");
        let tracks = vec![record(1), record(2), record(5)];

        std::fs::write(&path, encode(&tracks)?)?;

        assert_eq!(load(&path)?, tracks);
        Ok(())
    }

    #[test]
    fn test_garbage_is_corrupt() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("tracks.json");

        for garbage in [
            &b""[..],
            &b"{\"version\":1,\"tracks\":[{\"id\""[..],
            &b"[]"[..],
        ] {
            std::fs::write(&path, garbage)?;
            assert!(matches!(load(&path), Err(StoreError::CorruptStore { .. })));
        }
        Ok(())
    }

    #[test]
    fn test_unknown_version_is_corrupt() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("tracks.json");
        std::fs::write(&path, r#"{"version": 7, "tracks": []}"#)?;

        match load(&path) {
            Err(StoreError::CorruptStore { reason, .. }) => {
                assert!(reason.contains("version 7"))
            }
            other => panic!("expected corrupt store, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_duplicate_ids_are_corrupt() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("tracks.json");
        std::fs::write(&path, encode(&[record(3), record(3)])?)?;

        assert!(matches!(load(&path), Err(StoreError::CorruptStore { .. })));
        Ok(())
    }
}
