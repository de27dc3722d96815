use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, RwLock},
};

use anyhow::anyhow;
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    certificate::{CertificateRenderer, CertificateSnapshot},
    config::{PublicEndpoint, StoreConfig},
    domain::{
        ids::{IdGenerator, TrackId},
        track::{TrackDraft, TrackRecord},
    },
    public_endpoint::certificate_url,
    storage::{
        atomic::{self, temp_path_for},
        error::StoreError,
        index,
    },
};

pub const INDEX_FILE: &str = "tracks.json";
pub const CERTIFICATES_DIR: &str = "certificates";

/// Immutable view of the record set. Replaced wholesale on every append.
#[derive(Debug, Default)]
struct StoreState {
    records: Vec<TrackRecord>,
    positions: HashMap<TrackId, usize>,
}

impl StoreState {
    fn from_records(records: Vec<TrackRecord>) -> Self {
        let positions = records
            .iter()
            .enumerate()
            .map(|(pos, record)| (record.id, pos))
            .collect();
        Self { records, positions }
    }

    fn with_appended(&self, record: TrackRecord) -> Self {
        let mut records = Vec::with_capacity(self.records.len() + 1);
        records.extend_from_slice(&self.records);
        let mut positions = self.positions.clone();
        positions.insert(record.id, records.len());
        records.push(record);
        Self { records, positions }
    }

    fn get(&self, id: &TrackId) -> Option<&TrackRecord> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    fn last_id(&self) -> Option<TrackId> {
        self.records.last().map(|r| r.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verification {
    pub id: TrackId,
    pub verified: bool,
    pub seal: String,
}

/// Owns the track index and the certificate snapshot directory.
///
/// Appends are serialized through the writer lock, which also guards the id
/// generator. Reads clone an `Arc` of the current state and never wait for an
/// append's disk I/O.
pub struct CertificateStore {
    index_path: PathBuf,
    certificates_dir: PathBuf,
    endpoint: PublicEndpoint,
    renderer: Box<dyn CertificateRenderer>,
    state: RwLock<Arc<StoreState>>,
    writer: Mutex<IdGenerator>,
}

impl CertificateStore {
    /// Opens the store in `config.dir`, creating it if needed.
    ///
    /// Fails with [`StoreError::CorruptStore`] rather than starting empty when
    /// an existing index cannot be read.
    pub fn open(
        config: &StoreConfig,
        endpoint: PublicEndpoint,
        renderer: Box<dyn CertificateRenderer>,
    ) -> Result<Self, StoreError> {
        let certificates_dir = config.dir.join(CERTIFICATES_DIR);
        std::fs::create_dir_all(&certificates_dir)?;

        let index_path = config.dir.join(INDEX_FILE);
        discard_interrupted_write(&index_path)?;

        let records = index::load(&index_path)?;
        info!(
            "Restored {} tracks from {}",
            records.len(),
            index_path.to_string_lossy()
        );

        let state = StoreState::from_records(records);
        let generator = IdGenerator::resume_after(state.last_id());

        let store = Self {
            index_path,
            certificates_dir,
            endpoint,
            renderer,
            state: RwLock::new(Arc::new(state)),
            writer: Mutex::new(generator),
        };
        store.repair_snapshots()?;
        Ok(store)
    }

    fn current(&self) -> Result<Arc<StoreState>, StoreError> {
        let state = self.state.read().map_err(|e| {
            StoreError::Internal(anyhow!("certificate store state poisoned: {e}"))
        })?;
        Ok(Arc::clone(&state))
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, IdGenerator>, StoreError> {
        self.writer.lock().map_err(|e| {
            StoreError::Internal(anyhow!("certificate store writer poisoned: {e}"))
        })
    }

    fn snapshot_path(&self, id: &TrackId) -> PathBuf {
        self.certificates_dir
            .join(format!("track_{id}.{}", self.renderer.extension()))
    }

    fn render(&self, record: &TrackRecord) -> Result<Vec<u8>, StoreError> {
        let snapshot = CertificateSnapshot::for_record(record, &self.endpoint)?;
        Ok(self.renderer.render(&snapshot)?)
    }

    fn write_snapshot(&self, record: &TrackRecord) -> Result<PathBuf, StoreError> {
        let document = self.render(record)?;
        let path = self.snapshot_path(&record.id);
        atomic::write_atomic(&path, &document)?;
        Ok(path)
    }

    /// Regenerates every snapshot missing on disk. Only called while the store is not shared yet.
    fn repair_snapshots(&self) -> Result<(), StoreError> {
        let state = self.current()?;
        for record in &state.records {
            if !self.snapshot_path(&record.id).is_file() {
                let path = self.write_snapshot(record)?;
                info!(
                    "Regenerated missing certificate for track {} at {}",
                    record.id,
                    path.to_string_lossy()
                );
            }
        }
        Ok(())
    }

    /// Persists a new record and its certificate.
    ///
    /// The index is the ground truth: it is replaced atomically before the
    /// snapshot is written, and the in-memory state only changes once the
    /// rename is done. A failure before that point leaves the store exactly as
    /// it was.
    pub fn append(&self, draft: TrackDraft) -> Result<TrackRecord, StoreError> {
        let mut generator = self.lock_writer()?;

        let minted = generator.mint();
        let record = TrackRecord {
            id: minted.id,
            title: draft.title,
            artist: draft.artist,
            fingerprint: draft.fingerprint.unwrap_or(minted.fingerprint),
            external_ref: minted.external_ref,
            file_meta: draft.file_meta,
            created_at: Utc::now(),
            certificate_ref: certificate_url(&self.endpoint, &minted.id),
        };

        let document = self.render(&record)?;

        let next = self.current()?.with_appended(record.clone());
        atomic::write_atomic(&self.index_path, &index::encode(&next.records)?)?;
        debug!(
            "Persisted {} tracks to {}",
            next.records.len(),
            self.index_path.to_string_lossy()
        );

        *self.state.write().map_err(|e| {
            StoreError::Internal(anyhow!("certificate store state poisoned: {e}"))
        })? = Arc::new(next);

        let snapshot_path = self.snapshot_path(&record.id);
        match atomic::write_atomic(&snapshot_path, &document) {
            Ok(()) => debug!(
                "Certificate saved to {}",
                snapshot_path.to_string_lossy()
            ),
            Err(e) => warn!(
                "Track {} committed but its certificate could not be written, it will be regenerated: {e}",
                record.id
            ),
        }

        info!(
            "Certified track {} '{}' by {}",
            record.id, record.title, record.artist
        );
        Ok(record)
    }

    /// All tracks in creation order.
    ///
    /// The store has a single owner scope, so every owner key sees the same records.
    pub fn list(&self, owner: Option<&str>) -> Result<Vec<TrackRecord>, StoreError> {
        if let Some(owner) = owner {
            debug!("listing tracks for owner {owner}");
        }
        Ok(self.current()?.records.clone())
    }

    pub fn get(&self, id: &str) -> Result<TrackRecord, StoreError> {
        let track_id: TrackId = id.parse().map_err(|_| StoreError::not_found(id))?;
        self.current()?
            .get(&track_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    /// Makes sure the record's snapshot exists, rewriting it under the writer lock if not
    fn ensure_snapshot(&self, record: &TrackRecord) -> Result<PathBuf, StoreError> {
        let path = self.snapshot_path(&record.id);
        if path.is_file() {
            return Ok(path);
        }

        let _writer = self.lock_writer()?;
        if !path.is_file() {
            self.write_snapshot(record)?;
            info!("Regenerated missing certificate for track {}", record.id);
        }
        Ok(path)
    }

    pub fn certificate_ref(&self, id: &str) -> Result<String, StoreError> {
        let record = self.get(id)?;
        self.ensure_snapshot(&record)?;
        Ok(record.certificate_ref)
    }

    /// Rendered certificate document of a track
    pub fn certificate_document(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let record = self.get(id)?;
        let path = self.ensure_snapshot(&record)?;
        Ok(std::fs::read(path)?)
    }

    pub fn certificate_mime_type(&self) -> &'static str {
        self.renderer.mime_type()
    }

    /// Checks that the stored certificate still attests to the indexed record.
    ///
    /// A document that no longer parses is reported as unverified.
    pub fn verify(&self, id: &str) -> Result<Verification, StoreError> {
        let record = self.get(id)?;
        let stored = self.certificate_document(id)?;

        let verified = match self.renderer.parse(&stored) {
            Ok(snapshot) => snapshot.attests(&record),
            Err(e) => {
                warn!("Certificate for track {} is unreadable: {e}", record.id);
                false
            }
        };

        Ok(Verification {
            id: record.id,
            verified,
            seal: crate::certificate::seal(&record),
        })
    }
}

/// Drops a temp index left behind by a write that never reached its rename
fn discard_interrupted_write(index_path: &Path) -> Result<(), StoreError> {
    let tmp = temp_path_for(index_path);
    if tmp.exists() {
        warn!(
            "Discarding interrupted index write {}",
            tmp.to_string_lossy()
        );
        std::fs::remove_file(&tmp)?;
    }
    Ok(())
}
