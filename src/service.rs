//! Entry point used by the HTTP server and the CLI.
//!
//! [`TrackVault`] ties the record codec, the content store and the certificate
//! store together. Uploads to the content store happen before the store's
//! writer lock is taken.

use std::sync::Arc;

use log::{info, warn};

use crate::{
    certificate::JsonCertificateRenderer,
    config::Config,
    domain::{
        codec,
        track::{Submission, TrackRecord},
    },
    storage::{
        content::{ContentStore, LocalContentStore, StorageUnavailable},
        error::StoreError,
        store::{CertificateStore, Verification},
    },
};

pub struct TrackVault {
    store: CertificateStore,
    content: Option<Arc<dyn ContentStore>>,
}

impl TrackVault {
    pub fn new(store: CertificateStore, content: Option<Arc<dyn ContentStore>>) -> Self {
        Self { store, content }
    }

    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let store = CertificateStore::open(
            &config.store,
            config.public_endpoint.clone(),
            Box::new(JsonCertificateRenderer),
        )?;

        let content: Option<Arc<dyn ContentStore>> = match &config.content_store {
            Some(cs) => {
                info!("Content store at {}", cs.path.to_string_lossy());
                Some(Arc::new(LocalContentStore::open(&cs.path)?))
            }
            None => {
                warn!("No content store configured, fingerprints will be placeholders");
                None
            }
        };

        Ok(Self::new(store, content))
    }

    /// Validates a submission, stores the audio and certifies the track
    pub fn mint_track(
        &self,
        submission: &Submission,
        audio: &[u8],
    ) -> Result<TrackRecord, StoreError> {
        let draft = codec::normalize(submission)?;

        let draft = match &self.content {
            Some(content) => draft.with_fingerprint(content.put(audio)?),
            None => draft,
        };

        self.store.append(draft)
    }

    pub fn list_tracks(&self, owner: Option<&str>) -> Result<Vec<TrackRecord>, StoreError> {
        self.store.list(owner)
    }

    pub fn get_certificate(&self, id: &str) -> Result<String, StoreError> {
        self.store.certificate_ref(id)
    }

    pub fn certificate_document(&self, id: &str) -> Result<(Vec<u8>, &'static str), StoreError> {
        Ok((
            self.store.certificate_document(id)?,
            self.store.certificate_mime_type(),
        ))
    }

    pub fn verify_certificate(&self, id: &str) -> Result<Verification, StoreError> {
        self.store.verify(id)
    }

    /// Pushes the rendered certificate to the content store, returns its fingerprint
    pub fn publish_certificate(&self, id: &str) -> Result<String, StoreError> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| StorageUnavailable("no content store configured".to_string()))?;

        let document = self.store.certificate_document(id)?;
        let fingerprint = content.put(&document)?;
        info!("Published certificate of track {id} as {fingerprint}");
        Ok(fingerprint)
    }
}
