use std::path::PathBuf;

use thiserror::Error;

use crate::{certificate::RenderError, domain::codec::ValidationError, storage::content::StorageUnavailable};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("track {id} not found")]
    NotFound { id: String },

    #[error("certificate store index {} is corrupt: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error(transparent)]
    StorageUnavailable(#[from] StorageUnavailable),

    #[error(transparent)]
    RenderFailure(#[from] RenderError),

    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound { id: id.into() }
    }
}
