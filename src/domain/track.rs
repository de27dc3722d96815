use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TrackId;

/// A certified track, as persisted in the index.
///
/// Records are created once by the certificate store and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub fingerprint: String,
    pub external_ref: String,
    pub file_meta: FileMeta,
    pub created_at: DateTime<Utc>,
    pub certificate_ref: String,
}

/// Describes the submitted audio file. The bytes themselves are not owned by the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Raw submission, as received from a form or the command line
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub file: Option<SubmittedFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedFile {
    pub original_name: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
}

/// Validated submission, waiting for identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDraft {
    pub title: String,
    pub artist: String,
    pub file_meta: FileMeta,
    /// Fingerprint returned by a content store; when absent the minted placeholder is used
    pub fingerprint: Option<String>,
}

impl TrackDraft {
    pub fn with_fingerprint(self, fingerprint: String) -> Self {
        Self {
            fingerprint: Some(fingerprint),
            ..self
        }
    }
}
