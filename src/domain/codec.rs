//! Turns raw submissions into validated drafts.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::track::{FileMeta, Submission, SubmittedFile, TrackDraft};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MissingField {
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "artist")]
    Artist,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "file.originalName")]
    FileName,
    #[serde(rename = "file.mimeType")]
    FileMimeType,
    #[serde(rename = "file.sizeBytes")]
    FileSize,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissingField::Title => "title",
            MissingField::Artist => "artist",
            MissingField::File => "file",
            MissingField::FileName => "file.originalName",
            MissingField::FileMimeType => "file.mimeType",
            MissingField::FileSize => "file.sizeBytes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required fields: {}", join(.missing_fields))]
pub struct ValidationError {
    pub missing_fields: Vec<MissingField>,
}

fn join(fields: &[MissingField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn normalize_file(file: &SubmittedFile, missing: &mut Vec<MissingField>) -> Option<FileMeta> {
    let original_name = non_blank(&file.original_name);
    let mime_type = non_blank(&file.mime_type);

    if original_name.is_none() {
        missing.push(MissingField::FileName);
    }
    if mime_type.is_none() {
        missing.push(MissingField::FileMimeType);
    }
    if file.size_bytes == 0 {
        missing.push(MissingField::FileSize);
    }

    Some(FileMeta {
        original_name: original_name?,
        mime_type: mime_type?,
        size_bytes: file.size_bytes,
    })
}

/// Validates a submission, reporting every missing field at once
pub fn normalize(submission: &Submission) -> Result<TrackDraft, ValidationError> {
    let mut missing = Vec::new();

    let title = non_blank(&submission.title);
    if title.is_none() {
        missing.push(MissingField::Title);
    }

    let artist = non_blank(&submission.artist);
    if artist.is_none() {
        missing.push(MissingField::Artist);
    }

    let file_meta = match &submission.file {
        Some(file) => normalize_file(file, &mut missing),
        None => {
            missing.push(MissingField::File);
            None
        }
    };

    match (title, artist, file_meta) {
        (Some(title), Some(artist), Some(file_meta)) if missing.is_empty() => Ok(TrackDraft {
            title,
            artist,
            file_meta,
            fingerprint: None,
        }),
        _ => Err(ValidationError {
            missing_fields: missing,
        }),
    }
}
